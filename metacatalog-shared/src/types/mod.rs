//! Core data structures of the catalog.

pub mod aggregation;
pub mod context;
pub mod page;
pub mod supplementary;
