//! # Metacatalog
//!
//! HTTP service for a metadata catalog stored in a search engine.
//!
//! ## Architecture
//!
//! Pages live in per-context physical indices named `{context}_v{version}`.
//! Each index is aliased by its context name and by every parent context, so
//! a read through a parent's name sees the pages of all its children.
//!
//! ## Modules
//!
//! - [`config`]: Environment settings and dependency initialization
//! - [`server`]: Axum routes, handlers and shared state
//! - [`errors`]: Service error type and its HTTP rendering

pub mod config;
pub mod errors;
pub mod server;

pub use config::{Dependencies, Settings};
pub use errors::AppError;
pub use server::{create_app, run_server};
