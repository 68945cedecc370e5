// HTTP request handlers
pub mod contexts;
pub mod info;
pub mod pages;
