//! Repository layer for database access.

pub mod catalog;
pub mod memory;

pub use catalog::{CatalogRepository, SqlxCatalogRepository};
pub use memory::InMemoryCatalog;
