//! tubetto library crate.
//!
//! Stream resolution, the same-origin streaming proxy, catalog metadata
//! sync and the HTTP surface exposing them. The binary wires these
//! together; integration tests drive them directly.

pub mod api;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod resolver;
pub mod sync;
pub mod utils;

pub use error::{Error, Result};
