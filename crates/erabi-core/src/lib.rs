//! Media discovery and selection core.
//!
//! [`fetch`] runs every configured source for one request and exposes the
//! merged, deduplicated results plus per-source lifecycle. [`selector`]
//! filters those results through layered preferences and picks one item.

pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod models;
pub mod selector;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErabiError, SourceError};
