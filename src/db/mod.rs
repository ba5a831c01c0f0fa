//! Database module for uptrail.
//!
//! Provides the append-only SQLite record store with embedded migrations.

mod models;
mod query;
mod store;

pub use models::*;
pub use query::*;
pub use store::*;
