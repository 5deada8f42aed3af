//! SQLite backend for the Deckhand checklist store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Row changes are captured by triggers
//! into a `change_log` table and read back through [`SqliteChangeFeed`].

mod encode;
mod schema;
mod store;

pub mod error;
pub mod feed;

pub use error::{Error, Result};
pub use feed::{SqliteChangeFeed, SqliteChangeStream};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
