//! Core types and trait definitions for the Deckhand shared checklist.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::ChecklistStore`] and
//! [`store::ChangeFeed`]; the transport crates depend on those traits, not on
//! any concrete backend.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod bridge;
pub mod crew;
pub mod error;
pub mod event;
pub mod item;
pub mod state;
pub mod store;
pub mod trip;
pub mod user;

pub use error::{Classify, Error, ErrorKind, Result};
