//! Core types and trait definitions for Colloquy.
//!
//! Discussion-id derivation, discussion building and mention aggregation are
//! pure and live here. This crate is free of HTTP and database dependencies;
//! storage is abstracted behind the traits in [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod discussion;
pub mod error;
pub mod identity;
pub mod mention;
pub mod note;
pub mod noteable;
pub mod references;
pub mod store;
pub mod thread;

pub use discussion::{DiscussionId, DiscussionKind, IdComponent, compute_discussion_id};
pub use error::{Error, Result};
pub use thread::Discussion;
