//! Core types and trait definitions for the worksite directory.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! It defines the entity model, the [`store::EntityStore`] abstraction, and
//! the policy layer over it: sequence allocation for site codes, conflict
//! detection, merge resolution, and dependent-record transfer.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod allocator;
pub mod conflict;
pub mod entity;
pub mod error;
pub mod merge;
pub mod registry;
pub mod store;
pub mod transfer;

pub use error::{Error, Result};
