//! # Context Recorder Core
//!
//! Persistence-independent logic for the Context Recorder: the entry model,
//! the store abstraction, the in-memory fuzzy search index, retrieval,
//! analytics and the [`Recorder`](recorder::Recorder) facade.
//!
//! This crate has no tokio, sqlx or filesystem dependencies; the search
//! index is a RAM-only tantivy index. The SQLite backend lives in the
//! `context-recorder` crate and implements [`store::Store`].

pub mod analytics;
pub mod error;
pub mod events;
pub mod index;
pub mod models;
pub mod recorder;
pub mod search;
pub mod store;
