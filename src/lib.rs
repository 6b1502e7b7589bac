//! # Context Recorder
//!
//! A local-first recorder for code context: short notes, decisions, bug
//! reports and commit descriptions linked to the project files they
//! explain, kept in SQLite and searchable with a fuzzy in-memory index.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │   CLI    │──▶│ Recorder (core)              │──▶│  SQLite  │
//! │  (ccr)   │   │ Retrieval + SearchIndex      │   │ contexts │
//! └──────────┘   └──────────────────────────────┘   └──────────┘
//! ```
//!
//! The entry model, the [`Store`](context_recorder_core::store::Store)
//! trait, the search index and analytics live in `context-recorder-core`.
//! This crate adds the SQLite backend, configuration and the command
//! implementations behind `ccr`.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | Connection pool and `Store` over SQLite |
//! | [`add`] | `ccr add`, `ccr edit` |
//! | [`search`] | `ccr search`, `ccr suggest`, `ccr related` |
//! | [`timeline`] | `ccr timeline`, `ccr recent`, `ccr commit`, `ccr author` |
//! | [`get`] | `ccr get`, `ccr delete` |
//! | [`stats`] | `ccr stats` |
//! | [`export`] | `ccr export`, `ccr import` |

pub mod add;
pub mod config;
pub mod export;
pub mod get;
pub mod migrate;
pub mod render;
pub mod search;
pub mod sqlite_store;
pub mod stats;
pub mod timeline;
