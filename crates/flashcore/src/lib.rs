//! flashcore - core library for the flashsync Mini App relay
//!
//! This library holds everything that is not HTTP: the Telegram WebApp
//! `initData` verifier, configuration, logging setup, the record types and
//! the remote state store client.
//!
//! # Module Structure
//!
//! - `auth`: Telegram WebApp signature verification
//! - `core`: Configuration and logging
//! - `events`: Typed batch events and their aggregation into counter deltas
//! - `storage`: Store trait, REST client and in-memory store

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod auth;
pub mod core;
pub mod events;
pub mod storage;

// Re-export commonly used types for convenience
pub use auth::{AuthFailure, Identity, Verifier};
pub use core::config::{AllowedOrigin, Config, ConfigError};
pub use storage::{DailyRecord, MemoryStore, ProgressRecord, RestStore, StateStore, StoreError};
