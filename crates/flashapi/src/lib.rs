//! flashapi - HTTP relay for the Telegram Mini App
//!
//! Verifies Telegram `initData` on every call and relays progress and daily
//! stats to the hosted store. No state survives a request.
//!
//! # Module Structure
//!
//! - `server`: Shared state, router and CORS setup
//! - `handlers`: `/api/progress` and `/api/daily` request handlers
//! - `identity`: Credential extraction and verification
//! - `error`: API error taxonomy and its HTTP mapping
//! - `cli`: Command line interface

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cli;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod server;

pub use error::ApiError;
pub use server::{create_router, run_server, AppState};
