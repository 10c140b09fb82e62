//! Remote state store: trait, REST client and in-memory implementation

pub mod memory;
pub mod rest;
pub mod types;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

pub use memory::MemoryStore;
pub use rest::RestStore;
pub use types::{DailyDelta, DailyPatch, DailyRecord, DailyState, ProgressPatch, ProgressRecord, ProgressState};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure (connect, TLS, body read)
    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Store answered with a non-success status
    #[error("store responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body does not match the expected row shape
    #[error("unexpected store response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Write succeeded but no row was returned
    #[error("store returned no row")]
    EmptyResponse,

    /// Increment would push a counter past `i64::MAX`
    #[error("counter overflow for user {user_id} on {day}")]
    CounterOverflow { user_id: i64, day: NaiveDate },

    #[error("invalid store URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the request handlers need from the hosted store.
///
/// Upserts are idempotent and keyed by user (and day for daily rows).
/// [`StateStore::increment_daily`] must be atomic on the store side so that
/// concurrent batches from the same user do not lose updates.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn fetch_progress(&self, user_id: i64) -> StoreResult<Option<ProgressRecord>>;

    async fn upsert_progress(&self, patch: &ProgressPatch) -> StoreResult<ProgressRecord>;

    async fn fetch_daily(&self, user_id: i64, day: NaiveDate) -> StoreResult<Option<DailyRecord>>;

    async fn upsert_daily(&self, patch: &DailyPatch) -> StoreResult<DailyRecord>;

    async fn increment_daily(&self, user_id: i64, day: NaiveDate, delta: &DailyDelta) -> StoreResult<DailyRecord>;
}
