//! In-process store for local development (`serve --memory-store`) and tests.
//!
//! Same contract as the REST store: upserts merge by key and increments are
//! applied under the lock, so concurrent batches never lose updates.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{DailyDelta, DailyPatch, DailyRecord, ProgressPatch, ProgressRecord, StateStore, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    progress: Mutex<HashMap<i64, ProgressRecord>>,
    daily: Mutex<HashMap<(i64, NaiveDate), DailyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored progress rows
    pub async fn progress_rows(&self) -> usize {
        self.progress.lock().await.len()
    }

    /// Number of stored daily rows
    pub async fn daily_rows(&self) -> usize {
        self.daily.lock().await.len()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn fetch_progress(&self, user_id: i64) -> StoreResult<Option<ProgressRecord>> {
        Ok(self.progress.lock().await.get(&user_id).cloned())
    }

    async fn upsert_progress(&self, patch: &ProgressPatch) -> StoreResult<ProgressRecord> {
        let mut progress = self.progress.lock().await;
        let record = progress
            .entry(patch.user_id)
            .or_insert_with(|| ProgressRecord::empty(patch.user_id));
        record.merge(patch);
        Ok(record.clone())
    }

    async fn fetch_daily(&self, user_id: i64, day: NaiveDate) -> StoreResult<Option<DailyRecord>> {
        Ok(self.daily.lock().await.get(&(user_id, day)).cloned())
    }

    async fn upsert_daily(&self, patch: &DailyPatch) -> StoreResult<DailyRecord> {
        let mut daily = self.daily.lock().await;
        let record = daily
            .entry((patch.user_id, patch.day))
            .or_insert_with(|| DailyRecord::empty(patch.user_id, patch.day));
        record.merge(patch);
        Ok(record.clone())
    }

    async fn increment_daily(&self, user_id: i64, day: NaiveDate, delta: &DailyDelta) -> StoreResult<DailyRecord> {
        let mut daily = self.daily.lock().await;
        let record = daily
            .entry((user_id, day))
            .or_insert_with(|| DailyRecord::empty(user_id, day));
        record.apply(delta)?;
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;
    use serde_json::json;
    use std::sync::Arc;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_missing_progress() {
        let store = MemoryStore::new();
        assert!(store.fetch_progress(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_progress_is_idempotent() {
        let store = MemoryStore::new();
        let patch = ProgressPatch {
            user_id: 1,
            pairs: Some(vec![json!({"en": "dog"})]),
            known: Some(vec![]),
            counters: None,
            updated_at: Utc::now(),
        };

        let first = store.upsert_progress(&patch).await.unwrap();
        let second = store.upsert_progress(&patch).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.progress_rows().await, 1);
    }

    #[tokio::test]
    async fn test_daily_rows_are_keyed_by_day() {
        let store = MemoryStore::new();
        let delta = DailyDelta {
            cards: 1,
            ..DailyDelta::default()
        };
        let next_day = day().succ_opt().unwrap();

        store.increment_daily(1, day(), &delta).await.unwrap();
        store.increment_daily(1, next_day, &delta).await.unwrap();

        assert_eq!(store.daily_rows().await, 2);
        assert_eq!(store.fetch_daily(1, day()).await.unwrap().unwrap().cards, 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        let delta = DailyDelta {
            cards: 1,
            ..DailyDelta::default()
        };

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.increment_daily(7, day(), &delta).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = store.fetch_daily(7, day()).await.unwrap().unwrap();
        assert_eq!(record.cards, 16);
        assert_eq!(record.quiz, 0);
    }

    #[tokio::test]
    async fn test_upsert_daily_merges_counters() {
        let store = MemoryStore::new();
        store
            .increment_daily(
                3,
                day(),
                &DailyDelta {
                    cards: 4,
                    quiz: 2,
                    ..DailyDelta::default()
                },
            )
            .await
            .unwrap();

        let record = store
            .upsert_daily(&DailyPatch {
                user_id: 3,
                day: day(),
                cards: None,
                quiz: Some(10),
                cheese: None,
                accent: None,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!((record.cards, record.quiz), (4, 10));
    }

    #[tokio::test]
    async fn test_increment_past_max_is_error() {
        let store = MemoryStore::new();
        store
            .upsert_daily(&DailyPatch {
                user_id: 5,
                day: day(),
                cards: Some(i64::MAX),
                quiz: None,
                cheese: None,
                accent: None,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let result = store
            .increment_daily(5, day(), &DailyDelta { cards: 1, ..DailyDelta::default() })
            .await;

        assert!(matches!(result, Err(StoreError::CounterOverflow { .. })));
        assert_eq!(store.fetch_daily(5, day()).await.unwrap().unwrap().cards, i64::MAX);
    }
}
