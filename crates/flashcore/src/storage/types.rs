//! Record types exchanged with the store and the Mini App
//!
//! Store rows use the table column names (snake_case). The `*State` types are
//! the camelCase shapes returned to the client.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::StoreError;

/// Table holding one progress row per user
pub const PROGRESS_TABLE: &str = "user_progress";

/// Table holding one row per user and day
pub const DAILY_TABLE: &str = "daily_stats";

/// Stored procedure that adds deltas to a daily row, creating it if needed
pub const INCREMENT_DAILY_FN: &str = "increment_daily_stats";

/// Treats an explicit JSON `null` column the same as a missing one.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Progress
// ============================================================================

/// Row of the `user_progress` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pairs: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub known: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub counters: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// State of a user that never synced
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            pairs: Vec::new(),
            known: Vec::new(),
            counters: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Applies the fields present in `patch`; absent fields keep their value.
    pub fn merge(&mut self, patch: &ProgressPatch) {
        if let Some(pairs) = &patch.pairs {
            self.pairs = pairs.clone();
        }
        if let Some(known) = &patch.known {
            self.known = known.clone();
        }
        if let Some(counters) = &patch.counters {
            self.counters = counters.clone();
        }
        self.updated_at = Some(patch.updated_at);
    }

    pub fn to_state(&self) -> ProgressState {
        ProgressState {
            user_id: self.user_id,
            pairs: self.pairs.clone(),
            known: self.known.clone(),
            counters: self.counters.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Upsert payload for `user_progress`; `None` columns are left untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressPatch {
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairs: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<BTreeMap<String, i64>>,
    pub updated_at: DateTime<Utc>,
}

/// Progress as sent by and returned to the Mini App
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub user_id: i64,
    pub pairs: Vec<Value>,
    pub known: Vec<Value>,
    pub counters: BTreeMap<String, i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Daily stats
// ============================================================================

/// Row of the `daily_stats` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub user_id: i64,
    pub day: NaiveDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cards: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quiz: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cheese: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub accent: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailyRecord {
    pub fn empty(user_id: i64, day: NaiveDate) -> Self {
        Self {
            user_id,
            day,
            cards: 0,
            quiz: 0,
            cheese: 0,
            accent: 0,
            updated_at: None,
        }
    }

    pub fn merge(&mut self, patch: &DailyPatch) {
        if let Some(cards) = patch.cards {
            self.cards = cards;
        }
        if let Some(quiz) = patch.quiz {
            self.quiz = quiz;
        }
        if let Some(cheese) = patch.cheese {
            self.cheese = cheese;
        }
        if let Some(accent) = patch.accent {
            self.accent = accent;
        }
        self.updated_at = Some(patch.updated_at);
    }

    /// Adds `delta` to the counters; on overflow nothing is changed.
    pub fn apply(&mut self, delta: &DailyDelta) -> Result<(), StoreError> {
        let overflow = || StoreError::CounterOverflow {
            user_id: self.user_id,
            day: self.day,
        };
        let cards = self.cards.checked_add(delta.cards).ok_or_else(overflow)?;
        let quiz = self.quiz.checked_add(delta.quiz).ok_or_else(overflow)?;
        let cheese = self.cheese.checked_add(delta.cheese).ok_or_else(overflow)?;
        let accent = self.accent.checked_add(delta.accent).ok_or_else(overflow)?;

        self.cards = cards;
        self.quiz = quiz;
        self.cheese = cheese;
        self.accent = accent;
        Ok(())
    }

    pub fn to_state(&self) -> DailyState {
        DailyState {
            user_id: self.user_id,
            day: self.day,
            cards: self.cards,
            quiz: self.quiz,
            cheese: self.cheese,
            accent: self.accent,
        }
    }
}

/// Upsert payload for `daily_stats`; `None` counters are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPatch {
    pub user_id: i64,
    pub day: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cards: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheese: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// Per-counter increments applied through the atomic increment path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyDelta {
    pub cards: i64,
    pub quiz: i64,
    pub cheese: i64,
    pub accent: i64,
}

impl DailyDelta {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Daily stats as returned to the Mini App
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyState {
    pub user_id: i64,
    pub day: NaiveDate,
    pub cards: i64,
    pub quiz: i64,
    pub cheese: i64,
    pub accent: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_progress_row_with_null_columns() {
        let row: ProgressRecord = serde_json::from_value(json!({
            "user_id": 5,
            "pairs": null,
            "known": ["a"],
            "updated_at": "2026-10-18T09:30:00.123456+00:00"
        }))
        .unwrap();

        assert!(row.pairs.is_empty());
        assert_eq!(row.known, vec![json!("a")]);
        assert!(row.counters.is_empty());
        assert!(row.updated_at.is_some());
    }

    #[test]
    fn test_progress_state_is_camel_case() {
        let state = ProgressRecord::empty(7).to_state();
        let value = serde_json::to_value(&state).unwrap();

        assert_eq!(
            value,
            json!({ "userId": 7, "pairs": [], "known": [], "counters": {}, "updatedAt": null })
        );
    }

    #[test]
    fn test_progress_patch_skips_absent_columns() {
        let patch = ProgressPatch {
            user_id: 1,
            pairs: None,
            known: Some(vec![json!(3)]),
            counters: None,
            updated_at: "2026-10-18T00:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&patch).unwrap();

        assert_eq!(
            value,
            json!({ "user_id": 1, "known": [3], "updated_at": "2026-10-18T00:00:00Z" })
        );
    }

    #[test]
    fn test_progress_merge_keeps_untouched_fields() {
        let mut record = ProgressRecord::empty(1);
        record.pairs = vec![json!({"en": "cat", "ru": "кот"})];

        record.merge(&ProgressPatch {
            user_id: 1,
            pairs: None,
            known: Some(vec![json!("cat")]),
            counters: Some(BTreeMap::from([("streak".to_string(), 3)])),
            updated_at: Utc::now(),
        });

        assert_eq!(record.pairs.len(), 1);
        assert_eq!(record.known, vec![json!("cat")]);
        assert_eq!(record.counters["streak"], 3);
    }

    #[test]
    fn test_daily_row_and_state() {
        let row: DailyRecord = serde_json::from_value(json!({
            "user_id": 9,
            "day": "2026-10-18",
            "cards": 4,
            "quiz": null,
            "cheese": 1
        }))
        .unwrap();

        assert_eq!(row.quiz, 0);
        assert_eq!(row.accent, 0);
        assert_eq!(
            serde_json::to_value(row.to_state()).unwrap(),
            json!({ "userId": 9, "day": "2026-10-18", "cards": 4, "quiz": 0, "cheese": 1, "accent": 0 })
        );
    }

    #[test]
    fn test_daily_apply_delta() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let mut record = DailyRecord::empty(1, day);
        record
            .apply(&DailyDelta {
                cards: 2,
                quiz: 1,
                cheese: 0,
                accent: 5,
            })
            .unwrap();

        assert_eq!((record.cards, record.quiz, record.cheese, record.accent), (2, 1, 0, 5));
        assert!(DailyDelta::default().is_zero());
    }

    #[test]
    fn test_daily_apply_overflow_leaves_record_unchanged() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let mut record = DailyRecord::empty(3, day);
        record.cards = i64::MAX;
        record.quiz = 4;

        let result = record.apply(&DailyDelta {
            cards: 1,
            quiz: 1,
            ..DailyDelta::default()
        });

        assert!(matches!(
            result,
            Err(StoreError::CounterOverflow { user_id: 3, .. })
        ));
        assert_eq!((record.cards, record.quiz), (i64::MAX, 4));
    }
}
