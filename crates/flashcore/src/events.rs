//! Typed batch events for daily stats
//!
//! The Mini App reports activity as a list of events; a batch is folded into
//! a single [`DailyDelta`] and applied with one atomic increment call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::DailyDelta;

/// Maximum number of events accepted in one batch
pub const MAX_BATCH_EVENTS: usize = 500;

/// Maximum `count` of a single event
pub const MAX_EVENT_COUNT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[serde(alias = "cards")]
    Card,
    Quiz,
    Cheese,
    Accent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default = "default_count")]
    pub count: i64,
}

fn default_count() -> i64 {
    1
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("too many events in batch: {0} (max {max})", max = MAX_BATCH_EVENTS)]
    TooMany(usize),

    #[error("event #{index} has invalid count {count} (expected 1..={max})", max = MAX_EVENT_COUNT)]
    InvalidCount { index: usize, count: i64 },
}

/// Sums a batch into per-counter increments.
///
/// Counters are increment-only: every event must carry a positive `count`.
pub fn aggregate(events: &[Event]) -> Result<DailyDelta, EventError> {
    if events.len() > MAX_BATCH_EVENTS {
        return Err(EventError::TooMany(events.len()));
    }

    let mut delta = DailyDelta::default();
    for (index, event) in events.iter().enumerate() {
        if !(1..=MAX_EVENT_COUNT).contains(&event.count) {
            return Err(EventError::InvalidCount {
                index,
                count: event.count,
            });
        }
        let counter = match event.kind {
            EventKind::Card => &mut delta.cards,
            EventKind::Quiz => &mut delta.quiz,
            EventKind::Cheese => &mut delta.cheese,
            EventKind::Accent => &mut delta.accent,
        };
        *counter += event.count;
    }
    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> Vec<Event> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_aggregate_sums_by_kind() {
        let events = parse(
            r#"[{"type":"card"},{"type":"card","count":3},{"type":"quiz"},{"type":"cheese","count":2},{"type":"cards"}]"#,
        );

        assert_eq!(
            aggregate(&events).unwrap(),
            DailyDelta {
                cards: 5,
                quiz: 1,
                cheese: 2,
                accent: 0
            }
        );
    }

    #[test]
    fn test_empty_batch_is_zero() {
        assert!(aggregate(&[]).unwrap().is_zero());
    }

    #[test]
    fn test_unknown_kind_fails_to_parse() {
        let result: Result<Vec<Event>, _> = serde_json::from_str(r#"[{"type":"streak"}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_positive_count_rejected() {
        let events = parse(r#"[{"type":"quiz"},{"type":"accent","count":0}]"#);
        assert_eq!(
            aggregate(&events),
            Err(EventError::InvalidCount { index: 1, count: 0 })
        );

        let events = parse(r#"[{"type":"accent","count":-4}]"#);
        assert!(aggregate(&events).is_err());
    }

    #[test]
    fn test_count_upper_bound() {
        let events = parse(r#"[{"type":"card","count":1001}]"#);
        assert!(matches!(aggregate(&events), Err(EventError::InvalidCount { .. })));
    }

    #[test]
    fn test_batch_size_limit() {
        let events = vec![
            Event {
                kind: EventKind::Card,
                count: 1
            };
            MAX_BATCH_EVENTS + 1
        ];
        assert_eq!(aggregate(&events), Err(EventError::TooMany(MAX_BATCH_EVENTS + 1)));
    }
}
