//! `/api/daily` - per-user, per-day activity counters

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method},
    response::Response,
};
use chrono::{NaiveDate, Utc};
use flashcore::events::{aggregate, Event};
use flashcore::storage::{DailyPatch, DailyRecord};
use serde::Deserialize;
use serde_json::json;

use super::{health, ok_json, parse_body, parse_day, require_method, Action, ActionQuery};
use crate::error::ApiError;
use crate::identity::authenticate;
use crate::server::AppState;

const VARIANT: &str = "daily";

/// POST body of `push`: absolute counter values for one day
#[derive(Debug, Deserialize)]
pub struct PushBody {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
    pub day: Option<String>,
    pub cards: Option<i64>,
    pub quiz: Option<i64>,
    pub cheese: Option<i64>,
    pub accent: Option<i64>,
}

/// POST body of `batch`: events to add to one day
#[derive(Debug, Deserialize)]
pub struct BatchBody {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
    pub day: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

pub async fn handle(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<ActionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    match Action::resolve(&query, &method, Action::Batch)? {
        Action::Health => Ok(health(&state, VARIANT)),
        Action::Get => {
            require_method(&method, Method::GET)?;
            fetch(&state, &query, &headers).await
        }
        Action::Push => {
            require_method(&method, Method::POST)?;
            push(&state, &query, &headers, &body).await
        }
        Action::Batch => {
            require_method(&method, Method::POST)?;
            batch(&state, &query, &headers, &body).await
        }
    }
}

/// Day from the body, then the query string, then today (UTC).
fn day_for(body_day: Option<&str>, query: &ActionQuery) -> Result<NaiveDate, ApiError> {
    parse_day(body_day.or(query.day.as_deref()))
}

async fn fetch(state: &AppState, query: &ActionQuery, headers: &HeaderMap) -> Result<Response, ApiError> {
    let backend = state.backend()?;
    let day = day_for(None, query)?;
    let identity = authenticate(state, backend.verifier, headers, None)?;

    let record = backend
        .store
        .fetch_daily(identity.id, day)
        .await?
        .unwrap_or_else(|| DailyRecord::empty(identity.id, day));

    Ok(ok_json(json!({ "stats": record.to_state() })))
}

async fn push(state: &AppState, query: &ActionQuery, headers: &HeaderMap, body: &[u8]) -> Result<Response, ApiError> {
    let backend = state.backend()?;
    let request: PushBody = parse_body(body)?;
    let day = day_for(request.day.as_deref(), query)?;

    for (name, value) in [
        ("cards", request.cards),
        ("quiz", request.quiz),
        ("cheese", request.cheese),
        ("accent", request.accent),
    ] {
        if value.is_some_and(|value| value < 0) {
            return Err(ApiError::malformed(format!("{} must not be negative", name)));
        }
    }

    let identity = authenticate(state, backend.verifier, headers, request.init_data.as_deref())?;

    let patch = DailyPatch {
        user_id: identity.id,
        day,
        cards: request.cards,
        quiz: request.quiz,
        cheese: request.cheese,
        accent: request.accent,
        updated_at: Utc::now(),
    };
    let record = backend.store.upsert_daily(&patch).await?;
    log::info!("Daily stats saved for user {} on {}", identity.id, day);

    Ok(ok_json(json!({ "stats": record.to_state() })))
}

async fn batch(state: &AppState, query: &ActionQuery, headers: &HeaderMap, body: &[u8]) -> Result<Response, ApiError> {
    let backend = state.backend()?;
    let request: BatchBody = parse_body(body)?;
    let day = day_for(request.day.as_deref(), query)?;
    let delta = aggregate(&request.events)?;

    let identity = authenticate(state, backend.verifier, headers, request.init_data.as_deref())?;

    // Nothing to add: report the current record without touching the store.
    let record = if delta.is_zero() {
        backend
            .store
            .fetch_daily(identity.id, day)
            .await?
            .unwrap_or_else(|| DailyRecord::empty(identity.id, day))
    } else {
        backend.store.increment_daily(identity.id, day, &delta).await?
    };

    log::debug!(
        "Applied {} events for user {} on {}",
        request.events.len(),
        identity.id,
        day
    );

    Ok(ok_json(json!({
        "stats": record.to_state(),
        "applied": request.events.len(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_day_wins_over_query() {
        let query = ActionQuery {
            action: None,
            day: Some("2026-01-01".to_string()),
        };

        assert_eq!(
            day_for(Some("2026-10-18"), &query).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
        );
        assert_eq!(
            day_for(None, &query).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_batch_body_defaults_to_no_events() {
        let body: BatchBody = serde_json::from_value(json!({ "initData": "x" })).unwrap();
        assert!(body.events.is_empty());
        assert!(body.day.is_none());
    }

    #[test]
    fn test_batch_body_rejects_unknown_event_type() {
        let result: Result<BatchBody, _> = serde_json::from_value(json!({ "events": [{ "type": "streak" }] }));
        assert!(result.is_err());
    }
}
