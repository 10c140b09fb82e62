//! `/api/progress` - per-user learning state (word pairs, known set, counters)

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method},
    response::Response,
};
use chrono::Utc;
use flashcore::storage::{ProgressPatch, ProgressRecord};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{health, ok_json, parse_body, require_method, Action, ActionQuery};
use crate::error::ApiError;
use crate::identity::authenticate;
use crate::server::AppState;

const VARIANT: &str = "progress";

/// Fields the Mini App may push; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct ProgressInput {
    pub pairs: Option<Vec<Value>>,
    pub known: Option<Vec<Value>>,
    pub counters: Option<BTreeMap<String, i64>>,
}

/// POST body of `push`
///
/// Accepts the fields either nested under `state` or at the top level.
#[derive(Debug, Deserialize)]
pub struct PushBody {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
    pub state: Option<ProgressInput>,
    #[serde(flatten)]
    pub inline: ProgressInput,
}

pub async fn handle(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<ActionQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    match Action::resolve(&query, &method, Action::Push)? {
        Action::Health => Ok(health(&state, VARIANT)),
        Action::Get => {
            require_method(&method, Method::GET)?;
            fetch(&state, &headers).await
        }
        Action::Push => {
            require_method(&method, Method::POST)?;
            push(&state, &headers, &body).await
        }
        Action::Batch => Err(ApiError::malformed("unknown action: batch")),
    }
}

async fn fetch(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    let backend = state.backend()?;
    let identity = authenticate(state, backend.verifier, headers, None)?;

    let record = backend
        .store
        .fetch_progress(identity.id)
        .await?
        .unwrap_or_else(|| ProgressRecord::empty(identity.id));

    Ok(ok_json(json!({ "state": record.to_state() })))
}

async fn push(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, ApiError> {
    let backend = state.backend()?;
    let request: PushBody = parse_body(body)?;
    let identity = authenticate(state, backend.verifier, headers, request.init_data.as_deref())?;

    let input = request.state.unwrap_or(request.inline);
    let patch = ProgressPatch {
        user_id: identity.id,
        pairs: input.pairs,
        known: input.known,
        counters: input.counters,
        updated_at: Utc::now(),
    };

    let record = backend.store.upsert_progress(&patch).await?;
    log::info!(
        "Progress saved for user {} ({} pairs, {} known)",
        identity.id,
        record.pairs.len(),
        record.known.len()
    );

    Ok(ok_json(json!({ "state": record.to_state() })))
}
