//! Request handlers
//!
//! Each endpoint dispatches on the `action` query parameter, falling back to
//! a default action per HTTP method. Order of checks in every handler:
//! action → method → configuration → body → credential → store.

pub mod daily;
pub mod progress;

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::server::AppState;

const SERVICE_NAME: &str = "flashapi";

/// Query parameters shared by both endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    pub action: Option<String>,
    pub day: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Health,
    Get,
    Push,
    Batch,
}

impl Action {
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "health" | "ping" => Ok(Action::Health),
            "get" | "fetch" => Ok(Action::Get),
            "push" | "save" => Ok(Action::Push),
            "batch" | "events" => Ok(Action::Batch),
            other => Err(ApiError::malformed(format!("unknown action: {}", other))),
        }
    }

    /// Action requested explicitly, or the default for `method`.
    pub fn resolve(query: &ActionQuery, method: &Method, post_default: Action) -> Result<Self, ApiError> {
        match query.action.as_deref() {
            Some(raw) => Action::parse(raw),
            None if method == Method::GET => Ok(Action::Get),
            None if method == Method::POST => Ok(post_default),
            None => Err(ApiError::MethodNotAllowed { allow: "GET, POST" }),
        }
    }
}

pub(crate) fn require_method(method: &Method, expected: Method) -> Result<(), ApiError> {
    if *method == expected {
        Ok(())
    } else if expected == Method::GET {
        Err(ApiError::MethodNotAllowed { allow: "GET" })
    } else {
        Err(ApiError::MethodNotAllowed { allow: "POST" })
    }
}

/// Parses a JSON body; anything unparseable is a 400.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::malformed("request body is empty"));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::malformed(format!("invalid JSON body: {}", e)))
}

/// `YYYY-MM-DD`, defaulting to today in UTC.
pub(crate) fn parse_day(raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| ApiError::malformed(format!("invalid day: {} (expected YYYY-MM-DD)", value))),
        None => Ok(Utc::now().date_naive()),
    }
}

/// `200 { ok: true, ...fields }`
pub(crate) fn ok_json(fields: Value) -> Response {
    let mut body = json!({ "ok": true });
    if let (Some(body), Value::Object(fields)) = (body.as_object_mut(), fields) {
        body.extend(fields);
    }
    (StatusCode::OK, Json(body)).into_response()
}

/// Health check; needs no credential and exposes no identity.
pub(crate) fn health(state: &AppState, variant: &str) -> Response {
    ok_json(json!({
        "service": SERVICE_NAME,
        "variant": variant,
        "configured": state.is_configured(),
    }))
}
