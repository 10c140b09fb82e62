//! API error taxonomy
//!
//! Every failure leaves a handler as an [`ApiError`] and is rendered as
//! `{ "ok": false, "error": ... }` with the matching status code.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use flashcore::events::EventError;
use flashcore::{AuthFailure, ConfigError, StoreError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Required configuration is missing; reported before any auth check
    #[error("server misconfigured: {0}")]
    Configuration(#[from] ConfigError),

    /// initData verification failed
    #[error("unauthorized: {0}")]
    Authentication(#[from] AuthFailure),

    /// Unparseable body, unknown action or invalid field
    #[error("{0}")]
    MalformedInput(String),

    /// Action requires a different HTTP method
    #[error("method not allowed")]
    MethodNotAllowed { allow: &'static str },

    /// Store call failed
    #[error("{0}")]
    Downstream(#[from] StoreError),
}

impl ApiError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ApiError::MalformedInput(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Downstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        ApiError::MalformedInput(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ApiError::Authentication(reason) => {
                log::warn!("Rejected initData: {}", reason.tag());
                json!({ "ok": false, "error": "unauthorized", "reason": reason.tag() })
            }
            ApiError::Configuration(_) | ApiError::Downstream(_) => {
                log::error!("{}", self);
                json!({ "ok": false, "error": self.to_string() })
            }
            ApiError::MalformedInput(_) | ApiError::MethodNotAllowed { .. } => {
                log::debug!("{}", self);
                json!({ "ok": false, "error": self.to_string() })
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::MethodNotAllowed { allow } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(ConfigError::Missing(vec!["BOT_TOKEN"])).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::from(AuthFailure::Stale).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::malformed("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::MethodNotAllowed { allow: "POST" }.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::from(StoreError::EmptyResponse).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let response = ApiError::MethodNotAllowed { allow: "POST" }.into_response();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "POST");
    }

    #[test]
    fn test_event_error_is_bad_request() {
        let err = ApiError::from(EventError::TooMany(501));
        assert!(matches!(err, ApiError::MalformedInput(_)));
    }
}
