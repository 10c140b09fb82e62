//! Resolves the caller's Telegram identity for a request

use axum::http::HeaderMap;
use flashcore::{Identity, Verifier};

use crate::error::ApiError;
use crate::server::AppState;

/// Header carrying the raw `initData` query string
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// Trusted header with a user id, honoured only by `dev-identity` builds
#[cfg(feature = "dev-identity")]
pub const DEV_USER_ID_HEADER: &str = "x-dev-user-id";

#[cfg(feature = "dev-identity")]
pub const DEV_USERNAME_HEADER: &str = "x-dev-username";

/// Picks the credential: header first, then the `initData` body field.
///
/// Returns an empty string when neither is present so the verifier reports `EMPTY`.
pub fn init_data_from<'a>(headers: &'a HeaderMap, body_init_data: Option<&'a str>) -> &'a str {
    headers
        .get(INIT_DATA_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .or(body_init_data)
        .unwrap_or("")
}

/// Verifies the request credential and returns the caller.
pub fn authenticate(
    state: &AppState,
    verifier: &Verifier,
    headers: &HeaderMap,
    body_init_data: Option<&str>,
) -> Result<Identity, ApiError> {
    #[cfg(feature = "dev-identity")]
    {
        if state.dev_identity() {
            if let Some(identity) = dev_identity(headers)? {
                log::warn!("Using dev identity {} (unauthenticated)", identity.id);
                return Ok(identity);
            }
        }
    }
    #[cfg(not(feature = "dev-identity"))]
    let _ = state;

    let init_data = init_data_from(headers, body_init_data);
    let identity = verifier.verify(init_data)?;
    log::debug!("Verified Telegram user {}", identity.id);
    Ok(identity)
}

#[cfg(feature = "dev-identity")]
fn dev_identity(headers: &HeaderMap) -> Result<Option<Identity>, ApiError> {
    let Some(raw_id) = headers.get(DEV_USER_ID_HEADER) else {
        return Ok(None);
    };
    let id = raw_id
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| ApiError::malformed(format!("{} must be an integer", DEV_USER_ID_HEADER)))?;
    let username = headers
        .get(DEV_USERNAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    Ok(Some(Identity {
        id,
        username,
        first_name: None,
        last_name: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_wins_over_body() {
        let mut headers = HeaderMap::new();
        headers.insert(INIT_DATA_HEADER, HeaderValue::from_static("from=header"));

        assert_eq!(init_data_from(&headers, Some("from=body")), "from=header");
    }

    #[test]
    fn test_body_used_when_header_missing_or_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(init_data_from(&headers, Some("from=body")), "from=body");

        headers.insert(INIT_DATA_HEADER, HeaderValue::from_static(" "));
        assert_eq!(init_data_from(&headers, Some("from=body")), "from=body");
    }

    #[test]
    fn test_nothing_present_is_empty() {
        assert_eq!(init_data_from(&HeaderMap::new(), None), "");
    }
}
