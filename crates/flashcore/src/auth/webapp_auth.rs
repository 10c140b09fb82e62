//! Telegram WebApp `initData` validation
//!
//! Telegram signs the Mini App launch parameters with HMAC-SHA256. The key is
//! derived from the bot token: `HMAC_SHA256(key = "WebAppData", msg = bot_token)`.
//! The signed message is the data-check-string: every field except `hash`,
//! sorted by key and joined as `key=value` lines.

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Key material of the first HMAC stage. Part of the protocol, not a setting.
const WEBAPP_DATA_KEY: &[u8] = b"WebAppData";

/// Length of a hex-encoded SHA-256 MAC.
const HASH_HEX_LEN: usize = 64;

/// Reason a credential blob was rejected.
///
/// The router exposes only [`AuthFailure::tag`] to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("init data is empty")]
    Empty,
    #[error("init data has no hash field")]
    NoHash,
    #[error("init data has no user field")]
    NoUser,
    #[error("init data signature does not match")]
    HashMismatch,
    #[error("user field is not a valid profile")]
    UserParse,
    #[error("init data is older than the allowed window")]
    Stale,
}

impl AuthFailure {
    /// Stable tag returned to clients in 401 responses.
    pub fn tag(self) -> &'static str {
        match self {
            AuthFailure::Empty => "EMPTY",
            AuthFailure::NoHash => "NO_HASH",
            AuthFailure::NoUser => "NO_USER",
            AuthFailure::HashMismatch => "HASH_MISMATCH",
            AuthFailure::UserParse => "USER_PARSE",
            AuthFailure::Stale => "STALE",
        }
    }
}

/// Telegram user extracted from a verified `initData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Verifier bound to one bot token and freshness window.
///
/// Built once at startup from [`crate::Config`] and shared by every request.
#[derive(Debug)]
pub struct Verifier {
    bot_token: SecretString,
    max_age_secs: u64,
}

impl Verifier {
    pub fn new(bot_token: &str, max_age_secs: u64) -> Self {
        Self {
            bot_token: SecretString::from(bot_token.to_owned()),
            max_age_secs,
        }
    }

    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    /// Verifies `init_data` against the current wall clock.
    pub fn verify(&self, init_data: &str) -> Result<Identity, AuthFailure> {
        verify_init_data(init_data, self.bot_token.expose_secret(), self.max_age_secs)
    }

    /// Verifies `init_data` as if the current time were `now` (unix seconds).
    pub fn verify_at(&self, init_data: &str, now: i64) -> Result<Identity, AuthFailure> {
        verify_init_data_at(init_data, self.bot_token.expose_secret(), self.max_age_secs, now)
    }

    /// Produces a blob this verifier accepts. Used by the `sign` CLI command.
    pub fn sign(&self, fields: &[(&str, &str)]) -> String {
        sign_init_data(fields, self.bot_token.expose_secret())
    }
}

/// Validates Telegram WebApp init data.
///
/// # Arguments
/// * `init_data` - URL-encoded launch parameters as sent by the Telegram client
/// * `bot_token` - Token of the bot the Mini App belongs to
/// * `max_age_secs` - Maximum accepted age of `auth_date`
///
/// # Returns
/// The user profile from the `user` field, or the reason the blob was rejected.
pub fn verify_init_data(init_data: &str, bot_token: &str, max_age_secs: u64) -> Result<Identity, AuthFailure> {
    verify_init_data_at(init_data, bot_token, max_age_secs, Utc::now().timestamp())
}

/// Same as [`verify_init_data`] with an explicit clock.
pub fn verify_init_data_at(
    init_data: &str,
    bot_token: &str,
    max_age_secs: u64,
    now: i64,
) -> Result<Identity, AuthFailure> {
    if init_data.trim().is_empty() {
        return Err(AuthFailure::Empty);
    }

    let mut pairs = parse_pairs(init_data);

    let received_hash = field(&pairs, "hash").map(str::to_owned).ok_or(AuthFailure::NoHash)?;
    pairs.retain(|(key, _)| key != "hash");

    // `user` stays in the check-string; it is only looked up here.
    let user_json = field(&pairs, "user").ok_or(AuthFailure::NoUser)?;

    let check_string = data_check_string(&pairs);
    let expected = decode_hash(&received_hash).ok_or(AuthFailure::HashMismatch)?;
    let mac = signing_mac(bot_token, &check_string).ok_or(AuthFailure::HashMismatch)?;
    // verify_slice compares in constant time.
    mac.verify_slice(&expected).map_err(|_| AuthFailure::HashMismatch)?;

    let identity: Identity = serde_json::from_str(user_json).map_err(|_| AuthFailure::UserParse)?;

    let auth_date = field(&pairs, "auth_date")
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or(AuthFailure::Stale)?;
    let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);
    if now.saturating_sub(auth_date) > max_age {
        return Err(AuthFailure::Stale);
    }

    Ok(identity)
}

/// Builds a signed, URL-encoded `initData` from `fields`.
///
/// Any `hash` entry in `fields` is ignored; the computed hash is appended last.
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> String {
    let pairs: Vec<(String, String)> = fields
        .iter()
        .filter(|(key, _)| *key != "hash")
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();

    let hash = signing_mac(bot_token, &data_check_string(&pairs))
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("hash", &hash);
    serializer.finish()
}

/// Splits the query string into decoded pairs, keeping order and duplicates.
fn parse_pairs(init_data: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(init_data.as_bytes()).into_owned().collect()
}

fn field<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// `key=value` lines sorted by decoded key (byte order, stable).
fn data_check_string(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Accepts only the canonical form Telegram sends: 64 lowercase hex digits.
fn decode_hash(hash: &str) -> Option<Vec<u8>> {
    let canonical = hash.len() == HASH_HEX_LEN && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if !canonical {
        return None;
    }
    hex::decode(hash).ok()
}

/// HMAC over the check-string, keyed with `HMAC_SHA256("WebAppData", bot_token)`.
fn signing_mac(bot_token: &str, check_string: &str) -> Option<HmacSha256> {
    let mut secret_key_mac = HmacSha256::new_from_slice(WEBAPP_DATA_KEY).ok()?;
    secret_key_mac.update(bot_token.as_bytes());
    let secret_key = secret_key_mac.finalize().into_bytes();

    let mut mac = HmacSha256::new_from_slice(&secret_key).ok()?;
    mac.update(check_string.as_bytes());
    Some(mac)
}
