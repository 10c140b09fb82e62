//! Process configuration
//!
//! Read once at startup from the environment (after `.env` is loaded by the
//! binary) and passed explicitly to the verifier, the store client and the
//! router. Nothing reads the environment after this point.

use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Default freshness window for `initData`: two days.
pub const DEFAULT_MAX_AUTH_AGE_SECS: u64 = 2 * 86_400;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8080;

/// Environment variable names, with the legacy names accepted as fallbacks.
pub mod keys {
    pub const BOT_TOKEN: &[&str] = &["BOT_TOKEN", "TELEGRAM_BOT_TOKEN"];
    pub const STORE_URL: &[&str] = &["STORE_URL", "SUPABASE_URL"];
    pub const STORE_SERVICE_KEY: &[&str] = &["STORE_SERVICE_KEY", "SUPABASE_SERVICE_ROLE_KEY"];
    pub const ALLOWED_ORIGIN: &str = "ALLOWED_ORIGIN";
    pub const MAX_AUTH_AGE: &str = "INIT_DATA_MAX_AGE_SECS";
    pub const PORT: &str = "PORT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FILE_PATH: &str = "LOG_FILE_PATH";
    pub const DEV_IDENTITY: &str = "DEV_IDENTITY";
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required values that are absent or empty
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    /// A value is present but cannot be parsed
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// CORS origin allowed to call the API
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowedOrigin {
    #[default]
    Any,
    Exact(String),
}

impl AllowedOrigin {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "*" => AllowedOrigin::Any,
            origin => AllowedOrigin::Exact(origin.trim_end_matches('/').to_string()),
        }
    }
}

impl fmt::Display for AllowedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowedOrigin::Any => write!(f, "*"),
            AllowedOrigin::Exact(origin) => write!(f, "{}", origin),
        }
    }
}

/// Store endpoint and service credential
#[derive(Debug)]
pub struct StoreConfig {
    pub url: Url,
    pub service_key: SecretString,
}

#[derive(Debug)]
pub struct Config {
    pub bot_token: Option<SecretString>,
    pub store_url: Option<Url>,
    pub store_service_key: Option<SecretString>,
    pub allowed_origin: AllowedOrigin,
    pub max_auth_age_secs: u64,
    pub port: u16,
    pub log_level: log::LevelFilter,
    pub log_file_path: Option<String>,
    pub dev_identity: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            store_url: None,
            store_service_key: None,
            allowed_origin: AllowedOrigin::Any,
            max_auth_age_secs: DEFAULT_MAX_AUTH_AGE_SECS,
            port: DEFAULT_PORT,
            log_level: log::LevelFilter::Info,
            log_file_path: None,
            dev_identity: false,
        }
    }
}

impl Config {
    /// Loads configuration from process environment variables.
    ///
    /// Missing required values are not an error here; see [`Config::missing_required`].
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when a present value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let first_of = |names: &[&str]| names.iter().find_map(|name| get(*name));

        let store_url = first_of(keys::STORE_URL)
            .map(|raw| {
                Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    key: keys::STORE_URL[0],
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let max_auth_age_secs = match get(keys::MAX_AUTH_AGE) {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: keys::MAX_AUTH_AGE,
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_AUTH_AGE_SECS,
        };

        let port = match get(keys::PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: keys::PORT,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let log_level = match get(keys::LOG_LEVEL) {
            Some(raw) => raw.parse::<log::LevelFilter>().map_err(|e| ConfigError::Invalid {
                key: keys::LOG_LEVEL,
                reason: e.to_string(),
            })?,
            None => log::LevelFilter::Info,
        };

        Ok(Self {
            bot_token: first_of(keys::BOT_TOKEN).map(SecretString::from),
            store_url,
            store_service_key: first_of(keys::STORE_SERVICE_KEY).map(SecretString::from),
            allowed_origin: get(keys::ALLOWED_ORIGIN)
                .map(|raw| AllowedOrigin::parse(&raw))
                .unwrap_or_default(),
            max_auth_age_secs,
            port,
            log_level,
            log_file_path: get(keys::LOG_FILE_PATH),
            dev_identity: get(keys::DEV_IDENTITY).is_some_and(|raw| is_truthy(&raw)),
        })
    }

    /// Names of required values that are not set.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bot_token.is_none() {
            missing.push(keys::BOT_TOKEN[0]);
        }
        if self.store_url.is_none() {
            missing.push(keys::STORE_URL[0]);
        }
        if self.store_service_key.is_none() {
            missing.push(keys::STORE_SERVICE_KEY[0]);
        }
        missing
    }

    pub fn bot_token(&self) -> Result<&str, ConfigError> {
        self.bot_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or_else(|| ConfigError::Missing(vec![keys::BOT_TOKEN[0]]))
    }

    /// Store endpoint and key, if both are configured.
    pub fn store(&self) -> Result<StoreConfig, ConfigError> {
        match (&self.store_url, &self.store_service_key) {
            (Some(url), Some(key)) => Ok(StoreConfig {
                url: url.clone(),
                service_key: SecretString::from(key.expose_secret().to_owned()),
            }),
            (url, key) => {
                let mut missing = Vec::new();
                if url.is_none() {
                    missing.push(keys::STORE_URL[0]);
                }
                if key.is_none() {
                    missing.push(keys::STORE_SERVICE_KEY[0]);
                }
                Err(ConfigError::Missing(missing))
            }
        }
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.allowed_origin, AllowedOrigin::Any);
        assert_eq!(config.max_auth_age_secs, DEFAULT_MAX_AUTH_AGE_SECS);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_level, log::LevelFilter::Info);
        assert!(!config.dev_identity);
        assert_eq!(
            config.missing_required(),
            vec!["BOT_TOKEN", "STORE_URL", "STORE_SERVICE_KEY"]
        );
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "123:abc"),
            ("STORE_URL", "https://db.example.com"),
            ("STORE_SERVICE_KEY", "service-key"),
            ("ALLOWED_ORIGIN", "https://app.example.com/"),
            ("INIT_DATA_MAX_AGE_SECS", "604800"),
            ("PORT", "3000"),
            ("LOG_LEVEL", "debug"),
            ("DEV_IDENTITY", "true"),
        ]))
        .unwrap();

        assert!(config.missing_required().is_empty());
        assert_eq!(config.bot_token().unwrap(), "123:abc");
        assert_eq!(
            config.allowed_origin,
            AllowedOrigin::Exact("https://app.example.com".to_string())
        );
        assert_eq!(config.max_auth_age_secs, 604_800);
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, log::LevelFilter::Debug);
        assert!(config.dev_identity);

        let store = config.store().unwrap();
        assert_eq!(store.url.as_str(), "https://db.example.com/");
        assert_eq!(store.service_key.expose_secret(), "service-key");
    }

    #[test]
    fn test_legacy_names() {
        let config = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "legacy"),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "k"),
        ]))
        .unwrap();

        assert!(config.missing_required().is_empty());
        assert_eq!(config.bot_token().unwrap(), "legacy");
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = Config::from_lookup(lookup(&[("BOT_TOKEN", "  "), ("ALLOWED_ORIGIN", "")])).unwrap();

        assert!(config.bot_token().is_err());
        assert_eq!(config.allowed_origin, AllowedOrigin::Any);
    }

    #[test]
    fn test_store_reports_missing_parts() {
        let config = Config::from_lookup(lookup(&[("STORE_URL", "https://db.example.com")])).unwrap();

        assert_eq!(
            config.store().unwrap_err(),
            ConfigError::Missing(vec!["STORE_SERVICE_KEY"])
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[("STORE_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "STORE_URL", .. }));

        let err = Config::from_lookup(lookup(&[("INIT_DATA_MAX_AGE_SECS", "two days")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "INIT_DATA_MAX_AGE_SECS", .. }));

        let err = Config::from_lookup(lookup(&[("PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_missing_error_message() {
        let err = ConfigError::Missing(vec!["BOT_TOKEN", "STORE_URL"]);
        assert_eq!(err.to_string(), "missing required configuration: BOT_TOKEN, STORE_URL");
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        env::set_var("INIT_DATA_MAX_AGE_SECS", "3600");
        let config = Config::from_env();
        env::remove_var("INIT_DATA_MAX_AGE_SECS");

        assert_eq!(config.unwrap().max_auth_age_secs, 3600);
    }
}
