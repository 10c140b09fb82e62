//! Logger initialization and startup diagnostics

use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::io;

use crate::core::config::Config;

/// Initialize logger for console and, optionally, file output
///
/// # Arguments
/// * `level` - Maximum level to emit
/// * `log_file_path` - Path to the log file; console only when `None`
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(io::Error)` - Failed to create the log file or a logger is already set
pub fn init_logger(level: LevelFilter, log_file_path: Option<&str>) -> io::Result<()> {
    let config = ConfigBuilder::new()
        // hyper/reqwest are chatty at debug level
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file_path {
        let log_file = File::create(path)?;
        loggers.push(WriteLogger::new(level, config, log_file));
    }

    CombinedLogger::init(loggers).map_err(|e| io::Error::other(format!("Failed to initialize logger: {}", e)))
}

/// Logs the effective configuration at startup. Secrets are reported only as set/unset.
pub fn log_configuration(config: &Config) {
    log::info!("Configuration:");
    log::info!("  BOT_TOKEN:          {}", set_or_missing(config.bot_token.is_some()));
    log::info!(
        "  STORE_URL:          {}",
        config.store_url.as_ref().map(|u| u.as_str()).unwrap_or("MISSING")
    );
    log::info!(
        "  STORE_SERVICE_KEY:  {}",
        set_or_missing(config.store_service_key.is_some())
    );
    log::info!("  ALLOWED_ORIGIN:     {}", config.allowed_origin);
    log::info!("  initData max age:   {}s", config.max_auth_age_secs);

    let missing = config.missing_required();
    if !missing.is_empty() {
        log::error!(
            "Missing required configuration: {} - API calls will answer 500 until it is set",
            missing.join(", ")
        );
    }
    if config.dev_identity {
        log::warn!("DEV_IDENTITY is set - dev identity headers are honoured only by builds with the `dev-identity` feature");
    }
}

fn set_or_missing(is_set: bool) -> &'static str {
    if is_set {
        "set"
    } else {
        "MISSING"
    }
}
