//! Configuration and logging

pub mod config;
pub mod logging;

pub use config::{AllowedOrigin, Config, ConfigError};
pub use logging::{init_logger, log_configuration};
