//! Configuration module for lightsail-sd.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Output file and refresh interval
//! - AWS profile and region
//! - Web server settings (listen address, telemetry path)
//!
//! Command-line flags override file values via [`ConfigOverrides`].

mod app;
mod validation;

pub use app::{AppConfig, AwsConfig, ConfigOverrides, WebConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration, parse_listen_address};

// Re-export constants
pub use app::{
    DEFAULT_LISTEN_ADDRESS, DEFAULT_OUTPUT_FILE, DEFAULT_REFRESH_INTERVAL, DEFAULT_TELEMETRY_PATH,
};
