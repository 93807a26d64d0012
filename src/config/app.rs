//! Application configuration structures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigError, expand_env_vars, parse_duration, parse_listen_address};

// =============================================================================
// Constants
// =============================================================================

/// Default output file for the `file_sd` document.
pub const DEFAULT_OUTPUT_FILE: &str = "lightsail_sd.json";

/// Default refresh interval (60 seconds).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Default listen address for the metrics server.
pub const DEFAULT_LISTEN_ADDRESS: &str = ":9888";

/// Default path under which metrics are exposed.
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

/// Minimum refresh interval (1 second).
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Routes served alongside the telemetry path.
const RESERVED_PATHS: &[&str] = &["/", "/healthz"];

fn default_output_file() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

// =============================================================================
// AWS Configuration
// =============================================================================

/// AWS session settings. Unset values fall back to the default provider chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Named profile from the shared config files.
    pub profile: Option<String>,

    /// Region override.
    pub region: Option<String>,
}

// =============================================================================
// Web Configuration
// =============================================================================

/// Metrics server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address, `host:port` or `:port` (default: ":9888").
    pub listen_address: String,

    /// Path under which to expose metrics (default: "/metrics").
    pub telemetry_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output file for the `file_sd` document.
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Refresh interval (default: 60s, minimum: 1s).
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,

    /// AWS session settings.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Metrics server settings.
    #[serde(default)]
    pub web: WebConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_file: default_output_file(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            aws: AwsConfig::default(),
            web: WebConfig::default(),
        }
    }
}

/// Values supplied on the command line or through the environment.
///
/// Every `Some` field replaces the corresponding file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_file: Option<PathBuf>,
    /// Refresh interval, seconds or a humantime string.
    pub refresh: Option<String>,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub listen_address: Option<String>,
    pub telemetry_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&expand_env_vars(&content))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides (CLI > ENV > config file).
    ///
    /// An empty profile or region is treated as unset.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if the refresh value cannot be parsed.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(output_file) = overrides.output_file {
            self.output_file = output_file;
        }
        if let Some(refresh) = overrides.refresh {
            self.refresh_interval = parse_duration(&refresh)
                .map_err(|e| ConfigError::ValidationError(format!("target.refresh: {e}")))?;
        }
        if let Some(profile) = overrides.profile {
            self.aws.profile = Some(profile).filter(|p| !p.is_empty());
        }
        if let Some(region) = overrides.region {
            self.aws.region = Some(region).filter(|r| !r.is_empty());
        }
        if let Some(listen_address) = overrides.listen_address {
            self.web.listen_address = listen_address;
        }
        if let Some(telemetry_path) = overrides.telemetry_path {
            self.web.telemetry_path = telemetry_path;
        }
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "output file must not be empty".to_string(),
            ));
        }

        if self.refresh_interval < MIN_REFRESH_INTERVAL {
            return Err(ConfigError::ValidationError(format!(
                "refresh interval must be at least {:?}",
                MIN_REFRESH_INTERVAL
            )));
        }

        parse_listen_address(&self.web.listen_address)?;

        let path = &self.web.telemetry_path;
        if !path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "telemetry path must start with '/': '{}'",
                path
            )));
        }
        if RESERVED_PATHS.contains(&path.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "telemetry path conflicts with a built-in route: '{}'",
                path
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.output_file, PathBuf::from("lightsail_sd.json"));
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.aws, AwsConfig::default());
        assert_eq!(config.web.listen_address, ":9888");
        assert_eq!(config.web.telemetry_path, "/metrics");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "output_file: /srv/prometheus/lightsail.json\n\
             refresh_interval: 2m\n\
             aws:\n  profile: ops\n  region: ${NONEXISTENT_REGION_12345:-eu-central-1}\n\
             web:\n  listen_address: 127.0.0.1:9900\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.output_file, PathBuf::from("/srv/prometheus/lightsail.json"));
        assert_eq!(config.refresh_interval, Duration::from_secs(120));
        assert_eq!(config.aws.profile.as_deref(), Some("ops"));
        assert_eq!(config.aws.region.as_deref(), Some("eu-central-1"));
        assert_eq!(config.web.listen_address, "127.0.0.1:9900");
        assert_eq!(config.web.telemetry_path, "/metrics");
    }

    #[test]
    fn test_load_unset_region_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "aws:\n  region: ${LIGHTSAIL_SD_TEST_NO_REGION}\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.aws.region, None);
        assert_eq!(config.refresh_interval, DEFAULT_REFRESH_INTERVAL);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/lightsail-sd.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "refresh_interval: [not, a, duration]\n").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut config = AppConfig {
            aws: AwsConfig {
                profile: Some("from-file".to_string()),
                region: Some("us-east-1".to_string()),
            },
            ..AppConfig::default()
        };

        config
            .apply_overrides(ConfigOverrides {
                output_file: Some(PathBuf::from("/tmp/sd.json")),
                refresh: Some("30".to_string()),
                profile: Some(String::new()),
                region: None,
                listen_address: Some(":9999".to_string()),
                telemetry_path: Some("/prom".to_string()),
            })
            .unwrap();

        assert_eq!(config.output_file, PathBuf::from("/tmp/sd.json"));
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_eq!(config.aws.profile, None);
        assert_eq!(config.aws.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.web.listen_address, ":9999");
        assert_eq!(config.web.telemetry_path, "/prom");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_invalid_refresh() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(ConfigOverrides {
                refresh: Some("soon".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("target.refresh"));
    }

    #[test]
    fn test_validation_zero_refresh() {
        let config = AppConfig {
            refresh_interval: Duration::ZERO,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_listen_address() {
        let config = AppConfig {
            web: WebConfig {
                listen_address: "not-an-address".to_string(),
                ..WebConfig::default()
            },
            ..AppConfig::default()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid listen address")
        );
    }

    #[test]
    fn test_validation_invalid_telemetry_path() {
        for path in ["metrics", "/", "", "/healthz"] {
            let config = AppConfig {
                web: WebConfig {
                    telemetry_path: path.to_string(),
                    ..WebConfig::default()
                },
                ..AppConfig::default()
            };
            assert!(config.validate().is_err(), "path {path:?} should be rejected");
        }
    }

    #[test]
    fn test_validation_healthz_telemetry_path_message() {
        let config = AppConfig {
            web: WebConfig {
                telemetry_path: "/healthz".to_string(),
                ..WebConfig::default()
            },
            ..AppConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("built-in route"));
    }

    #[test]
    fn test_validation_empty_output_file() {
        let config = AppConfig {
            output_file: PathBuf::new(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
