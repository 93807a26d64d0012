//! Configuration validation utilities.

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse duration string using humantime.
///
/// A bare integer is read as a number of seconds. Otherwise supports various
/// formats: `30s`, `1m`, `5m30s`, `1h`, `100ms`, etc.
///
/// # Examples
///
/// ```
/// use lightsail_sd::config::parse_duration;
///
/// assert_eq!(parse_duration("60").unwrap().as_secs(), 60);
/// assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
/// assert_eq!(parse_duration("1h30m").unwrap().as_secs(), 5400);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse a listen address.
///
/// Accepts `host:port` with an IP host, or `:port` to bind all interfaces.
pub fn parse_listen_address(s: &str) -> Result<SocketAddr, ConfigError> {
    let s = s.trim();
    let full = if s.starts_with(':') {
        format!("0.0.0.0{s}")
    } else {
        s.to_string()
    };

    full.parse::<SocketAddr>().map_err(|_| {
        ConfigError::ValidationError(format!("invalid listen address: '{}'", s))
    })
}

/// Substitute `${VAR}` and `${VAR:-default}` references in a config document.
///
/// Unset variables without a default expand to an empty string, which YAML
/// reads as null for optional settings such as `aws.region`.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_REFERENCE: OnceLock<Regex> = OnceLock::new();

    let reference = ENV_REFERENCE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env reference regex")
    });

    reference
        .replace_all(input, |caps: &Captures| match std::env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => caps.get(2).map_or_else(String::new, |m| m.as_str().to_owned()),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_valid() {
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration(" 5m ").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("30x").is_err());
        assert!(parse_duration("-5").is_err());
    }

    #[test]
    fn test_parse_listen_address() {
        assert_eq!(
            parse_listen_address(":9888").unwrap(),
            "0.0.0.0:9888".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_listen_address("127.0.0.1:8080").unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_listen_address("[::1]:9888").unwrap(),
            "[::1]:9888".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_parse_listen_address_invalid() {
        let err = parse_listen_address("localhost").unwrap_err();
        assert!(err.to_string().contains("invalid listen address"));
        assert!(parse_listen_address(":notaport").is_err());
        assert!(parse_listen_address("").is_err());
    }

    #[test]
    fn test_expand_env_vars_leaves_plain_yaml() {
        let doc = "output_file: lightsail_sd.json\nrefresh_interval: 60s\n";
        assert_eq!(expand_env_vars(doc), doc);
    }

    #[test]
    fn test_expand_env_vars_default_region() {
        let doc = "aws:\n  region: ${LIGHTSAIL_SD_TEST_UNSET_REGION:-us-east-1}\n";
        assert_eq!(expand_env_vars(doc), "aws:\n  region: us-east-1\n");
    }

    #[test]
    fn test_expand_env_vars_unset_without_default() {
        let doc = "aws:\n  profile: ${LIGHTSAIL_SD_TEST_UNSET_PROFILE}\n";
        assert_eq!(expand_env_vars(doc), "aws:\n  profile: \n");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: only this test touches this variable.
        unsafe {
            std::env::set_var("LIGHTSAIL_SD_TEST_OUTPUT_DIR", "/srv/prometheus");
        }
        let result = expand_env_vars(
            "output_file: ${LIGHTSAIL_SD_TEST_OUTPUT_DIR:-/tmp}/lightsail.json",
        );
        assert_eq!(result, "output_file: /srv/prometheus/lightsail.json");
        // SAFETY: cleanup of the variable set above.
        unsafe {
            std::env::remove_var("LIGHTSAIL_SD_TEST_OUTPUT_DIR");
        }
    }
}
