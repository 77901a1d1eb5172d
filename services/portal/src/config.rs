//! services/portal/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;

use portfolio_core::FallbackMode;
use tracing::Level;

/// The value the endpoint variable ships with before a real deployment URL is pasted in.
pub const ENDPOINT_PLACEHOLDER: &str = "YOUR_GAS_WEB_APP_URL";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the remote spreadsheet API lives, if anywhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Configured(String),
    Unconfigured,
}

impl Endpoint {
    /// Unset, blank and placeholder values all mean "not configured".
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() && v != ENDPOINT_PLACEHOLDER => {
                Endpoint::Configured(v.to_string())
            }
            _ => Endpoint::Unconfigured,
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Endpoint::Configured(_))
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub endpoint: Endpoint,
    pub log_level: Level,
    pub fallback_mode: FallbackMode,
    pub request_timeout: Duration,
    pub allowed_origin: String,
    pub export_label: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Remote API Settings ---
        let endpoint = Endpoint::from_value(std::env::var("SHEET_API_URL").ok().as_deref());

        let fallback_str =
            std::env::var("FALLBACK_MODE").unwrap_or_else(|_| "placeholder".to_string());
        let fallback_mode = parse_fallback_mode(&fallback_str)?;

        let timeout_str =
            std::env::var("REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let timeout_secs = timeout_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS".to_string(),
                format!("'{}' is not a whole number of seconds", timeout_str),
            )
        })?;

        // --- Load Export Settings ---
        let export_label =
            std::env::var("EXPORT_LABEL").unwrap_or_else(|_| "塾生データ".to_string());

        Ok(Self {
            bind_address,
            endpoint,
            log_level,
            fallback_mode,
            request_timeout: Duration::from_secs(timeout_secs),
            allowed_origin,
            export_label,
        })
    }
}

fn parse_fallback_mode(value: &str) -> Result<FallbackMode, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "placeholder" => Ok(FallbackMode::Placeholder),
        "error" => Ok(FallbackMode::Unavailable),
        other => Err(ConfigError::InvalidValue(
            "FALLBACK_MODE".to_string(),
            format!("'{}' is not one of placeholder, error", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_and_blank_endpoints_are_unconfigured() {
        assert_eq!(Endpoint::from_value(None), Endpoint::Unconfigured);
        assert_eq!(Endpoint::from_value(Some("  ")), Endpoint::Unconfigured);
        assert_eq!(
            Endpoint::from_value(Some(ENDPOINT_PLACEHOLDER)),
            Endpoint::Unconfigured
        );
        assert_eq!(
            Endpoint::from_value(Some(" https://script.google.com/macros/s/x/exec ")),
            Endpoint::Configured("https://script.google.com/macros/s/x/exec".to_string())
        );
    }

    #[test]
    fn fallback_modes_parse() {
        assert_eq!(parse_fallback_mode("Placeholder").unwrap(), FallbackMode::Placeholder);
        assert_eq!(parse_fallback_mode("error").unwrap(), FallbackMode::Unavailable);
        assert!(parse_fallback_mode("silent").is_err());
    }
}
