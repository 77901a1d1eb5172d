//! services/portal/src/error.rs
//!
//! Defines the primary error type for the portal service.

use crate::config::ConfigError;
use portfolio_core::ports::PortError;

/// The primary error type for the `portal` service.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a failure to build the outbound HTTP client.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
