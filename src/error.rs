//! Error types for the scanner core

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the scanner core
#[derive(Error, Debug)]
pub enum Error {
    // Gateway errors
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Malformed response from {endpoint}: {detail}")]
    MalformedResponse { endpoint: String, detail: String },

    // Lookup errors
    #[error("No pairs found for token: {0}")]
    LookupNotFound(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Persistence errors
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient transport failure)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::GatewayUnavailable(_))
    }

    /// Check if this error means the queried token simply does not exist,
    /// as opposed to the upstream being temporarily unreachable. The
    /// presentation layer renders these two cases differently.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::LookupNotFound(_))
    }
}

// Conversion from reqwest errors: decode failures mean the response shape
// was wrong, everything else is a transport problem.
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let endpoint = e
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if e.is_decode() {
            Error::MalformedResponse {
                endpoint,
                detail: e.to_string(),
            }
        } else {
            Error::GatewayUnavailable(e.to_string())
        }
    }
}

// Conversion from serde_json errors (only reachable from persistence paths)
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Persistence(e.to_string())
    }
}
