//! Error types for the OAuth engine
//!
//! [`Error`] covers hard failures (configuration, crypto, transport). OAuth
//! protocol outcomes are not errors in this sense: they travel as
//! [`crate::oauth::OAuthError`] inside the response metadata.

use thiserror::Error;

/// Result type alias for the OAuth engine
pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key material could not be parsed or used
    #[error("Key error: {0}")]
    Key(String),

    /// Sealing or unsealing a blob failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Transport error (connection refused, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error from `reqwest`
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error came from the network layer rather than local state
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http(_))
    }
}
