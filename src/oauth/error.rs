//! OAuth error taxonomy
//!
//! Protocol failures are values, not panics or hard errors: every
//! [`OAuthError`] ends up as `oauthError`/`oauthErrorText` metadata on the
//! response handed back to the caller.

use std::fmt;

use thiserror::Error;

/// Provider-reported `oauth_problem` codes (OAuth Problem Reporting extension)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OAuthProblem {
    /// `token_expired`
    TokenExpired,
    /// `token_revoked`
    TokenRevoked,
    /// `token_rejected`
    TokenRejected,
    /// `consumer_key_unknown`
    ConsumerKeyUnknown,
    /// `consumer_key_refused`
    ConsumerKeyRefused,
    /// `parameter_rejected`
    ParameterRejected,
    /// Any other code, passed through verbatim
    Other(String),
}

impl OAuthProblem {
    /// Parse a wire code
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code.trim() {
            "token_expired" => Self::TokenExpired,
            "token_revoked" => Self::TokenRevoked,
            "token_rejected" => Self::TokenRejected,
            "consumer_key_unknown" => Self::ConsumerKeyUnknown,
            "consumer_key_refused" => Self::ConsumerKeyRefused,
            "parameter_rejected" => Self::ParameterRejected,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire code
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TokenExpired => "token_expired",
            Self::TokenRevoked => "token_revoked",
            Self::TokenRejected => "token_rejected",
            Self::ConsumerKeyUnknown => "consumer_key_unknown",
            Self::ConsumerKeyRefused => "consumer_key_refused",
            Self::ParameterRejected => "parameter_rejected",
            Self::Other(code) => code,
        }
    }

    /// Problems recovered locally by discarding the token and starting over
    #[must_use]
    pub fn is_token_failure(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::TokenRevoked)
    }
}

impl fmt::Display for OAuthProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable error codes surfaced as `oauthError`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthErrorKind {
    /// Unknown service, missing consumer key, inconsistent descriptor
    BadOAuthConfiguration,
    /// Identity required for signing or approval is absent
    Unauthenticated,
    /// A viewer other than the page owner tried to approve or use a token
    NotOwner,
    /// The caller tried to supply reserved protocol parameters
    InvalidRequest,
    /// Missing or garbled provider response, or a failure during the exchange
    UnknownProblem,
    /// Pass-through `oauth_problem` from the provider
    Provider(OAuthProblem),
}

impl OAuthErrorKind {
    /// Code reported to the caller
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::BadOAuthConfiguration => "BAD_OAUTH_CONFIGURATION",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::NotOwner => "NOT_OWNER",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::UnknownProblem => "UNKNOWN_PROBLEM",
            Self::Provider(problem) => problem.as_str(),
        }
    }
}

/// A protocol-level failure with human-readable detail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {}", .kind.code(), .message)]
pub struct OAuthError {
    /// Error code
    pub kind: OAuthErrorKind,
    /// Detail text; never contains token secrets or session handles
    pub message: String,
}

impl OAuthError {
    /// Create an error
    pub fn new(kind: OAuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// `BAD_OAUTH_CONFIGURATION`
    pub fn bad_config(message: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::BadOAuthConfiguration, message)
    }

    /// `UNAUTHENTICATED`
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::Unauthenticated, message)
    }

    /// `NOT_OWNER`
    pub fn not_owner(message: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::NotOwner, message)
    }

    /// `INVALID_REQUEST`
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::InvalidRequest, message)
    }

    /// `UNKNOWN_PROBLEM`
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::UnknownProblem, message)
    }

    /// Provider-reported problem
    pub fn provider(problem: OAuthProblem, message: impl Into<String>) -> Self {
        Self::new(OAuthErrorKind::Provider(problem), message)
    }

    /// The provider problem, if this error carries one
    #[must_use]
    pub fn problem(&self) -> Option<&OAuthProblem> {
        match &self.kind {
            OAuthErrorKind::Provider(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_codes_round_trip() {
        for code in [
            "token_expired",
            "token_revoked",
            "token_rejected",
            "consumer_key_unknown",
            "consumer_key_refused",
            "parameter_rejected",
            "nonce_used",
        ] {
            assert_eq!(OAuthProblem::parse(code).as_str(), code);
        }
    }

    #[test]
    fn only_expired_and_revoked_are_token_failures() {
        assert!(OAuthProblem::TokenExpired.is_token_failure());
        assert!(OAuthProblem::TokenRevoked.is_token_failure());
        assert!(!OAuthProblem::TokenRejected.is_token_failure());
        assert!(!OAuthProblem::ConsumerKeyUnknown.is_token_failure());
    }

    #[test]
    fn error_display_uses_code() {
        let err = OAuthError::not_owner("only the page owner may approve");
        assert_eq!(err.to_string(), "NOT_OWNER: only the page owner may approve");

        let err = OAuthError::provider(OAuthProblem::ConsumerKeyRefused, "refused");
        assert_eq!(err.kind.code(), "consumer_key_refused");
        assert_eq!(err.problem(), Some(&OAuthProblem::ConsumerKeyRefused));
    }
}
