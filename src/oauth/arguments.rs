//! Caller intent for one OAuth or signed fetch

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::OAuthError;
use super::params::OAUTH_VERIFIER;

/// Request parameter naming the service
pub const PARAM_SERVICE_NAME: &str = "OAUTH_SERVICE_NAME";
/// Request parameter naming the token
pub const PARAM_TOKEN_NAME: &str = "OAUTH_TOKEN_NAME";
/// Pre-approved request token
pub const PARAM_REQUEST_TOKEN: &str = "OAUTH_REQUEST_TOKEN";
/// Pre-approved request token secret
pub const PARAM_REQUEST_TOKEN_SECRET: &str = "OAUTH_REQUEST_TOKEN_SECRET";
/// Token use policy
pub const PARAM_USE_TOKEN: &str = "OAUTH_USE_TOKEN";
/// Client state from a previous response
pub const PARAM_CLIENT_STATE: &str = "oauthState";
/// Callback URL the provider redirected the user to after approval
pub const PARAM_RECEIVED_CALLBACK: &str = "OAUTH_RECEIVED_CALLBACK";
/// Whether to sign the owner id
pub const PARAM_SIGN_OWNER: &str = "signOwner";
/// Whether to sign the viewer id
pub const PARAM_SIGN_VIEWER: &str = "signViewer";
/// Skip the signed result cache
pub const PARAM_BYPASS_CACHE: &str = "bypassCache";

/// Whether an access token is needed for the fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UseToken {
    /// Never use a token; sign with the consumer key only
    Never,
    /// Use a token when one is already approved, otherwise fetch without
    IfAvailable,
    /// A token is required; start the approval dance when none exists
    #[default]
    Always,
}

impl UseToken {
    /// Parse `never`, `if_available` or `always`, case-insensitively
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "never" => Some(Self::Never),
            "if_available" => Some(Self::IfAvailable),
            "always" => Some(Self::Always),
            _ => None,
        }
    }
}

/// Signing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// Three-legged OAuth against a declared service
    OAuth,
    /// Server-key signature asserting owner/viewer identity; no token dance
    SignedFetch,
}

/// Caller intent.
///
/// One type serves both preloads and live requests. Defaults: OAuth fetches
/// use `UseToken::Always`, signed fetches `UseToken::Never`, and both sign
/// owner and viewer.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthArguments {
    /// Signing mode
    pub auth_type: AuthType,
    /// Declared service name (empty for signed fetch)
    pub service_name: String,
    /// Token name, so one gadget can hold several tokens per service
    pub token_name: String,
    /// Token policy
    pub use_token: UseToken,
    /// Add `opensocial_owner_id`
    pub sign_owner: bool,
    /// Add `opensocial_viewer_id`
    pub sign_viewer: bool,
    /// Pre-approved request token
    pub request_token: Option<String>,
    /// Secret for the pre-approved request token
    pub request_token_secret: Option<String>,
    /// Opaque state from a previous response
    pub client_state: Option<String>,
    /// Provider callback URL, carrying `oauth_verifier`
    pub received_callback: Option<String>,
    /// Skip the signed result cache
    pub bypass_cache: bool,
}

impl OAuthArguments {
    /// Three-legged OAuth against `service_name`
    #[must_use]
    pub fn oauth(service_name: &str) -> Self {
        Self {
            auth_type: AuthType::OAuth,
            service_name: service_name.to_string(),
            token_name: String::new(),
            use_token: UseToken::Always,
            sign_owner: true,
            sign_viewer: true,
            request_token: None,
            request_token_secret: None,
            client_state: None,
            received_callback: None,
            bypass_cache: false,
        }
    }

    /// Signed fetch
    #[must_use]
    pub fn signed_fetch() -> Self {
        Self {
            auth_type: AuthType::SignedFetch,
            use_token: UseToken::Never,
            ..Self::oauth("")
        }
    }

    /// Set the token policy
    #[must_use]
    pub fn with_use_token(mut self, use_token: UseToken) -> Self {
        self.use_token = use_token;
        self
    }

    /// Set the token name
    #[must_use]
    pub fn with_token_name(mut self, token_name: &str) -> Self {
        self.token_name = token_name.to_string();
        self
    }

    /// Replay client state from a previous response
    #[must_use]
    pub fn with_client_state(mut self, state: Option<&str>) -> Self {
        self.client_state = state.map(str::to_string);
        self
    }

    /// Supply a pre-approved request token
    #[must_use]
    pub fn with_request_token(mut self, token: &str, secret: &str) -> Self {
        self.request_token = Some(token.to_string());
        self.request_token_secret = Some(secret.to_string());
        self
    }

    /// Supply the callback URL the provider sent the user back to
    #[must_use]
    pub fn with_received_callback(mut self, callback: &str) -> Self {
        self.received_callback = Some(callback.to_string());
        self
    }

    /// Toggle owner/viewer signing
    #[must_use]
    pub fn with_signing(mut self, sign_owner: bool, sign_viewer: bool) -> Self {
        self.sign_owner = sign_owner;
        self.sign_viewer = sign_viewer;
        self
    }

    /// Parse arguments from live request parameters
    pub fn from_request_params(
        auth_type: AuthType,
        params: &HashMap<String, String>,
    ) -> Result<Self, OAuthError> {
        let mut args = match auth_type {
            AuthType::OAuth => Self::oauth(params.get(PARAM_SERVICE_NAME).map_or("", String::as_str)),
            AuthType::SignedFetch => Self::signed_fetch(),
        };

        if let Some(name) = params.get(PARAM_TOKEN_NAME) {
            args.token_name.clone_from(name);
        }
        if auth_type == AuthType::OAuth {
            if let Some(raw) = params.get(PARAM_USE_TOKEN) {
                args.use_token = UseToken::parse(raw).ok_or_else(|| {
                    OAuthError::invalid_request(format!("Unknown {PARAM_USE_TOKEN} value '{raw}'"))
                })?;
            }
        }
        args.request_token = non_empty(params.get(PARAM_REQUEST_TOKEN));
        args.request_token_secret = non_empty(params.get(PARAM_REQUEST_TOKEN_SECRET));
        args.client_state = non_empty(params.get(PARAM_CLIENT_STATE));
        args.received_callback = non_empty(params.get(PARAM_RECEIVED_CALLBACK));
        args.sign_owner = parse_bool(params.get(PARAM_SIGN_OWNER), true);
        args.sign_viewer = parse_bool(params.get(PARAM_SIGN_VIEWER), true);
        args.bypass_cache = parse_bool(params.get(PARAM_BYPASS_CACHE), false);

        Ok(args)
    }

    /// `oauth_verifier` carried by the received callback, if any
    #[must_use]
    pub fn verifier(&self) -> Option<String> {
        let callback = Url::parse(self.received_callback.as_deref()?).ok()?;
        callback
            .query_pairs()
            .find(|(k, _)| k == OAUTH_VERIFIER)
            .map(|(_, v)| v.into_owned())
    }
}

impl fmt::Debug for OAuthArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthArguments")
            .field("auth_type", &self.auth_type)
            .field("service_name", &self.service_name)
            .field("token_name", &self.token_name)
            .field("use_token", &self.use_token)
            .field("sign_owner", &self.sign_owner)
            .field("sign_viewer", &self.sign_viewer)
            .field("request_token", &self.request_token)
            .field("request_token_secret", &self.request_token_secret.as_ref().map(|_| "<redacted>"))
            .field("has_client_state", &self.client_state.is_some())
            .field("received_callback", &self.received_callback.is_some())
            .field("bypass_cache", &self.bypass_cache)
            .finish()
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn parse_bool(value: Option<&String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "true" || v == "1" => true,
        Some(v) if v == "false" || v == "0" => false,
        _ => default,
    }
}
