//! Binding of consumer, token and wire format for one fetch
//!
//! An [`AccessorInfo`] is rebuilt for every attempt from immutable inputs and
//! never persisted. Token precedence:
//!
//! 1. a pre-approved request token supplied by the caller,
//! 2. the viewer's access token in the [`OAuthStore`],
//! 3. an access or request token carried in [`ClientState`],
//! 4. nothing, and the dance starts from scratch.

use tracing::debug;

use super::arguments::{AuthType, OAuthArguments, UseToken};
use super::client_state::ClientState;
use super::descriptor::{DeclaredServices, ParamLocation};
use super::error::OAuthError;
use super::identity::SecurityToken;
use super::signer::Credentials;
use super::store::{ConsumerKeyAndSecret, OAuthStore, TokenInfo};
use crate::transport::HttpMethod;

/// The token an accessor signs with. Request and access tokens never coexist.
#[derive(Clone, PartialEq, Eq)]
pub enum AccessorToken {
    /// Consumer-only signature
    None,
    /// Unapproved or just-approved request token
    Request {
        /// `oauth_token`
        token: String,
        /// Token secret
        secret: String,
    },
    /// Access token
    Access {
        /// `oauth_token`
        token: String,
        /// Token secret
        secret: String,
    },
}

impl std::fmt::Debug for AccessorToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Request { token, .. } => write!(f, "Request({token})"),
            Self::Access { token, .. } => write!(f, "Access({token})"),
        }
    }
}

/// Where the current token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// No token
    None,
    /// Caller-supplied pre-approved request token
    Arguments,
    /// Server-side store
    Store,
    /// Caller-held client state
    ClientState,
}

/// Ready-to-sign accessor
#[derive(Debug, Clone)]
pub struct AccessorInfo {
    /// Consumer registration
    pub consumer: ConsumerKeyAndSecret,
    /// Current token
    pub token: AccessorToken,
    /// Origin of `token`
    pub source: TokenSource,
    /// Session handle for extending an access token
    pub session_handle: Option<String>,
    /// Access token expiry (Unix epoch millis)
    pub token_expire_millis: Option<u64>,
    /// Declared method of the service, used for the request-token call
    pub method: HttpMethod,
    /// Declared parameter location of the service
    pub location: ParamLocation,
}

impl AccessorInfo {
    fn consumer_only(consumer: ConsumerKeyAndSecret, method: HttpMethod, location: ParamLocation) -> Self {
        Self {
            consumer,
            token: AccessorToken::None,
            source: TokenSource::None,
            session_handle: None,
            token_expire_millis: None,
            method,
            location,
        }
    }

    /// Credentials for the current token
    #[must_use]
    pub fn credentials(&self) -> Credentials<'_> {
        let (token, token_secret) = match &self.token {
            AccessorToken::None => (None, None),
            AccessorToken::Request { token, secret } | AccessorToken::Access { token, secret } => {
                (Some(token.as_str()), Some(secret.as_str()))
            }
        };
        Credentials {
            consumer_key: &self.consumer.consumer_key,
            consumer_secret: &self.consumer.secret,
            token,
            token_secret,
        }
    }

    /// Consumer-only credentials, for request-token calls
    #[must_use]
    pub fn consumer_credentials(&self) -> Credentials<'_> {
        Credentials {
            consumer_key: &self.consumer.consumer_key,
            consumer_secret: &self.consumer.secret,
            token: None,
            token_secret: None,
        }
    }

    /// Whether an access token is bound
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        matches!(self.token, AccessorToken::Access { .. })
    }

    /// Whether the locally known access token expiry has passed
    #[must_use]
    pub fn access_token_expired(&self) -> bool {
        self.has_access_token() && self.token_expire_millis.is_some_and(|exp| super::store::now_millis() >= exp)
    }

    /// Bind an access token
    pub fn set_access_token(&mut self, info: &TokenInfo, source: TokenSource) {
        self.token = AccessorToken::Access {
            token: info.access_token.clone(),
            secret: info.token_secret.clone(),
        };
        self.source = source;
        self.session_handle.clone_from(&info.session_handle);
        self.token_expire_millis = info.token_expire_millis;
    }

    /// Bind a request token
    pub fn set_request_token(&mut self, token: &str, secret: &str, source: TokenSource) {
        self.token = AccessorToken::Request {
            token: token.to_string(),
            secret: secret.to_string(),
        };
        self.source = source;
        self.session_handle = None;
        self.token_expire_millis = None;
    }

    /// Drop whatever token is bound
    pub fn clear_token(&mut self) {
        self.token = AccessorToken::None;
        self.source = TokenSource::None;
        self.session_handle = None;
        self.token_expire_millis = None;
    }
}

/// Build the accessor for one attempt.
///
/// `state` must already belong to the current viewer.
pub async fn build_accessor(
    store: &dyn OAuthStore,
    args: &OAuthArguments,
    token: &SecurityToken,
    services: &DeclaredServices,
    state: &ClientState,
) -> Result<AccessorInfo, OAuthError> {
    if args.auth_type == AuthType::SignedFetch {
        let consumer = store.get_consumer_key_and_secret(token, "", None).await?;
        return Ok(AccessorInfo::consumer_only(consumer, HttpMethod::Get, ParamLocation::UriQuery));
    }

    let descriptor = services.oauth1(&args.service_name)?;
    let consumer = store
        .get_consumer_key_and_secret(token, &args.service_name, Some(descriptor))
        .await?;
    let mut accessor = AccessorInfo::consumer_only(consumer, descriptor.request.method, descriptor.request.location);

    if args.use_token == UseToken::Never {
        return Ok(accessor);
    }

    if let Some(request_token) = &args.request_token {
        let secret = args.request_token_secret.as_deref().unwrap_or_default();
        accessor.set_request_token(request_token, secret, TokenSource::Arguments);
        debug!(service = %args.service_name, "Using caller-supplied request token");
        return Ok(accessor);
    }

    if token.viewer_id.is_some() {
        if let Some(info) = store
            .get_token_info(token, &accessor.consumer, &args.service_name, &args.token_name)
            .await?
        {
            accessor.set_access_token(&info, TokenSource::Store);
            debug!(service = %args.service_name, "Using stored access token");
            return Ok(accessor);
        }
    }

    if let Some(info) = state.access_token_info() {
        accessor.set_access_token(&info, TokenSource::ClientState);
        debug!(service = %args.service_name, "Using access token from client state");
    } else if let Some(request_token) = &state.request_token {
        let secret = state.request_token_secret.as_deref().unwrap_or_default();
        accessor.set_request_token(request_token, secret, TokenSource::ClientState);
        debug!(service = %args.service_name, "Using request token from client state");
    }

    Ok(accessor)
}
