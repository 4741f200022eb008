//! Consumer keys and access tokens
//!
//! The [`OAuthStore`] trait abstracts over storage backends. The bundled
//! [`BasicOAuthStore`] keeps everything in memory behind `DashMap` indices and
//! is constructed explicitly by its owner; there is no process-wide instance.
//!
//! # Consumer lookup
//!
//! Consumers are looked up by `(gadget URI, service name)`, falling back to
//! the gadget's default entry (empty service name) and then to the
//! store-wide default signing key.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::descriptor::OAuth1Descriptor;
use super::error::OAuthError;
use super::identity::SecurityToken;
use super::signer::ConsumerSecret;
use crate::config::expand_env;
use crate::{Error, Result};

/// How a consumer secret is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    /// Shared secret, HMAC-SHA1
    #[default]
    HmacSymmetric,
    /// RSA private key, RSA-SHA1
    RsaPrivate,
}

/// A consumer registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerKeyAndSecret {
    /// `oauth_consumer_key`; empty means "use the container domain"
    pub consumer_key: String,
    /// Secret or private key
    pub secret: ConsumerSecret,
    /// Name of the public key the provider should verify with
    pub key_name: Option<String>,
    /// Callback URL sent with request-token calls
    pub callback_url: Option<String>,
}

impl ConsumerKeyAndSecret {
    /// HMAC consumer
    #[must_use]
    pub fn hmac(consumer_key: &str, consumer_secret: &str) -> Self {
        Self {
            consumer_key: consumer_key.to_string(),
            secret: ConsumerSecret::Hmac(consumer_secret.to_string()),
            key_name: None,
            callback_url: None,
        }
    }

    /// RSA consumer from PEM or bare base64 key text
    pub fn rsa(consumer_key: &str, private_key: &str) -> Result<Self> {
        Ok(Self {
            consumer_key: consumer_key.to_string(),
            secret: ConsumerSecret::rsa_from_text(private_key)?,
            key_name: None,
            callback_url: None,
        })
    }

    /// Set the key name
    #[must_use]
    pub fn with_key_name(mut self, key_name: &str) -> Self {
        self.key_name = Some(key_name.to_string());
        self
    }

    /// Set the callback URL
    #[must_use]
    pub fn with_callback_url(mut self, callback_url: &str) -> Self {
        self.callback_url = Some(callback_url.to_string());
        self
    }

    /// Key type of the secret
    #[must_use]
    pub fn key_type(&self) -> KeyType {
        match self.secret {
            ConsumerSecret::Hmac(_) => KeyType::HmacSymmetric,
            ConsumerSecret::RsaPrivate(_) => KeyType::RsaPrivate,
        }
    }
}

/// An approved access token
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// `oauth_token`
    pub access_token: String,
    /// `oauth_token_secret`
    pub token_secret: String,
    /// `oauth_session_handle`, when the provider supports session extension
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_handle: Option<String>,
    /// Expiry (Unix epoch millis), when the provider reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expire_millis: Option<u64>,
}

impl TokenInfo {
    /// Token without session data
    #[must_use]
    pub fn new(access_token: &str, token_secret: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            token_secret: token_secret.to_string(),
            session_handle: None,
            token_expire_millis: None,
        }
    }

    /// Whether the locally known expiry has passed
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.token_expire_millis.is_some_and(|exp| now_millis() >= exp)
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &self.access_token)
            .field("token_secret", &"<redacted>")
            .field("session_handle", &self.session_handle.as_ref().map(|_| "<redacted>"))
            .field("token_expire_millis", &self.token_expire_millis)
            .finish()
    }
}

/// Current time in Unix epoch millis
#[must_use]
pub fn now_millis() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Uniqueness boundary for stored tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    /// Gadget spec URL
    pub gadget_uri: String,
    /// Declared service name
    pub service_name: String,
    /// Viewer the token was approved for
    pub user_id: String,
    /// Gadget instance
    pub module_id: u64,
    /// Token name within the service
    pub token_name: String,
}

impl TokenKey {
    /// Key for the current viewer
    pub fn new(token: &SecurityToken, service_name: &str, token_name: &str) -> std::result::Result<Self, OAuthError> {
        let user_id = token
            .viewer_id
            .clone()
            .ok_or_else(|| OAuthError::unauthenticated("Token storage requires a viewer id"))?;
        Ok(Self {
            gadget_uri: token.app_url.clone(),
            service_name: service_name.to_string(),
            user_id,
            module_id: token.module_id,
            token_name: token_name.to_string(),
        })
    }
}

/// Storage backend for consumers and tokens.
///
/// Implementations must be `Send + Sync` because one store is shared by
/// every concurrent fetch.
#[async_trait]
pub trait OAuthStore: Send + Sync + 'static {
    /// Resolve the consumer registration for a gadget and service
    async fn get_consumer_key_and_secret(
        &self,
        token: &SecurityToken,
        service_name: &str,
        provider: Option<&OAuth1Descriptor>,
    ) -> std::result::Result<ConsumerKeyAndSecret, OAuthError>;

    /// The viewer's approved token, if any
    async fn get_token_info(
        &self,
        token: &SecurityToken,
        consumer: &ConsumerKeyAndSecret,
        service_name: &str,
        token_name: &str,
    ) -> std::result::Result<Option<TokenInfo>, OAuthError>;

    /// Store or replace the viewer's token
    async fn set_token_info(
        &self,
        token: &SecurityToken,
        consumer: &ConsumerKeyAndSecret,
        service_name: &str,
        token_name: &str,
        info: TokenInfo,
    ) -> std::result::Result<(), OAuthError>;

    /// Forget the viewer's token
    async fn remove_token(
        &self,
        token: &SecurityToken,
        consumer: &ConsumerKeyAndSecret,
        service_name: &str,
        token_name: &str,
    ) -> std::result::Result<(), OAuthError>;
}

/// One consumer entry in the JSON consumer file
#[derive(Debug, Deserialize)]
struct ConsumerEntry {
    consumer_key: String,
    consumer_secret: String,
    #[serde(default)]
    key_type: KeyType,
    #[serde(default)]
    key_name: Option<String>,
    #[serde(default)]
    callback_url: Option<String>,
}

impl ConsumerEntry {
    fn into_consumer(self) -> Result<ConsumerKeyAndSecret> {
        let consumer_key = expand_env(&self.consumer_key);
        let secret = expand_env(&self.consumer_secret);
        let mut consumer = match self.key_type {
            KeyType::HmacSymmetric => ConsumerKeyAndSecret::hmac(&consumer_key, &secret),
            KeyType::RsaPrivate => ConsumerKeyAndSecret::rsa(&consumer_key, &secret)?,
        };
        consumer.key_name = self.key_name;
        consumer.callback_url = self.callback_url.map(|u| expand_env(&u));
        Ok(consumer)
    }
}

/// Summary row for one configured consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSummary {
    /// Gadget spec URL
    pub gadget_uri: String,
    /// Service name, empty for the gadget default
    pub service_name: String,
    /// Consumer key
    pub consumer_key: String,
    /// Key type
    pub key_type: KeyType,
}

/// In-memory store.
///
/// Consumers are indexed by gadget, then service; tokens by [`TokenKey`].
#[derive(Default)]
pub struct BasicOAuthStore {
    consumers: DashMap<String, HashMap<String, ConsumerKeyAndSecret>>,
    tokens: DashMap<TokenKey, TokenInfo>,
    default_key: RwLock<Option<ConsumerKeyAndSecret>>,
}

impl BasicOAuthStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer for a gadget and service (`""` for the gadget default)
    pub fn set_consumer(&self, gadget_uri: &str, service_name: &str, consumer: ConsumerKeyAndSecret) {
        self.consumers
            .entry(gadget_uri.to_string())
            .or_default()
            .insert(service_name.to_string(), consumer);
    }

    /// Set the store-wide default signing key
    pub fn set_default_key(&self, consumer: ConsumerKeyAndSecret) {
        *self.default_key.write() = Some(consumer);
    }

    /// Whether a store-wide default key is configured
    #[must_use]
    pub fn has_default_key(&self) -> bool {
        self.default_key.read().is_some()
    }

    /// Load consumers from the JSON consumer format.
    ///
    /// `${VAR}` and `${VAR:-default}` in keys, secrets and callback URLs are
    /// expanded from the environment. Returns the number of entries loaded.
    pub fn init_from_config_string(&self, json: &str) -> Result<usize> {
        let parsed: HashMap<String, HashMap<String, ConsumerEntry>> = serde_json::from_str(json)?;

        let mut loaded = 0;
        for (gadget_uri, services) in parsed {
            for (service_name, entry) in services {
                let consumer = entry.into_consumer().map_err(|e| {
                    Error::Config(format!(
                        "Consumer for gadget {gadget_uri} service '{service_name}': {e}"
                    ))
                })?;
                self.set_consumer(&gadget_uri, &service_name, consumer);
                loaded += 1;
            }
        }

        info!(consumers = loaded, "Loaded OAuth consumers");
        Ok(loaded)
    }

    /// Load consumers from a JSON file
    pub fn load_consumers_file(&self, path: &Path) -> Result<usize> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read consumer file {}: {e}", path.display()))
        })?;
        self.init_from_config_string(&json)
    }

    /// Load the default RSA signing key from a PEM file
    pub fn load_default_key(
        &self,
        path: &Path,
        consumer_key: Option<&str>,
        key_name: Option<&str>,
        callback_url: Option<&str>,
    ) -> Result<()> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read signing key {}: {e}", path.display()))
        })?;
        let mut consumer = ConsumerKeyAndSecret::rsa(consumer_key.unwrap_or_default(), &pem)?;
        consumer.key_name = key_name.map(str::to_string);
        consumer.callback_url = callback_url.map(str::to_string);
        self.set_default_key(consumer);

        info!(path = %path.display(), key_name = ?key_name, "Loaded default signing key");
        Ok(())
    }

    /// Configured consumers, sorted by gadget then service
    #[must_use]
    pub fn consumer_summaries(&self) -> Vec<ConsumerSummary> {
        let mut rows: Vec<ConsumerSummary> = self
            .consumers
            .iter()
            .flat_map(|entry| {
                let gadget_uri = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|(service, c)| ConsumerSummary {
                        gadget_uri: gadget_uri.clone(),
                        service_name: service.clone(),
                        consumer_key: c.consumer_key.clone(),
                        key_type: c.key_type(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        rows.sort_by(|a, b| (&a.gadget_uri, &a.service_name).cmp(&(&b.gadget_uri, &b.service_name)));
        rows
    }

    /// Number of stored tokens
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    fn lookup_consumer(&self, gadget_uri: &str, service_name: &str) -> Option<ConsumerKeyAndSecret> {
        let services = self.consumers.get(gadget_uri)?;
        services
            .get(service_name)
            .or_else(|| services.get(""))
            .cloned()
    }
}

#[async_trait]
impl OAuthStore for BasicOAuthStore {
    async fn get_consumer_key_and_secret(
        &self,
        token: &SecurityToken,
        service_name: &str,
        provider: Option<&OAuth1Descriptor>,
    ) -> std::result::Result<ConsumerKeyAndSecret, OAuthError> {
        if let Some(consumer) = self.lookup_consumer(&token.app_url, service_name) {
            debug!(gadget = %token.app_url, service = %service_name, "Using registered consumer");
            return Ok(consumer);
        }

        let default_key = self.default_key.read().clone();
        if let Some(mut consumer) = default_key {
            if consumer.consumer_key.is_empty() {
                consumer.consumer_key.clone_from(&token.domain);
            }
            debug!(gadget = %token.app_url, service = %service_name, "Using default signing key");
            return Ok(consumer);
        }

        let endpoint = provider.map_or_else(String::new, |p| format!(" (request token URL {})", p.request.url));
        Err(OAuthError::bad_config(format!(
            "No consumer key for gadget {} and service '{service_name}'{endpoint}",
            token.app_url
        )))
    }

    async fn get_token_info(
        &self,
        token: &SecurityToken,
        _consumer: &ConsumerKeyAndSecret,
        service_name: &str,
        token_name: &str,
    ) -> std::result::Result<Option<TokenInfo>, OAuthError> {
        let key = TokenKey::new(token, service_name, token_name)?;
        Ok(self.tokens.get(&key).map(|entry| entry.value().clone()))
    }

    async fn set_token_info(
        &self,
        token: &SecurityToken,
        _consumer: &ConsumerKeyAndSecret,
        service_name: &str,
        token_name: &str,
        info: TokenInfo,
    ) -> std::result::Result<(), OAuthError> {
        let key = TokenKey::new(token, service_name, token_name)?;
        debug!(gadget = %key.gadget_uri, service = %service_name, user = %key.user_id, "Stored access token");
        self.tokens.insert(key, info);
        Ok(())
    }

    async fn remove_token(
        &self,
        token: &SecurityToken,
        _consumer: &ConsumerKeyAndSecret,
        service_name: &str,
        token_name: &str,
    ) -> std::result::Result<(), OAuthError> {
        let key = TokenKey::new(token, service_name, token_name)?;
        if self.tokens.remove(&key).is_some() {
            debug!(gadget = %key.gadget_uri, service = %service_name, user = %key.user_id, "Removed access token");
        }
        Ok(())
    }
}
