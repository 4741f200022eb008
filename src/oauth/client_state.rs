//! Token state carried by the caller between requests
//!
//! The state is serialized as compact JSON inside a timestamped envelope and
//! sealed with a [`BlobCrypter`]. Decoding never fails loudly: a blob that
//! was tampered with, sealed under another key, or is older than the allowed
//! age decodes to an empty state and the dance starts over.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::{TokenInfo, now_millis};
use crate::Result;
use crate::crypto::BlobCrypter;

/// Opaque per-caller state.
///
/// Every field is optional and absence is meaningful.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    /// Unapproved request token
    #[serde(rename = "r", default, skip_serializing_if = "Option::is_none")]
    pub request_token: Option<String>,
    /// Secret for `request_token`
    #[serde(rename = "rs", default, skip_serializing_if = "Option::is_none")]
    pub request_token_secret: Option<String>,
    /// Access token (client-held persistence)
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Secret for `access_token`
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub access_token_secret: Option<String>,
    /// Session handle for extending the access token
    #[serde(rename = "sh", default, skip_serializing_if = "Option::is_none")]
    pub session_handle: Option<String>,
    /// Access token expiry (Unix epoch millis)
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub token_expire_millis: Option<u64>,
    /// Viewer that created this state
    #[serde(rename = "o", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Callback URL sent with the request-token call
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    /// Issued at, Unix epoch millis
    t: u64,
    s: ClientState,
}

impl ClientState {
    /// Whether no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Seal the state; `None` when there is nothing to carry
    pub fn encode(&self, crypter: &dyn BlobCrypter) -> Result<Option<String>> {
        if self.is_empty() {
            return Ok(None);
        }
        let envelope = Envelope {
            t: now_millis(),
            s: self.clone(),
        };
        let json = serde_json::to_vec(&envelope)?;
        crypter.seal(&json).map(Some)
    }

    /// Open a blob from the caller. Any failure yields an empty state.
    #[must_use]
    pub fn decode(crypter: &dyn BlobCrypter, blob: Option<&str>, max_age: Duration) -> Self {
        let Some(blob) = blob.filter(|b| !b.is_empty()) else {
            return Self::default();
        };

        let plaintext = match crypter.unseal(blob) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Discarding client state that does not unseal");
                return Self::default();
            }
        };

        let envelope: Envelope = match serde_json::from_slice(&plaintext) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Discarding malformed client state");
                return Self::default();
            }
        };

        let age_millis = now_millis().saturating_sub(envelope.t);
        if u128::from(age_millis) > max_age.as_millis() {
            debug!(age_millis, "Discarding expired client state");
            return Self::default();
        }

        envelope.s
    }

    /// Forget the request token
    pub fn clear_request_token(&mut self) {
        self.request_token = None;
        self.request_token_secret = None;
    }

    /// Forget the access token and its session data
    pub fn clear_access_token(&mut self) {
        self.access_token = None;
        self.access_token_secret = None;
        self.session_handle = None;
        self.token_expire_millis = None;
    }

    /// Carry an access token
    pub fn set_access_token(&mut self, info: &TokenInfo) {
        self.access_token = Some(info.access_token.clone());
        self.access_token_secret = Some(info.token_secret.clone());
        self.session_handle.clone_from(&info.session_handle);
        self.token_expire_millis = info.token_expire_millis;
    }

    /// The carried access token, if complete
    #[must_use]
    pub fn access_token_info(&self) -> Option<TokenInfo> {
        Some(TokenInfo {
            access_token: self.access_token.clone()?,
            token_secret: self.access_token_secret.clone()?,
            session_handle: self.session_handle.clone(),
            token_expire_millis: self.token_expire_millis,
        })
    }
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientState")
            .field("request_token", &self.request_token)
            .field("request_token_secret", &self.request_token_secret.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token)
            .field("access_token_secret", &self.access_token_secret.as_ref().map(|_| "<redacted>"))
            .field("session_handle", &self.session_handle.as_ref().map(|_| "<redacted>"))
            .field("token_expire_millis", &self.token_expire_millis)
            .field("owner", &self.owner)
            .field("callback_url", &self.callback_url)
            .finish()
    }
}
