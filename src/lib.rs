//! Gadget OAuth Library
//!
//! Fetches third-party resources on behalf of hosted gadgets using OAuth 1.0a
//! or server-signed requests, without exposing provider secrets to the gadget.
//!
//! # Features
//!
//! - **Signing**: HMAC-SHA1 and RSA-SHA1 (RFC 5849), header/query/body placement
//! - **Token Lifecycle**: request token, approval URL, access token, session extension
//! - **Client State**: AES-256-GCM sealed state carried by the caller
//! - **Recovery**: expired or revoked tokens are recovered exactly once per call
//! - **Signed Fetch**: owner/viewer identity asserted with the container key

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod oauth;
pub mod transport;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    }
    .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
