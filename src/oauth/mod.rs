//! OAuth 1.0a engine for gadget fetches
//!
//! Components, leaves first:
//! - [`signer`]: RFC 5849 signatures and parameter placement
//! - [`store`]: consumer keys and access tokens
//! - [`client_state`]: sealed token state round-tripped through the caller
//! - [`accessor`]: per-attempt binding of consumer, token and wire format
//! - [`fetcher`]: the three-legged dance and its single-retry recovery
//! - [`response_params`]: error, approval URL and state metadata

pub mod accessor;
pub mod arguments;
pub mod client_state;
pub mod descriptor;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod params;
pub mod response_params;
pub mod signer;
pub mod store;

pub use accessor::{AccessorInfo, AccessorToken, TokenSource};
pub use arguments::{AuthType, OAuthArguments, UseToken};
pub use client_state::ClientState;
pub use descriptor::{DeclaredServices, Endpoint, OAuth1Descriptor, OAuth2Descriptor, ParamLocation, ServiceDescriptor};
pub use error::{OAuthError, OAuthErrorKind, OAuthProblem};
pub use fetcher::{FetcherConfig, OAuthFetcher, TokenPersistence};
pub use identity::SecurityToken;
pub use response_params::{OAUTH_APPROVAL_URL, OAUTH_ERROR, OAUTH_ERROR_TEXT, OAUTH_STATE, OAuthResponseParams};
pub use signer::{ConsumerSecret, Credentials, SignatureMethod, SignedParams, VerificationKey, sign_request, verify_request};
pub use store::{BasicOAuthStore, ConsumerKeyAndSecret, KeyType, OAuthStore, TokenInfo, TokenKey};
