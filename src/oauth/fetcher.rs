//! OAuth fetch orchestration
//!
//! [`OAuthFetcher::fetch`] drives one caller request through the three-legged
//! dance:
//!
//! ```text
//! NoToken ──request token──▶ AwaitingApproval  (returns approval URL + state)
//! RequestToken ──access token──▶ HaveAccessToken ──sign──▶ ResourceFetched
//!                                        │
//!                          expired/revoked, first time only
//!                                        ▼
//!                  session extension, else discard token and start over
//! ```
//!
//! Protocol failures never escape as `Err`: they become `oauthError` and
//! `oauthErrorText` metadata on a 403 response. Only transport and crypto
//! faults are returned as [`crate::Error`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::accessor::{AccessorInfo, AccessorToken, TokenSource, build_accessor};
use super::arguments::{AuthType, OAuthArguments, UseToken};
use super::client_state::ClientState;
use super::descriptor::{DeclaredServices, Endpoint, OAuth1Descriptor};
use super::error::{OAuthError, OAuthProblem};
use super::identity::SecurityToken;
use super::params::{
    self, OAUTH_CALLBACK, OAUTH_CALLBACK_CONFIRMED, OAUTH_EXPIRES_IN, OAUTH_PROBLEM,
    OAUTH_PROBLEM_ADVICE, OAUTH_SESSION_HANDLE, OAUTH_TOKEN, OAUTH_TOKEN_SECRET, OAUTH_VERIFIER,
    OPENSOCIAL_APP_ID, OPENSOCIAL_APP_URL, OPENSOCIAL_OWNER_ID, OPENSOCIAL_VIEWER_ID,
    XOAUTH_PUBLIC_KEY, XOAUTH_SIGNATURE_PUBLICKEY,
};
use super::response_params::OAuthResponseParams;
use super::signer::{self, ConsumerSecret, Credentials};
use super::store::{OAuthStore, TokenInfo, now_millis};
use crate::cache::{CacheIdentity, SignedResultCache};
use crate::crypto::BlobCrypter;
use crate::transport::{HttpFetcher, HttpMethod, HttpRequest, HttpResponse};
use crate::{Error, Result};

/// Where approved access tokens are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPersistence {
    /// In the [`OAuthStore`], keyed by viewer
    #[default]
    Server,
    /// In the sealed client state handed back to the caller
    Client,
}

/// Fetcher behavior
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Where access tokens are kept
    pub token_persistence: TokenPersistence,
    /// Include the exchange trace in `oauthErrorText`
    pub send_trace_to_client: bool,
    /// Oldest client state accepted
    pub state_max_age: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            token_persistence: TokenPersistence::Server,
            send_trace_to_client: true,
            state_max_age: Duration::from_secs(3600),
        }
    }
}

/// Signs and executes requests on behalf of gadgets
pub struct OAuthFetcher {
    store: Arc<dyn OAuthStore>,
    transport: Arc<dyn HttpFetcher>,
    crypter: Arc<dyn BlobCrypter>,
    cache: Option<Arc<SignedResultCache>>,
    config: FetcherConfig,
}

impl OAuthFetcher {
    /// Create a fetcher
    pub fn new(
        store: Arc<dyn OAuthStore>,
        transport: Arc<dyn HttpFetcher>,
        crypter: Arc<dyn BlobCrypter>,
        config: FetcherConfig,
    ) -> Self {
        Self {
            store,
            transport,
            crypter,
            cache: None,
            config,
        }
    }

    /// Memoize identical signed GETs
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<SignedResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fetch `request` on behalf of the gadget identified by `token`.
    ///
    /// The returned response is either the provider's resource response, an
    /// empty 200 with `oauthApprovalUrl` while approval is pending, or an
    /// empty 403 carrying `oauthError`. `oauthState` is attached whenever
    /// there is state to carry.
    pub async fn fetch(
        &self,
        request: &HttpRequest,
        token: &SecurityToken,
        args: &OAuthArguments,
        services: &DeclaredServices,
    ) -> Result<HttpResponse> {
        let mut call = FetchCall {
            fetcher: self,
            request,
            token,
            services,
            args: args.clone(),
            state: self.load_state(args, token),
            params: OAuthResponseParams::new(self.config.send_trace_to_client),
            recovered: false,
        };
        let outcome = call.run().await;
        call.finish(outcome)
    }

    fn load_state(&self, args: &OAuthArguments, token: &SecurityToken) -> ClientState {
        let state = ClientState::decode(
            &*self.crypter,
            args.client_state.as_deref(),
            self.config.state_max_age,
        );
        if !state.is_empty() && state.owner.as_deref() != token.viewer_id.as_deref() {
            debug!(gadget = %token.app_url, "Discarding client state issued to another viewer");
            return ClientState::default();
        }
        state
    }
}

/// Why an attempt stopped
enum FetchError {
    /// Reported to the caller as metadata
    OAuth(OAuthError),
    /// Returned as `Err`
    Fatal(Error),
}

impl From<OAuthError> for FetchError {
    fn from(e: OAuthError) -> Self {
        Self::OAuth(e)
    }
}

impl From<Error> for FetchError {
    fn from(e: Error) -> Self {
        Self::Fatal(e)
    }
}

type Step<T> = std::result::Result<T, FetchError>;

enum Attempt {
    /// Resource response, or `None` when approval is pending
    Done(Option<HttpResponse>),
    /// Token discarded or refreshed; build a new accessor
    Retry,
}

/// A provider failure on the resource request
struct ResourceFailure {
    error: OAuthError,
    recoverable: bool,
    expired: bool,
}

/// State of one `fetch` call
struct FetchCall<'a> {
    fetcher: &'a OAuthFetcher,
    request: &'a HttpRequest,
    token: &'a SecurityToken,
    services: &'a DeclaredServices,
    args: OAuthArguments,
    state: ClientState,
    params: OAuthResponseParams,
    recovered: bool,
}

impl<'a> FetchCall<'a> {
    async fn run(&mut self) -> Step<Option<HttpResponse>> {
        signer::check_caller_params(self.request)?;
        self.check_identity()?;

        loop {
            match self.attempt().await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retry => debug!(service = %self.args.service_name, "Retrying with a fresh accessor"),
            }
        }
    }

    fn finish(mut self, outcome: Step<Option<HttpResponse>>) -> Result<HttpResponse> {
        let response = match outcome {
            Ok(response) => response,
            Err(FetchError::OAuth(e)) => {
                warn!(
                    code = e.kind.code(),
                    service = %self.args.service_name,
                    gadget = %self.token.app_url,
                    error = %params::redact_secrets(&e.message),
                    "OAuth fetch failed"
                );
                self.params.set_error(e);
                None
            }
            Err(FetchError::Fatal(e)) => {
                error!(
                    error = %e,
                    method = %self.request.method,
                    url = %self.request.url,
                    service = %self.args.service_name,
                    trace = %self.params.trace_text(),
                    "OAuth fetch aborted"
                );
                return Err(e);
            }
        };

        let state = self.outgoing_state();
        self.params.set_client_state(state.encode(&*self.fetcher.crypter)?);

        Ok(match response {
            Some(mut response) => {
                self.params.add_to_response(&mut response);
                response
            }
            None => self.params.to_response(),
        })
    }

    /// State for the next call, bound to the current viewer
    fn outgoing_state(&self) -> ClientState {
        let mut state = self.state.clone();
        if state.request_token.is_none() && state.access_token.is_none() {
            return ClientState::default();
        }
        state.owner.clone_from(&self.token.viewer_id);
        state
    }

    fn check_identity(&self) -> std::result::Result<(), OAuthError> {
        if self.args.sign_owner && self.token.owner_id.is_none() {
            return Err(OAuthError::unauthenticated("Signing the owner id requires an owner"));
        }
        if self.args.sign_viewer && self.token.viewer_id.is_none() {
            return Err(OAuthError::unauthenticated("Signing the viewer id requires a viewer"));
        }
        if self.args.auth_type == AuthType::OAuth
            && self.args.use_token == UseToken::Always
            && self.token.viewer_id.is_none()
        {
            return Err(OAuthError::unauthenticated("An access token requires a known viewer"));
        }
        Ok(())
    }

    fn descriptor(&self) -> std::result::Result<&'a OAuth1Descriptor, OAuthError> {
        self.services.oauth1(&self.args.service_name)
    }

    async fn attempt(&mut self) -> Step<Attempt> {
        let mut accessor = build_accessor(
            &*self.fetcher.store,
            &self.args,
            self.token,
            self.services,
            &self.state,
        )
        .await?;

        if self.args.auth_type == AuthType::SignedFetch {
            let response = self.fetch_resource(&accessor).await?;
            if let Some(failure) = resource_failure(&response, false) {
                return Err(failure.error.into());
            }
            return Ok(Attempt::Done(Some(response)));
        }

        // A token refreshed during recovery is used as issued, even if already stale
        if !self.recovered && accessor.access_token_expired() && accessor.session_handle.is_some() {
            debug!(service = %self.args.service_name, "Access token expired locally, extending session");
            match self.extend_session(&mut accessor).await {
                Ok(()) => {}
                Err(FetchError::OAuth(e)) => {
                    info!(service = %self.args.service_name, code = e.kind.code(), "Session extension refused");
                    self.discard_token(&accessor).await?;
                    accessor.clear_token();
                }
                Err(fatal) => return Err(fatal),
            }
        }

        if accessor.token == AccessorToken::None {
            if self.args.use_token == UseToken::Always {
                self.request_approval(&accessor).await?;
                return Ok(Attempt::Done(None));
            }
            debug!(service = %self.args.service_name, "No token available, signing with consumer key only");
        } else if !accessor.has_access_token() {
            match self.exchange_request_token(&mut accessor).await {
                Ok(()) => {}
                Err(FetchError::OAuth(e)) if self.can_recover(&e) => {
                    info!(service = %self.args.service_name, code = e.kind.code(), "Request token refused, starting over");
                    self.recovered = true;
                    self.forget_request_token(&accessor);
                    return Ok(Attempt::Retry);
                }
                Err(e) => {
                    self.forget_request_token(&accessor);
                    return Err(e);
                }
            }
        }

        let response = self.fetch_resource(&accessor).await?;
        let Some(failure) = resource_failure(&response, accessor.has_access_token()) else {
            return Ok(Attempt::Done(Some(response)));
        };

        if !failure.recoverable || self.recovered {
            return Err(failure.error.into());
        }
        self.recovered = true;
        info!(
            service = %self.args.service_name,
            code = failure.error.kind.code(),
            "Access token rejected, recovering once"
        );

        if failure.expired && accessor.session_handle.is_some() {
            match self.extend_session(&mut accessor).await {
                Ok(()) => return Ok(Attempt::Retry),
                Err(FetchError::OAuth(e)) => {
                    info!(service = %self.args.service_name, code = e.kind.code(), "Session extension refused, re-approving");
                }
                Err(fatal) => return Err(fatal),
            }
        }

        self.discard_token(&accessor).await?;
        Ok(Attempt::Retry)
    }

    fn can_recover(&self, error: &OAuthError) -> bool {
        !self.recovered && error.problem().is_some_and(OAuthProblem::is_token_failure)
    }

    /// Obtain a request token and hand back the approval URL
    async fn request_approval(&mut self, accessor: &AccessorInfo) -> Step<()> {
        if !self.token.viewer_is_owner() {
            return Err(OAuthError::not_owner("Only the page owner can approve access to this service").into());
        }

        let descriptor = self.descriptor()?;
        let callback = accessor.consumer.callback_url.clone();
        let mut extra = Vec::new();
        if let Some(url) = &callback {
            extra.push((OAUTH_CALLBACK.to_string(), url.clone()));
        }

        let binding = Endpoint {
            url: descriptor.request.url.clone(),
            method: accessor.method,
            location: accessor.location,
        };
        let response = self
            .exchange("request token", &binding, &accessor.consumer_credentials(), &extra)
            .await?;
        let reply = token_reply(&response, "request token")?;
        let (request_token, request_secret) = token_pair(&reply, "request token")?;

        self.state.clear_access_token();
        self.state.request_token = Some(request_token.clone());
        self.state.request_token_secret = Some(request_secret);
        self.state.callback_url.clone_from(&callback);

        let mut approval = descriptor.authorization.clone();
        approval.query_pairs_mut().append_pair(OAUTH_TOKEN, &request_token);
        let confirmed = params::find(&reply, OAUTH_CALLBACK_CONFIRMED) == Some("true");
        if let (Some(url), false) = (&callback, confirmed) {
            approval.query_pairs_mut().append_pair(OAUTH_CALLBACK, url);
        }
        self.params.set_approval_url(approval.to_string());

        info!(
            service = %self.args.service_name,
            gadget = %self.token.app_url,
            "Obtained request token, awaiting user approval"
        );
        Ok(())
    }

    /// Trade the bound request token for an access token
    async fn exchange_request_token(&mut self, accessor: &mut AccessorInfo) -> Step<()> {
        if !self.token.viewer_is_owner() {
            return Err(OAuthError::not_owner("Only the page owner can complete approval").into());
        }

        let descriptor = self.descriptor()?;
        let mut extra = Vec::new();
        if let Some(verifier) = self.args.verifier() {
            extra.push((OAUTH_VERIFIER.to_string(), verifier));
        }

        let response = self
            .exchange("access token", &descriptor.access, &accessor.credentials(), &extra)
            .await?;
        let reply = token_reply(&response, "access token")?;
        let info = token_info(&reply, "access token")?;

        self.forget_request_token(accessor);
        let source = self.persist(accessor, &info).await?;
        accessor.set_access_token(&info, source);

        info!(
            service = %self.args.service_name,
            gadget = %self.token.app_url,
            persistence = ?self.fetcher.config.token_persistence,
            "Obtained access token"
        );
        Ok(())
    }

    /// Refresh the bound access token with its session handle
    async fn extend_session(&mut self, accessor: &mut AccessorInfo) -> Step<()> {
        let Some(handle) = accessor.session_handle.clone() else {
            return Err(OAuthError::unknown("No session handle to extend").into());
        };

        let descriptor = self.descriptor()?;
        let extra = vec![(OAUTH_SESSION_HANDLE.to_string(), handle.clone())];
        let response = self
            .exchange("session extension", &descriptor.access, &accessor.credentials(), &extra)
            .await?;
        let reply = token_reply(&response, "session extension")?;
        let mut info = token_info(&reply, "session extension")?;
        if info.session_handle.is_none() {
            info.session_handle = Some(handle);
        }

        let source = self.persist(accessor, &info).await?;
        accessor.set_access_token(&info, source);

        info!(service = %self.args.service_name, gadget = %self.token.app_url, "Extended OAuth session");
        Ok(())
    }

    /// Sign and send one token-endpoint request
    async fn exchange(
        &mut self,
        label: &str,
        endpoint: &Endpoint,
        credentials: &Credentials<'_>,
        extra: &[(String, String)],
    ) -> Step<HttpResponse> {
        let request = HttpRequest::new(endpoint.method, endpoint.url.clone());
        let signed = signer::sign_request(&request, credentials, extra, endpoint.location)?;
        self.send(label, &signed).await
    }

    async fn send(&mut self, label: &str, signed: &HttpRequest) -> Step<HttpResponse> {
        debug!(label, method = %signed.method, url = %signed.url, "Sending signed request");
        match self.fetcher.transport.fetch(signed).await {
            Ok(response) => {
                self.params.add_request_trace(label, signed, Some(&response));
                Ok(response)
            }
            Err(e) => {
                self.params.add_request_trace(label, signed, None);
                Err(FetchError::Fatal(e))
            }
        }
    }

    /// Sign and execute the caller's request
    async fn fetch_resource(&mut self, accessor: &AccessorInfo) -> Step<HttpResponse> {
        let cache_key = self.cache_key(accessor);
        if let (Some(cache), Some(key)) = (&self.fetcher.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                debug!(url = %self.request.url, "Serving signed fetch from cache");
                return Ok(hit);
            }
        }

        let extra = self.identity_params(accessor);
        let signed = signer::sign_request(self.request, &accessor.credentials(), &extra, accessor.location)?;
        let response = self.send("resource", &signed).await?;

        if let (Some(cache), Some(key)) = (&self.fetcher.cache, &cache_key) {
            cache.set(key, &response);
        }
        Ok(response)
    }

    fn cache_key(&self, accessor: &AccessorInfo) -> Option<String> {
        let cache = self.fetcher.cache.as_ref()?;
        if !cache.is_enabled() || self.args.bypass_cache || self.request.method != HttpMethod::Get {
            return None;
        }
        let owner = self.token.owner_id.as_deref().filter(|_| self.args.sign_owner);
        let viewer = self
            .token
            .viewer_id
            .as_deref()
            .filter(|_| self.args.sign_viewer || accessor.has_access_token());
        Some(SignedResultCache::build_key(
            self.request,
            &CacheIdentity {
                app_url: &self.token.app_url,
                service_name: &self.args.service_name,
                token_name: &self.args.token_name,
                owner,
                viewer,
            },
        ))
    }

    /// Identity assertions signed alongside the protocol parameters
    fn identity_params(&self, accessor: &AccessorInfo) -> Vec<(String, String)> {
        let mut extra = Vec::new();
        if self.args.sign_owner {
            if let Some(owner) = &self.token.owner_id {
                extra.push((OPENSOCIAL_OWNER_ID.to_string(), owner.clone()));
            }
        }
        if self.args.sign_viewer {
            if let Some(viewer) = &self.token.viewer_id {
                extra.push((OPENSOCIAL_VIEWER_ID.to_string(), viewer.clone()));
            }
        }
        if self.args.auth_type == AuthType::SignedFetch {
            extra.push((OPENSOCIAL_APP_ID.to_string(), self.token.app_id.clone()));
            extra.push((OPENSOCIAL_APP_URL.to_string(), self.token.app_url.clone()));
            if let (ConsumerSecret::RsaPrivate(_), Some(name)) = (&accessor.consumer.secret, &accessor.consumer.key_name) {
                extra.push((XOAUTH_SIGNATURE_PUBLICKEY.to_string(), name.clone()));
                extra.push((XOAUTH_PUBLIC_KEY.to_string(), name.clone()));
            }
        }
        extra
    }

    /// Keep a new access token where the configuration says
    async fn persist(&mut self, accessor: &AccessorInfo, info: &TokenInfo) -> Step<TokenSource> {
        match self.fetcher.config.token_persistence {
            TokenPersistence::Server => {
                self.fetcher
                    .store
                    .set_token_info(
                        self.token,
                        &accessor.consumer,
                        &self.args.service_name,
                        &self.args.token_name,
                        info.clone(),
                    )
                    .await?;
                self.state.clear_access_token();
                Ok(TokenSource::Store)
            }
            TokenPersistence::Client => {
                self.state.set_access_token(info);
                Ok(TokenSource::ClientState)
            }
        }
    }

    /// Forget a rejected access token everywhere it may live
    async fn discard_token(&mut self, accessor: &AccessorInfo) -> Step<()> {
        if self.token.viewer_id.is_some() {
            self.fetcher
                .store
                .remove_token(
                    self.token,
                    &accessor.consumer,
                    &self.args.service_name,
                    &self.args.token_name,
                )
                .await?;
        }
        self.state.clear_access_token();
        Ok(())
    }

    fn forget_request_token(&mut self, accessor: &AccessorInfo) {
        if accessor.source == TokenSource::Arguments {
            self.args.request_token = None;
            self.args.request_token_secret = None;
        }
        self.state.clear_request_token();
    }
}

/// `oauth_problem` reported by a failed response, from `WWW-Authenticate`
/// or a form-encoded body
fn reported_problem(response: &HttpResponse) -> Option<(OAuthProblem, Option<String>)> {
    let mut reported = response
        .header("WWW-Authenticate")
        .map(signer::parse_oauth_header)
        .unwrap_or_default();
    if params::find(&reported, OAUTH_PROBLEM).is_none() {
        reported = params::parse_form(&response.body);
    }
    let problem = params::find(&reported, OAUTH_PROBLEM).filter(|p| !p.is_empty())?;
    let advice = params::find(&reported, OAUTH_PROBLEM_ADVICE).map(str::to_string);
    Some((OAuthProblem::parse(problem), advice))
}

fn resource_failure(response: &HttpResponse, used_access_token: bool) -> Option<ResourceFailure> {
    if response.is_success() {
        return None;
    }

    if let Some((problem, advice)) = reported_problem(response) {
        let advice = advice.map(|a| format!(" ({a})")).unwrap_or_default();
        let message = format!(
            "Service provider returned {} with oauth_problem={problem}{advice}",
            response.status
        );
        return Some(ResourceFailure {
            recoverable: used_access_token && problem.is_token_failure(),
            expired: problem == OAuthProblem::TokenExpired,
            error: OAuthError::provider(problem, message),
        });
    }

    if response.status == 401 && used_access_token {
        return Some(ResourceFailure {
            error: OAuthError::unknown("Service provider rejected the access token with 401"),
            recoverable: true,
            expired: false,
        });
    }

    None
}

/// Decode a token endpoint reply, rejecting redirects and failures
fn token_reply(response: &HttpResponse, label: &str) -> std::result::Result<Vec<(String, String)>, OAuthError> {
    if response.is_redirect() {
        return Err(OAuthError::unknown(format!(
            "The {label} endpoint answered {} redirecting to {}; signed requests are not redirected",
            response.status,
            response.header("Location").unwrap_or("an unknown location")
        )));
    }

    if !response.is_success() {
        if let Some((problem, advice)) = reported_problem(response) {
            let advice = advice.map(|a| format!(" ({a})")).unwrap_or_default();
            return Err(OAuthError::provider(
                problem,
                format!("The {label} endpoint returned {}{advice}", response.status),
            ));
        }
        return Err(OAuthError::unknown(format!(
            "The {label} endpoint returned {}",
            response.status
        )));
    }

    Ok(params::parse_form(&response.body))
}

fn token_pair(reply: &[(String, String)], label: &str) -> std::result::Result<(String, String), OAuthError> {
    match (params::find(reply, OAUTH_TOKEN), params::find(reply, OAUTH_TOKEN_SECRET)) {
        (Some(token), Some(secret)) if !token.is_empty() => Ok((token.to_string(), secret.to_string())),
        _ => Err(OAuthError::unknown(format!(
            "The {label} response is missing oauth_token or oauth_token_secret"
        ))),
    }
}

fn token_info(reply: &[(String, String)], label: &str) -> std::result::Result<TokenInfo, OAuthError> {
    let (access_token, token_secret) = token_pair(reply, label)?;
    let token_expire_millis = params::find(reply, OAUTH_EXPIRES_IN)
        .and_then(|secs| secs.trim().parse::<u64>().ok())
        .map(|secs| now_millis().saturating_add(secs.saturating_mul(1000)));
    Ok(TokenInfo {
        access_token,
        token_secret,
        session_handle: params::find(reply, OAUTH_SESSION_HANDLE).map(str::to_string),
        token_expire_millis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problems_come_from_header_or_body() {
        let header = HttpResponse::new(401).with_header(
            "WWW-Authenticate",
            r#"OAuth realm="https://sp.example.com/", oauth_problem="token_expired""#,
        );
        assert_eq!(reported_problem(&header).unwrap().0, OAuthProblem::TokenExpired);

        let body = HttpResponse::new(401)
            .with_body("oauth_problem=token_revoked&oauth_problem_advice=re-approve");
        let (problem, advice) = reported_problem(&body).unwrap();
        assert_eq!(problem, OAuthProblem::TokenRevoked);
        assert_eq!(advice.as_deref(), Some("re-approve"));

        assert!(reported_problem(&HttpResponse::new(500).with_body("oops")).is_none());
    }

    #[test]
    fn resource_failures_are_classified() {
        // Success and plain errors pass through
        assert!(resource_failure(&HttpResponse::new(200), true).is_none());
        assert!(resource_failure(&HttpResponse::new(404), true).is_none());
        assert!(resource_failure(&HttpResponse::new(302), true).is_none());
        assert!(resource_failure(&HttpResponse::new(401), false).is_none());

        // A bare 401 with a token is recoverable
        let bare = resource_failure(&HttpResponse::new(401), true).unwrap();
        assert!(bare.recoverable && !bare.expired);

        // Expired tokens are recoverable only when a token was used
        let expired = HttpResponse::new(401).with_body("oauth_problem=token_expired");
        assert!(resource_failure(&expired, true).unwrap().recoverable);
        assert!(!resource_failure(&expired, false).unwrap().recoverable);

        // Other problems surface
        let refused = HttpResponse::new(403).with_body("oauth_problem=consumer_key_refused");
        let failure = resource_failure(&refused, true).unwrap();
        assert!(!failure.recoverable);
        assert_eq!(failure.error.kind.code(), "consumer_key_refused");
    }

    #[test]
    fn token_endpoint_redirects_are_errors() {
        let redirect = HttpResponse::new(302).with_header("Location", "https://elsewhere.example.com/");
        let err = token_reply(&redirect, "request token").unwrap_err();
        assert_eq!(err.kind.code(), "UNKNOWN_PROBLEM");
        assert!(err.message.contains("elsewhere.example.com"));
    }

    #[test]
    fn token_replies_need_token_and_secret() {
        let ok = token_reply(&HttpResponse::new(200).with_body("oauth_token=t&oauth_token_secret=s"), "x").unwrap();
        assert_eq!(token_pair(&ok, "x").unwrap(), ("t".to_string(), "s".to_string()));

        let partial = token_reply(&HttpResponse::new(200).with_body("oauth_token=t"), "x").unwrap();
        assert!(token_pair(&partial, "x").is_err());

        let garbled = token_reply(&HttpResponse::new(200).with_body("<html>"), "x").unwrap();
        assert!(token_pair(&garbled, "x").is_err());
    }

    #[test]
    fn token_info_reads_session_extension_fields() {
        let reply = params::parse_form(
            b"oauth_token=at&oauth_token_secret=ats&oauth_session_handle=sh&oauth_expires_in=60",
        );
        let info = token_info(&reply, "access token").unwrap();
        assert_eq!(info.session_handle.as_deref(), Some("sh"));
        let expires = info.token_expire_millis.unwrap();
        assert!(expires > now_millis() + 50_000 && expires <= now_millis() + 60_000);
    }
}
