//! Scripted OAuth 1.0a service provider used by the integration tests
//!
//! The provider verifies every signature it receives, issues tokens from
//! counters, and answers resource requests from a queue of scripted
//! responses before falling back to a 200.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use gadget_oauth::crypto::AesBlobCrypter;
use gadget_oauth::oauth::{
    BasicOAuthStore, ConsumerKeyAndSecret, DeclaredServices, Endpoint, FetcherConfig, OAuth1Descriptor,
    OAuthFetcher, ParamLocation, SecurityToken, ServiceDescriptor, SignedParams, VerificationKey,
};
use gadget_oauth::transport::{HttpFetcher, HttpRequest, HttpResponse};
use gadget_oauth::{Error, Result};

pub const GADGET: &str = "http://gadgets.example.com/photos.xml";
pub const SERVICE: &str = "photos";
pub const CONSUMER_KEY: &str = "gadget-consumer";
pub const CONSUMER_SECRET: &str = "gadget-secret";
pub const RESOURCE_URL: &str = "https://api.example.com/photos?album=summer";

/// One request seen by the provider, with where its OAuth parameters were
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub location: Option<ParamLocation>,
    pub request: HttpRequest,
}

impl Seen {
    pub fn param(&self, name: &str) -> Option<String> {
        SignedParams::parse(&self.request)
            .ok()
            .and_then(|p| p.get(name).map(str::to_string))
    }
}

#[derive(Default)]
pub struct FakeProvider {
    secrets: Mutex<HashMap<String, String>>,
    issued: Mutex<u32>,
    seen: Mutex<Vec<Seen>>,
    resource_script: Mutex<VecDeque<HttpResponse>>,
    access_script: Mutex<VecDeque<HttpResponse>>,
    fail_transport: Mutex<bool>,
    rsa_key: Mutex<Option<VerificationKey>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make a token known to the provider, as if issued earlier
    pub fn grant(&self, token: &str, secret: &str) {
        self.secrets.lock().insert(token.to_string(), secret.to_string());
    }

    /// Queue a response for the next resource request
    pub fn script_resource(&self, response: HttpResponse) {
        self.resource_script.lock().push_back(response);
    }

    /// Queue a response for the next access-token request
    pub fn script_access(&self, response: HttpResponse) {
        self.access_script.lock().push_back(response);
    }

    /// Fail every request at the transport level
    pub fn go_offline(&self) {
        *self.fail_transport.lock() = true;
    }

    /// Verify resource signatures with this key instead of the HMAC secret
    pub fn use_rsa(&self, key: VerificationKey) {
        *self.rsa_key.lock() = Some(key);
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.seen.lock().iter().filter(|s| s.path == path).count()
    }

    pub fn total_hits(&self) -> usize {
        self.seen.lock().len()
    }

    fn issue(&self, prefix: &str) -> (String, String) {
        let n = {
            let mut issued = self.issued.lock();
            *issued += 1;
            *issued
        };
        let token = format!("{prefix}-{n}");
        let secret = format!("{prefix}s-{n}");
        self.grant(&token, &secret);
        (token, secret)
    }

    fn verify(&self, request: &HttpRequest) -> std::result::Result<SignedParams, HttpResponse> {
        let signed = SignedParams::parse(request).map_err(|e| problem(400, e.kind.code()))?;
        if signed.get("oauth_consumer_key") != Some(CONSUMER_KEY)
            && self.rsa_key.lock().is_none()
        {
            return Err(problem(401, "consumer_key_unknown"));
        }

        let key = match self.rsa_key.lock().clone() {
            Some(rsa) => rsa,
            None => {
                let token_secret = match signed.get("oauth_token") {
                    None => String::new(),
                    Some(token) => match self.secrets.lock().get(token) {
                        Some(secret) => secret.clone(),
                        None => return Err(problem(401, "token_rejected")),
                    },
                };
                VerificationKey::Hmac {
                    consumer_secret: CONSUMER_SECRET.to_string(),
                    token_secret,
                }
            }
        };
        signed.verify(&key).map_err(|e| problem(401, e.kind.code()))?;
        Ok(signed)
    }

    fn respond(&self, request: &HttpRequest) -> HttpResponse {
        let signed = match self.verify(request) {
            Ok(signed) => signed,
            Err(rejection) => return rejection,
        };

        match request.url.path() {
            "/request" => {
                let (token, secret) = self.issue("rt");
                form(&format!(
                    "oauth_token={token}&oauth_token_secret={secret}&oauth_callback_confirmed=true"
                ))
            }
            "/access" => {
                if let Some(scripted) = self.access_script.lock().pop_front() {
                    return scripted;
                }
                let (token, secret) = self.issue("at");
                let handle = signed
                    .get("oauth_session_handle")
                    .map_or_else(|| format!("sh-{token}"), str::to_string);
                form(&format!(
                    "oauth_token={token}&oauth_token_secret={secret}&oauth_session_handle={handle}&oauth_expires_in=3600"
                ))
            }
            _ => {
                if let Some(scripted) = self.resource_script.lock().pop_front() {
                    return scripted;
                }
                let token = signed.get("oauth_token").unwrap_or("anonymous");
                HttpResponse::new(200).with_body(format!("photos for {token}"))
            }
        }
    }
}

#[async_trait]
impl HttpFetcher for FakeProvider {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        assert!(!request.follow_redirects, "signed requests must not follow redirects");
        if *self.fail_transport.lock() {
            return Err(Error::Transport("connection refused".to_string()));
        }
        self.seen.lock().push(Seen {
            path: request.url.path().to_string(),
            location: SignedParams::parse(request).ok().map(|p| p.location),
            request: request.clone(),
        });
        Ok(self.respond(request))
    }
}

pub fn form(body: &str) -> HttpResponse {
    HttpResponse::new(200)
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body(body)
}

/// Failure carrying `oauth_problem` in `WWW-Authenticate`
pub fn problem(status: u16, code: &str) -> HttpResponse {
    HttpResponse::new(status).with_header(
        "WWW-Authenticate",
        &format!("OAuth realm=\"https://api.example.com/\", oauth_problem=\"{code}\""),
    )
}

/// Request token from the auth header, access token from the POST body
pub fn services() -> DeclaredServices {
    DeclaredServices::new().with(ServiceDescriptor::OAuth1(
        OAuth1Descriptor::new(
            SERVICE,
            Endpoint::parse("https://sp.example.com/request", Some("POST"), Some("auth-header")).unwrap(),
            Endpoint::parse("https://sp.example.com/access", Some("POST"), Some("post-body")).unwrap(),
            "https://sp.example.com/authorize",
        )
        .unwrap(),
    ))
}

pub fn owner() -> SecurityToken {
    SecurityToken::new(GADGET)
        .with_owner("alice")
        .with_viewer("alice")
        .with_domain("container.example.com")
}

pub fn visitor() -> SecurityToken {
    SecurityToken::new(GADGET)
        .with_owner("alice")
        .with_viewer("bob")
        .with_domain("container.example.com")
}

pub fn store() -> Arc<BasicOAuthStore> {
    let store = BasicOAuthStore::new();
    store.set_consumer(GADGET, SERVICE, ConsumerKeyAndSecret::hmac(CONSUMER_KEY, CONSUMER_SECRET));
    Arc::new(store)
}

pub fn crypter() -> Arc<AesBlobCrypter> {
    Arc::new(AesBlobCrypter::new(b"integration-test-master-key", "oauthState").unwrap())
}

pub fn fetcher(
    store: Arc<BasicOAuthStore>,
    provider: Arc<FakeProvider>,
    config: FetcherConfig,
) -> OAuthFetcher {
    OAuthFetcher::new(store, provider, crypter(), config)
}

pub fn resource() -> HttpRequest {
    HttpRequest::get(url::Url::parse(RESOURCE_URL).unwrap())
}
