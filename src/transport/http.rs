//! `reqwest`-backed [`HttpFetcher`]

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, redirect::Policy};
use tracing::debug;

use super::{HttpFetcher, HttpMethod, HttpRequest, HttpResponse};
use crate::{Error, Result};

/// Maximum redirects followed for requests that allow it
const MAX_REDIRECTS: usize = 5;

/// HTTP fetcher built on two pooled `reqwest` clients: one that follows
/// redirects and one that never does.
pub struct ReqwestFetcher {
    following: Client,
    direct: Client,
}

impl ReqwestFetcher {
    /// Create a fetcher with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            following: build_client(timeout, Policy::limited(MAX_REDIRECTS))?,
            direct: build_client(timeout, Policy::none())?,
        })
    }
}

fn build_client(timeout: Duration, policy: Policy) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .redirect(policy)
        .build()
        .map_err(Error::from)
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.direct
        };

        let mut builder = client.request(to_reqwest_method(request.method), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(method = %request.method, status, bytes = body.len(), "Fetched");

        Ok(HttpResponse {
            status,
            headers,
            body,
            metadata: BTreeMap::new(),
        })
    }
}
