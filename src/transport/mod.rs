//! HTTP transport collaborator
//!
//! The engine never talks to the network directly. Every outbound call is an
//! [`HttpRequest`] handed to an [`HttpFetcher`]; the fetcher owns timeouts,
//! connection pooling and cancellation.

mod http;

pub use self::http::ReqwestFetcher;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Result;

/// Content type of form-encoded bodies
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP methods the engine can sign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Upper-case wire name, as used in the signature base string
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Parse a method name, case-insensitively
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method
    pub method: HttpMethod,
    /// Full URL including the query string
    pub url: Url,
    /// Header name/value pairs in insertion order
    pub headers: Vec<(String, String)>,
    /// Raw body
    pub body: Vec<u8>,
    /// Whether the transport may follow 3xx responses.
    ///
    /// Signed requests always clear this: following a redirect would send the
    /// signature to a URL it was not computed for.
    pub follow_redirects: bool,
}

impl HttpRequest {
    /// Create a request with no headers and an empty body
    #[must_use]
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: Vec::new(),
            follow_redirects: true,
        }
    }

    /// Create a GET request
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Create a POST request
    #[must_use]
    pub fn post(url: Url) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set a raw body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a form-encoded body and the matching content type
    #[must_use]
    pub fn with_form_body(mut self, params: &[(String, String)]) -> Self {
        self.body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish()
            .into_bytes();
        self.set_header("Content-Type", FORM_CONTENT_TYPE);
        self
    }

    /// Look up a header, case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every header with this name by a single value
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// The `Content-Type` header, if any
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Whether the body is `application/x-www-form-urlencoded`
    #[must_use]
    pub fn is_form_encoded(&self) -> bool {
        self.content_type().is_some_and(|ct| {
            ct.split(';')
                .next()
                .is_some_and(|base| base.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        })
    }

    /// Body as text (lossy)
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// A response from the transport, plus OAuth metadata attached by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// Raw body
    pub body: Vec<u8>,
    /// Additive metadata for the calling layer (`oauthState`, `oauthError`, ...)
    pub metadata: BTreeMap<String, String>,
}

impl HttpResponse {
    /// Create an empty response with the given status
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Look up a header, case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as text (lossy)
    #[must_use]
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 3xx other than 304 Not Modified
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.status != 304
    }

    /// Metadata value attached by the engine
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Outbound HTTP collaborator
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Execute a request.
    ///
    /// Non-2xx statuses are responses, not errors; `Err` is reserved for
    /// failures to obtain any response at all.
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn method_round_trip() {
        for m in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete] {
            assert_eq!(HttpMethod::parse(m.as_str()), Some(m));
        }
        assert_eq!(HttpMethod::parse(" post "), Some(HttpMethod::Post));
        assert_eq!(HttpMethod::parse("PATCH"), None);
    }

    #[test]
    fn form_body_sets_content_type() {
        let req = HttpRequest::post(url("http://example.com/api"))
            .with_form_body(&[("a".into(), "b c".into()), ("d".into(), "&".into())]);
        assert!(req.is_form_encoded());
        assert_eq!(req.body_text(), "a=b+c&d=%26");
    }

    #[test]
    fn form_detection_ignores_charset() {
        let req = HttpRequest::post(url("http://example.com/"))
            .with_header("content-type", "application/x-www-form-urlencoded; charset=UTF-8");
        assert!(req.is_form_encoded());

        let json = HttpRequest::post(url("http://example.com/"))
            .with_header("Content-Type", "application/json");
        assert!(!json.is_form_encoded());
    }

    #[test]
    fn set_header_replaces_existing() {
        let mut req = HttpRequest::get(url("http://example.com/"))
            .with_header("Authorization", "one")
            .with_header("authorization", "two");
        req.set_header("Authorization", "three");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("AUTHORIZATION"), Some("three"));
    }

    #[test]
    fn redirect_classification() {
        assert!(HttpResponse::new(302).is_redirect());
        assert!(!HttpResponse::new(304).is_redirect());
        assert!(!HttpResponse::new(200).is_redirect());
        assert!(HttpResponse::new(204).is_success());
    }
}
