//! OAuth service descriptors declared by a gadget
//!
//! Descriptors arrive from gadget-spec parsing as plain immutable values.
//! Consistency checks happen here, when a descriptor is built, so that a bad
//! declaration is a configuration error rather than a request-time surprise.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::OAuthError;
use crate::transport::HttpMethod;

/// Where OAuth protocol parameters are placed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParamLocation {
    /// `Authorization: OAuth ...` header
    #[default]
    AuthHeader,
    /// URL query string
    UriQuery,
    /// Form-encoded POST body
    PostBody,
}

impl ParamLocation {
    /// Parse the gadget-spec attribute value
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "auth-header" => Some(Self::AuthHeader),
            "uri-query" => Some(Self::UriQuery),
            "post-body" => Some(Self::PostBody),
            _ => None,
        }
    }

    /// Attribute value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthHeader => "auth-header",
            Self::UriQuery => "uri-query",
            Self::PostBody => "post-body",
        }
    }
}

/// One provider endpoint with its declared method and parameter location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Endpoint URL
    pub url: Url,
    /// Declared HTTP method
    pub method: HttpMethod,
    /// Declared parameter location
    pub location: ParamLocation,
}

impl Endpoint {
    /// Build an endpoint, rejecting combinations that can never be signed
    pub fn new(url: &str, method: HttpMethod, location: ParamLocation) -> Result<Self, OAuthError> {
        let url = Url::parse(url)
            .map_err(|e| OAuthError::bad_config(format!("Invalid OAuth endpoint URL '{url}': {e}")))?;

        if !matches!(method, HttpMethod::Get | HttpMethod::Post) {
            return Err(OAuthError::bad_config(format!(
                "OAuth endpoint {url} declares unsupported method {method}"
            )));
        }

        if location == ParamLocation::PostBody && method == HttpMethod::Get {
            return Err(OAuthError::bad_config(format!(
                "OAuth endpoint {url} declares post-body parameters with GET"
            )));
        }

        Ok(Self {
            url,
            method,
            location,
        })
    }

    /// Build from raw attribute values, defaulting to `GET` and `auth-header`
    pub fn parse(url: &str, method: Option<&str>, location: Option<&str>) -> Result<Self, OAuthError> {
        let method = match method {
            None => HttpMethod::Get,
            Some(m) => HttpMethod::parse(m)
                .ok_or_else(|| OAuthError::bad_config(format!("Unknown OAuth method '{m}'")))?,
        };
        let location = match location {
            None => ParamLocation::default(),
            Some(l) => ParamLocation::parse(l).ok_or_else(|| {
                OAuthError::bad_config(format!("Unknown OAuth parameter location '{l}'"))
            })?,
        };
        Self::new(url, method, location)
    }
}

/// Three-legged OAuth 1.0a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth1Descriptor {
    /// Service name as declared by the gadget
    pub name: String,
    /// Request-token endpoint
    pub request: Endpoint,
    /// Access-token endpoint
    pub access: Endpoint,
    /// User authorization page
    pub authorization: Url,
}

impl OAuth1Descriptor {
    /// Build a descriptor
    pub fn new(
        name: &str,
        request: Endpoint,
        access: Endpoint,
        authorization: &str,
    ) -> Result<Self, OAuthError> {
        let authorization = Url::parse(authorization).map_err(|e| {
            OAuthError::bad_config(format!("Invalid authorization URL '{authorization}': {e}"))
        })?;
        Ok(Self {
            name: name.to_string(),
            request,
            access,
            authorization,
        })
    }
}

/// OAuth2 service. Modelled so that declarations parse; not fetchable here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuth2Descriptor {
    /// Service name
    pub name: String,
    /// Authorization endpoint
    pub authorization: Endpoint,
    /// Token endpoint
    pub token: Endpoint,
    /// Requested scope
    pub scope: Option<String>,
}

/// A declared service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceDescriptor {
    /// OAuth 1.0a
    OAuth1(OAuth1Descriptor),
    /// OAuth2
    OAuth2(OAuth2Descriptor),
}

impl ServiceDescriptor {
    /// Declared name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::OAuth1(d) => &d.name,
            Self::OAuth2(d) => &d.name,
        }
    }
}

/// The services a gadget declares, by name
#[derive(Debug, Clone, Default)]
pub struct DeclaredServices {
    services: HashMap<String, ServiceDescriptor>,
}

impl DeclaredServices {
    /// No services
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service, builder style
    #[must_use]
    pub fn with(mut self, service: ServiceDescriptor) -> Self {
        self.insert(service);
        self
    }

    /// Add or replace a service
    pub fn insert(&mut self, service: ServiceDescriptor) {
        self.services.insert(service.name().to_string(), service);
    }

    /// Look up a service
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    /// Declared names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve an OAuth 1.0a service or explain why it cannot be used
    pub fn oauth1(&self, name: &str) -> Result<&OAuth1Descriptor, OAuthError> {
        match self.get(name) {
            Some(ServiceDescriptor::OAuth1(d)) => Ok(d),
            Some(ServiceDescriptor::OAuth2(_)) => Err(OAuthError::bad_config(format!(
                "Service '{name}' is declared as OAuth2 and cannot be used for OAuth 1.0a fetches"
            ))),
            None => Err(OAuthError::bad_config(format!(
                "Gadget does not declare OAuth service '{name}'. Known services: {}",
                self.names().join(",")
            ))),
        }
    }
}
