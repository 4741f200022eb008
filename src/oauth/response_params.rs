//! OAuth outcome attached to a fetch response
//!
//! Error text is for humans and is redacted before it is built; the client
//! state blob is sealed and never redacted. The two never share content.

use std::fmt::Write as _;

use super::error::OAuthError;
use super::params::redact_secrets;
use crate::transport::{HttpRequest, HttpResponse};

/// Metadata key: sealed client state for the next call
pub const OAUTH_STATE: &str = "oauthState";
/// Metadata key: URL the user must visit to approve access
pub const OAUTH_APPROVAL_URL: &str = "oauthApprovalUrl";
/// Metadata key: stable error code
pub const OAUTH_ERROR: &str = "oauthError";
/// Metadata key: diagnostic text
pub const OAUTH_ERROR_TEXT: &str = "oauthErrorText";

/// Longest body excerpt kept in a trace entry
const MAX_TRACE_BODY: usize = 2048;

/// One outbound exchange, already redacted
#[derive(Debug, Clone, PartialEq, Eq)]
struct TraceEntry {
    label: String,
    text: String,
}

/// Accumulated outcome of one fetch call
#[derive(Debug, Clone, Default)]
pub struct OAuthResponseParams {
    error: Option<OAuthError>,
    approval_url: Option<String>,
    client_state: Option<String>,
    trace: Vec<TraceEntry>,
    send_trace: bool,
}

impl OAuthResponseParams {
    /// Empty outcome. `send_trace` controls whether exchanges end up in error text.
    #[must_use]
    pub fn new(send_trace: bool) -> Self {
        Self {
            send_trace,
            ..Self::default()
        }
    }

    /// Record an exchange with the provider
    pub fn add_request_trace(&mut self, label: &str, request: &HttpRequest, response: Option<&HttpResponse>) {
        let mut text = format!("{} {}\n", request.method, request.url);
        for (name, value) in &request.headers {
            let _ = writeln!(text, "{name}: {value}");
        }
        if !request.body.is_empty() {
            let _ = writeln!(text, "\n{}", excerpt(&request.body_text()));
        }
        match response {
            Some(resp) => {
                let _ = writeln!(text, "\n<- {}", resp.status);
                for (name, value) in &resp.headers {
                    let _ = writeln!(text, "{name}: {value}");
                }
                if !resp.body.is_empty() {
                    let _ = writeln!(text, "\n{}", excerpt(&resp.body_text()));
                }
            }
            None => text.push_str("\n<- no response\n"),
        }

        self.trace.push(TraceEntry {
            label: label.to_string(),
            text: redact_secrets(&text),
        });
    }

    /// Record the error for this call, replacing any earlier one
    pub fn set_error(&mut self, error: OAuthError) {
        self.error = Some(error);
    }

    /// Set the approval URL
    pub fn set_approval_url(&mut self, url: String) {
        self.approval_url = Some(url);
    }

    /// Set the sealed client state for the next call
    pub fn set_client_state(&mut self, state: Option<String>) {
        self.client_state = state;
    }

    /// Recorded exchanges, one labelled block each; secrets already removed
    #[must_use]
    pub fn trace_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.trace {
            let _ = write!(text, "== {} ==\n{}\n", entry.label, entry.text);
        }
        text
    }

    /// Human-readable error text; secrets already removed
    #[must_use]
    pub fn error_text(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        let mut text = redact_secrets(&error.message);
        if self.send_trace && !self.trace.is_empty() {
            text.push_str("\n\n");
            text.push_str(&self.trace_text());
        }
        Some(text)
    }

    /// Attach metadata. `oauthState` is written at most once.
    pub fn add_to_response(&self, response: &mut HttpResponse) {
        if let Some(state) = &self.client_state {
            response.metadata.insert(OAUTH_STATE.to_string(), state.clone());
        }
        if let Some(url) = &self.approval_url {
            response.metadata.insert(OAUTH_APPROVAL_URL.to_string(), url.clone());
        }
        if let Some(error) = &self.error {
            response
                .metadata
                .insert(OAUTH_ERROR.to_string(), error.kind.code().to_string());
        }
        if let Some(text) = self.error_text() {
            response.metadata.insert(OAUTH_ERROR_TEXT.to_string(), text);
        }
    }

    /// Empty-bodied response carrying only the metadata.
    ///
    /// Errors answer 403; a pending approval answers 200.
    #[must_use]
    pub fn to_response(&self) -> HttpResponse {
        let status = if self.error.is_some() { 403 } else { 200 };
        let mut response = HttpResponse::new(status);
        self.add_to_response(&mut response);
        response
    }
}

fn excerpt(text: &str) -> String {
    if text.len() <= MAX_TRACE_BODY {
        return text.to_string();
    }
    let mut end = MAX_TRACE_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::oauth::OAuthProblem;

    fn request() -> HttpRequest {
        HttpRequest::get(Url::parse("https://sp.example.com/access").unwrap())
            .with_header("Authorization", "OAuth oauth_token=\"rt\", oauth_signature=\"sig\"")
    }

    #[test]
    fn success_attaches_only_state() {
        let mut params = OAuthResponseParams::new(true);
        params.set_client_state(Some("blob".into()));

        let mut response = HttpResponse::new(200).with_body("data");
        params.add_to_response(&mut response);

        assert_eq!(response.metadata(OAUTH_STATE), Some("blob"));
        assert_eq!(response.metadata.len(), 1);
        assert_eq!(response.body, b"data");
    }

    #[test]
    fn approval_is_200_with_url_and_state() {
        let mut params = OAuthResponseParams::new(true);
        params.set_approval_url("https://sp.example.com/authorize?oauth_token=rt".into());
        params.set_client_state(Some("blob".into()));

        let response = params.to_response();
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        assert_eq!(
            response.metadata(OAUTH_APPROVAL_URL),
            Some("https://sp.example.com/authorize?oauth_token=rt")
        );
        assert!(response.metadata(OAUTH_ERROR).is_none());
    }

    #[test]
    fn error_text_is_redacted_and_traced() {
        // GIVEN: a failed exchange whose response leaks a secret
        let mut params = OAuthResponseParams::new(true);
        let leaked = HttpResponse::new(400)
            .with_body("oauth_token=at&oauth_token_secret=s3cr3t&oauth_problem=parameter_rejected");
        params.add_request_trace("access token", &request(), Some(&leaked));
        params.set_error(OAuthError::provider(OAuthProblem::ParameterRejected, "Provider refused"));

        // WHEN
        let response = params.to_response();

        // THEN
        assert_eq!(response.status, 403);
        assert_eq!(response.metadata(OAUTH_ERROR), Some("parameter_rejected"));
        let text = response.metadata(OAUTH_ERROR_TEXT).unwrap();
        assert!(text.starts_with("Provider refused"));
        assert!(text.contains("== access token =="));
        assert!(text.contains("GET https://sp.example.com/access"));
        assert!(text.contains("<- 400"));
        assert!(!text.contains("s3cr3t"));
    }

    #[test]
    fn trace_can_be_withheld() {
        let mut params = OAuthResponseParams::new(false);
        params.add_request_trace("resource", &request(), None);
        params.set_error(OAuthError::unknown("No response"));

        assert!(params.trace_text().starts_with("== resource ==\nGET https://sp.example.com/access"));
        assert!(params.trace_text().contains("<- no response"));
        assert_eq!(params.error_text().as_deref(), Some("No response"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let long = "é".repeat(MAX_TRACE_BODY);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_TRACE_BODY + 3);
    }
}
