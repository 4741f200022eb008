//! OAuth parameter names, RFC 5849 encoding, and redaction

use std::sync::LazyLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;

/// `oauth_consumer_key`
pub const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
/// `oauth_token`
pub const OAUTH_TOKEN: &str = "oauth_token";
/// `oauth_token_secret`
pub const OAUTH_TOKEN_SECRET: &str = "oauth_token_secret";
/// `oauth_signature_method`
pub const OAUTH_SIGNATURE_METHOD: &str = "oauth_signature_method";
/// `oauth_signature`
pub const OAUTH_SIGNATURE: &str = "oauth_signature";
/// `oauth_timestamp`
pub const OAUTH_TIMESTAMP: &str = "oauth_timestamp";
/// `oauth_nonce`
pub const OAUTH_NONCE: &str = "oauth_nonce";
/// `oauth_version`
pub const OAUTH_VERSION: &str = "oauth_version";
/// `oauth_callback`
pub const OAUTH_CALLBACK: &str = "oauth_callback";
/// `oauth_callback_confirmed`
pub const OAUTH_CALLBACK_CONFIRMED: &str = "oauth_callback_confirmed";
/// `oauth_verifier`
pub const OAUTH_VERIFIER: &str = "oauth_verifier";
/// `oauth_session_handle`
pub const OAUTH_SESSION_HANDLE: &str = "oauth_session_handle";
/// `oauth_expires_in`
pub const OAUTH_EXPIRES_IN: &str = "oauth_expires_in";
/// `oauth_problem`
pub const OAUTH_PROBLEM: &str = "oauth_problem";
/// `oauth_problem_advice`
pub const OAUTH_PROBLEM_ADVICE: &str = "oauth_problem_advice";
/// `oauth_body_hash`
pub const OAUTH_BODY_HASH: &str = "oauth_body_hash";

/// `opensocial_owner_id`
pub const OPENSOCIAL_OWNER_ID: &str = "opensocial_owner_id";
/// `opensocial_viewer_id`
pub const OPENSOCIAL_VIEWER_ID: &str = "opensocial_viewer_id";
/// `opensocial_app_id`
pub const OPENSOCIAL_APP_ID: &str = "opensocial_app_id";
/// `opensocial_app_url`
pub const OPENSOCIAL_APP_URL: &str = "opensocial_app_url";
/// `xoauth_public_key`
pub const XOAUTH_PUBLIC_KEY: &str = "xoauth_public_key";
/// `xoauth_signature_publickey`
pub const XOAUTH_SIGNATURE_PUBLICKEY: &str = "xoauth_signature_publickey";

/// Protocol version sent with every request
pub const OAUTH_VERSION_1_0: &str = "1.0";

/// Prefixes callers may not use in their own parameters
const RESERVED_PREFIXES: [&str; 3] = ["oauth_", "opensocial_", "xoauth_"];

/// Everything except ALPHA / DIGIT / "-" / "." / "_" / "~"
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

static SECRET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(oauth_token_secret|oauth_session_handle)("?\s*[=:]\s*"?)([^&\s",]*)"#)
        .expect("redaction pattern is valid")
});

/// RFC 5849 §3.6 percent-encoding
#[must_use]
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Inverse of [`percent_encode`]
#[must_use]
pub fn percent_decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Decode an `application/x-www-form-urlencoded` payload
#[must_use]
pub fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body)
        .into_owned()
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// First value for `name`
#[must_use]
pub fn find<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

/// Whether `name` uses a protocol-reserved prefix
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Replace token secrets and session handles with a placeholder
#[must_use]
pub fn redact_secrets(text: &str) -> String {
    SECRET_PATTERN.replace_all(text, "${1}${2}REMOVED").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_per_rfc5849() {
        // Examples from RFC 5849 §3.4.1.3.2
        assert_eq!(percent_encode("Ladies + Gentlemen"), "Ladies%20%2B%20Gentlemen");
        assert_eq!(percent_encode("An encoded string!"), "An%20encoded%20string%21");
        assert_eq!(percent_encode("Dogs, Cats & Mice"), "Dogs%2C%20Cats%20%26%20Mice");
        assert_eq!(percent_encode("☃"), "%E2%98%83");
        assert_eq!(percent_encode("a-b.c_d~e"), "a-b.c_d~e");
    }

    #[test]
    fn decode_inverts_encode() {
        let raw = "x=1&y=caf\u{e9} /~";
        assert_eq!(percent_decode(&percent_encode(raw)), raw);
    }

    #[test]
    fn form_parsing_decodes_plus() {
        let params = parse_form(b"a=b+c&d=%26&=skipped&e");
        assert_eq!(
            params,
            vec![
                ("a".to_string(), "b c".to_string()),
                ("d".to_string(), "&".to_string()),
                ("e".to_string(), String::new()),
            ]
        );
        assert_eq!(find(&params, "d"), Some("&"));
        assert_eq!(find(&params, "z"), None);
    }

    #[test]
    fn reserved_prefixes() {
        assert!(is_reserved("oauth_foo"));
        assert!(is_reserved("OAuth_Token"));
        assert!(is_reserved("opensocial_owner_id"));
        assert!(is_reserved("xoauth_requestor_id"));
        assert!(!is_reserved("oauthish"));
        assert!(!is_reserved("q"));
    }

    #[test]
    fn redaction_covers_form_header_and_json() {
        let form = "oauth_token=abc&oauth_token_secret=s3cr3t&oauth_session_handle=h4ndle";
        let redacted = redact_secrets(form);
        assert!(redacted.contains("oauth_token=abc"));
        assert!(!redacted.contains("s3cr3t"));
        assert!(!redacted.contains("h4ndle"));

        let header = r#"OAuth oauth_session_handle="h4ndle", oauth_token="abc""#;
        assert!(!redact_secrets(header).contains("h4ndle"));

        let json = r#"{"oauth_token_secret": "s3cr3t"}"#;
        assert!(!redact_secrets(json).contains("s3cr3t"));
    }
}
