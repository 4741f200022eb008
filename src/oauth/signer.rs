//! OAuth 1.0a request signing (RFC 5849)
//!
//! [`sign_request`] is pure apart from the nonce and timestamp: it takes the
//! caller's request plus credentials and returns a new request carrying the
//! protocol parameters at exactly one location. [`verify_request`] performs
//! the provider side of the same computation.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use rand::Rng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use url::Url;

use super::descriptor::ParamLocation;
use super::error::{OAuthError, OAuthProblem};
use super::params::{
    self, OAUTH_BODY_HASH, OAUTH_CONSUMER_KEY, OAUTH_NONCE, OAUTH_SIGNATURE,
    OAUTH_SIGNATURE_METHOD, OAUTH_TIMESTAMP, OAUTH_TOKEN, OAUTH_VERSION, OAUTH_VERSION_1_0,
};
use crate::Error;
use crate::transport::{FORM_CONTENT_TYPE, HttpMethod, HttpRequest};

type HmacSha1 = Hmac<Sha1>;

/// Signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureMethod {
    /// HMAC-SHA1 over `consumer_secret&token_secret`
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,
    /// RSASSA-PKCS1-v1_5 with SHA-1
    #[serde(rename = "RSA-SHA1")]
    RsaSha1,
}

impl SignatureMethod {
    /// `oauth_signature_method` value
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::RsaSha1 => "RSA-SHA1",
        }
    }
}

/// The consumer's half of the signing key
#[derive(Clone)]
pub enum ConsumerSecret {
    /// Shared secret
    Hmac(String),
    /// Private key; the provider holds the certificate
    RsaPrivate(Arc<RsaPrivateKey>),
}

impl ConsumerSecret {
    /// Parse a PKCS#8 or PKCS#1 PEM private key
    pub fn rsa_from_pem(pem: &str) -> crate::Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| Error::Key(format!("Unable to parse RSA private key: {e}")))?;
        Ok(Self::RsaPrivate(Arc::new(key)))
    }

    /// Parse a PKCS#8 or PKCS#1 DER private key
    pub fn rsa_from_der(der: &[u8]) -> crate::Result<Self> {
        let key = RsaPrivateKey::from_pkcs8_der(der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(der))
            .map_err(|e| Error::Key(format!("Unable to parse RSA private key: {e}")))?;
        Ok(Self::RsaPrivate(Arc::new(key)))
    }

    /// Parse either a PEM document or bare base64 DER, as found in consumer files
    pub fn rsa_from_text(text: &str) -> crate::Result<Self> {
        if text.contains("-----BEGIN") {
            return Self::rsa_from_pem(text);
        }
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let der = STANDARD
            .decode(compact)
            .map_err(|e| Error::Key(format!("RSA private key is neither PEM nor base64: {e}")))?;
        Self::rsa_from_der(&der)
    }

    /// Algorithm this secret signs with
    #[must_use]
    pub fn signature_method(&self) -> SignatureMethod {
        match self {
            Self::Hmac(_) => SignatureMethod::HmacSha1,
            Self::RsaPrivate(_) => SignatureMethod::RsaSha1,
        }
    }

    /// Public half of an RSA key
    #[must_use]
    pub fn public_key(&self) -> Option<RsaPublicKey> {
        match self {
            Self::Hmac(_) => None,
            Self::RsaPrivate(key) => Some(key.to_public_key()),
        }
    }
}

impl fmt::Debug for ConsumerSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hmac(_) => f.write_str("Hmac(<redacted>)"),
            Self::RsaPrivate(_) => f.write_str("RsaPrivate(<redacted>)"),
        }
    }
}

impl PartialEq for ConsumerSecret {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Hmac(a), Self::Hmac(b)) => a == b,
            (Self::RsaPrivate(a), Self::RsaPrivate(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConsumerSecret {}

/// Everything needed to compute one signature
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    /// `oauth_consumer_key`
    pub consumer_key: &'a str,
    /// Consumer secret or private key
    pub consumer_secret: &'a ConsumerSecret,
    /// Request or access token
    pub token: Option<&'a str>,
    /// Secret of `token`
    pub token_secret: Option<&'a str>,
}

/// Provider-side key for [`verify_request`]
#[derive(Debug, Clone)]
pub enum VerificationKey {
    /// Shared secrets
    Hmac {
        /// Consumer secret
        consumer_secret: String,
        /// Token secret, empty when no token was used
        token_secret: String,
    },
    /// Consumer certificate
    Rsa(RsaPublicKey),
}

/// Reject caller-supplied parameters that would shadow protocol parameters
pub fn check_caller_params(request: &HttpRequest) -> Result<(), OAuthError> {
    if let Some((name, _)) = request.url.query_pairs().find(|(k, _)| params::is_reserved(k)) {
        return Err(OAuthError::invalid_request(format!(
            "Parameter '{name}' in the query string uses a reserved prefix"
        )));
    }
    if request.is_form_encoded() {
        if let Some((name, _)) = params::parse_form(&request.body)
            .into_iter()
            .find(|(k, _)| params::is_reserved(k))
        {
            return Err(OAuthError::invalid_request(format!(
                "Parameter '{name}' in the request body uses a reserved prefix"
            )));
        }
    }
    Ok(())
}

/// Sign `request`, placing protocol parameters at `location`.
///
/// `extra_params` are signed alongside the generated `oauth_*` parameters
/// (`opensocial_*` identity, `oauth_callback`, `oauth_verifier`, ...). The
/// returned request never follows redirects.
pub fn sign_request(
    request: &HttpRequest,
    credentials: &Credentials<'_>,
    extra_params: &[(String, String)],
    location: ParamLocation,
) -> Result<HttpRequest, OAuthError> {
    if location == ParamLocation::PostBody
        && (request.method == HttpMethod::Get
            || !(request.body.is_empty() || request.is_form_encoded()))
    {
        return Err(OAuthError::invalid_request(
            "OAuth parameters can only be placed in a form-encoded request body",
        ));
    }

    let mut oauth_params: Vec<(String, String)> = extra_params.to_vec();
    oauth_params.push((OAUTH_CONSUMER_KEY.into(), credentials.consumer_key.into()));
    if let Some(token) = credentials.token {
        oauth_params.push((OAUTH_TOKEN.into(), token.into()));
    }
    oauth_params.push((
        OAUTH_SIGNATURE_METHOD.into(),
        credentials.consumer_secret.signature_method().as_str().into(),
    ));
    oauth_params.push((OAUTH_TIMESTAMP.into(), unix_timestamp().to_string()));
    oauth_params.push((OAUTH_NONCE.into(), generate_nonce()));
    oauth_params.push((OAUTH_VERSION.into(), OAUTH_VERSION_1_0.into()));
    if !request.body.is_empty() && !request.is_form_encoded() {
        oauth_params.push((OAUTH_BODY_HASH.into(), body_hash(&request.body)));
    }

    let mut all = request_params(request);
    all.extend(oauth_params.iter().cloned());
    let base = signature_base_string(request.method, &request.url, &all);
    let signature = compute_signature(&base, credentials)?;
    oauth_params.push((OAUTH_SIGNATURE.into(), signature));

    let mut signed = request.clone();
    signed.follow_redirects = false;
    place_params(&mut signed, oauth_params, location);
    Ok(signed)
}

fn place_params(request: &mut HttpRequest, oauth_params: Vec<(String, String)>, location: ParamLocation) {
    match location {
        ParamLocation::AuthHeader => {
            // The header scheme only carries oauth_*; identity params ride in the query.
            let (header, query): (Vec<_>, Vec<_>) = oauth_params
                .into_iter()
                .partition(|(k, _)| k.starts_with("oauth_"));
            if !query.is_empty() {
                request.url.query_pairs_mut().extend_pairs(&query);
            }
            let value = header
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", params::percent_encode(k), params::percent_encode(v)))
                .collect::<Vec<_>>()
                .join(", ");
            request.set_header("Authorization", &format!("OAuth {value}"));
        }
        ParamLocation::UriQuery => {
            request.url.query_pairs_mut().extend_pairs(&oauth_params);
        }
        ParamLocation::PostBody => {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&oauth_params)
                .finish();
            if !request.body.is_empty() {
                request.body.push(b'&');
            }
            request.body.extend_from_slice(encoded.as_bytes());
            if !request.is_form_encoded() {
                request.set_header("Content-Type", FORM_CONTENT_TYPE);
            }
        }
    }
}

/// Query and form-body parameters of a request
fn request_params(request: &HttpRequest) -> Vec<(String, String)> {
    let mut all: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
    if request.is_form_encoded() {
        all.extend(params::parse_form(&request.body));
    }
    all
}

/// Base string URI: scheme and host lower-cased, default port dropped, no query
#[must_use]
pub fn base_string_uri(url: &Url) -> String {
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    format!(
        "{}://{}{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default().to_ascii_lowercase(),
        port,
        url.path()
    )
}

/// RFC 5849 §3.4.1 signature base string
#[must_use]
pub fn signature_base_string(method: HttpMethod, url: &Url, all_params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = all_params
        .iter()
        .filter(|(k, _)| k != OAUTH_SIGNATURE)
        .map(|(k, v)| (params::percent_encode(k), params::percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.as_str(),
        params::percent_encode(&base_string_uri(url)),
        params::percent_encode(&normalized)
    )
}

fn compute_signature(base: &str, credentials: &Credentials<'_>) -> Result<String, OAuthError> {
    match credentials.consumer_secret {
        ConsumerSecret::Hmac(secret) => {
            let mac = hmac_sha1(base, secret, credentials.token_secret.unwrap_or_default())?;
            Ok(STANDARD.encode(mac.finalize().into_bytes()))
        }
        ConsumerSecret::RsaPrivate(key) => {
            let digest = Sha1::digest(base.as_bytes());
            let signature = key
                .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
                .map_err(|e| OAuthError::unknown(format!("RSA signing failed: {e}")))?;
            Ok(STANDARD.encode(signature))
        }
    }
}

fn hmac_sha1(base: &str, consumer_secret: &str, token_secret: &str) -> Result<HmacSha1, OAuthError> {
    let key = format!(
        "{}&{}",
        params::percent_encode(consumer_secret),
        params::percent_encode(token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| OAuthError::unknown(format!("HMAC key rejected: {e}")))?;
    mac.update(base.as_bytes());
    Ok(mac)
}

fn body_hash(body: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(body))
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Protocol parameters recovered from a signed request
#[derive(Debug, Clone)]
pub struct SignedParams {
    /// Every signed parameter (query, body, and protocol), decoded
    pub params: Vec<(String, String)>,
    /// Where the `oauth_*` parameters were found
    pub location: ParamLocation,
    signature: String,
    base_string: String,
}

impl SignedParams {
    /// Collect parameters from a signed request.
    ///
    /// Fails when protocol parameters are missing, appear in more than one
    /// location, or the body hash does not match.
    pub fn parse(request: &HttpRequest) -> Result<Self, OAuthError> {
        let header = authorization_params(request);
        let query: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
        let body = if request.is_form_encoded() {
            params::parse_form(&request.body)
        } else {
            Vec::new()
        };

        let carrying: Vec<ParamLocation> = [
            (ParamLocation::AuthHeader, &header),
            (ParamLocation::UriQuery, &query),
            (ParamLocation::PostBody, &body),
        ]
        .iter()
        .filter(|(_, p)| p.iter().any(|(k, _)| k.starts_with("oauth_")))
        .map(|(l, _)| *l)
        .collect();

        let location = match carrying.as_slice() {
            [] => return Err(problem("parameter_absent", "No OAuth parameters in request")),
            [single] => *single,
            _ => {
                return Err(problem(
                    "parameter_rejected",
                    "OAuth parameters appear in more than one location",
                ));
            }
        };

        let mut all = header;
        all.extend(query);
        all.extend(body);

        let mut signatures = all.iter().filter(|(k, _)| k == OAUTH_SIGNATURE);
        let signature = match (signatures.next(), signatures.next()) {
            (Some((_, s)), None) => s.clone(),
            (None, _) => return Err(problem("parameter_absent", "Missing oauth_signature")),
            (Some(_), Some(_)) => return Err(problem("parameter_rejected", "Duplicate oauth_signature")),
        };
        all.retain(|(k, _)| k != OAUTH_SIGNATURE);

        if let Some(expected) = params::find(&all, OAUTH_BODY_HASH) {
            if expected != body_hash(&request.body) {
                return Err(problem("signature_invalid", "oauth_body_hash does not match body"));
            }
        }

        let base_string = signature_base_string(request.method, &request.url, &all);
        Ok(Self {
            params: all,
            location,
            signature,
            base_string,
        })
    }

    /// First value of a parameter
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        params::find(&self.params, name)
    }

    /// Check the signature against a key
    pub fn verify(&self, key: &VerificationKey) -> Result<(), OAuthError> {
        let signature = STANDARD
            .decode(&self.signature)
            .map_err(|_| problem("signature_invalid", "oauth_signature is not base64"))?;

        let valid = match key {
            VerificationKey::Hmac {
                consumer_secret,
                token_secret,
            } => hmac_sha1(&self.base_string, consumer_secret, token_secret)?
                .verify_slice(&signature)
                .is_ok(),
            VerificationKey::Rsa(public) => {
                let digest = Sha1::digest(self.base_string.as_bytes());
                public
                    .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
                    .is_ok()
            }
        };

        if valid {
            Ok(())
        } else {
            Err(problem("signature_invalid", "Signature does not match"))
        }
    }
}

/// Parse and verify a signed request in one step
pub fn verify_request(request: &HttpRequest, key: &VerificationKey) -> Result<SignedParams, OAuthError> {
    let signed = SignedParams::parse(request)?;
    signed.verify(key)?;
    Ok(signed)
}

fn authorization_params(request: &HttpRequest) -> Vec<(String, String)> {
    request
        .header("Authorization")
        .map(parse_oauth_header)
        .unwrap_or_default()
}

/// Decode the parameters of an `OAuth` scheme header (`Authorization` or
/// `WWW-Authenticate`), dropping `realm`
#[must_use]
pub fn parse_oauth_header(value: &str) -> Vec<(String, String)> {
    let Some(rest) = value
        .get(..6)
        .filter(|scheme| scheme.eq_ignore_ascii_case("OAuth "))
        .map(|_| &value[6..])
    else {
        return Vec::new();
    };

    rest.split(',')
        .filter_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            Some((
                params::percent_decode(k.trim()),
                params::percent_decode(v.trim().trim_matches('"')),
            ))
        })
        .filter(|(k, _)| k != "realm")
        .collect()
}

fn problem(code: &str, message: &str) -> OAuthError {
    OAuthError::provider(OAuthProblem::parse(code), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::OAuthErrorKind;

    const TEST_RSA_KEY: &str = include_str!("../../tests/fixtures/test_rsa_key.pem");

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn hmac_secret() -> ConsumerSecret {
        ConsumerSecret::Hmac("kd94hf93k423kf44".to_string())
    }

    fn creds(secret: &ConsumerSecret) -> Credentials<'_> {
        Credentials {
            consumer_key: "dpf43f3p2l4k3l03",
            consumer_secret: secret,
            token: Some("nnch734d00sl2jdk"),
            token_secret: Some("pfkkdhi9sl3r4s00"),
        }
    }

    fn hmac_key() -> VerificationKey {
        VerificationKey::Hmac {
            consumer_secret: "kd94hf93k423kf44".into(),
            token_secret: "pfkkdhi9sl3r4s00".into(),
        }
    }

    fn identity() -> Vec<(String, String)> {
        vec![(params::OPENSOCIAL_OWNER_ID.into(), "alice".into())]
    }

    #[test]
    fn matches_published_hmac_vector() {
        // OAuth Core 1.0 Appendix A.5
        let params: Vec<(String, String)> = [
            ("oauth_consumer_key", "dpf43f3p2l4k3l03"),
            ("oauth_token", "nnch734d00sl2jdk"),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1191242096"),
            ("oauth_nonce", "kllo9940pd9333jh"),
            ("oauth_version", "1.0"),
            ("file", "vacation.jpg"),
            ("size", "original"),
        ]
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

        let base = signature_base_string(HttpMethod::Get, &url("http://photos.example.net/photos"), &params);
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh%26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096%26oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );

        let secret = hmac_secret();
        let signature = compute_signature(&base, &creds(&secret)).unwrap();
        assert_eq!(signature, "tR3+Ty81lMeYAr/Fid0kMTYa/WM=");
    }

    #[test]
    fn base_uri_normalization() {
        assert_eq!(base_string_uri(&url("HTTP://Example.COM:80/r%20v/X?id=123")), "http://example.com/r%20v/X");
        assert_eq!(base_string_uri(&url("https://www.example.net:8080/?q=1")), "https://www.example.net:8080/");
        assert_eq!(base_string_uri(&url("https://example.com:443/a#frag")), "https://example.com/a");
    }

    #[test]
    fn auth_header_signing_verifies() {
        let secret = hmac_secret();
        let request = HttpRequest::get(url("http://photos.example.net/photos?file=vacation.jpg&size=original"));
        let signed = sign_request(&request, &creds(&secret), &identity(), ParamLocation::AuthHeader).unwrap();

        let header = signed.header("Authorization").unwrap();
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature="));
        assert!(!header.contains("opensocial_owner_id"));
        assert!(!signed.follow_redirects);

        // identity rides in the query, protocol params do not
        let query: Vec<(String, String)> = signed.url.query_pairs().into_owned().collect();
        assert_eq!(params::find(&query, "opensocial_owner_id"), Some("alice"));
        assert!(query.iter().all(|(k, _)| !k.starts_with("oauth_")));

        let verified = verify_request(&signed, &hmac_key()).unwrap();
        assert_eq!(verified.location, ParamLocation::AuthHeader);
        assert_eq!(verified.get("oauth_token"), Some("nnch734d00sl2jdk"));
        assert_eq!(verified.get("file"), Some("vacation.jpg"));
    }

    #[test]
    fn query_signing_verifies() {
        let secret = hmac_secret();
        let request = HttpRequest::get(url("https://api.example.com/feed?q=a+b%21"));
        let signed = sign_request(&request, &creds(&secret), &identity(), ParamLocation::UriQuery).unwrap();

        assert!(signed.header("Authorization").is_none());
        assert!(signed.body.is_empty());

        let verified = verify_request(&signed, &hmac_key()).unwrap();
        assert_eq!(verified.location, ParamLocation::UriQuery);
        assert_eq!(verified.get("q"), Some("a b!"));
    }

    #[test]
    fn body_signing_verifies() {
        let secret = hmac_secret();
        let request = HttpRequest::post(url("https://api.example.com/update?x=1"))
            .with_form_body(&[("status".into(), "hello world & more".into())]);
        let signed = sign_request(&request, &creds(&secret), &identity(), ParamLocation::PostBody).unwrap();

        assert!(signed.header("Authorization").is_none());
        assert_eq!(signed.url.query(), Some("x=1"));

        let body = params::parse_form(&signed.body);
        assert_eq!(params::find(&body, "status"), Some("hello world & more"));
        assert!(params::find(&body, "oauth_signature").is_some());

        let verified = verify_request(&signed, &hmac_key()).unwrap();
        assert_eq!(verified.location, ParamLocation::PostBody);
    }

    #[test]
    fn empty_post_gets_form_body() {
        let secret = hmac_secret();
        let request = HttpRequest::post(url("https://api.example.com/request_token"));
        let signed = sign_request(&request, &creds(&secret), &[], ParamLocation::PostBody).unwrap();
        assert!(signed.is_form_encoded());
        assert!(verify_request(&signed, &hmac_key()).is_ok());
    }

    #[test]
    fn body_location_requires_form_post() {
        let secret = hmac_secret();
        let get = HttpRequest::get(url("https://api.example.com/"));
        let err = sign_request(&get, &creds(&secret), &[], ParamLocation::PostBody).unwrap_err();
        assert_eq!(err.kind, OAuthErrorKind::InvalidRequest);

        let json = HttpRequest::post(url("https://api.example.com/"))
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"a":1}"#);
        let err = sign_request(&json, &creds(&secret), &[], ParamLocation::PostBody).unwrap_err();
        assert_eq!(err.kind, OAuthErrorKind::InvalidRequest);
    }

    #[test]
    fn non_form_body_is_hashed() {
        let secret = hmac_secret();
        let request = HttpRequest::post(url("https://api.example.com/items"))
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"name":"x"}"#);
        let signed = sign_request(&request, &creds(&secret), &[], ParamLocation::AuthHeader).unwrap();
        let verified = verify_request(&signed, &hmac_key()).unwrap();
        assert!(verified.get(OAUTH_BODY_HASH).is_some());

        let mut tampered = signed.clone();
        tampered.body = br#"{"name":"y"}"#.to_vec();
        assert!(verify_request(&tampered, &hmac_key()).is_err());
    }

    #[test]
    fn rsa_signing_verifies_with_public_key() {
        let secret = ConsumerSecret::rsa_from_pem(TEST_RSA_KEY).unwrap();
        assert_eq!(secret.signature_method(), SignatureMethod::RsaSha1);
        let credentials = Credentials {
            consumer_key: "container.example.com",
            consumer_secret: &secret,
            token: None,
            token_secret: None,
        };
        let request = HttpRequest::get(url("https://api.example.com/profile?fields=name"));
        let signed = sign_request(&request, &credentials, &identity(), ParamLocation::UriQuery).unwrap();

        let key = VerificationKey::Rsa(secret.public_key().unwrap());
        let verified = verify_request(&signed, &key).unwrap();
        assert_eq!(verified.get(OAUTH_SIGNATURE_METHOD), Some("RSA-SHA1"));
        assert!(verified.get(OAUTH_TOKEN).is_none());
    }

    #[test]
    fn rsa_keys_load_from_bare_base64() {
        let body: String = TEST_RSA_KEY
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect();
        let from_text = ConsumerSecret::rsa_from_text(&body).unwrap();
        let from_pem = ConsumerSecret::rsa_from_pem(TEST_RSA_KEY).unwrap();
        assert_eq!(from_text, from_pem);

        assert!(ConsumerSecret::rsa_from_text("not a key!").is_err());
    }

    #[test]
    fn tampering_breaks_verification() {
        let secret = hmac_secret();
        let request = HttpRequest::get(url("https://api.example.com/feed?q=1"));
        let signed = sign_request(&request, &creds(&secret), &[], ParamLocation::AuthHeader).unwrap();

        let mut other_url = signed.clone();
        other_url.url = url("https://api.example.com/feed?q=2");
        assert!(verify_request(&other_url, &hmac_key()).is_err());

        let wrong_secret = VerificationKey::Hmac {
            consumer_secret: "kd94hf93k423kf44".into(),
            token_secret: "wrong".into(),
        };
        let err = verify_request(&signed, &wrong_secret).unwrap_err();
        assert_eq!(err.kind.code(), "signature_invalid");
    }

    #[test]
    fn duplicated_locations_are_rejected() {
        let secret = hmac_secret();
        let request = HttpRequest::get(url("https://api.example.com/feed"));
        let mut signed = sign_request(&request, &creds(&secret), &[], ParamLocation::AuthHeader).unwrap();
        signed.url.query_pairs_mut().append_pair("oauth_nonce", "again");

        let err = SignedParams::parse(&signed).unwrap_err();
        assert_eq!(err.kind.code(), "parameter_rejected");
    }

    #[test]
    fn unsigned_request_has_no_params() {
        let err = SignedParams::parse(&HttpRequest::get(url("https://api.example.com/"))).unwrap_err();
        assert_eq!(err.kind.code(), "parameter_absent");
    }

    #[test]
    fn caller_params_with_reserved_prefixes_are_rejected() {
        let query = HttpRequest::get(url("https://api.example.com/?oauth_foo=1"));
        assert_eq!(check_caller_params(&query).unwrap_err().kind, OAuthErrorKind::InvalidRequest);

        let body = HttpRequest::post(url("https://api.example.com/"))
            .with_form_body(&[("opensocial_owner_id".into(), "mallory".into())]);
        assert_eq!(check_caller_params(&body).unwrap_err().kind, OAuthErrorKind::InvalidRequest);

        let fine = HttpRequest::post(url("https://api.example.com/?q=oauth_foo"))
            .with_form_body(&[("note".into(), "oauth_token=x".into())]);
        assert!(check_caller_params(&fine).is_ok());
    }

    #[test]
    fn secrets_do_not_leak_through_debug() {
        let rendered = format!("{:?}", ConsumerSecret::Hmac("topsecret".into()));
        assert!(!rendered.contains("topsecret"));
    }

    #[test]
    fn nonces_are_unique() {
        assert_ne!(generate_nonce(), generate_nonce());
        assert_eq!(generate_nonce().len(), 32);
    }
}
