//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Twitter's v1.1 user-context endpoints require every request to carry an
//! `Authorization: OAuth ...` header whose signature covers the method, the
//! URL and all form parameters.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;

use crate::error::SocialError;

type HmacSha1 = Hmac<Sha1>;

const NONCE_LEN: usize = 32;

/// The four user-context secrets
#[derive(Clone)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("token", &self.token)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// RFC 3986 percent-encoding (unreserved: ALPHA / DIGIT / "-" / "." / "_" / "~")
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build the `Authorization` header for a request
///
/// # Arguments
/// * `method` - HTTP method, e.g. "POST"
/// * `url` - request URL without query string
/// * `params` - form or query parameters that are part of the signature
pub fn authorization_header(
    credentials: &OAuthCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
) -> Result<String, SocialError> {
    let nonce: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect();
    let timestamp = chrono::Utc::now().timestamp().to_string();

    signed_header(credentials, method, url, params, &nonce, &timestamp)
}

fn oauth_params<'a>(
    credentials: &'a OAuthCredentials,
    nonce: &'a str,
    timestamp: &'a str,
) -> Vec<(&'static str, &'a str)> {
    vec![
        ("oauth_consumer_key", credentials.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", credentials.token.as_str()),
        ("oauth_version", "1.0"),
    ]
}

pub(crate) fn signature_base_string(
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    oauth: &[(&str, &str)],
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .chain(oauth.iter())
        .map(|(key, value)| (encode(key), encode(value)))
        .collect();
    encoded.sort();

    let parameter_string = encoded
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&parameter_string)
    )
}

pub(crate) fn sign(
    credentials: &OAuthCredentials,
    base_string: &str,
) -> Result<String, SocialError> {
    let signing_key = format!(
        "{}&{}",
        encode(&credentials.consumer_secret),
        encode(&credentials.token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
        .map_err(|e| SocialError::Signing(e.to_string()))?;
    mac.update(base_string.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

pub(crate) fn signed_header(
    credentials: &OAuthCredentials,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> Result<String, SocialError> {
    let oauth = oauth_params(credentials, nonce, timestamp);
    let base_string = signature_base_string(method, url, params, &oauth);
    let signature = sign(credentials, &base_string)?;

    let mut header_params = oauth;
    header_params.push(("oauth_signature", signature.as_str()));
    header_params.sort();

    let fields = header_params
        .iter()
        .map(|(key, value)| format!("{}=\"{}\"", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {}", fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference request from Twitter's "Creating a signature" guide.
    fn reference_credentials() -> OAuthCredentials {
        OAuthCredentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".to_string(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".to_string(),
            token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".to_string(),
            token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".to_string(),
        }
    }

    const REFERENCE_URL: &str = "https://api.twitter.com/1.1/statuses/update.json";
    const REFERENCE_NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const REFERENCE_TIMESTAMP: &str = "1318622958";
    const REFERENCE_PARAMS: &[(&str, &str)] = &[
        ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
        ("include_entities", "true"),
    ];

    #[test]
    fn base_string_matches_reference() {
        let credentials = reference_credentials();
        let oauth = oauth_params(&credentials, REFERENCE_NONCE, REFERENCE_TIMESTAMP);
        let base = signature_base_string("post", REFERENCE_URL, REFERENCE_PARAMS, &oauth);

        assert_eq!(
            base,
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&\
             include_entities%3Dtrue%26oauth_consumer_key%3Dxvz1evFS4wEEPTGEFPHBog%26\
             oauth_nonce%3DkYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg%26\
             oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1318622958%26\
             oauth_token%3D370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb%26\
             oauth_version%3D1.0%26status%3DHello%2520Ladies%2520%252B%2520Gentlemen\
             %252C%2520a%2520signed%2520OAuth%2520request%2521"
        );
    }

    #[test]
    fn signature_matches_reference() {
        let credentials = reference_credentials();
        let oauth = oauth_params(&credentials, REFERENCE_NONCE, REFERENCE_TIMESTAMP);
        let base = signature_base_string("POST", REFERENCE_URL, REFERENCE_PARAMS, &oauth);

        assert_eq!(
            sign(&credentials, &base).unwrap(),
            "hCtSmYh+iHYCEqBWrE7C7hYmtUk="
        );
    }

    #[test]
    fn header_carries_encoded_signature() {
        let header = signed_header(
            &reference_credentials(),
            "POST",
            REFERENCE_URL,
            REFERENCE_PARAMS,
            REFERENCE_NONCE,
            REFERENCE_TIMESTAMP,
        )
        .unwrap();

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(!header.contains("status="));
    }

    #[test]
    fn fresh_headers_use_distinct_nonces() {
        let credentials = reference_credentials();
        let first = authorization_header(&credentials, "POST", REFERENCE_URL, &[]).unwrap();
        let second = authorization_header(&credentials, "POST", REFERENCE_URL, &[]).unwrap();
        assert_ne!(first, second);
    }
}
