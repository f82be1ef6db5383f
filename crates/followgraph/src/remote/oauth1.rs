//! OAuth 1.0a HMAC-SHA1 request signing for user-context credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use ring::hmac;
use url::Url;

/// Everything except RFC 3986 unreserved characters is escaped.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LEN: usize = 32;

fn encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

/// Consumer and access-token key pairs used to sign one request.
pub(crate) struct Signer<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: &'a str,
    pub token_secret: &'a str,
}

impl Signer<'_> {
    /// `Authorization` header for `method resource?params` with a fresh nonce.
    ///
    /// `resource` must not carry a query; request parameters go in `params`.
    pub fn authorization(&self, method: &str, resource: &Url, params: &[(&str, String)]) -> String {
        let nonce: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        self.authorization_with(method, resource, params, &nonce, Utc::now().timestamp())
    }

    fn authorization_with(
        &self,
        method: &str,
        resource: &Url,
        params: &[(&str, String)],
        nonce: &str,
        timestamp: i64,
    ) -> String {
        let timestamp = timestamp.to_string();
        let oauth = [
            ("oauth_consumer_key", self.consumer_key),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.token),
            ("oauth_version", "1.0"),
        ];

        let base = signature_base(method, resource, params, &oauth);
        let key = format!("{}&{}", encode(self.consumer_secret), encode(self.token_secret));
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key.as_bytes());
        let signature = STANDARD.encode(hmac::sign(&key, base.as_bytes()).as_ref());

        let mut fields: Vec<String> = oauth
            .iter()
            .chain(std::iter::once(&("oauth_signature", signature.as_str())))
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        fields.sort_unstable();
        format!("OAuth {}", fields.join(", "))
    }
}

fn signature_base(
    method: &str,
    resource: &Url,
    params: &[(&str, String)],
    oauth: &[(&str, &str)],
) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .chain(oauth.iter().map(|(k, v)| (encode(k), encode(v))))
        .collect();
    pairs.sort_unstable();
    let normalized = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = resource.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(base_url.as_str()),
        encode(&normalized)
    )
}
