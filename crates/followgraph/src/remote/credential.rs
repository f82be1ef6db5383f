//! Authorization material for one remote-service application.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// One set of API keys.
///
/// Each credential carries its own rate-limit budget on the remote side, so
/// a pool of several multiplies throughput. With an access-token pair,
/// requests are signed in user context; without one they use
/// application-only authentication.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    /// Operator-facing label, used in logs in place of the keys.
    pub name: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_secret: Option<String>,
}

impl Credential {
    pub fn new(
        name: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            token: None,
            token_secret: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, secret: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self.token_secret = Some(secret.into());
        self
    }

    /// The access-token pair, `None` for application-only credentials.
    ///
    /// Fails when only one half of the pair is configured.
    pub(crate) fn user_token(&self) -> Result<Option<(&str, &str)>, String> {
        match (&self.token, &self.token_secret) {
            (Some(token), Some(secret)) => Ok(Some((token.as_str(), secret.as_str()))),
            (None, None) => Ok(None),
            _ => Err(format!(
                "credential {} must set both token and token_secret",
                self.name
            )),
        }
    }

    /// `Authorization` header value for the bearer-token exchange.
    pub(crate) fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.consumer_key, self.consumer_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
