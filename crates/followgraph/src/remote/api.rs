//! Per-credential access to the remote service.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::classify::CallFailure;
use super::credential::Credential;
use super::http::{HttpError, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use super::oauth1::Signer;
use super::operation::Operation;

/// Default service root.
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/";

/// Ids per page requested from cursored id and member listings.
const ID_PAGE_SIZE: &str = "5000";
/// Statuses per page requested from timelines.
const TIMELINE_PAGE_SIZE: &str = "200";
/// Service code for an invalid or expired bearer token.
const INVALID_TOKEN_CODE: i64 = 89;

/// Executes one [`Operation`] with one credential.
///
/// Implementations report failures raw; classification, failover and retry
/// belong to the [`CredentialPool`](super::CredentialPool).
#[async_trait]
pub trait GraphApi: Send + Sync {
    async fn call(&self, credential: &Credential, op: &Operation) -> Result<Value, CallFailure>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Build a [`CallFailure`] from a non-success response.
///
/// Reads the first `{"errors":[{"code","message"}]}` entry when present and
/// the `x-rate-limit-reset` header.
pub fn failure_from_response(response: &HttpResponse) -> CallFailure {
    let (api_code, message) = match serde_json::from_slice::<ErrorBody>(&response.body) {
        Ok(body) => match body.errors.into_iter().next() {
            Some(entry) => (entry.code, entry.message.unwrap_or_default()),
            None => (None, body.error.unwrap_or_default()),
        },
        Err(_) => (None, String::from_utf8_lossy(&response.body).into_owned()),
    };
    let message = if message.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        message
    };

    let failure = CallFailure::http(response.status, api_code, message);
    match response
        .header("x-rate-limit-reset")
        .and_then(|v| v.trim().parse::<i64>().ok())
    {
        Some(reset) => failure.with_reset(reset),
        None => failure,
    }
}

fn transport_failure(err: HttpError) -> CallFailure {
    CallFailure::transport(err.to_string())
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

/// Path below the base URL and query parameters for `op`.
fn endpoint(op: &Operation) -> (&'static str, Vec<(&'static str, String)>) {
    match op {
        Operation::LookupUsers { ids } => ("1.1/users/lookup.json", vec![("user_id", join_ids(ids))]),
        Operation::LookupHandles { handles } => (
            "1.1/users/lookup.json",
            vec![("screen_name", handles.join(","))],
        ),
        Operation::FollowerIds { user_id, cursor } => (
            "1.1/followers/ids.json",
            vec![
                ("user_id", user_id.to_string()),
                ("cursor", cursor.to_string()),
                ("count", ID_PAGE_SIZE.to_string()),
            ],
        ),
        Operation::FriendIds { user_id, cursor } => (
            "1.1/friends/ids.json",
            vec![
                ("user_id", user_id.to_string()),
                ("cursor", cursor.to_string()),
                ("count", ID_PAGE_SIZE.to_string()),
            ],
        ),
        Operation::UserTimeline { user_id, max_id } => {
            let mut params = vec![
                ("user_id", user_id.to_string()),
                ("count", TIMELINE_PAGE_SIZE.to_string()),
            ];
            if let Some(max_id) = max_id {
                params.push(("max_id", max_id.to_string()));
            }
            ("1.1/statuses/user_timeline.json", params)
        }
        Operation::ListMembers { list, cursor } => (
            "1.1/lists/members.json",
            vec![
                ("slug", list.slug.clone()),
                ("owner_id", list.owner_id.to_string()),
                ("cursor", cursor.to_string()),
                ("count", ID_PAGE_SIZE.to_string()),
            ],
        ),
        Operation::ListShow { list } => (
            "1.1/lists/show.json",
            vec![
                ("slug", list.slug.clone()),
                ("owner_id", list.owner_id.to_string()),
            ],
        ),
    }
}

/// [`GraphApi`] over HTTP.
///
/// Credentials carrying an access-token pair sign each request with OAuth
/// 1.0a. Others use application-only auth: the key pair is exchanged for a
/// bearer token on first use, cached per consumer key and dropped when the
/// service rejects it.
pub struct HttpGraphApi<T = ReqwestTransport> {
    transport: T,
    base_url: Url,
    tokens: Mutex<HashMap<String, String>>,
}

impl HttpGraphApi<ReqwestTransport> {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::with_timeout(timeout)?;
        Self::with_transport(transport, base_url)
    }
}

impl<T: HttpTransport> HttpGraphApi<T> {
    pub fn with_transport(transport: T, base_url: &str) -> Result<Self, HttpError> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| HttpError::Transport(format!("invalid base URL {base_url}: {e}")))?;

        Ok(Self {
            transport,
            base_url,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    /// Full request URL for `op`.
    pub fn request_url(&self, op: &Operation) -> Result<Url, url::ParseError> {
        let (path, params) = endpoint(op);
        let mut url = self.base_url.join(path)?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    fn cached_token(&self, credential: &Credential) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&credential.consumer_key)
            .cloned()
    }

    fn forget_token(&self, credential: &Credential) {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&credential.consumer_key);
    }

    async fn bearer_token(&self, credential: &Credential) -> Result<String, CallFailure> {
        if let Some(token) = self.cached_token(credential) {
            return Ok(token);
        }

        let url = self
            .base_url
            .join("oauth2/token")
            .map_err(|e| CallFailure::local(format!("token URL: {e}")))?;
        let request = HttpRequest::post_form(url.as_str(), "grant_type=client_credentials")
            .header("Authorization", credential.basic_auth());

        let response = self.transport.send(request).await.map_err(transport_failure)?;
        if !response.is_success() {
            return Err(failure_from_response(&response));
        }
        let token: TokenResponse = serde_json::from_slice(&response.body).map_err(|e| {
            CallFailure::http(response.status, None, format!("invalid token response: {e}"))
        })?;

        tracing::debug!(credential = %credential.name, "Obtained bearer token");
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credential.consumer_key.clone(), token.access_token.clone());
        Ok(token.access_token)
    }
}

#[async_trait]
impl<T: HttpTransport> GraphApi for HttpGraphApi<T> {
    async fn call(&self, credential: &Credential, op: &Operation) -> Result<Value, CallFailure> {
        let (path, params) = endpoint(op);
        let resource = self
            .base_url
            .join(path)
            .map_err(|e| CallFailure::local(format!("request URL for {}: {e}", op.name())))?;
        let mut url = resource.clone();
        url.query_pairs_mut().extend_pairs(&params);

        let authorization = match credential.user_token() {
            Ok(Some((token, token_secret))) => Signer {
                consumer_key: &credential.consumer_key,
                consumer_secret: &credential.consumer_secret,
                token,
                token_secret,
            }
            .authorization("GET", &resource, &params),
            Ok(None) => format!("Bearer {}", self.bearer_token(credential).await?),
            Err(message) => return Err(CallFailure::local(message)),
        };

        tracing::trace!(credential = %credential.name, url = %url, "GET");
        let request = HttpRequest::get(url.as_str()).header("Authorization", authorization);
        let response = self.transport.send(request).await.map_err(transport_failure)?;

        if !response.is_success() {
            let failure = failure_from_response(&response);
            if response.status == 401 && failure.api_code == Some(INVALID_TOKEN_CODE) {
                self.forget_token(credential);
            }
            return Err(failure);
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            CallFailure::http(response.status, None, format!("invalid JSON body: {e}"))
        })
    }
}
