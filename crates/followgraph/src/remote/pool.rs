//! Rate-limit-aware pool of credentials.
//!
//! The remote service meters each credential separately. [`CredentialPool`]
//! presents several of them as one caller: every call goes to a credential
//! not currently believed exhausted, a rate-limited credential is parked
//! until its reset time, and the pool only sleeps once all of them are
//! parked. Transient service failures are retried on a fixed delay with a
//! bounded budget per logical call.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde_json::Value;

use super::api::GraphApi;
use super::classify::{ErrorClass, classify};
use super::credential::Credential;
use super::error::RemoteError;
use super::operation::Operation;
use crate::sync::{EventCallback, SyncEvent, emit};

/// Default pause after a transient service failure.
pub const DEFAULT_CAPACITY_SLEEP: Duration = Duration::from_secs(900);

/// Default number of retries after transient service failures, per call.
pub const DEFAULT_CAPACITY_RETRIES: u32 = 3;

/// Source of wall-clock time for rate-limit bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Retry settings for transient service failures.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pause before each retry.
    pub capacity_sleep: Duration,
    /// Retries allowed per logical call before the failure is surfaced.
    pub capacity_retries: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity_sleep: DEFAULT_CAPACITY_SLEEP,
            capacity_retries: DEFAULT_CAPACITY_RETRIES,
        }
    }
}

impl PoolConfig {
    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.capacity_sleep)
            .with_max_times(self.capacity_retries as usize)
    }
}

/// Index of a credential within its pool.
///
/// Only a pool hands these out; see [`CredentialPool::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CredentialId(pub(crate) usize);

impl CredentialId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct RateState {
    blocked_until: Option<DateTime<Utc>>,
}

/// Credentials plus the per-credential client that uses them.
pub struct CredentialPool<A> {
    api: A,
    credentials: Vec<Credential>,
    states: Mutex<Vec<RateState>>,
    config: PoolConfig,
    clock: Arc<dyn Clock>,
    on_event: Option<EventCallback>,
}

impl<A: GraphApi> CredentialPool<A> {
    /// Build a pool. At least one credential is required.
    pub fn new(api: A, credentials: Vec<Credential>) -> Result<Self, RemoteError> {
        if credentials.is_empty() {
            return Err(RemoteError::NoCredentials);
        }

        let states = vec![RateState::default(); credentials.len()];
        Ok(Self {
            api,
            credentials,
            states: Mutex::new(states),
            config: PoolConfig::default(),
            clock: Arc::new(SystemClock),
            on_event: None,
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_events(mut self, on_event: EventCallback) -> Self {
        self.on_event = Some(on_event);
        self
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credential(&self, id: CredentialId) -> Option<&Credential> {
        self.credentials.get(id.0)
    }

    /// Id of the credential labelled `name`.
    pub fn find(&self, name: &str) -> Option<CredentialId> {
        self.credentials
            .iter()
            .position(|c| c.name == name)
            .map(CredentialId)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn states(&self) -> MutexGuard<'_, Vec<RateState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `id` until `resume_at`. Ids from another pool are ignored.
    pub fn mark_limited(&self, id: CredentialId, resume_at: DateTime<Utc>) {
        if let Some(state) = self.states().get_mut(id.0) {
            state.blocked_until = Some(resume_at);
        }
    }

    /// Return `id` to the eligible set.
    pub fn mark_free(&self, id: CredentialId) {
        if let Some(state) = self.states().get_mut(id.0) {
            state.blocked_until = None;
        }
    }

    /// When `id` becomes eligible again, if it is parked.
    pub fn blocked_until(&self, id: CredentialId) -> Option<DateTime<Utc>> {
        self.states().get(id.0).and_then(|state| state.blocked_until)
    }

    /// Pick an eligible credential uniformly at random.
    ///
    /// Parks that have expired are cleared first. When nothing is eligible
    /// the credential with the soonest reset is returned as the error.
    fn select(&self) -> Result<CredentialId, (CredentialId, DateTime<Utc>)> {
        let now = self.clock.now();
        let mut states = self.states();

        for state in states.iter_mut() {
            if state.blocked_until.is_some_and(|until| until <= now) {
                state.blocked_until = None;
            }
        }

        let eligible: Vec<usize> = states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.blocked_until.is_none())
            .map(|(i, _)| i)
            .collect();
        if let Some(&index) = eligible.choose(&mut rand::rng()) {
            return Ok(CredentialId(index));
        }

        let soonest = states
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.blocked_until.map(|until| (i, until)))
            .min_by_key(|&(_, until)| until);
        match soonest {
            Some((index, until)) => Err((CredentialId(index), until)),
            None => Ok(CredentialId(0)),
        }
    }

    /// Get a credential to call with, sleeping if every one is parked.
    pub async fn acquire(&self) -> CredentialId {
        let (soonest, until) = match self.select() {
            Ok(id) => return id,
            Err(parked) => parked,
        };

        let wait = (until - self.clock.now()).to_std().unwrap_or_default();
        tracing::warn!(
            credentials = self.credentials.len(),
            resume_at = %until,
            wait_secs = wait.as_secs(),
            "All credentials rate limited, waiting"
        );
        emit(
            self.on_event.as_ref(),
            SyncEvent::WaitingForCredential {
                resume_at: until,
                wait_ms: wait.as_millis() as u64,
            },
        );
        tokio::time::sleep(wait).await;

        match self.select() {
            Ok(id) => id,
            Err(_) => {
                // Waited out the soonest reset; trust it over a lagging clock.
                self.mark_free(soonest);
                soonest
            }
        }
    }

    /// Run `op` on some credential, absorbing rate limits.
    ///
    /// Rate-limited responses park the credential and the call moves on to
    /// another; this loop only ends on success or on a failure of another
    /// class.
    async fn call_admitted(&self, op: &Operation) -> Result<Value, RemoteError> {
        loop {
            let id = self.acquire().await;
            let credential = &self.credentials[id.0];

            let failure = match self.api.call(credential, op).await {
                Ok(value) => {
                    self.mark_free(id);
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            match classify(&failure, self.clock.now()) {
                ErrorClass::RateLimited { resume_at } => {
                    tracing::warn!(
                        credential = %credential.name,
                        operation = op.name(),
                        resume_at = %resume_at,
                        "Credential rate limited"
                    );
                    self.mark_limited(id, resume_at);
                    emit(
                        self.on_event.as_ref(),
                        SyncEvent::CredentialLimited {
                            credential: credential.name.clone(),
                            resume_at,
                        },
                    );
                }
                ErrorClass::ServiceError => {
                    return Err(RemoteError::Service {
                        message: failure.message,
                        attempts: 1,
                    });
                }
                ErrorClass::NotFound => {
                    return Err(RemoteError::NotFound {
                        resource: op.resource(),
                    });
                }
                ErrorClass::Forbidden => {
                    return Err(RemoteError::Forbidden {
                        resource: op.resource(),
                    });
                }
                ErrorClass::Unclassified => {
                    return Err(RemoteError::Unclassified {
                        operation: op.name().to_string(),
                        status: failure.status,
                        api_code: failure.api_code,
                        message: failure.message,
                    });
                }
            }
        }
    }

    /// Execute one logical remote operation.
    ///
    /// Rate limits are never surfaced while at least one credential exists.
    /// Transient service failures are retried after `capacity_sleep`, at most
    /// `capacity_retries` times for this call. Everything else is returned
    /// as classified.
    pub async fn invoke(&self, op: &Operation) -> Result<Value, RemoteError> {
        let attempts = AtomicU32::new(0);
        let attempts_ref = &attempts;

        let call = move || async move {
            attempts_ref.fetch_add(1, Ordering::SeqCst);
            self.call_admitted(op).await
        };

        let result = call
            .retry(self.config.backoff())
            .notify(|err: &RemoteError, dur: Duration| {
                let attempt = attempts_ref.load(Ordering::SeqCst);
                tracing::warn!(
                    operation = op.name(),
                    attempt,
                    retry_in_secs = dur.as_secs(),
                    error = %err,
                    "Remote service unavailable, backing off"
                );
                emit(
                    self.on_event.as_ref(),
                    SyncEvent::CapacityBackoff {
                        operation: op.name().to_string(),
                        attempt,
                        retry_after_ms: dur.as_millis() as u64,
                    },
                );
            })
            .when(RemoteError::is_service)
            .await;

        result.map_err(|err| match err {
            RemoteError::Service { message, .. } => RemoteError::Service {
                message,
                attempts: attempts.load(Ordering::SeqCst),
            },
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chrono::TimeZone;
    use serde_json::json;

    use crate::remote::classify::CallFailure;
    use crate::remote::scripted::ScriptedApi;

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid timestamp")
    }

    fn op() -> Operation {
        Operation::FollowerIds {
            user_id: 1,
            cursor: -1,
        }
    }

    fn two_credentials() -> Vec<Credential> {
        vec![Credential::new("a", "ka", "sa"), Credential::new("b", "kb", "sb")]
    }

    fn fast_config() -> PoolConfig {
        PoolConfig {
            capacity_sleep: Duration::from_secs(900),
            capacity_retries: 3,
        }
    }

    #[test]
    fn empty_pool_is_rejected() {
        let err = CredentialPool::new(ScriptedApi::new(), Vec::new())
            .err()
            .expect("no credentials should error");
        assert!(matches!(err, RemoteError::NoCredentials));
    }

    #[test]
    fn foreign_ids_are_ignored() {
        let big = CredentialPool::new(ScriptedApi::new(), two_credentials()).expect("pool");
        let small = CredentialPool::new(ScriptedApi::new(), vec![Credential::new("a", "ka", "sa")])
            .expect("pool");
        let foreign = big.find("b").expect("b is in the larger pool");
        assert_eq!(foreign.index(), 1);
        assert_eq!(small.find("b"), None);

        small.mark_limited(foreign, start());
        small.mark_free(foreign);
        assert_eq!(small.blocked_until(foreign), None);
        assert!(small.credential(foreign).is_none());
        assert_eq!(small.credential(CredentialId(0)).map(|c| c.name.as_str()), Some("a"));
    }

    #[tokio::test]
    async fn limited_credential_is_skipped_until_reset() {
        let clock = Arc::new(ManualClock::new(start()));
        let pool = CredentialPool::new(ScriptedApi::new(), two_credentials())
            .expect("pool")
            .with_clock(clock.clone());

        pool.mark_limited(CredentialId(0), start() + chrono::Duration::seconds(100));
        for _ in 0..50 {
            assert_eq!(pool.acquire().await, CredentialId(1));
        }

        clock.advance(chrono::Duration::seconds(101));
        let mut seen = HashSet::new();
        for _ in 0..200 {
            seen.insert(pool.acquire().await);
        }
        assert_eq!(seen.len(), 2, "both credentials should be eligible again");
        assert_eq!(pool.blocked_until(CredentialId(0)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_sleeps_until_soonest_reset() {
        let clock = Arc::new(ManualClock::new(start()));
        let pool = CredentialPool::new(ScriptedApi::new(), two_credentials())
            .expect("pool")
            .with_clock(clock);

        pool.mark_limited(CredentialId(0), start() + chrono::Duration::seconds(300));
        pool.mark_limited(CredentialId(1), start() + chrono::Duration::seconds(60));

        let before = tokio::time::Instant::now();
        let id = pool.acquire().await;
        assert_eq!(id, CredentialId(1));
        assert!(before.elapsed() >= Duration::from_secs(60));
        assert!(pool.blocked_until(CredentialId(0)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_call_fails_over_to_other_credential() {
        let api = ScriptedApi::new();
        api.push_for(
            "a",
            op(),
            Err(CallFailure::http(429, Some(88), "limit").with_reset(1_700_000_100)),
        );
        api.push_for("b", op(), Ok(json!({ "ids": [1], "next_cursor": 0 })));

        let clock = Arc::new(ManualClock::new(start()));
        let pool = CredentialPool::new(api.clone(), two_credentials())
            .expect("pool")
            .with_clock(clock);
        // Only "a" is eligible for the first attempt.
        pool.mark_limited(CredentialId(1), start() + chrono::Duration::seconds(1));

        let value = pool.invoke(&op()).await.expect("call should succeed");

        assert_eq!(value["ids"], json!([1]));
        let callers: Vec<String> = api.calls().into_iter().map(|(name, _)| name).collect();
        assert_eq!(callers, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            pool.blocked_until(CredentialId(0)),
            Utc.timestamp_opt(1_700_000_100, 0).single()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn single_credential_waits_out_its_own_limit() {
        let api = ScriptedApi::new();
        api.push_for(
            "a",
            op(),
            Err(CallFailure::http(429, None, "limit").with_reset(1_700_000_100)),
        );
        api.push_for("a", op(), Ok(json!({ "ids": [5], "next_cursor": 0 })));

        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&events);
        let callback: EventCallback = Arc::new(move |event| {
            captured.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        });

        let pool = CredentialPool::new(api.clone(), vec![Credential::new("a", "k", "s")])
            .expect("pool")
            .with_clock(Arc::new(ManualClock::new(start())))
            .with_events(callback);

        let before = tokio::time::Instant::now();
        let value = pool.invoke(&op()).await.expect("call should succeed");
        assert_eq!(value["ids"], json!([5]));
        assert!(before.elapsed() >= Duration::from_secs(100));
        assert_eq!(api.calls().len(), 2);

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        assert!(events.iter().any(
            |e| matches!(e, SyncEvent::CredentialLimited { credential, .. } if credential == "a")
        ));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, SyncEvent::WaitingForCredential { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn service_errors_retry_then_surface() {
        let api = ScriptedApi::new();
        for _ in 0..10 {
            api.push(op(), Err(CallFailure::http(503, None, "over capacity")));
        }

        let pool = CredentialPool::new(api.clone(), two_credentials())
            .expect("pool")
            .with_config(fast_config());

        let before = tokio::time::Instant::now();
        let err = pool.invoke(&op()).await.expect_err("should give up");
        match err {
            RemoteError::Service { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.calls().len(), 4);
        assert!(before.elapsed() >= Duration::from_secs(3 * 900));
    }

    #[tokio::test(start_paused = true)]
    async fn service_error_recovers_within_budget() {
        let api = ScriptedApi::new();
        api.push(op(), Err(CallFailure::transport("connection reset")));
        api.push(op(), Ok(json!({ "ids": [9], "next_cursor": 0 })));

        let pool = CredentialPool::new(api.clone(), two_credentials())
            .expect("pool")
            .with_config(fast_config());

        let value = pool.invoke(&op()).await.expect("second attempt succeeds");
        assert_eq!(value["ids"], json!([9]));
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn not_found_surfaces_immediately() {
        let api = ScriptedApi::new();
        api.push(op(), Err(CallFailure::http(404, Some(34), "page does not exist")));

        let pool = CredentialPool::new(api.clone(), two_credentials()).expect("pool");
        let err = pool.invoke(&op()).await.expect_err("should fail");
        assert!(err.is_not_found());
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn unclassified_surfaces_with_details() {
        let api = ScriptedApi::new();
        api.push(op(), Err(CallFailure::http(400, Some(215), "bad auth")));

        let pool = CredentialPool::new(api, two_credentials()).expect("pool");
        match pool.invoke(&op()).await {
            Err(RemoteError::Unclassified {
                status, api_code, ..
            }) => {
                assert_eq!(status, Some(400));
                assert_eq!(api_code, Some(215));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
