//! In-memory [`GraphApi`] driven by scripted responses.
//!
//! No sockets and no clock: each call is answered from, in order,
//! 1. a one-shot queue for the calling credential and operation,
//! 2. a one-shot queue for the operation on any credential,
//! 3. a sticky response for the operation,
//! 4. the user directory, for lookups.
//!
//! Anything else fails with an unclassified 400 naming the operation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::api::GraphApi;
use super::classify::CallFailure;
use super::credential::Credential;
use super::operation::{FIRST_CURSOR, Operation};

type Scripted = Result<Value, CallFailure>;

/// Scriptable stand-in for the remote service.
#[derive(Clone, Default)]
pub struct ScriptedApi {
    inner: Arc<Mutex<ScriptedInner>>,
}

#[derive(Default)]
struct ScriptedInner {
    per_credential: HashMap<(String, Operation), VecDeque<Scripted>>,
    queued: HashMap<Operation, VecDeque<Scripted>>,
    sticky: HashMap<Operation, Scripted>,
    users: Vec<Value>,
    calls: Vec<(String, Operation)>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, ScriptedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer the next `op` from any credential with `result`.
    pub fn push(&self, op: Operation, result: Scripted) {
        self.inner().queued.entry(op).or_default().push_back(result);
    }

    /// Answer the next `op` from credential `name` with `result`.
    pub fn push_for(&self, name: &str, op: Operation, result: Scripted) {
        self.inner()
            .per_credential
            .entry((name.to_string(), op))
            .or_default()
            .push_back(result);
    }

    /// Answer every `op` not otherwise scripted with `result`.
    pub fn set(&self, op: Operation, result: Scripted) {
        self.inner().sticky.insert(op, result);
    }

    /// Make a user object available to lookups by id and by handle.
    pub fn add_user(&self, user: Value) {
        self.inner().users.push(user);
    }

    /// Script a user's follower ids as a chain of cursored pages.
    pub fn set_follower_pages(&self, user_id: i64, pages: Vec<Vec<i64>>) {
        self.set_id_pages(pages, |cursor| Operation::FollowerIds { user_id, cursor });
    }

    /// Script the ids a user follows as a chain of cursored pages.
    pub fn set_friend_pages(&self, user_id: i64, pages: Vec<Vec<i64>>) {
        self.set_id_pages(pages, |cursor| Operation::FriendIds { user_id, cursor });
    }

    fn set_id_pages(&self, pages: Vec<Vec<i64>>, op: impl Fn(i64) -> Operation) {
        let last = pages.len().saturating_sub(1);
        let mut cursor = FIRST_CURSOR;
        let mut inner = self.inner();
        if pages.is_empty() {
            inner.sticky.insert(op(cursor), Ok(json!({ "ids": [], "next_cursor": 0 })));
            return;
        }
        for (index, ids) in pages.into_iter().enumerate() {
            let next = if index == last { 0 } else { index as i64 + 1 };
            inner
                .sticky
                .insert(op(cursor), Ok(json!({ "ids": ids, "next_cursor": next })));
            cursor = next;
        }
    }

    /// Every call made so far, as `(credential name, operation)`.
    pub fn calls(&self) -> Vec<(String, Operation)> {
        self.inner().calls.clone()
    }

    fn lookup(users: &[Value], op: &Operation) -> Option<Scripted> {
        let found: Vec<Value> = match op {
            Operation::LookupUsers { ids } => users
                .iter()
                .filter(|u| u["id"].as_i64().is_some_and(|id| ids.contains(&id)))
                .cloned()
                .collect(),
            Operation::LookupHandles { handles } => users
                .iter()
                .filter(|u| {
                    u["screen_name"].as_str().is_some_and(|name| {
                        handles.iter().any(|h| h.eq_ignore_ascii_case(name))
                    })
                })
                .cloned()
                .collect(),
            _ => return None,
        };

        if found.is_empty() {
            Some(Err(CallFailure::http(404, Some(17), "No user matches for specified terms.")))
        } else {
            Some(Ok(Value::Array(found)))
        }
    }
}

#[async_trait]
impl GraphApi for ScriptedApi {
    async fn call(&self, credential: &Credential, op: &Operation) -> Result<Value, CallFailure> {
        let mut inner = self.inner();
        inner.calls.push((credential.name.clone(), op.clone()));

        let key = (credential.name.clone(), op.clone());
        if let Some(result) = inner.per_credential.get_mut(&key).and_then(VecDeque::pop_front) {
            return result;
        }
        if let Some(result) = inner.queued.get_mut(op).and_then(VecDeque::pop_front) {
            return result;
        }
        if let Some(result) = inner.sticky.get(op) {
            return result.clone();
        }
        if let Some(result) = Self::lookup(&inner.users, op) {
            return result;
        }

        Err(CallFailure::http(
            400,
            None,
            format!("no scripted response for {op}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred() -> Credential {
        Credential::new("a", "k", "s")
    }

    #[tokio::test]
    async fn id_pages_chain_through_cursors() {
        let api = ScriptedApi::new();
        api.set_follower_pages(1, vec![vec![10, 11], vec![12]]);

        let first = api
            .call(&cred(), &Operation::FollowerIds { user_id: 1, cursor: -1 })
            .await
            .expect("first page");
        assert_eq!(first["next_cursor"], json!(1));

        let second = api
            .call(&cred(), &Operation::FollowerIds { user_id: 1, cursor: 1 })
            .await
            .expect("second page");
        assert_eq!(second["ids"], json!([12]));
        assert_eq!(second["next_cursor"], json!(0));
    }

    #[tokio::test]
    async fn lookups_omit_unknown_users() {
        let api = ScriptedApi::new();
        api.add_user(json!({ "id": 1, "screen_name": "Alice" }));

        let found = api
            .call(&cred(), &Operation::LookupHandles { handles: vec!["alice".into(), "bob".into()] })
            .await
            .expect("lookup");
        assert_eq!(found.as_array().map(Vec::len), Some(1));

        let none = api
            .call(&cred(), &Operation::LookupUsers { ids: vec![2] })
            .await
            .expect_err("nobody matches");
        assert_eq!(none.api_code, Some(17));
    }

    #[tokio::test]
    async fn one_shot_responses_take_priority_over_sticky() {
        let api = ScriptedApi::new();
        let op = Operation::FriendIds { user_id: 1, cursor: -1 };
        api.set(op.clone(), Ok(json!("sticky")));
        api.push(op.clone(), Ok(json!("once")));

        assert_eq!(api.call(&cred(), &op).await.expect("once"), json!("once"));
        assert_eq!(api.call(&cred(), &op).await.expect("sticky"), json!("sticky"));
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn unscripted_calls_fail_unclassified() {
        let api = ScriptedApi::new();
        let err = api
            .call(&cred(), &Operation::UserTimeline { user_id: 1, max_id: None })
            .await
            .expect_err("nothing scripted");
        assert_eq!(err.status, Some(400));
        assert!(err.message.contains("statuses/user_timeline"));
    }
}
