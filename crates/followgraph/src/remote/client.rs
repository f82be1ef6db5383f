//! One method per logical remote operation.

use std::collections::HashSet;

use super::api::GraphApi;
use super::error::RemoteError;
use super::operation::{FIRST_CURSOR, Operation};
use super::pager::{
    PageToken, Pager, decode_id_page, decode_member_page, decode_timeline_page,
};
use super::pool::CredentialPool;
use super::types::{ListKey, RemoteList, RemoteUser};
use crate::entity::Direction;

/// Most identifiers the service accepts in one lookup.
pub const LOOKUP_BATCH_SIZE: usize = 100;

/// Users a lookup returned, and the requested identifiers it silently
/// omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<K> {
    pub found: Vec<RemoteUser>,
    pub missing: Vec<K>,
}

impl<K> Default for Lookup<K> {
    fn default() -> Self {
        Self {
            found: Vec::new(),
            missing: Vec::new(),
        }
    }
}

fn cursor_of(token: Option<PageToken>) -> i64 {
    match token {
        Some(PageToken::Cursor(cursor)) => cursor,
        _ => FIRST_CURSOR,
    }
}

/// Typed access to the remote service through a [`CredentialPool`].
pub struct RemoteClient<A> {
    pool: CredentialPool<A>,
}

impl<A: GraphApi> RemoteClient<A> {
    pub fn new(pool: CredentialPool<A>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &CredentialPool<A> {
        &self.pool
    }

    /// Hydrate users by id, in batches of [`LOOKUP_BATCH_SIZE`].
    pub async fn lookup_users_by_id(&self, ids: &[i64]) -> Result<Lookup<i64>, RemoteError> {
        let mut lookup = Lookup::default();
        for batch in ids.chunks(LOOKUP_BATCH_SIZE) {
            let op = Operation::LookupUsers { ids: batch.to_vec() };
            let users = match self.lookup_batch(&op).await? {
                Some(users) => users,
                None => {
                    lookup.missing.extend_from_slice(batch);
                    continue;
                }
            };
            let returned: HashSet<i64> = users.iter().map(|u| u.id).collect();
            lookup
                .missing
                .extend(batch.iter().copied().filter(|id| !returned.contains(id)));
            lookup.found.extend(users);
        }
        Ok(lookup)
    }

    /// Hydrate users by handle, in batches of [`LOOKUP_BATCH_SIZE`].
    ///
    /// Handles match without regard to case.
    pub async fn lookup_users_by_handle(
        &self,
        handles: &[String],
    ) -> Result<Lookup<String>, RemoteError> {
        let mut lookup = Lookup::default();
        for batch in handles.chunks(LOOKUP_BATCH_SIZE) {
            let op = Operation::LookupHandles {
                handles: batch.to_vec(),
            };
            let users = match self.lookup_batch(&op).await? {
                Some(users) => users,
                None => {
                    lookup.missing.extend_from_slice(batch);
                    continue;
                }
            };
            let returned: HashSet<String> = users
                .iter()
                .filter_map(|u| u.screen_name.as_deref())
                .map(str::to_lowercase)
                .collect();
            lookup.missing.extend(
                batch
                    .iter()
                    .filter(|h| !returned.contains(&h.to_lowercase()))
                    .cloned(),
            );
            lookup.found.extend(users);
        }
        Ok(lookup)
    }

    /// `None` when the service found none of the batch.
    async fn lookup_batch(&self, op: &Operation) -> Result<Option<Vec<RemoteUser>>, RemoteError> {
        match self.pool.invoke(op).await {
            Ok(raw) => RemoteUser::many_from_json(raw)
                .map(Some)
                .map_err(|e| RemoteError::decode(op.name(), e)),
            Err(RemoteError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Ids of the accounts following `user_id`.
    pub fn follower_ids(&self, user_id: i64) -> Pager<'_, A, i64> {
        Pager::new(
            &self.pool,
            Box::new(move |token| Operation::FollowerIds {
                user_id,
                cursor: cursor_of(token),
            }),
            decode_id_page,
        )
    }

    /// Ids of the accounts `user_id` follows.
    pub fn friend_ids(&self, user_id: i64) -> Pager<'_, A, i64> {
        Pager::new(
            &self.pool,
            Box::new(move |token| Operation::FriendIds {
                user_id,
                cursor: cursor_of(token),
            }),
            decode_id_page,
        )
    }

    /// Ids on the far side of `user_id`'s edges in `direction`.
    pub fn edge_ids(&self, direction: Direction, user_id: i64) -> Pager<'_, A, i64> {
        match direction {
            Direction::Followers => self.follower_ids(user_id),
            Direction::Friends => self.friend_ids(user_id),
        }
    }

    /// A user's statuses, newest first.
    pub fn user_timeline(&self, user_id: i64) -> Pager<'_, A, serde_json::Value> {
        Pager::new(
            &self.pool,
            Box::new(move |token| Operation::UserTimeline {
                user_id,
                max_id: match token {
                    Some(PageToken::MaxId(max_id)) => Some(max_id),
                    _ => None,
                },
            }),
            decode_timeline_page,
        )
    }

    /// Members of a list.
    pub fn list_members(&self, list: &ListKey) -> Pager<'_, A, RemoteUser> {
        let list = list.clone();
        Pager::new(
            &self.pool,
            Box::new(move |token| Operation::ListMembers {
                list: list.clone(),
                cursor: cursor_of(token),
            }),
            decode_member_page,
        )
    }

    /// A list's metadata.
    pub async fn get_list(&self, list: &ListKey) -> Result<RemoteList, RemoteError> {
        let op = Operation::ListShow { list: list.clone() };
        let raw = self.pool.invoke(&op).await?;
        RemoteList::from_json(raw).map_err(|e| RemoteError::decode(op.name(), e))
    }
}
