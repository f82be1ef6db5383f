//! Descriptors for every remote operation the client can issue.
//!
//! The credential pool is generic over these descriptors: it hands one to
//! the per-credential [`GraphApi`](super::GraphApi) and gets raw JSON back,
//! so adding an operation never touches retry or failover logic.

use std::fmt;

use super::types::ListKey;

/// Sentinel cursor that requests the first page.
pub const FIRST_CURSOR: i64 = -1;

/// A single remote request, named and fully parameterized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Hydrate up to 100 users by id.
    LookupUsers { ids: Vec<i64> },
    /// Hydrate up to 100 users by handle.
    LookupHandles { handles: Vec<String> },
    /// One page of a user's follower ids.
    FollowerIds { user_id: i64, cursor: i64 },
    /// One page of the ids a user follows.
    FriendIds { user_id: i64, cursor: i64 },
    /// One page of a user's timeline, newest first, at or below `max_id`.
    UserTimeline { user_id: i64, max_id: Option<i64> },
    /// One page of a list's members.
    ListMembers { list: ListKey, cursor: i64 },
    /// A list's metadata.
    ListShow { list: ListKey },
}

impl Operation {
    /// Stable operation name, matching the endpoint path.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Operation::LookupUsers { .. } | Operation::LookupHandles { .. } => "users/lookup",
            Operation::FollowerIds { .. } => "followers/ids",
            Operation::FriendIds { .. } => "friends/ids",
            Operation::UserTimeline { .. } => "statuses/user_timeline",
            Operation::ListMembers { .. } => "lists/members",
            Operation::ListShow { .. } => "lists/show",
        }
    }

    /// The resource this operation is about, for error messages.
    #[must_use]
    pub fn resource(&self) -> String {
        match self {
            Operation::LookupUsers { ids } => format!("users {ids:?}"),
            Operation::LookupHandles { handles } => format!("users {handles:?}"),
            Operation::FollowerIds { user_id, .. }
            | Operation::FriendIds { user_id, .. }
            | Operation::UserTimeline { user_id, .. } => format!("user {user_id}"),
            Operation::ListMembers { list, .. } | Operation::ListShow { list } => {
                format!("list {}/{}", list.owner_id, list.slug)
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.resource())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_operation_and_resource() {
        let op = Operation::FollowerIds {
            user_id: 42,
            cursor: FIRST_CURSOR,
        };
        assert_eq!(op.to_string(), "followers/ids (user 42)");

        let list = Operation::ListShow {
            list: ListKey::new(7, "press"),
        };
        assert_eq!(list.resource(), "list 7/press");
    }
}
