//! Wire types for remote-service responses.

use sea_orm::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::user;

/// A user object as returned by lookups and list-membership pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: i64,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub protected: Option<bool>,
    #[serde(default)]
    pub followers_count: Option<i64>,
    #[serde(default)]
    pub friends_count: Option<i64>,
    /// The full payload the fields above were read from.
    #[serde(skip)]
    pub raw: Value,
}

impl RemoteUser {
    /// Parse one user object, keeping the raw payload.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let mut parsed: RemoteUser = serde_json::from_value(value.clone())?;
        parsed.raw = value;
        Ok(parsed)
    }

    /// Parse an array of user objects.
    pub fn many_from_json(value: Value) -> Result<Vec<Self>, serde_json::Error> {
        let items: Vec<Value> = serde_json::from_value(value)?;
        items.into_iter().map(Self::from_json).collect()
    }

    /// Convert into an active model for a profile upsert.
    pub fn to_active_model(&self, now: DateTimeWithTimeZone) -> user::ActiveModel {
        user::ActiveModel {
            user_id: Set(self.id),
            screen_name: Set(self.screen_name.clone()),
            display_name: Set(self.name.clone()),
            protected: Set(self.protected),
            followers_count: Set(self.followers_count),
            friends_count: Set(self.friends_count),
            api_response: Set(Some(self.raw.clone())),
            created_at: Set(now),
            modified_at: Set(now),
        }
    }
}

/// One page of a cursored id listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdPage {
    pub ids: Vec<i64>,
    #[serde(default)]
    pub next_cursor: i64,
}

/// One page of list members.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberPage {
    pub users: Vec<Value>,
    #[serde(default)]
    pub next_cursor: i64,
}

/// Identifies a remote list by its owner's id and the list slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub owner_id: i64,
    pub slug: String,
}

impl ListKey {
    pub fn new(owner_id: i64, slug: impl Into<String>) -> Self {
        Self {
            owner_id,
            slug: slug.into(),
        }
    }
}

/// List metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteList {
    pub id: i64,
    pub slug: String,
    pub name: Option<String>,
    pub member_count: Option<i64>,
    pub owner: RemoteUser,
}

#[derive(Deserialize)]
struct ListWire {
    id: i64,
    slug: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    member_count: Option<i64>,
    user: Value,
}

impl RemoteList {
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let wire: ListWire = serde_json::from_value(value)?;
        Ok(Self {
            id: wire.id,
            slug: wire.slug,
            name: wire.name,
            member_count: wire.member_count,
            owner: RemoteUser::from_json(wire.user)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_keeps_raw_payload() {
        let payload = json!({
            "id": 12,
            "screen_name": "jack",
            "name": "Jack",
            "followers_count": 10,
            "verified": true
        });
        let user = RemoteUser::from_json(payload.clone()).expect("parses");
        assert_eq!(user.id, 12);
        assert_eq!(user.screen_name.as_deref(), Some("jack"));
        assert_eq!(user.protected, None);
        assert_eq!(user.raw, payload);
    }

    #[test]
    fn id_page_missing_cursor_means_last_page() {
        let page: IdPage = serde_json::from_value(json!({ "ids": [1, 2] })).expect("parses");
        assert_eq!(page.next_cursor, 0);
    }

    #[test]
    fn list_owner_is_parsed() {
        let list = RemoteList::from_json(json!({
            "id": 99,
            "slug": "press",
            "member_count": 3,
            "user": { "id": 7, "screen_name": "owner" }
        }))
        .expect("parses");
        assert_eq!(list.owner.id, 7);
        assert_eq!(list.slug, "press");
    }

    #[test]
    fn active_model_carries_profile_fields() {
        let now = chrono::Utc::now().fixed_offset();
        let user = RemoteUser::from_json(json!({ "id": 3, "protected": true })).expect("parses");
        let model = user.to_active_model(now);
        assert_eq!(model.user_id, Set(3));
        assert_eq!(model.protected, Set(Some(true)));
        assert_eq!(model.created_at, Set(now));
    }
}
