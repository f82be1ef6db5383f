//! User entity - an account on the remote service, keyed by its numeric id.
//!
//! Rows are created the first time a user is observed, either through target
//! resolution or as the far endpoint of a follow edge. Profile columns are
//! filled in by the most recent lookup and stay empty for bare endpoints.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    /// External numeric identifier assigned by the remote service.
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,

    /// Handle as last reported by the service. Matched case-insensitively.
    pub screen_name: Option<String>,

    pub display_name: Option<String>,

    /// Whether the account's graph is hidden from non-followers.
    pub protected: Option<bool>,

    pub followers_count: Option<i64>,

    pub friends_count: Option<i64>,

    /// Raw lookup payload, kept for fields without a dedicated column.
    #[sea_orm(column_type = "Json", nullable)]
    pub api_response: Option<Json>,

    pub created_at: DateTimeWithTimeZone,

    pub modified_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_tag::Entity")]
    UserTags,
}

impl Related<super::user_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserTags.def()
    }
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::user_tag::Relation::Tag.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::user_tag::Relation::User.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Human-readable label used in log lines: the handle when known,
    /// otherwise the numeric id.
    pub fn label(&self) -> String {
        match &self.screen_name {
            Some(name) => format!("@{name}"),
            None => self.user_id.to_string(),
        }
    }
}
