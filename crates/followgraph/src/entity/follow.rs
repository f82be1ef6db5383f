//! Follow entity - one version of a "source follows target" relationship.
//!
//! History is kept as a type 2 slowly changing dimension: a row with
//! `valid_end = NULL` is the relationship as currently believed, and closing
//! it records when the relationship was last seen to stop. Rows are never
//! deleted. At most one open row exists per `(source_user_id, target_user_id)`,
//! enforced by a partial unique index created in the schema migration.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub follow_id: i64,

    /// The follower.
    pub source_user_id: i64,

    /// The account being followed.
    pub target_user_id: i64,

    /// First sync in which the edge was observed.
    pub valid_start: DateTimeWithTimeZone,

    /// Sync in which the edge was found missing, or `None` while open.
    pub valid_end: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SourceUserId",
        to = "super::user::Column::UserId"
    )]
    Source,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TargetUserId",
        to = "super::user::Column::UserId"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_open(&self) -> bool {
        self.valid_end.is_none()
    }

    pub fn pair(&self) -> (i64, i64) {
        (self.source_user_id, self.target_user_id)
    }
}
