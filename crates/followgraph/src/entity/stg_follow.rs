//! Staging entity - the latest full snapshot of one user's edges.
//!
//! The table is dropped and recreated from this definition before each user
//! is processed, so it only ever holds pairs from a single fetch.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "stg_follow")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_user_id: i64,

    #[sea_orm(primary_key, auto_increment = false)]
    pub target_user_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
