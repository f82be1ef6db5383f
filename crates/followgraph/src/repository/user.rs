use std::collections::HashSet;

use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};

use crate::entity::user::{ActiveModel, Column, Entity as User, Model};

use super::errors::Result;

/// Upper bound on bound parameters per `IN (...)` query.
const LOOKUP_CHUNK: usize = 500;

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Find a user by its external id.
pub async fn find_by_id<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<Option<Model>> {
    Ok(User::find_by_id(user_id).one(db).await?)
}

/// Find every persisted user among `ids`. Order is unspecified.
pub async fn find_by_ids<C: ConnectionTrait>(db: &C, ids: &[i64]) -> Result<Vec<Model>> {
    let mut found = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let rows = User::find()
            .filter(Column::UserId.is_in(chunk.iter().copied()))
            .all(db)
            .await?;
        found.extend(rows);
    }
    Ok(found)
}

/// Find every persisted user whose handle matches one of `names`,
/// ignoring case.
pub async fn find_by_screen_names<C: ConnectionTrait>(
    db: &C,
    names: &[String],
) -> Result<Vec<Model>> {
    let lowered: Vec<String> = names
        .iter()
        .map(|n| n.to_lowercase())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut found = Vec::with_capacity(lowered.len());
    for chunk in lowered.chunks(LOOKUP_CHUNK) {
        let rows = User::find()
            .filter(Expr::expr(Func::lower(Expr::col(Column::ScreenName))).is_in(chunk.iter().cloned()))
            .all(db)
            .await?;
        found.extend(rows);
    }
    Ok(found)
}

/// Count all persisted users.
pub async fn count<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(User::find().count(db).await?)
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Ensure a bare row exists for `user_id`. Existing rows are left untouched.
///
/// Returns `true` if a row was created.
pub async fn upsert_user<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<bool> {
    let now = chrono::Utc::now().fixed_offset();
    let model = ActiveModel {
        user_id: Set(user_id),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    };

    let inserted = User::insert(model)
        .on_conflict(OnConflict::column(Column::UserId).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;
    Ok(inserted > 0)
}

/// Conflict clause for profile upserts: refresh every profile column but
/// keep the original `created_at`.
pub(super) fn profile_on_conflict() -> OnConflict {
    OnConflict::column(Column::UserId)
        .update_columns([
            Column::ScreenName,
            Column::DisplayName,
            Column::Protected,
            Column::FollowersCount,
            Column::FriendsCount,
            Column::ApiResponse,
            Column::ModifiedAt,
        ])
        .to_owned()
}

/// Insert or refresh users with profile data from a lookup.
///
/// Returns the number of rows written.
pub async fn upsert_profiles<C: ConnectionTrait>(
    db: &C,
    models: Vec<ActiveModel>,
) -> Result<u64> {
    if models.is_empty() {
        return Ok(0);
    }

    let written = User::insert_many(models)
        .on_conflict(profile_on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(written)
}
