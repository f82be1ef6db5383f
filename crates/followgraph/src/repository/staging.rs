use sea_orm::sea_query::Table;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, QueryOrder, Schema, Set};

use crate::entity::stg_follow::{ActiveModel, Column, Entity as StgFollow};

use super::errors::Result;

/// Drop and recreate the staging table.
///
/// Recreating rather than deleting rows keeps the table small on backends
/// that do not reclaim space on `DELETE`.
pub async fn clear_staging<C: ConnectionTrait>(db: &C) -> Result<()> {
    let backend = db.get_database_backend();

    let drop = Table::drop().table(StgFollow).if_exists().to_owned();
    db.execute(backend.build(&drop)).await?;

    let create = Schema::new(backend).create_table_from_entity(StgFollow);
    db.execute(backend.build(&create)).await?;

    Ok(())
}

fn staged(source_user_id: i64, target_user_id: i64) -> ActiveModel {
    ActiveModel {
        source_user_id: Set(source_user_id),
        target_user_id: Set(target_user_id),
    }
}

/// Insert `rows` as one statement.
///
/// The statement is atomic: if any pair is already staged the whole batch
/// fails with a unique violation and nothing is written.
pub async fn insert_staging_batch<C: ConnectionTrait>(db: &C, rows: &[(i64, i64)]) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let written = StgFollow::insert_many(rows.iter().map(|&(s, t)| staged(s, t)))
        .exec_without_returning(db)
        .await?;
    Ok(written)
}

/// Insert a single staged pair.
pub async fn insert_staging_row<C: ConnectionTrait>(
    db: &C,
    source_user_id: i64,
    target_user_id: i64,
) -> Result<()> {
    StgFollow::insert(staged(source_user_id, target_user_id))
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Every staged pair, ordered by `(source, target)`.
pub async fn staging_pairs<C: ConnectionTrait>(db: &C) -> Result<Vec<(i64, i64)>> {
    let rows = StgFollow::find()
        .order_by_asc(Column::SourceUserId)
        .order_by_asc(Column::TargetUserId)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.source_user_id, r.target_user_id))
        .collect())
}

pub async fn count_staged<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(StgFollow::find().count(db).await?)
}
