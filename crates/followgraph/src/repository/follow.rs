use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entity::direction::Direction;
use crate::entity::follow::{self, ActiveModel, Column, Entity as Follow, Model};
use crate::entity::{stg_follow, user};

use super::errors::Result;

/// Row counts produced by one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileCounts {
    /// Endpoint users that had no `user` row yet.
    pub users_inserted: u64,
    /// Staged pairs that had no open edge.
    pub edges_opened: u64,
    /// Open edges on the user's side that were absent from staging.
    pub edges_closed: u64,
}

impl ReconcileCounts {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.edges_opened == 0 && self.edges_closed == 0
    }
}

// ─── Single edges ────────────────────────────────────────────────────────────

/// Open a new version of `source -> target` starting at `at`.
///
/// Fails with a unique violation if the pair already has an open row.
pub async fn open_edge<C: ConnectionTrait>(
    db: &C,
    source_user_id: i64,
    target_user_id: i64,
    at: DateTimeWithTimeZone,
) -> Result<Model> {
    let model = ActiveModel {
        source_user_id: Set(source_user_id),
        target_user_id: Set(target_user_id),
        valid_start: Set(at),
        valid_end: Set(None),
        ..Default::default()
    };
    Ok(model.insert(db).await?)
}

/// Close the open version of `source -> target`, if any.
///
/// Returns `true` if a row was closed.
pub async fn close_edge<C: ConnectionTrait>(
    db: &C,
    source_user_id: i64,
    target_user_id: i64,
    at: DateTimeWithTimeZone,
) -> Result<bool> {
    let result = Follow::update_many()
        .col_expr(Column::ValidEnd, Expr::value(at))
        .filter(Column::SourceUserId.eq(source_user_id))
        .filter(Column::TargetUserId.eq(target_user_id))
        .filter(Column::ValidEnd.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// List the open edges on `user_id`'s side of `direction`.
pub async fn list_open_edges<C: ConnectionTrait>(
    db: &C,
    direction: Direction,
    user_id: i64,
) -> Result<Vec<Model>> {
    Ok(Follow::find()
        .filter(direction.user_column().eq(user_id))
        .filter(Column::ValidEnd.is_null())
        .order_by_asc(Column::SourceUserId)
        .order_by_asc(Column::TargetUserId)
        .all(db)
        .await?)
}

/// Every version of `source -> target`, oldest first.
pub async fn edge_history<C: ConnectionTrait>(
    db: &C,
    source_user_id: i64,
    target_user_id: i64,
) -> Result<Vec<Model>> {
    Ok(Follow::find()
        .filter(Column::SourceUserId.eq(source_user_id))
        .filter(Column::TargetUserId.eq(target_user_id))
        .order_by_asc(Column::ValidStart)
        .order_by_asc(Column::FollowId)
        .all(db)
        .await?)
}

/// Count open edges across the whole graph.
pub async fn count_open<C: ConnectionTrait>(db: &C) -> Result<u64> {
    Ok(Follow::find()
        .filter(Column::ValidEnd.is_null())
        .count(db)
        .await?)
}

// ─── Reconcile ───────────────────────────────────────────────────────────────

/// `SELECT 1 FROM follow WHERE open AND pair = staged pair`, correlated on
/// the outer `stg_follow` row.
fn open_edge_for_staged_pair() -> SelectStatement {
    Query::select()
        .expr(Expr::val(1))
        .from(Follow)
        .and_where(Expr::col((Follow, Column::ValidEnd)).is_null())
        .and_where(
            Expr::col((Follow, Column::SourceUserId))
                .equals((stg_follow::Entity, stg_follow::Column::SourceUserId)),
        )
        .and_where(
            Expr::col((Follow, Column::TargetUserId))
                .equals((stg_follow::Entity, stg_follow::Column::TargetUserId)),
        )
        .to_owned()
}

/// `SELECT 1 FROM stg_follow WHERE pair = follow pair`, correlated on the
/// outer `follow` row.
fn staged_pair_for_edge() -> SelectStatement {
    Query::select()
        .expr(Expr::val(1))
        .from(stg_follow::Entity)
        .and_where(
            Expr::col((stg_follow::Entity, stg_follow::Column::SourceUserId))
                .equals((Follow, Column::SourceUserId)),
        )
        .and_where(
            Expr::col((stg_follow::Entity, stg_follow::Column::TargetUserId))
                .equals((Follow, Column::TargetUserId)),
        )
        .to_owned()
}

/// Merge the staged snapshot for `user_id` into edge history.
///
/// Runs three set-based statements against the staging table:
/// 1. insert a bare `user` row for every observed id that has none,
/// 2. open an edge at `at` for every staged pair without an open edge,
/// 3. close at `at` every open edge on the user's side of `direction` whose
///    pair is not staged.
///
/// Pairs present both in staging and as open edges are untouched, so their
/// `valid_start` survives. Callers run this inside a transaction.
pub async fn reconcile_staged<C: ConnectionTrait>(
    db: &C,
    direction: Direction,
    user_id: i64,
    at: DateTimeWithTimeZone,
) -> Result<ReconcileCounts> {
    let backend = db.get_database_backend();
    let observed = direction.staged_observed_column();

    let unknown_endpoints = Query::select()
        .distinct()
        .column((stg_follow::Entity, observed))
        .expr(Expr::val(at))
        .expr(Expr::val(at))
        .from(stg_follow::Entity)
        .and_where(
            Expr::exists(
                Query::select()
                    .expr(Expr::val(1))
                    .from(user::Entity)
                    .and_where(
                        Expr::col((user::Entity, user::Column::UserId))
                            .equals((stg_follow::Entity, observed)),
                    )
                    .to_owned(),
            )
            .not(),
        )
        .to_owned();
    let insert_users = Query::insert()
        .into_table(user::Entity)
        .columns([
            user::Column::UserId,
            user::Column::CreatedAt,
            user::Column::ModifiedAt,
        ])
        .select_from(unknown_endpoints)?
        .to_owned();
    let users_inserted = db.execute(backend.build(&insert_users)).await?.rows_affected();

    let new_pairs = Query::select()
        .column((stg_follow::Entity, stg_follow::Column::SourceUserId))
        .column((stg_follow::Entity, stg_follow::Column::TargetUserId))
        .expr(Expr::val(at))
        .from(stg_follow::Entity)
        .and_where(Expr::exists(open_edge_for_staged_pair()).not())
        .to_owned();
    let insert_edges = Query::insert()
        .into_table(Follow)
        .columns([
            Column::SourceUserId,
            Column::TargetUserId,
            Column::ValidStart,
        ])
        .select_from(new_pairs)?
        .to_owned();
    let edges_opened = db.execute(backend.build(&insert_edges)).await?.rows_affected();

    let edges_closed = Follow::update_many()
        .col_expr(Column::ValidEnd, Expr::value(at))
        .filter(Column::ValidEnd.is_null())
        .filter(direction.user_column().eq(user_id))
        .filter(Expr::exists(staged_pair_for_edge()).not())
        .exec(db)
        .await?
        .rows_affected;

    tracing::debug!(
        user_id,
        direction = %direction,
        users_inserted,
        edges_opened,
        edges_closed,
        "Reconciled staged edges"
    );

    Ok(ReconcileCounts {
        users_inserted,
        edges_opened,
        edges_closed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, QueryTrait};

    #[test]
    fn close_statement_correlates_on_both_columns() {
        let sql = Follow::update_many()
            .col_expr(Column::ValidEnd, Expr::value(chrono::Utc::now().fixed_offset()))
            .filter(Column::ValidEnd.is_null())
            .filter(Direction::Followers.user_column().eq(7))
            .filter(Expr::exists(staged_pair_for_edge()).not())
            .build(DatabaseBackend::Sqlite)
            .to_string();

        assert!(sql.contains("NOT") && sql.contains("EXISTS"), "{sql}");
        assert!(
            sql.contains("\"stg_follow\".\"source_user_id\" = \"follow\".\"source_user_id\""),
            "{sql}"
        );
        assert!(sql.contains("\"target_user_id\" = 7"), "{sql}");
    }

    #[test]
    fn reconcile_counts_noop_ignores_user_inserts() {
        let counts = ReconcileCounts {
            users_inserted: 3,
            ..Default::default()
        };
        assert!(counts.is_noop());
        assert!(
            !ReconcileCounts {
                edges_closed: 1,
                ..Default::default()
            }
            .is_noop()
        );
    }
}
