//! Edge sync: stage each user's current snapshot, then merge it into history.
//!
//! For every user the engine
//! 1. recreates the staging table,
//! 2. pages through the user's follower or friend ids, staging each page as
//!    `(source, target)` pairs,
//! 3. reconciles staging against open edges in one transaction, opening new
//!    edges and closing vanished ones.
//!
//! Users whose edges cannot be read (protected or deleted accounts) are
//! skipped without touching their history.
//!
//! # Example
//!
//! ```ignore
//! use followgraph::sync::{GraphSyncEngine, SyncOptions};
//! use followgraph::entity::Direction;
//!
//! let engine = GraphSyncEngine::new(&db, &client, SyncOptions::new(Direction::Friends));
//! let report = engine.sync_users(&[12, 13]).await?;
//! println!("{} edges opened", report.edges_inserted);
//! ```

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};

use super::error::SyncError;
use super::progress::{EventCallback, SyncEvent, emit};
use super::types::{SyncOptions, SyncReport};
use crate::remote::{Classified, GraphApi, Outcome, RemoteClient};
use crate::repository::{self, ReconcileCounts, RepositoryError};

/// Pairs staged for one user and duplicates dropped on the way.
#[derive(Debug, Default)]
struct Staged {
    pages: usize,
    pairs: usize,
    discarded: usize,
}

/// What happened to one user.
#[derive(Debug)]
pub enum UserSync {
    Reconciled(ReconcileCounts),
    Skipped { reason: String },
}

/// Ids in first-seen order with repeats removed.
fn dedupe(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Syncs follow edges for a set of users.
pub struct GraphSyncEngine<'a, A> {
    db: &'a DatabaseConnection,
    client: &'a RemoteClient<A>,
    options: SyncOptions,
    on_event: Option<&'a EventCallback>,
}

impl<'a, A: GraphApi> GraphSyncEngine<'a, A> {
    pub fn new(db: &'a DatabaseConnection, client: &'a RemoteClient<A>, options: SyncOptions) -> Self {
        Self {
            db,
            client,
            options,
            on_event: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, on_event: Option<&'a EventCallback>) -> Self {
        self.on_event = on_event;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Sync every user in turn.
    ///
    /// Stops at the first fatal error; users reconciled before it stay
    /// committed.
    pub async fn sync_users(&self, user_ids: &[i64]) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let total = user_ids.len();

        for (index, &user_id) in user_ids.iter().enumerate() {
            emit(
                self.on_event,
                SyncEvent::SyncingUser {
                    user_id,
                    direction: self.options.direction,
                    index: index + 1,
                    total,
                },
            );

            match self.sync_user_into(user_id, &mut report).await? {
                UserSync::Reconciled(counts) => {
                    report.users_processed += 1;
                    report.edges_inserted += counts.edges_opened;
                    report.edges_closed += counts.edges_closed;
                    report.users_inserted += counts.users_inserted;
                }
                UserSync::Skipped { reason } => {
                    report.users_skipped += 1;
                    emit(self.on_event, SyncEvent::UserSkipped { user_id, reason });
                }
            }
        }

        tracing::info!(
            direction = %self.options.direction,
            users = report.users_processed,
            skipped = report.users_skipped,
            opened = report.edges_inserted,
            closed = report.edges_closed,
            duplicates = report.duplicates_discarded,
            "Sync complete"
        );
        emit(
            self.on_event,
            SyncEvent::SyncComplete {
                users_processed: report.users_processed,
                users_skipped: report.users_skipped,
                edges_inserted: report.edges_inserted,
                edges_closed: report.edges_closed,
            },
        );
        Ok(report)
    }

    /// Sync a single user.
    pub async fn sync_user(&self, user_id: i64) -> Result<UserSync, SyncError> {
        let mut report = SyncReport::default();
        self.sync_user_into(user_id, &mut report).await
    }

    async fn sync_user_into(
        &self,
        user_id: i64,
        report: &mut SyncReport,
    ) -> Result<UserSync, SyncError> {
        let direction = self.options.direction;

        let staged = match self.stage(user_id, report).await? {
            Ok(staged) => staged,
            Err(reason) => {
                tracing::warn!(user_id, direction = %direction, reason = %reason, "Skipping user");
                return Ok(UserSync::Skipped { reason });
            }
        };
        tracing::debug!(
            user_id,
            pages = staged.pages,
            pairs = staged.pairs,
            discarded = staged.discarded,
            "Staged edges"
        );

        let counts = self.reconcile(user_id).await?;
        tracing::info!(
            user_id,
            direction = %direction,
            opened = counts.edges_opened,
            closed = counts.edges_closed,
            "Synced user"
        );
        emit(
            self.on_event,
            SyncEvent::Reconciled {
                user_id,
                direction,
                edges_inserted: counts.edges_opened,
                edges_closed: counts.edges_closed,
                users_inserted: counts.users_inserted,
            },
        );
        Ok(UserSync::Reconciled(counts))
    }

    /// Fill staging with the user's current edges.
    ///
    /// The inner `Err` carries the reason a user is skipped.
    async fn stage(
        &self,
        user_id: i64,
        report: &mut SyncReport,
    ) -> Result<Result<Staged, String>, SyncError> {
        let direction = self.options.direction;
        repository::clear_staging(self.db).await?;

        // Reconcile closes whatever is not staged, so the walk is never capped.
        let mut pager = self.client.edge_ids(direction, user_id);
        let mut staged = Staged::default();

        loop {
            let ids = match pager.next_page().await.classified()? {
                Outcome::Found(Some(ids)) => ids,
                Outcome::Found(None) => break,
                Outcome::NotFound { resource } if self.options.strict => {
                    return Err(SyncError::BadTarget { user_id, resource });
                }
                Outcome::NotFound { resource } => return Ok(Err(format!("not found: {resource}"))),
                Outcome::Forbidden { resource } => return Ok(Err(format!("forbidden: {resource}"))),
            };

            staged.pages += 1;
            let pairs: Vec<(i64, i64)> = dedupe(ids)
                .into_iter()
                .map(|observed| direction.pair(user_id, observed))
                .collect();

            for chunk in pairs.chunks(self.options.chunk_len()) {
                let discarded = self.insert_chunk(user_id, chunk).await?;
                staged.discarded += discarded;
                staged.pairs += chunk.len() - discarded;
            }

            emit(
                self.on_event,
                SyncEvent::FetchedPage {
                    user_id,
                    page: staged.pages,
                    count: pairs.len(),
                    total_so_far: staged.pairs,
                },
            );
        }

        report.duplicates_discarded += staged.discarded;
        Ok(Ok(staged))
    }

    /// Stage one chunk, returning how many rows were discarded.
    async fn insert_chunk(&self, user_id: i64, chunk: &[(i64, i64)]) -> Result<usize, SyncError> {
        let err = match repository::insert_staging_batch(self.db, chunk).await {
            Ok(_) => return Ok(0),
            Err(err) => err,
        };
        if !err.is_unique_violation() {
            return Err(err.into());
        }
        if !self.options.robust {
            return Err(SyncError::IntegrityViolation {
                user_id,
                message: err.to_string(),
            });
        }

        tracing::debug!(user_id, rows = chunk.len(), "Batch collided, staging row by row");
        let mut discarded = 0;
        for &(source_user_id, target_user_id) in chunk {
            match repository::insert_staging_row(self.db, source_user_id, target_user_id).await {
                Ok(()) => {}
                Err(err) if err.is_unique_violation() => {
                    tracing::warn!(
                        source_user_id,
                        target_user_id,
                        "Discarding duplicate edge"
                    );
                    emit(
                        self.on_event,
                        SyncEvent::DuplicateDiscarded {
                            source_user_id,
                            target_user_id,
                        },
                    );
                    discarded += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(discarded)
    }

    /// Merge staging into edge history in one transaction.
    ///
    /// The synced user gets a bare row too if it has none.
    async fn reconcile(&self, user_id: i64) -> Result<ReconcileCounts, SyncError> {
        let txn = self.db.begin().await?;
        let now = Utc::now().fixed_offset();

        let merged = async {
            let created = repository::upsert_user(&txn, user_id).await?;
            let mut counts =
                repository::reconcile_staged(&txn, self.options.direction, user_id, now).await?;
            counts.users_inserted += u64::from(created);
            Ok::<_, RepositoryError>(counts)
        }
        .await;

        match merged {
            Ok(counts) => {
                txn.commit().await?;
                Ok(counts)
            }
            Err(err) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::warn!(user_id, error = %rollback, "Rollback failed");
                }
                Err(err.into())
            }
        }
    }
}
