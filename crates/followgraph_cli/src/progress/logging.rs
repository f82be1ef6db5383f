use followgraph::sync::SyncEvent;

/// Logging reporter using tracing for structured output.
#[derive(Debug, Default)]
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncEvent) {
        match event {
            SyncEvent::WaitingForCredential { resume_at, wait_ms } => {
                tracing::warn!(resume_at = %resume_at, wait_ms, "All credentials rate limited, waiting");
            }

            SyncEvent::CredentialLimited {
                credential,
                resume_at,
            } => {
                tracing::debug!(credential = %credential, resume_at = %resume_at, "Credential rate limited");
            }

            SyncEvent::CapacityBackoff {
                operation,
                attempt,
                retry_after_ms,
            } => {
                tracing::warn!(
                    operation = %operation,
                    attempt,
                    retry_after_ms,
                    "Service over capacity, backing off"
                );
            }

            SyncEvent::ResolvingTargets { specs } => {
                tracing::debug!(specs, "Resolving targets");
            }

            SyncEvent::TargetSkipped { target, reason } => {
                tracing::warn!(target = %target, reason = %reason, "Skipped target");
            }

            SyncEvent::TargetsResolved {
                users,
                missing,
                bad,
            } => {
                tracing::info!(users, missing, bad, "Targets resolved");
            }

            SyncEvent::SyncingUser {
                user_id,
                direction,
                index,
                total,
            } => {
                tracing::info!(user_id, direction = %direction, "Syncing user {}/{}", index, total);
            }

            SyncEvent::FetchedPage {
                user_id,
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(user_id, page, count, total_so_far, "Fetched page");
            }

            SyncEvent::DuplicateDiscarded {
                source_user_id,
                target_user_id,
            } => {
                tracing::warn!(source_user_id, target_user_id, "Discarded duplicate edge");
            }

            SyncEvent::Reconciled {
                user_id,
                direction,
                edges_inserted,
                edges_closed,
                users_inserted,
            } => {
                tracing::info!(
                    user_id,
                    direction = %direction,
                    edges_inserted,
                    edges_closed,
                    users_inserted,
                    "Reconciled"
                );
            }

            SyncEvent::UserSkipped { user_id, reason } => {
                tracing::warn!(user_id, reason = %reason, "Skipped user");
            }

            SyncEvent::SyncComplete {
                users_processed,
                users_skipped,
                edges_inserted,
                edges_closed,
            } => {
                tracing::info!(
                    users_processed,
                    users_skipped,
                    edges_inserted,
                    edges_closed,
                    "Sync complete"
                );
            }

            _ => {}
        }
    }
}
