//! Observable events for resolution and sync runs.
//!
//! Components never print. They hand [`SyncEvent`]s to an optional
//! [`EventCallback`]; the CLI turns them into log lines and tests collect them.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::entity::Direction;

/// Events emitted while resolving targets and syncing edges.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SyncEvent {
    /// Every credential is rate limited; the pool is sleeping.
    WaitingForCredential {
        /// When the soonest credential becomes usable again.
        resume_at: DateTime<Utc>,
        /// How long the pool will sleep (ms).
        wait_ms: u64,
    },

    /// A credential hit its rate limit and was parked.
    CredentialLimited {
        /// Name of the parked credential.
        credential: String,
        resume_at: DateTime<Utc>,
    },

    /// The service failed transiently; backing off before retrying.
    CapacityBackoff {
        operation: String,
        /// Attempts made so far for this call.
        attempt: u32,
        retry_after_ms: u64,
    },

    /// Starting to resolve target specifications.
    ResolvingTargets {
        /// Number of specifications.
        specs: usize,
    },

    /// A target could not be used and was left out.
    TargetSkipped { target: String, reason: String },

    /// Target resolution finished.
    TargetsResolved {
        users: usize,
        missing: usize,
        bad: usize,
    },

    /// Starting to sync one user's edges.
    SyncingUser {
        user_id: i64,
        direction: Direction,
        /// Position in this run (1-indexed).
        index: usize,
        total: usize,
    },

    /// Staged one page of a user's edges.
    FetchedPage {
        user_id: i64,
        /// Page number (1-indexed).
        page: usize,
        count: usize,
        total_so_far: usize,
    },

    /// A staged pair collided with one already staged and was dropped.
    DuplicateDiscarded {
        source_user_id: i64,
        target_user_id: i64,
    },

    /// A user's staged snapshot was merged into edge history.
    Reconciled {
        user_id: i64,
        direction: Direction,
        edges_inserted: u64,
        edges_closed: u64,
        users_inserted: u64,
    },

    /// A user's edges could not be fetched and were left untouched.
    UserSkipped { user_id: i64, reason: String },

    /// The sync run finished.
    SyncComplete {
        users_processed: usize,
        users_skipped: usize,
        edges_inserted: u64,
        edges_closed: u64,
    },
}

/// Receiver for [`SyncEvent`]s, shareable between the pool and the engine.
pub type EventCallback = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Deliver `event` if a callback is installed.
#[inline]
pub fn emit(on_event: Option<&EventCallback>, event: SyncEvent) {
    if let Some(cb) = on_event {
        cb(event);
    }
}

/// A callback that appends every event to a shared vector.
///
/// ```ignore
/// let (events, on_event) = followgraph::sync::collecting_callback();
/// engine.with_events(on_event).sync_users(&[42]).await?;
/// assert!(!events.lock().unwrap().is_empty());
/// ```
pub fn collecting_callback() -> (Arc<std::sync::Mutex<Vec<SyncEvent>>>, EventCallback) {
    let events = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let callback: EventCallback = Arc::new(move |event| {
        sink.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    });
    (events, callback)
}
