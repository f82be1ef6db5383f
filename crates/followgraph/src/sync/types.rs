//! Options and results for edge sync runs.

pub use crate::entity::Direction;

/// How a sync run fetches and stages edges.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Which side of each user's edges to sync.
    pub direction: Direction,
    /// Retry failed staging batches row by row, discarding duplicates.
    pub robust: bool,
    /// Split each fetched page into staging inserts of at most this many rows.
    pub batch_size: Option<usize>,
    /// Abort with [`SyncError::BadTarget`](super::SyncError::BadTarget) when a
    /// user no longer exists instead of skipping it.
    pub strict: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Followers,
            robust: false,
            batch_size: None,
            strict: false,
        }
    }
}

impl SyncOptions {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    /// Staging chunk length; zero or unset means whole pages.
    pub(crate) fn chunk_len(&self) -> usize {
        self.batch_size.filter(|&n| n > 0).unwrap_or(usize::MAX)
    }
}

/// Totals for one sync run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Users whose snapshot was reconciled.
    pub users_processed: usize,
    /// Users left untouched because their edges could not be fetched.
    pub users_skipped: usize,
    pub edges_inserted: u64,
    pub edges_closed: u64,
    /// Bare users created for edge endpoints.
    pub users_inserted: u64,
    pub duplicates_discarded: usize,
}

impl SyncReport {
    pub fn has_changes(&self) -> bool {
        self.edges_inserted > 0 || self.edges_closed > 0 || self.users_inserted > 0
    }
}
