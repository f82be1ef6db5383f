//! Follow-edge sync.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncOptions`, `SyncReport`
//! - [`progress`] - `SyncEvent`, `EventCallback`, `emit()`
//! - [`engine`] - `GraphSyncEngine`: stage, then reconcile per user

pub mod engine;
mod error;
mod progress;
mod types;

pub use engine::{GraphSyncEngine, UserSync};
pub use error::SyncError;
pub use progress::{EventCallback, SyncEvent, collecting_callback, emit};
pub use types::{Direction, SyncOptions, SyncReport};
