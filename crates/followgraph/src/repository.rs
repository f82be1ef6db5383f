//! Storage operations over the followgraph schema.
//!
//! Every function is generic over [`sea_orm::ConnectionTrait`] so it runs
//! equally against a pooled connection or inside a transaction.

pub mod follow;
pub mod staging;
pub mod tag;
pub mod user;

mod errors;

pub use errors::{RepositoryError, Result};
pub use follow::{
    ReconcileCounts, close_edge, count_open, edge_history, list_open_edges, open_edge,
    reconcile_staged,
};
pub use staging::{
    clear_staging, count_staged, insert_staging_batch, insert_staging_row, staging_pairs,
};
pub use user::{find_by_screen_names, upsert_profiles, upsert_user};
