//! Followgraph - follow-edge history for a social graph.
//!
//! Users are resolved from ids, handles, local tags or remote lists; each
//! user's followers or friends are then fetched through a pool of
//! rate-limited credentials and merged into slowly-changing edge history,
//! where every follow edge keeps the interval during which it was observed.
//!
//! # Features
//!
//! - `sqlite`, `postgres` - database backends.
//! - `migrate` - schema migrations and [`connect_and_migrate`].
//! - `test-util` - `remote::ScriptedApi`, an in-memory stand-in for the remote service.
//!
//! # Example
//!
//! ```ignore
//! use followgraph::job::{self, JobContext, ResolveOptions};
//! use followgraph::remote::{Credential, CredentialPool, HttpGraphApi, RemoteClient};
//! use followgraph::resolve::{ResolveMode, Target, TargetSpec};
//! use followgraph::sync::SyncOptions;
//! use followgraph::Direction;
//!
//! let db = followgraph::connect_and_migrate("sqlite://followgraph.db?mode=rwc").await?;
//! let api = HttpGraphApi::new(followgraph::remote::DEFAULT_BASE_URL, Duration::from_secs(30))?;
//! let client = RemoteClient::new(CredentialPool::new(api, credentials)?);
//!
//! let targets = [Target::new(TargetSpec::ScreenNames(vec!["jack".into()]), ResolveMode::Fetch)];
//! let report = job::follow_graph(
//!     &JobContext::new(&db, Some(&client)),
//!     &targets,
//!     &ResolveOptions::default(),
//!     SyncOptions::new(Direction::Friends),
//! )
//! .await?;
//! ```

pub mod db;
pub mod entity;
pub mod error;
pub mod job;
pub mod remote;
pub mod repository;
pub mod resolve;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use error::{Error, Result};
pub use repository::RepositoryError;
