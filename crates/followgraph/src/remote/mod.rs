//! Access to the remote social-graph service.
//!
//! Layered bottom-up:
//! - [`HttpTransport`] moves bytes; [`HttpGraphApi`] turns an [`Operation`]
//!   into an authenticated request for one [`Credential`].
//! - [`classify`] maps a raw [`CallFailure`] to an [`ErrorClass`].
//! - [`CredentialPool`] spreads calls over credentials, parks rate-limited
//!   ones and retries transient service failures.
//! - [`RemoteClient`] exposes one typed method per operation, with lookups
//!   batched and listings returned as lazy [`Pager`]s.

mod api;
mod classify;
mod client;
mod credential;
mod error;
pub mod http;
mod oauth1;
mod operation;
mod pager;
mod pool;
#[cfg(any(test, feature = "test-util"))]
mod scripted;
mod types;

pub use api::{DEFAULT_BASE_URL, GraphApi, HttpGraphApi, failure_from_response};
pub use classify::{CallFailure, DEFAULT_RATE_LIMIT_WINDOW, ErrorClass, classify};
pub use client::{LOOKUP_BATCH_SIZE, Lookup, RemoteClient};
pub use credential::Credential;
pub use error::{Classified, Outcome, RemoteError};
pub use http::{HttpError, HttpTransport, ReqwestTransport};
pub use operation::{FIRST_CURSOR, Operation};
pub use pager::{Page, PageToken, Pager};
pub use pool::{
    Clock, CredentialId, CredentialPool, DEFAULT_CAPACITY_RETRIES, DEFAULT_CAPACITY_SLEEP,
    ManualClock, PoolConfig, SystemClock,
};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedApi;
pub use types::{ListKey, RemoteList, RemoteUser};
