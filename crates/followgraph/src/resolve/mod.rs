//! Resolving target specifications into persisted users.
//!
//! | mode | absent locally | present locally |
//! |---|---|---|
//! | `fetch` | look up, store, include | include |
//! | `rehydrate` | look up, store, include | look up again, store, include |
//! | `skip` | report as missing | include |
//! | `raise` | fail with `MissingTarget` | include |

mod error;
mod resolver;
mod target;

pub use error::ResolveError;
pub use resolver::{Resolution, TargetResolver};
pub use target::{ListRef, ParseTargetError, ResolveMode, Target, TargetSpec};
