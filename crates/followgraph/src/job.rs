//! Runnable jobs composed from the resolver, the sync engine and storage.
//!
//! A [`JobContext`] carries the capabilities a job may need. Jobs that only
//! touch local data accept a context without a remote client.

use sea_orm::DatabaseConnection;

use crate::entity::tag;
use crate::error::{Error, Result};
use crate::remote::{GraphApi, RemoteClient, RemoteError};
use crate::repository::{self, RepositoryError};
use crate::resolve::{Resolution, ResolveMode, Target, TargetResolver};
use crate::sync::{EventCallback, GraphSyncEngine, SyncOptions, SyncReport};

/// How strictly a job treats targets that did not resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Continue when `skip`-mode targets are absent locally.
    pub allow_missing_targets: bool,
    /// Continue when the remote service does not know a target, and skip
    /// users that vanish during sync.
    pub allow_api_errors: bool,
}

/// Capabilities shared by every job.
pub struct JobContext<'a, A> {
    pub db: &'a DatabaseConnection,
    pub client: Option<&'a RemoteClient<A>>,
    pub on_event: Option<&'a EventCallback>,
}

impl<'a, A: GraphApi> JobContext<'a, A> {
    pub fn new(db: &'a DatabaseConnection, client: Option<&'a RemoteClient<A>>) -> Self {
        Self {
            db,
            client,
            on_event: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, on_event: Option<&'a EventCallback>) -> Self {
        self.on_event = on_event;
        self
    }

    fn client(&self) -> Result<&'a RemoteClient<A>> {
        self.client.ok_or(Error::Remote(RemoteError::NoCredentials))
    }

    /// Resolve targets and apply the leniency policy.
    pub async fn resolve(&self, targets: &[Target], options: &ResolveOptions) -> Result<Resolution> {
        let resolution = TargetResolver::new(self.db, self.client)
            .with_events(self.on_event)
            .resolve(targets)
            .await?;

        if !resolution.missing.is_empty() && !options.allow_missing_targets {
            return Err(Error::MissingTarget {
                targets: resolution.missing,
            });
        }
        if !resolution.bad.is_empty() && !options.allow_api_errors {
            return Err(Error::BadTarget {
                targets: resolution.bad,
            });
        }
        Ok(resolution)
    }
}

/// Resolve targets and sync their edges in `sync.direction`.
///
/// Vanished users abort the run unless `allow_api_errors` is set.
pub async fn follow_graph<A: GraphApi>(
    ctx: &JobContext<'_, A>,
    targets: &[Target],
    resolve: &ResolveOptions,
    sync: SyncOptions,
) -> Result<SyncReport> {
    let client = ctx.client()?;
    let resolution = ctx.resolve(targets, resolve).await?;

    let options = SyncOptions {
        strict: !resolve.allow_api_errors,
        ..sync
    };
    let report = GraphSyncEngine::new(ctx.db, client, options)
        .with_events(ctx.on_event)
        .sync_users(&resolution.user_ids())
        .await?;
    Ok(report)
}

/// Look up every target again and store fresh profiles.
pub async fn user_info<A: GraphApi>(
    ctx: &JobContext<'_, A>,
    targets: &[Target],
    resolve: &ResolveOptions,
) -> Result<Resolution> {
    ctx.client()?;
    let rehydrate: Vec<Target> = targets
        .iter()
        .map(|t| Target::new(t.spec.clone(), ResolveMode::Rehydrate))
        .collect();
    ctx.resolve(&rehydrate, resolve).await
}

pub async fn create_tag(db: &DatabaseConnection, name: &str) -> Result<tag::Model> {
    let tag = repository::tag::create_tag(db, name).await?;
    tracing::info!(tag = %tag.name, "Created tag");
    Ok(tag)
}

/// Delete a tag, returning how many users carried it.
pub async fn delete_tag(db: &DatabaseConnection, name: &str) -> Result<u64> {
    match repository::tag::delete_tag(db, name).await {
        Ok(removed) => {
            tracing::info!(tag = name, users = removed, "Deleted tag");
            Ok(removed)
        }
        Err(RepositoryError::NotFound { .. }) => Err(Error::BadTag {
            tag: name.to_string(),
        }),
        Err(err) => Err(err.into()),
    }
}

/// Outcome of applying a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagReport {
    pub tag: String,
    /// Users resolved from the targets.
    pub resolved: usize,
    /// Users that did not carry the tag before.
    pub newly_tagged: u64,
}

/// Resolve targets and tag every resulting user with `name`.
pub async fn apply_tag<A: GraphApi>(
    ctx: &JobContext<'_, A>,
    name: &str,
    targets: &[Target],
    resolve: &ResolveOptions,
) -> Result<TagReport> {
    let tag = repository::tag::find_by_name(ctx.db, name)
        .await?
        .ok_or_else(|| Error::BadTag {
            tag: name.to_string(),
        })?;

    let resolution = ctx.resolve(targets, resolve).await?;
    let ids = resolution.user_ids();
    let newly_tagged = repository::tag::apply_tag(ctx.db, tag.tag_id, &ids).await?;

    tracing::info!(tag = name, users = ids.len(), new = newly_tagged, "Applied tag");
    Ok(TagReport {
        tag: tag.name,
        resolved: ids.len(),
        newly_tagged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolve_options_are_strict() {
        let options = ResolveOptions::default();
        assert!(!options.allow_missing_targets);
        assert!(!options.allow_api_errors);
    }
}
