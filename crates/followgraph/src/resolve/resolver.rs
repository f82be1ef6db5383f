use std::collections::HashSet;

use chrono::Utc;
use rand::seq::SliceRandom;
use sea_orm::DatabaseConnection;

use super::error::ResolveError;
use super::target::{ListRef, ResolveMode, Target, TargetSpec};
use crate::entity::user;
use crate::remote::{Classified, GraphApi, ListKey, Outcome, RemoteClient, RemoteError, RemoteUser};
use crate::repository::{self, tag as tags, user as users};
use crate::sync::{EventCallback, SyncEvent, emit};

/// Users a set of targets resolved to, plus what could not be used.
#[derive(Debug, Default, Clone)]
pub struct Resolution {
    /// Distinct users, in random order.
    pub users: Vec<user::Model>,
    /// Targets absent locally that the mode did not allow fetching.
    pub missing: Vec<String>,
    /// Targets the remote service does not know.
    pub bad: Vec<String>,
}

impl Resolution {
    pub fn user_ids(&self) -> Vec<i64> {
        self.users.iter().map(|u| u.user_id).collect()
    }

    fn finish(&mut self) {
        let mut seen = HashSet::with_capacity(self.users.len());
        self.users.retain(|u| seen.insert(u.user_id));
        self.users.shuffle(&mut rand::rng());
    }
}

fn handle_label(handle: &str) -> String {
    format!("@{handle}")
}

fn list_label(list: &ListRef) -> String {
    format!("list {list}")
}

/// Distinct ids in random order.
fn shuffled_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    let mut out: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    out.shuffle(&mut rand::rng());
    out
}

/// Handles with any leading `@` removed, distinct ignoring case, in random order.
fn shuffled_handles(handles: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(handles.len());
    let mut out: Vec<String> = handles
        .iter()
        .map(|h| h.trim().trim_start_matches('@').to_string())
        .filter(|h| !h.is_empty() && seen.insert(h.to_lowercase()))
        .collect();
    out.shuffle(&mut rand::rng());
    out
}

/// Turns [`Target`]s into persisted users.
///
/// The remote client is only needed for modes and specs that look users up;
/// resolving stored users and tags works without one.
pub struct TargetResolver<'a, A> {
    db: &'a DatabaseConnection,
    client: Option<&'a RemoteClient<A>>,
    on_event: Option<&'a EventCallback>,
}

impl<'a, A: GraphApi> TargetResolver<'a, A> {
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

    fn client(&self) -> Result<&'a RemoteClient<A>, ResolveError> {
        self.client
            .ok_or(ResolveError::Remote(RemoteError::NoCredentials))
    }

    /// Resolve every target.
    ///
    /// Mode and `raise` checks run first, so a failing `raise` target aborts
    /// before any remote call is made.
    pub async fn resolve(&self, targets: &[Target]) -> Result<Resolution, ResolveError> {
        emit(
            self.on_event,
            SyncEvent::ResolvingTargets {
                specs: targets.len(),
            },
        );
        self.check(targets).await?;

        let mut out = Resolution::default();
        for target in targets {
            match &target.spec {
                TargetSpec::UserIds(ids) => self.resolve_ids(ids, target.mode, &mut out).await?,
                TargetSpec::ScreenNames(handles) => {
                    self.resolve_handles(handles, target.mode, &mut out).await?
                }
                TargetSpec::Tags(names) => self.resolve_tags(names, target.mode, &mut out).await?,
                TargetSpec::Lists(lists) => self.resolve_lists(lists, target.mode, &mut out).await?,
            }
        }
        out.finish();

        tracing::info!(
            users = out.users.len(),
            missing = out.missing.len(),
            bad = out.bad.len(),
            "Resolved targets"
        );
        emit(
            self.on_event,
            SyncEvent::TargetsResolved {
                users: out.users.len(),
                missing: out.missing.len(),
                bad: out.bad.len(),
            },
        );
        Ok(out)
    }

    /// Local-only validation of modes, tags and `raise` targets.
    async fn check(&self, targets: &[Target]) -> Result<(), ResolveError> {
        let mut missing = Vec::new();

        for target in targets {
            let mode = target.mode;
            match &target.spec {
                TargetSpec::Tags(_) if mode == ResolveMode::Fetch => {
                    return Err(ResolveError::InvalidMode {
                        kind: target.spec.kind(),
                        mode,
                    });
                }
                TargetSpec::Tags(names) if mode != ResolveMode::Skip => {
                    let known: HashSet<String> = tags::find_by_names(self.db, names)
                        .await?
                        .into_iter()
                        .map(|t| t.name)
                        .collect();
                    if let Some(tag) = names.iter().find(|n| !known.contains(*n)) {
                        return Err(ResolveError::BadTag { tag: tag.clone() });
                    }
                }
                TargetSpec::UserIds(ids) if mode == ResolveMode::Raise => {
                    let stored: HashSet<i64> = users::find_by_ids(self.db, ids)
                        .await?
                        .into_iter()
                        .map(|u| u.user_id)
                        .collect();
                    missing.extend(
                        ids.iter()
                            .filter(|id| !stored.contains(id))
                            .map(i64::to_string),
                    );
                }
                TargetSpec::ScreenNames(handles) if mode == ResolveMode::Raise => {
                    let handles = shuffled_handles(handles);
                    let stored = self.stored_handles(&handles).await?;
                    missing.extend(
                        handles
                            .iter()
                            .filter(|h| !stored.contains(&h.to_lowercase()))
                            .map(|h| handle_label(h)),
                    );
                }
                TargetSpec::Lists(lists) if mode == ResolveMode::Raise => {
                    let owners: Vec<String> = lists.iter().map(|l| l.owner.clone()).collect();
                    let stored = self.stored_handles(&owners).await?;
                    missing.extend(
                        lists
                            .iter()
                            .filter(|l| !stored.contains(&l.owner.to_lowercase()))
                            .map(list_label),
                    );
                }
                _ => {}
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            missing.dedup();
            Err(ResolveError::MissingTarget { targets: missing })
        }
    }

    async fn stored_handles(&self, handles: &[String]) -> Result<HashSet<String>, ResolveError> {
        Ok(users::find_by_screen_names(self.db, handles)
            .await?
            .into_iter()
            .filter_map(|u| u.screen_name)
            .map(|h| h.to_lowercase())
            .collect())
    }

    fn mark_missing(&self, target: String, out: &mut Resolution) {
        tracing::warn!(target = %target, "Target not in database, skipping");
        emit(
            self.on_event,
            SyncEvent::TargetSkipped {
                target: target.clone(),
                reason: "not in database".to_string(),
            },
        );
        out.missing.push(target);
    }

    fn mark_bad(&self, target: String, reason: &str, out: &mut Resolution) {
        tracing::warn!(target = %target, reason, "Bad target");
        emit(
            self.on_event,
            SyncEvent::TargetSkipped {
                target: target.clone(),
                reason: reason.to_string(),
            },
        );
        out.bad.push(target);
    }

    /// Upsert looked-up profiles and read the stored rows back.
    async fn persist(&self, found: Vec<RemoteUser>) -> Result<Vec<user::Model>, ResolveError> {
        if found.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now().fixed_offset();
        let ids: Vec<i64> = found.iter().map(|u| u.id).collect();
        let models = found.iter().map(|u| u.to_active_model(now)).collect();

        let written = repository::upsert_profiles(self.db, models).await?;
        tracing::debug!(written, "Stored user profiles");
        Ok(users::find_by_ids(self.db, &ids).await?)
    }

    async fn fetch_ids(&self, ids: &[i64], out: &mut Resolution) -> Result<Vec<user::Model>, ResolveError> {
        let lookup = self.client()?.lookup_users_by_id(ids).await?;
        for id in lookup.missing {
            self.mark_bad(id.to_string(), "unknown to remote service", out);
        }
        self.persist(lookup.found).await
    }

    async fn fetch_handles(
        &self,
        handles: &[String],
        out: &mut Resolution,
    ) -> Result<Vec<user::Model>, ResolveError> {
        let lookup = self.client()?.lookup_users_by_handle(handles).await?;
        for handle in lookup.missing {
            self.mark_bad(handle_label(&handle), "unknown to remote service", out);
        }
        self.persist(lookup.found).await
    }

    async fn resolve_ids(
        &self,
        ids: &[i64],
        mode: ResolveMode,
        out: &mut Resolution,
    ) -> Result<(), ResolveError> {
        let ids = shuffled_ids(ids);
        if mode == ResolveMode::Rehydrate {
            let fetched = self.fetch_ids(&ids, out).await?;
            out.users.extend(fetched);
            return Ok(());
        }

        let stored = users::find_by_ids(self.db, &ids).await?;
        let stored_ids: HashSet<i64> = stored.iter().map(|u| u.user_id).collect();
        let absent: Vec<i64> = ids.into_iter().filter(|id| !stored_ids.contains(id)).collect();
        out.users.extend(stored);

        if absent.is_empty() {
            return Ok(());
        }
        if mode == ResolveMode::Fetch {
            let fetched = self.fetch_ids(&absent, out).await?;
            out.users.extend(fetched);
        } else {
            for id in absent {
                self.mark_missing(id.to_string(), out);
            }
        }
        Ok(())
    }

    async fn resolve_handles(
        &self,
        handles: &[String],
        mode: ResolveMode,
        out: &mut Resolution,
    ) -> Result<(), ResolveError> {
        let handles = shuffled_handles(handles);
        if mode == ResolveMode::Rehydrate {
            let fetched = self.fetch_handles(&handles, out).await?;
            out.users.extend(fetched);
            return Ok(());
        }

        let stored = users::find_by_screen_names(self.db, &handles).await?;
        let stored_handles: HashSet<String> = stored
            .iter()
            .filter_map(|u| u.screen_name.as_deref())
            .map(str::to_lowercase)
            .collect();
        let absent: Vec<String> = handles
            .into_iter()
            .filter(|h| !stored_handles.contains(&h.to_lowercase()))
            .collect();
        out.users.extend(stored);

        if absent.is_empty() {
            return Ok(());
        }
        if mode == ResolveMode::Fetch {
            let fetched = self.fetch_handles(&absent, out).await?;
            out.users.extend(fetched);
        } else {
            for handle in absent {
                self.mark_missing(handle_label(&handle), out);
            }
        }
        Ok(())
    }

    async fn resolve_tags(
        &self,
        names: &[String],
        mode: ResolveMode,
        out: &mut Resolution,
    ) -> Result<(), ResolveError> {
        let found = tags::find_by_names(self.db, names).await?;
        let known: HashSet<&str> = found.iter().map(|t| t.name.as_str()).collect();
        for name in names.iter().filter(|n| !known.contains(n.as_str())) {
            if mode != ResolveMode::Skip {
                return Err(ResolveError::BadTag { tag: name.clone() });
            }
            self.mark_missing(format!("tag {name}"), out);
        }

        let tag_ids: Vec<_> = found.iter().map(|t| t.tag_id).collect();
        let members = tags::users_with_tags(self.db, &tag_ids).await?;
        tracing::debug!(tags = found.len(), users = members.len(), "Resolved tags");

        if mode == ResolveMode::Rehydrate {
            let ids: Vec<i64> = members.iter().map(|u| u.user_id).collect();
            let fetched = self.fetch_ids(&ids, out).await?;
            out.users.extend(fetched);
        } else {
            out.users.extend(members);
        }
        Ok(())
    }

    async fn resolve_lists(
        &self,
        lists: &[ListRef],
        mode: ResolveMode,
        out: &mut Resolution,
    ) -> Result<(), ResolveError> {
        for list in lists {
            let Some(owner_id) = self.list_owner(list, mode, out).await? else {
                continue;
            };
            let client = self.client()?;
            let key = ListKey::new(owner_id, &list.slug);

            match client.get_list(&key).await.classified()? {
                Outcome::Found(meta) => {
                    tracing::debug!(list = %list, list_id = meta.id, members = ?meta.member_count, "Fetching list members");
                }
                Outcome::NotFound { .. } => {
                    self.mark_bad(list_label(list), "list not found", out);
                    continue;
                }
                Outcome::Forbidden { .. } => {
                    self.mark_bad(list_label(list), "list not accessible", out);
                    continue;
                }
            }

            let members = match client.list_members(&key).collect_all().await.classified()? {
                Outcome::Found(members) => members,
                Outcome::NotFound { .. } | Outcome::Forbidden { .. } => {
                    self.mark_bad(list_label(list), "members not accessible", out);
                    continue;
                }
            };
            let stored = self.persist(members).await?;
            out.users.extend(stored);
        }
        Ok(())
    }

    /// The list owner's id, looked up remotely when the mode allows it.
    async fn list_owner(
        &self,
        list: &ListRef,
        mode: ResolveMode,
        out: &mut Resolution,
    ) -> Result<Option<i64>, ResolveError> {
        let handle = vec![list.owner.clone()];
        if mode != ResolveMode::Rehydrate {
            if let Some(owner) = users::find_by_screen_names(self.db, &handle).await?.first() {
                return Ok(Some(owner.user_id));
            }
            if !mode.is_remote() {
                self.mark_missing(list_label(list), out);
                return Ok(None);
            }
        }

        let owner = self.fetch_handles(&handle, out).await?;
        Ok(owner.first().map(|u| u.user_id))
    }
}
