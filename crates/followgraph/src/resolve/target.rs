//! Target specifications and resolution modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a target is turned into persisted users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveMode {
    /// Look up users not yet stored; keep stored ones as they are.
    #[default]
    Fetch,
    /// Look up every user again, refreshing stored profiles.
    Rehydrate,
    /// Use stored users only; leave out the rest.
    Skip,
    /// Use stored users only; fail if any is absent.
    Raise,
}

impl ResolveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolveMode::Fetch => "fetch",
            ResolveMode::Rehydrate => "rehydrate",
            ResolveMode::Skip => "skip",
            ResolveMode::Raise => "raise",
        }
    }

    /// Whether this mode may call the remote service for users.
    pub fn is_remote(self) -> bool {
        matches!(self, ResolveMode::Fetch | ResolveMode::Rehydrate)
    }
}

impl fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseTargetError {
    #[error("unknown resolve mode {0:?} (expected fetch, rehydrate, skip or raise)")]
    Mode(String),
    #[error("invalid list reference {0:?} (expected owner/slug)")]
    List(String),
}

impl FromStr for ResolveMode {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fetch" => Ok(ResolveMode::Fetch),
            "rehydrate" => Ok(ResolveMode::Rehydrate),
            "skip" | "skip_missing" => Ok(ResolveMode::Skip),
            "raise" | "existing" => Ok(ResolveMode::Raise),
            _ => Err(ParseTargetError::Mode(s.to_string())),
        }
    }
}

/// A remote list named by its owner's handle and its slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListRef {
    pub owner: String,
    pub slug: String,
}

impl ListRef {
    pub fn new(owner: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            slug: slug.into(),
        }
    }
}

impl fmt::Display for ListRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

impl FromStr for ListRef {
    type Err = ParseTargetError;

    /// Parse `owner/slug`; a leading `@` on the owner is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, slug) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| ParseTargetError::List(s.to_string()))?;
        let owner = owner.trim_start_matches('@');
        if owner.is_empty() || slug.is_empty() || slug.contains('/') {
            return Err(ParseTargetError::List(s.to_string()));
        }
        Ok(ListRef::new(owner, slug))
    }
}

/// A group of users to operate on, named one of four ways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    UserIds(Vec<i64>),
    ScreenNames(Vec<String>),
    /// Names of locally stored tags.
    Tags(Vec<String>),
    /// Members of remote lists.
    Lists(Vec<ListRef>),
}

impl TargetSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            TargetSpec::UserIds(_) => "user ids",
            TargetSpec::ScreenNames(_) => "screen names",
            TargetSpec::Tags(_) => "tags",
            TargetSpec::Lists(_) => "lists",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TargetSpec::UserIds(v) => v.len(),
            TargetSpec::ScreenNames(v) => v.len(),
            TargetSpec::Tags(v) => v.len(),
            TargetSpec::Lists(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A specification paired with the mode it resolves under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub spec: TargetSpec,
    pub mode: ResolveMode,
}

impl Target {
    pub fn new(spec: TargetSpec, mode: ResolveMode) -> Self {
        Self { spec, mode }
    }
}
