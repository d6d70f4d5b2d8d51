//! Revision Content Provider
//!
//! Abstraction over the version-controlled content store. A provider hands out
//! immutable [`Snapshot`]s of the tracked files at one revision and answers the
//! cheap "has the store moved on?" question asked on every request.

pub mod git;
pub mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::plugin::error::{PluginError, PluginResult};

pub use git::GitContentProvider;
pub use memory::MemoryContentProvider;

/// Which state of the repository content is served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RevisionSelector {
    /// Committed tip of the checked out branch
    #[default]
    Default,
    /// Tracked files as they currently are in the working tree
    WorkingDir,
}

impl FromStr for RevisionSelector {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" | "head" => Ok(RevisionSelector::Default),
            "working-dir" | "working_dir" | "workdir" => Ok(RevisionSelector::WorkingDir),
            _ => Err(PluginError::invalid_revision_selector(s)),
        }
    }
}

impl fmt::Display for RevisionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionSelector::Default => write!(f, "default"),
            RevisionSelector::WorkingDir => write!(f, "working-dir"),
        }
    }
}

/// Opaque, comparable revision token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RevisionId(String);

impl RevisionId {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes and metadata of one tracked file
#[derive(Debug, Clone)]
pub struct FileContent {
    pub data: Vec<u8>,
    pub mtime: DateTime<Utc>,
    pub size: u64,
}

/// Backend that dereferences paths of one snapshot
pub trait SnapshotSource: Send + Sync {
    fn read(&self, path: &str) -> PluginResult<FileContent>;
}

/// Immutable view of the content store at one revision
pub struct Snapshot {
    revision: RevisionId,
    paths: Vec<String>,
    source: Arc<dyn SnapshotSource>,
}

impl Snapshot {
    /// Create a snapshot; paths are sorted and deduplicated
    pub fn new(revision: RevisionId, mut paths: Vec<String>, source: Arc<dyn SnapshotSource>) -> Self {
        paths.sort();
        paths.dedup();
        Self { revision, paths, source }
    }

    pub fn revision(&self) -> &RevisionId {
        &self.revision
    }

    /// Tracked paths in enumeration order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.binary_search_by(|p| p.as_str().cmp(path)).is_ok()
    }

    /// Dereference a tracked path to its bytes and metadata
    pub fn read(&self, path: &str) -> PluginResult<FileContent> {
        if !self.contains(path) {
            return Err(PluginError::file_not_tracked(path, self.revision.as_str()));
        }
        self.source.read(path)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("revision", &self.revision)
            .field("paths", &self.paths.len())
            .finish()
    }
}

/// Source of snapshots for the load pass
pub trait ContentProvider: Send + Sync {
    /// Take a fresh snapshot of the store
    fn current_snapshot(&self) -> PluginResult<Arc<Snapshot>>;

    /// Cheap check whether `snapshot` is out of date; evaluated on the request path
    fn needs_reload(&self, snapshot: &Snapshot) -> bool;

    /// Human readable description for logs and status output
    fn describe(&self) -> String;
}
