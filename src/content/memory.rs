//! In-memory content store
//!
//! Used by tests and by embedders that keep site content outside git. Every
//! mutation bumps the revision counter.

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use super::{ContentProvider, FileContent, RevisionId, Snapshot, SnapshotSource};
use crate::plugin::error::{PluginError, PluginResult};

#[derive(Clone)]
struct StoredFile {
    data: Arc<Vec<u8>>,
    mtime: DateTime<Utc>,
}

struct MemoryState {
    revision: u64,
    files: BTreeMap<String, StoredFile>,
}

/// Content provider backed by a map of path -> bytes
pub struct MemoryContentProvider {
    state: RwLock<MemoryState>,
}

impl MemoryContentProvider {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState { revision: 0, files: BTreeMap::new() }),
        }
    }

    /// Build a provider from `(path, content)` pairs as a single revision
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: AsRef<[u8]>,
    {
        let provider = Self::new();
        {
            let mut state = provider.state.write();
            for (path, content) in files {
                state.files.insert(path.into(), StoredFile {
                    data: Arc::new(content.as_ref().to_vec()),
                    mtime: Utc::now(),
                });
            }
            state.revision = 1;
        }
        provider
    }

    /// Add or replace a file, producing a new revision
    pub fn put<P: Into<String>, C: AsRef<[u8]>>(&self, path: P, content: C) -> RevisionId {
        let mut state = self.state.write();
        state.files.insert(path.into(), StoredFile {
            data: Arc::new(content.as_ref().to_vec()),
            mtime: Utc::now(),
        });
        state.revision += 1;
        Self::revision_id(state.revision)
    }

    /// Remove a file, producing a new revision when it existed
    pub fn remove(&self, path: &str) -> RevisionId {
        let mut state = self.state.write();
        if state.files.remove(path).is_some() {
            state.revision += 1;
        }
        Self::revision_id(state.revision)
    }

    pub fn revision(&self) -> RevisionId {
        Self::revision_id(self.state.read().revision)
    }

    fn revision_id(counter: u64) -> RevisionId {
        RevisionId::new(format!("memory:{}", counter))
    }
}

impl Default for MemoryContentProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen copy of the file map; shares file bytes with the provider
struct MemorySnapshotSource {
    files: BTreeMap<String, StoredFile>,
}

impl SnapshotSource for MemorySnapshotSource {
    fn read(&self, path: &str) -> PluginResult<FileContent> {
        let file = self.files.get(path)
            .ok_or_else(|| PluginError::module_not_found(path))?;
        Ok(FileContent {
            data: file.data.as_ref().clone(),
            mtime: file.mtime,
            size: file.data.len() as u64,
        })
    }
}

impl ContentProvider for MemoryContentProvider {
    fn current_snapshot(&self) -> PluginResult<Arc<Snapshot>> {
        let state = self.state.read();
        let source = MemorySnapshotSource { files: state.files.clone() };
        let paths = state.files.keys().cloned().collect();
        Ok(Arc::new(Snapshot::new(Self::revision_id(state.revision), paths, Arc::new(source))))
    }

    fn needs_reload(&self, snapshot: &Snapshot) -> bool {
        snapshot.revision().as_str() != Self::revision_id(self.state.read().revision).as_str()
    }

    fn describe(&self) -> String {
        format!("memory store ({} files)", self.state.read().files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_frozen() {
        let provider = MemoryContentProvider::with_files([("plugins/a.rhai", "let a = 1;")]);
        let snapshot = provider.current_snapshot().unwrap();
        assert!(!provider.needs_reload(&snapshot));

        provider.put("plugins/a.rhai", "let a = 2;");
        provider.put("plugins/b.rhai", "let b = 1;");
        assert!(provider.needs_reload(&snapshot));

        // old snapshot still sees the old content and file list
        assert_eq!(snapshot.read("plugins/a.rhai").unwrap().data, b"let a = 1;");
        assert!(!snapshot.contains("plugins/b.rhai"));

        let fresh = provider.current_snapshot().unwrap();
        assert_eq!(fresh.read("plugins/a.rhai").unwrap().data, b"let a = 2;");
        assert_eq!(fresh.paths().len(), 2);
    }

    #[test]
    fn test_remove_missing_file_keeps_revision() {
        let provider = MemoryContentProvider::with_files([("a", "1")]);
        let before = provider.revision();
        assert_eq!(provider.remove("missing"), before);
        assert_ne!(provider.remove("a"), before);
    }
}
