use git2::{ErrorCode, ObjectType, Oid, Repository, Sort, TreeWalkMode, TreeWalkResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use log::{debug, warn};
use super::{ContentProvider, FileContent, RevisionId, RevisionSelector, Snapshot, SnapshotSource};
use crate::plugin::error::{PluginError, PluginResult};

/// Check if the given path is a git repository
pub fn is_git_repository<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    debug!("Checking if path is git repository: {}", path.display());
    Repository::open(path).is_ok()
}

/// Open the repository at `path`, mapping every failure to `BackingStoreUnavailable`
pub fn open_repository<P: AsRef<Path>>(path: P) -> PluginResult<Repository> {
    let path = path.as_ref();
    let display = path.display().to_string();

    if !path.exists() {
        debug!("Repository path does not exist: {}", display);
        return Err(PluginError::backing_store_unavailable(display, "path does not exist"));
    }

    Repository::open(path)
        .map_err(|e| PluginError::backing_store_unavailable(display, e.message().to_string()))
}

/// Content provider reading a git repository through libgit2
pub struct GitContentProvider {
    path: PathBuf,
    selector: RevisionSelector,
    repository: Mutex<Option<Repository>>,
}

impl GitContentProvider {
    /// Create a provider; the repository is opened lazily so a missing store is not fatal
    pub fn new<P: AsRef<Path>>(path: P, selector: RevisionSelector) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            selector,
            repository: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn selector(&self) -> RevisionSelector {
        self.selector
    }

    fn with_repository<T>(&self, f: impl FnOnce(&Repository) -> PluginResult<T>) -> PluginResult<T> {
        let mut guard = self.repository.lock();
        if guard.is_none() {
            *guard = Some(open_repository(&self.path)?);
        }
        match guard.as_ref() {
            Some(repo) => f(repo),
            None => Err(PluginError::backing_store_unavailable(self.path.display().to_string(), "repository not open")),
        }
    }

    fn head_commit(&self, repo: &Repository) -> PluginResult<Oid> {
        match repo.refname_to_id("HEAD") {
            Ok(oid) => Ok(oid),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Err(PluginError::backing_store_unavailable(
                    self.path.display().to_string(),
                    "repository has no commits yet",
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn commit_snapshot(&self) -> PluginResult<Arc<Snapshot>> {
        let (commit_oid, paths) = self.with_repository(|repo| {
            let commit_oid = self.head_commit(repo)?;
            let tree = repo.find_commit(commit_oid)?.tree()?;

            let mut paths = Vec::new();
            tree.walk(TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(ObjectType::Blob) {
                    if let Some(name) = entry.name() {
                        paths.push(format!("{}{}", root, name));
                    }
                }
                TreeWalkResult::Ok
            })?;
            Ok((commit_oid, paths))
        })?;

        debug!("Snapshot of commit {} with {} tracked files", commit_oid, paths.len());
        let source = CommitSource {
            repository: Mutex::new(open_repository(&self.path)?),
            commit: commit_oid,
        };
        Ok(Arc::new(Snapshot::new(
            RevisionId::new(format!("commit:{}", commit_oid)),
            paths,
            Arc::new(source),
        )))
    }

    fn tracked_paths(&self) -> PluginResult<(PathBuf, Vec<String>)> {
        self.with_repository(|repo| {
            let workdir = repo.workdir()
                .ok_or_else(|| PluginError::backing_store_unavailable(
                    self.path.display().to_string(),
                    "bare repository has no working directory",
                ))?
                .to_path_buf();

            let index = repo.index()?;
            let paths = index.iter()
                .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
                .filter(|path| workdir.join(path).is_file())
                .collect();
            Ok((workdir, paths))
        })
    }

    fn worktree_snapshot(&self) -> PluginResult<Arc<Snapshot>> {
        let (workdir, paths) = self.tracked_paths()?;
        let revision = worktree_fingerprint(&workdir, &paths);
        debug!("Snapshot of working tree {} with {} tracked files", revision, paths.len());
        Ok(Arc::new(Snapshot::new(revision, paths, Arc::new(WorkTreeSource { root: workdir }))))
    }
}

impl ContentProvider for GitContentProvider {
    fn current_snapshot(&self) -> PluginResult<Arc<Snapshot>> {
        match self.selector {
            RevisionSelector::Default => self.commit_snapshot(),
            RevisionSelector::WorkingDir => self.worktree_snapshot(),
        }
    }

    fn needs_reload(&self, snapshot: &Snapshot) -> bool {
        let current = match self.selector {
            RevisionSelector::Default => self
                .with_repository(|repo| self.head_commit(repo))
                .map(|oid| RevisionId::new(format!("commit:{}", oid))),
            RevisionSelector::WorkingDir => self
                .tracked_paths()
                .map(|(workdir, paths)| worktree_fingerprint(&workdir, &paths)),
        };

        match current {
            Ok(revision) => &revision != snapshot.revision(),
            Err(e) => {
                // store vanished or is mid-setup; keep serving the old snapshot
                warn!("Unable to check repository revision: {}", e);
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("git repository {} ({})", self.path.display(), self.selector)
    }
}

/// Fingerprint over (path, size, mtime) of every tracked file
fn worktree_fingerprint(root: &Path, paths: &[String]) -> RevisionId {
    let mut hasher = DefaultHasher::new();
    for path in paths {
        path.hash(&mut hasher);
        if let Ok(meta) = fs::metadata(root.join(path)) {
            meta.len().hash(&mut hasher);
            if let Ok(modified) = meta.modified() {
                if let Ok(since) = modified.duration_since(UNIX_EPOCH) {
                    since.as_nanos().hash(&mut hasher);
                }
            }
        }
    }
    RevisionId::new(format!("worktree:{:016x}", hasher.finish()))
}

struct CommitSource {
    repository: Mutex<Repository>,
    commit: Oid,
}

impl CommitSource {
    /// Time of the most recent first-parent commit that changed `path`
    fn last_change(repo: &Repository, start: Oid, path: &Path) -> PluginResult<DateTime<Utc>> {
        let mut walk = repo.revwalk()?;
        walk.push(start)?;
        walk.simplify_first_parent()?;
        walk.set_sorting(Sort::TOPOLOGICAL)?;

        let mut last_seen = None;
        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            let here = commit.tree()?.get_path(path).ok().map(|e| e.id());
            let before = match commit.parent(0) {
                Ok(parent) => parent.tree()?.get_path(path).ok().map(|e| e.id()),
                Err(_) => None,
            };
            last_seen = Some(commit.time().seconds());
            if here != before {
                break;
            }
        }

        let seconds = last_seen.unwrap_or_default();
        Ok(DateTime::from_timestamp(seconds, 0).unwrap_or_default())
    }
}

impl SnapshotSource for CommitSource {
    fn read(&self, path: &str) -> PluginResult<FileContent> {
        let repo = self.repository.lock();
        let tree = repo.find_commit(self.commit)?.tree()?;
        let entry = tree.get_path(Path::new(path))?;
        let blob = repo.find_blob(entry.id())?;
        let mtime = Self::last_change(&repo, self.commit, Path::new(path))?;

        Ok(FileContent {
            data: blob.content().to_vec(),
            mtime,
            size: blob.size() as u64,
        })
    }
}

struct WorkTreeSource {
    root: PathBuf,
}

impl SnapshotSource for WorkTreeSource {
    fn read(&self, path: &str) -> PluginResult<FileContent> {
        let full_path = self.root.join(path);
        let data = fs::read(&full_path)?;
        let meta = fs::metadata(&full_path)?;
        let mtime = meta.modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();

        Ok(FileContent { data, mtime, size: meta.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_git_repository_with_non_git_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_git_repository(temp_dir.path()));
    }

    #[test]
    fn test_open_repository_nonexistent_path() {
        let err = open_repository("/definitely/does/not/exist")
            .err()
            .expect("opening a missing path should fail");
        assert!(matches!(err, PluginError::BackingStoreUnavailable { .. }));
        assert!(err.to_string().contains("path does not exist"));
    }

    #[test]
    fn test_missing_store_is_recoverable() {
        let provider = GitContentProvider::new("/definitely/does/not/exist", RevisionSelector::Default);
        let err = provider.current_snapshot().unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_unborn_head_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        Repository::init(temp_dir.path()).unwrap();

        let provider = GitContentProvider::new(temp_dir.path(), RevisionSelector::Default);
        let err = provider.current_snapshot().unwrap_err();
        assert!(matches!(err, PluginError::BackingStoreUnavailable { .. }));
    }

    #[test]
    fn test_worktree_fingerprint_tracks_content_changes() {
        let temp_dir = TempDir::new().unwrap();
        let paths = vec!["a.txt".to_string()];
        fs::write(temp_dir.path().join("a.txt"), "one").unwrap();
        let first = worktree_fingerprint(temp_dir.path(), &paths);
        assert_eq!(first, worktree_fingerprint(temp_dir.path(), &paths));

        fs::write(temp_dir.path().join("a.txt"), "three").unwrap();
        assert_ne!(first, worktree_fingerprint(temp_dir.path(), &paths));
    }
}
