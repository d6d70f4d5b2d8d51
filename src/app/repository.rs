//! Repository path resolution

use anyhow::{Context, Result};
use std::path::PathBuf;
use log::debug;

/// Resolve the content repository path from the command line or configuration.
///
/// Expands a leading `~`. The path is not required to exist or to be a
/// repository: the content provider reports that as an unavailable backing
/// store so a server can start before the repository is populated.
pub fn resolve_repository_path(repository_arg: Option<&str>) -> Result<PathBuf> {
    match repository_arg {
        Some(path) => {
            debug!("Repository path provided: {}", path);
            let expanded_path = match path.strip_prefix('~') {
                Some(rest) => match dirs::home_dir() {
                    Some(home_dir) => home_dir.join(rest.trim_start_matches('/')),
                    None => PathBuf::from(path),
                },
                None => PathBuf::from(path),
            };

            Ok(expanded_path.canonicalize().unwrap_or(expanded_path))
        }
        None => {
            debug!("No repository path provided, using current directory");
            std::env::current_dir()
                .context("Failed to get current directory")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_repository_path_resolution() {
        let result = resolve_repository_path(None);
        assert!(result.is_ok(), "Should resolve current directory");

        let temp_dir = TempDir::new().unwrap();
        let resolved = resolve_repository_path(Some(&temp_dir.path().to_string_lossy())).unwrap();
        assert_eq!(resolved, temp_dir.path().canonicalize().unwrap());

        // missing paths resolve; the provider reports them later
        let resolved = resolve_repository_path(Some("/nonexistent/path")).unwrap();
        assert_eq!(resolved, PathBuf::from("/nonexistent/path"));
    }

    #[test]
    fn test_tilde_expansion() {
        if let Some(home) = dirs::home_dir() {
            let resolved = resolve_repository_path(Some("~/gitpress-no-such-dir")).unwrap();
            assert_eq!(resolved, home.join("gitpress-no-such-dir"));
        }
    }
}
