//! Plugin Error Types
//!
//! Error taxonomy for the repository-backed loader, the resolver chain and the
//! plugin registration protocol.

use serde::Serialize;
use thiserror::Error;

/// Result type for loader and plugin operations
pub type PluginResult<T> = Result<T, PluginError>;

/// Errors raised while loading plugins from the content repository
#[derive(Error, Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PluginError {
    /// The backing store could not be opened (missing path, not a repository, unborn HEAD)
    #[error("Backing store unavailable at {path}: {message}")]
    BackingStoreUnavailable { path: String, message: String },

    /// No resolver claims the module, or the index went stale between claim and load
    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    /// Plugin source failed to compile or raised during execution
    #[error("Plugin execution error in {origin}: {message}")]
    PluginExecution { origin: String, message: String },

    /// Registration attempted outside an active load pass
    #[error("No active load context: {operation}")]
    NoActiveContext { operation: String },

    /// Unrecognised revision name in configuration or on the command line
    #[error("Invalid revision selector: {selector}. Valid options: default, working-dir")]
    InvalidRevisionSelector { selector: String },

    /// Path is not tracked by the snapshot being read
    #[error("File not tracked at revision {revision}: {path}")]
    FileNotTracked { path: String, revision: String },

    /// Plugin requires a newer host API than this build provides
    #[error("Plugin API version {required} required, host provides {provided}")]
    ApiVersion { required: i64, provided: i64 },

    /// Error reported by the version control library
    #[error("Repository error: {message}")]
    Repository { message: String },

    /// Configuration error
    #[error("Plugin configuration error: {message}")]
    Configuration { message: String },

    /// I/O error while reading repository content
    #[error("IO error: {message}")]
    Io { message: String },
}

impl PluginError {
    /// Create a backing store unavailable error
    pub fn backing_store_unavailable<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::BackingStoreUnavailable { path: path.into(), message: message.into() }
    }

    /// Create a module not found error
    pub fn module_not_found<S: Into<String>>(name: S) -> Self {
        Self::ModuleNotFound { name: name.into() }
    }

    /// Create a plugin execution error attributed to a synthetic origin
    pub fn plugin_execution<O: Into<String>, S: Into<String>>(origin: O, message: S) -> Self {
        Self::PluginExecution { origin: origin.into(), message: message.into() }
    }

    /// Create a no active context error
    pub fn no_active_context<S: Into<String>>(operation: S) -> Self {
        Self::NoActiveContext { operation: operation.into() }
    }

    /// Create an invalid revision selector error
    pub fn invalid_revision_selector<S: Into<String>>(selector: S) -> Self {
        Self::InvalidRevisionSelector { selector: selector.into() }
    }

    /// Create a file not tracked error
    pub fn file_not_tracked<P: Into<String>, R: Into<String>>(path: P, revision: R) -> Self {
        Self::FileNotTracked { path: path.into(), revision: revision.into() }
    }

    /// Create a repository error
    pub fn repository<S: Into<String>>(message: S) -> Self {
        Self::Repository { message: message.into() }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Check if the caller may skip or retry instead of failing the request
    pub fn is_recoverable(&self) -> bool {
        matches!(self,
            PluginError::BackingStoreUnavailable { .. } |
            PluginError::ModuleNotFound { .. }
        )
    }

    /// Check if error is a configuration issue
    pub fn is_configuration_error(&self) -> bool {
        matches!(self,
            PluginError::InvalidRevisionSelector { .. } |
            PluginError::Configuration { .. }
        )
    }

    /// Synthetic origin of the failing module, for execution errors
    pub fn origin(&self) -> Option<&str> {
        match self {
            PluginError::PluginExecution { origin, .. } => Some(origin),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PluginError {
    fn from(err: std::io::Error) -> Self {
        PluginError::Io { message: err.to_string() }
    }
}

impl From<git2::Error> for PluginError {
    fn from(err: git2::Error) -> Self {
        PluginError::repository(err.message().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PluginError::module_not_found("gitpress.plugins.missing");
        assert_eq!(error.to_string(), "Module not found: gitpress.plugins.missing");

        let error = PluginError::plugin_execution("repo:plugins/bad.rhai", "boom");
        assert_eq!(error.to_string(), "Plugin execution error in repo:plugins/bad.rhai: boom");
        assert_eq!(error.origin(), Some("repo:plugins/bad.rhai"));
    }

    #[test]
    fn test_error_classification() {
        assert!(PluginError::backing_store_unavailable("/nowhere", "missing").is_recoverable());
        assert!(PluginError::module_not_found("x").is_recoverable());
        assert!(!PluginError::plugin_execution("repo:x", "boom").is_recoverable());
        assert!(!PluginError::no_active_context("register_plugin").is_recoverable());

        assert!(PluginError::invalid_revision_selector("tip").is_configuration_error());
        assert!(!PluginError::module_not_found("x").is_configuration_error());
        assert!(PluginError::module_not_found("x").origin().is_none());
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let plugin_error: PluginError = io_error.into();
        assert!(matches!(plugin_error, PluginError::Io { .. }));
        assert!(plugin_error.to_string().contains("File not found"));

        let git_error = git2::Error::from_str("object not found");
        let plugin_error: PluginError = git_error.into();
        assert!(matches!(plugin_error, PluginError::Repository { .. }));
    }
}
