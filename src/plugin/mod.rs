//! Repository Plugin System
//!
//! Loads plugin modules from the content repository and activates them
//! against the running application.
//!
//! A load pass:
//! 1. takes a [`Snapshot`](crate::content::Snapshot) of the content store,
//! 2. builds a [`ModuleIndex`] of the `.rhai` sources under the plugin directory,
//! 3. (re)installs a [`RepoImporter`] for the namespace in the [`ResolverChain`],
//! 4. imports every indexed module; module code calls `register_plugin`,
//! 5. runs the setup callbacks of the registered plugins, in order.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use gitpress::app::Application;
//! use gitpress::config::SiteConfig;
//! use gitpress::content::MemoryContentProvider;
//!
//! let provider = Arc::new(MemoryContentProvider::with_files([
//!     ("plugins/hello.rhai", r#"register_plugin(plugin("hello").init_plugin(|app| app.set("hello", true)));"#),
//! ]));
//! let application = Application::new(SiteConfig::new(".").with_plugins_enabled(), provider);
//! let report = application.load_plugins()?;
//! assert_eq!(report.activated, vec!["hello"]);
//! # Ok::<(), gitpress::plugin::PluginError>(())
//! ```

pub mod error;
pub mod index;
pub mod module;
pub mod importer;
pub mod chain;
pub mod registry;
pub mod context;
pub mod engine;
pub mod api;
pub mod version;

#[cfg(test)]
pub mod tests;

pub use error::{PluginError, PluginResult};
pub use index::{ModuleDescriptor, ModuleIndex, PACKAGE_INIT, SOURCE_SUFFIX};
pub use module::{ModuleKind, ModuleState, ModuleTable, PluginModule};
pub use importer::{ImportHost, RepoImporter, Resolver, ResolverIdentity, StaticResolver};
pub use chain::{install_repo_importer, ResolverChain};
pub use registry::{Plugin, PluginGlobals, SetupCallback};
pub use context::LoadContext;
pub use engine::{build_engine, EngineLimits};
pub use version::get_api_version;
