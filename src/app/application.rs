//! Application and load passes
//!
//! [`Application`] owns everything that outlives a single load pass: the
//! content provider, the resolver chain, the module table, the application
//! handle plugins modify and the snapshot the current plugins came from.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use arc_swap::ArcSwapOption;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use crate::config::SiteConfig;
use crate::content::{ContentProvider, GitContentProvider, RevisionId, Snapshot};
use crate::plugin::chain::{install_repo_importer, ResolverChain};
use crate::plugin::context::LoadContext;
use crate::plugin::engine::{build_engine, EngineLimits};
use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::importer::{ImportHost, RepoImporter, StaticResolver};
use crate::plugin::module::{ModuleState, ModuleTable, PluginModule};
use crate::plugin::registry::Plugin;
use super::handle::AppHandle;

/// Outcome of one load pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub pass: u64,
    pub revision: Option<RevisionId>,
    /// Modules executed successfully, in import order
    pub imported: Vec<String>,
    /// Plugins whose setup callbacks ran, in registration order
    pub activated: Vec<String>,
    pub failures: Vec<PluginError>,
    /// Why the pass did nothing, when the backing store was unavailable
    pub skipped: Option<String>,
}

impl LoadReport {
    fn skipped(pass: u64, reason: String) -> Self {
        Self { pass, skipped: Some(reason), ..Self::default() }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_failure(&self) -> Option<&PluginError> {
        self.failures.first()
    }

    fn record_failure(&mut self, failure: PluginError) {
        let duplicate = failure.origin().is_some()
            && self.failures.iter().any(|f| f.origin() == failure.origin());
        if !duplicate {
            self.failures.push(failure);
        }
    }
}

pub struct Application {
    config: SiteConfig,
    provider: Arc<dyn ContentProvider>,
    chain: Arc<ResolverChain>,
    modules: Arc<ModuleTable>,
    app: AppHandle,
    snapshot: ArcSwapOption<Snapshot>,
    active_pass: Mutex<Option<Arc<LoadContext>>>,
    pass_lock: Mutex<()>,
    passes: AtomicU64,
    got_first_request: AtomicBool,
}

impl Application {
    /// Application serving the git repository named by `config`
    pub fn open(config: SiteConfig) -> Self {
        let provider = GitContentProvider::new(&config.repo_path, config.revision);
        Self::new(config, Arc::new(provider))
    }

    pub fn new(config: SiteConfig, provider: Arc<dyn ContentProvider>) -> Self {
        let chain = Arc::new(ResolverChain::new());
        chain.install(Arc::new(StaticResolver::for_namespace(&config.plugins.namespace, &config.plugins.dir)));
        let app = AppHandle::with_config(config.settings.clone());

        info!("Application serving {} (plugins {})",
            provider.describe(),
            if config.plugins.enable { "enabled" } else { "disabled" });

        Self {
            config,
            provider,
            chain,
            modules: Arc::new(ModuleTable::new()),
            app,
            snapshot: ArcSwapOption::empty(),
            active_pass: Mutex::new(None),
            pass_lock: Mutex::new(()),
            passes: AtomicU64::new(0),
            got_first_request: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn ContentProvider> {
        &self.provider
    }

    pub fn app(&self) -> &AppHandle {
        &self.app
    }

    pub fn chain(&self) -> &ResolverChain {
        &self.chain
    }

    pub fn modules(&self) -> &ModuleTable {
        &self.modules
    }

    /// Snapshot the currently loaded plugins came from
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.load_full()
    }

    /// Run one load pass against the current content revision
    ///
    /// Modules already executed at this revision are reused, so a repeated
    /// pass on an unchanged revision activates nothing and leaves the
    /// application state of the first pass in place.
    pub fn load_plugins(&self) -> PluginResult<LoadReport> {
        let _guard = self.pass_lock.lock();
        self.run_pass()
    }

    /// Per-request hook: loads plugins on the first request and, with
    /// auto-reload, whenever the content store moved on
    pub fn before_request(&self) -> PluginResult<()> {
        if !self.config.plugins.enable || !self.reload_due() {
            return Ok(());
        }

        let _guard = self.pass_lock.lock();
        // another request may have loaded while we waited
        if !self.reload_due() {
            return Ok(());
        }
        self.got_first_request.store(true, Ordering::Release);

        let report = self.run_pass()?;
        match report.first_failure() {
            Some(failure) => {
                error!("Plugin load pass {} failed: {}", report.pass, failure);
                Err(failure.clone())
            }
            None => Ok(()),
        }
    }

    fn reload_due(&self) -> bool {
        if !self.got_first_request.load(Ordering::Acquire) {
            return true;
        }
        if !self.config.plugins.auto_reload {
            return false;
        }
        match self.snapshot.load_full() {
            Some(snapshot) => self.provider.needs_reload(&snapshot),
            None => true,
        }
    }

    /// Register `plugin` into the load pass in progress
    pub fn register_plugin(&self, plugin: Plugin) -> PluginResult<()> {
        match self.active_pass.lock().as_ref() {
            Some(context) => context.register_plugin(plugin),
            None => Err(PluginError::no_active_context("register_plugin outside a load pass")),
        }
    }

    /// Import `fullname` through the resolver chain. Outside a load pass any
    /// plugin registration the module attempts fails.
    pub fn import_module(&self, fullname: &str) -> PluginResult<Arc<PluginModule>> {
        let active = self.active_pass.lock().clone();
        let context = match active {
            Some(context) => context,
            None => Arc::new(LoadContext::inactive(self.passes.load(Ordering::Acquire))),
        };
        let engine = self.engine_for(&context);
        ImportHost::new(&engine, &self.chain, &self.modules, &context).import(fullname)
    }

    fn engine_for(&self, context: &Arc<LoadContext>) -> rhai::Engine {
        build_engine(
            Arc::clone(&self.chain),
            Arc::clone(&self.modules),
            Arc::clone(context),
            EngineLimits::from(&self.config.plugins),
        )
    }

    fn run_pass(&self) -> PluginResult<LoadReport> {
        let pass = self.passes.fetch_add(1, Ordering::AcqRel) + 1;

        let snapshot = match self.provider.current_snapshot() {
            Ok(snapshot) => snapshot,
            Err(e @ PluginError::BackingStoreUnavailable { .. }) => {
                warn!("Skipping plugin load pass {}: {}", pass, e);
                return Ok(LoadReport::skipped(pass, e.to_string()));
            }
            Err(e) => return Err(e),
        };

        info!("Plugin load pass {} at {}", pass, snapshot.revision());
        if self.modules.bind(snapshot.revision()) {
            self.app.reset();
        }
        let importer = install_repo_importer(
            &self.chain,
            &self.config.plugins.namespace,
            Arc::clone(&snapshot),
            &self.config.plugins.dir,
        );

        let context = Arc::new(LoadContext::new(pass));
        *self.active_pass.lock() = Some(Arc::clone(&context));

        let mut report = LoadReport { pass, revision: Some(snapshot.revision().clone()), ..LoadReport::default() };
        let outcome = self.import_and_activate(&context, &importer, &mut report);

        *self.active_pass.lock() = None;
        context.finish();
        self.snapshot.store(Some(snapshot));

        outcome?;
        info!(
            "Plugin load pass {} imported {} modules, activated {} plugins, {} failures",
            pass,
            report.imported.len(),
            report.activated.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn import_and_activate(
        &self,
        context: &Arc<LoadContext>,
        importer: &RepoImporter,
        report: &mut LoadReport,
    ) -> PluginResult<()> {
        let engine = self.engine_for(context);
        let host = ImportHost::new(&engine, &self.chain, &self.modules, context);

        host.import(importer.namespace())?;

        for name in importer.qualified_names() {
            match host.import(&name) {
                Ok(module) => match module.state() {
                    ModuleState::Ready => report.imported.push(name),
                    ModuleState::Failed => {
                        // failed earlier in this revision, possibly while a dependant imported it
                        let message = module.failure().unwrap_or_default();
                        report.record_failure(PluginError::plugin_execution(module.origin(), message));
                    }
                    ModuleState::Loading => debug!("Module {} is still loading", name),
                },
                Err(e) => {
                    debug!("Import of {} failed: {}", name, e);
                    report.record_failure(e);
                }
            }
        }

        match context.drain_and_activate(&engine, &self.app) {
            Ok(activated) => {
                report.activated = activated;
                Ok(())
            }
            Err(e) => {
                error!("Plugin activation aborted: {}", e);
                report.record_failure(e);
                Ok(())
            }
        }
    }
}
