//! Script engine construction
//!
//! A fresh [`Engine`] is built for every load pass. Its `import` statements go
//! through [`ChainModuleResolver`], which hands the name to the resolver chain
//! and the module table instead of the filesystem.

use std::sync::Arc;
use log::{debug, info};
use rhai::module_resolvers::ModuleResolver;
use rhai::{Engine, EvalAltResult, Module, Position};
use crate::config::{PluginSettings, DEFAULT_MAX_CALL_DEPTH};
use super::api;
use super::chain::ResolverChain;
use super::context::LoadContext;
use super::error::PluginError;
use super::importer::ImportHost;
use super::module::{ModuleState, ModuleTable};

/// Log target of script `print` and `debug` output
pub const SCRIPT_LOG_TARGET: &str = "gitpress::script";

/// Sandbox limits applied to every script run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    /// 0 is unlimited
    pub max_operations: u64,
    pub max_call_depth: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self { max_operations: 0, max_call_depth: DEFAULT_MAX_CALL_DEPTH }
    }
}

impl From<&PluginSettings> for EngineLimits {
    fn from(settings: &PluginSettings) -> Self {
        Self {
            max_operations: settings.max_operations,
            max_call_depth: settings.max_call_depth,
        }
    }
}

/// Engine for one load pass, with the capability API registered and
/// imports routed through `chain`
pub fn build_engine(
    chain: Arc<ResolverChain>,
    modules: Arc<ModuleTable>,
    context: Arc<LoadContext>,
    limits: EngineLimits,
) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_depth);
    engine.disable_symbol("eval");

    engine.on_print(|text| info!(target: SCRIPT_LOG_TARGET, "{}", text));
    engine.on_debug(|text, source, pos| {
        debug!(target: SCRIPT_LOG_TARGET, "{} {}: {}", source.unwrap_or("<script>"), pos, text)
    });

    api::register_capabilities(&mut engine, &context);
    engine.set_module_resolver(ChainModuleResolver::new(chain, modules, context));

    debug!("Built script engine for load pass (limits {:?})", limits);
    engine
}

/// Adapter from Rhai's module resolution to [`ImportHost::import`]
pub struct ChainModuleResolver {
    chain: Arc<ResolverChain>,
    modules: Arc<ModuleTable>,
    context: Arc<LoadContext>,
}

impl ChainModuleResolver {
    pub fn new(chain: Arc<ResolverChain>, modules: Arc<ModuleTable>, context: Arc<LoadContext>) -> Self {
        Self { chain, modules, context }
    }
}

impl ModuleResolver for ChainModuleResolver {
    fn resolve(
        &self,
        engine: &Engine,
        _source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<Arc<Module>, Box<EvalAltResult>> {
        let host = ImportHost::new(engine, &self.chain, &self.modules, &self.context);
        match host.import(path) {
            Ok(module) if module.state() == ModuleState::Failed => {
                let failure = PluginError::plugin_execution(module.origin(), module.failure().unwrap_or_default());
                debug!("Import of failed module {} refused", path);
                Err(EvalAltResult::ErrorInModule(path.to_string(), failure.to_string().into(), pos).into())
            }
            Ok(module) => Ok(module.namespace()),
            Err(PluginError::ModuleNotFound { .. }) => {
                Err(EvalAltResult::ErrorModuleNotFound(path.to_string(), pos).into())
            }
            Err(e) => Err(EvalAltResult::ErrorInModule(path.to_string(), e.to_string().into(), pos).into()),
        }
    }
}
