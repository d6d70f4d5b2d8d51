//! Module resolution
//!
//! Two-phase resolver protocol: a resolver first `claims` a fully qualified
//! module name, then `load`s it into the module table. [`RepoImporter`]
//! serves plugin modules from a repository snapshot; [`StaticResolver`] serves
//! host-provided modules such as the namespace root.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use log::{debug, info, warn};
use rhai::{Engine, Module, Scope};
use crate::content::Snapshot;
use super::chain::ResolverChain;
use super::context::LoadContext;
use super::error::{PluginError, PluginResult};
use super::index::{ModuleDescriptor, ModuleIndex};
use super::module::{ModuleKind, ModuleTable, PluginModule};

/// Structural identity of a resolver; two entries with equal identity are the same registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverIdentity {
    pub kind: &'static str,
    pub namespace: String,
}

impl ResolverIdentity {
    pub fn new<S: Into<String>>(kind: &'static str, namespace: S) -> Self {
        Self { kind, namespace: namespace.into() }
    }
}

impl fmt::Display for ResolverIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.namespace)
    }
}

/// An entry of the resolver chain
pub trait Resolver: Send + Sync {
    fn identity(&self) -> ResolverIdentity;

    /// Whether this resolver takes responsibility for `fullname`
    fn claims(&self, fullname: &str) -> bool;

    /// Materialise a claimed module; only called after `claims` returned true
    fn load(&self, fullname: &str, host: &ImportHost<'_>) -> PluginResult<Arc<PluginModule>>;
}

/// Everything an import needs: the engine that executes module bodies, the
/// resolver chain, the module table and the active load context
pub struct ImportHost<'a> {
    engine: &'a Engine,
    chain: &'a ResolverChain,
    modules: &'a ModuleTable,
    context: &'a LoadContext,
}

impl<'a> ImportHost<'a> {
    pub fn new(engine: &'a Engine, chain: &'a ResolverChain, modules: &'a ModuleTable, context: &'a LoadContext) -> Self {
        Self { engine, chain, modules, context }
    }

    pub fn engine(&self) -> &Engine {
        self.engine
    }

    pub fn modules(&self) -> &ModuleTable {
        self.modules
    }

    pub fn context(&self) -> &LoadContext {
        self.context
    }

    /// Import `fullname`, importing its parent packages first.
    ///
    /// A cached module is returned as is, including one whose body is still
    /// executing further up the stack (circular imports).
    pub fn import(&self, fullname: &str) -> PluginResult<Arc<PluginModule>> {
        if let Some(module) = self.modules.get(fullname) {
            return Ok(module);
        }

        if let Some((parent, _)) = fullname.rsplit_once('.') {
            let parent = self.import(parent)?;
            if !parent.is_package() {
                debug!("Cannot import {}: {} is not a package", fullname, parent.name());
                return Err(PluginError::module_not_found(fullname));
            }
            // a parent body may have imported this module already
            if let Some(module) = self.modules.get(fullname) {
                return Ok(module);
            }
        }

        let resolver = self.chain
            .find(fullname)
            .ok_or_else(|| PluginError::module_not_found(fullname))?;
        resolver.load(fullname, self)
    }
}

/// Host-provided modules, consulted before any repository importer
pub struct StaticResolver {
    label: String,
    modules: HashMap<String, Arc<PluginModule>>,
}

impl StaticResolver {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self { label: label.into(), modules: HashMap::new() }
    }

    /// Packages for every dotted prefix of `namespace`; the namespace itself
    /// searches `plugin_root`
    pub fn for_namespace(namespace: &str, plugin_root: &str) -> Self {
        let mut resolver = Self::new(namespace);
        let segments: Vec<&str> = namespace.split('.').collect();
        for end in 1..=segments.len() {
            let name = segments[..end].join(".");
            let search_path = if end == segments.len() { vec![plugin_root.to_string()] } else { Vec::new() };
            resolver.add_module(Arc::new(PluginModule::builtin(&name, ModuleKind::Package { search_path })));
        }
        resolver
    }

    pub fn add_module(&mut self, module: Arc<PluginModule>) {
        self.modules.insert(module.name().to_string(), module);
    }
}

impl Resolver for StaticResolver {
    fn identity(&self) -> ResolverIdentity {
        ResolverIdentity::new("static", self.label.as_str())
    }

    fn claims(&self, fullname: &str) -> bool {
        self.modules.contains_key(fullname)
    }

    fn load(&self, fullname: &str, host: &ImportHost<'_>) -> PluginResult<Arc<PluginModule>> {
        let module = self.modules
            .get(fullname)
            .cloned()
            .ok_or_else(|| PluginError::module_not_found(fullname))?;
        host.modules().insert(Arc::clone(&module));
        Ok(module)
    }
}

/// Resolver serving plugin modules from one repository snapshot
pub struct RepoImporter {
    namespace: String,
    prefix: String,
    snapshot: Arc<Snapshot>,
    index: Arc<ModuleIndex>,
}

impl RepoImporter {
    pub fn new(namespace: &str, snapshot: Arc<Snapshot>, plugin_root: &str) -> Self {
        let index = Arc::new(ModuleIndex::build(&snapshot, plugin_root));
        Self {
            namespace: namespace.to_string(),
            prefix: format!("{}.", namespace),
            snapshot,
            index,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn index(&self) -> &ModuleIndex {
        &self.index
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Fully qualified names of every indexed module, sorted
    pub fn qualified_names(&self) -> Vec<String> {
        self.index.names().map(|name| format!("{}{}", self.prefix, name)).collect()
    }

    fn remainder<'n>(&self, fullname: &'n str) -> Option<&'n str> {
        if fullname == self.namespace {
            Some("")
        } else {
            fullname.strip_prefix(self.prefix.as_str())
        }
    }

    fn execute(&self, module: &Arc<PluginModule>, descriptor: &ModuleDescriptor, host: &ImportHost<'_>) -> PluginResult<Module> {
        let origin = module.origin();
        let content = self.snapshot.read(&descriptor.path)?;
        let source = String::from_utf8(content.data)
            .map_err(|e| PluginError::plugin_execution(origin, format!("source is not valid UTF-8: {}", e)))?;

        let mut ast = host.engine()
            .compile(&source)
            .map_err(|e| PluginError::plugin_execution(origin, e.to_string()))?;
        ast.set_source(origin);
        let ast = Arc::new(ast);
        module.attach_ast(Arc::clone(&ast));

        let _frame = host.context().enter(Arc::clone(module));
        Module::eval_ast_as_new(Scope::new(), &ast, host.engine())
            .map_err(|e| PluginError::plugin_execution(origin, e.to_string()))
    }
}

impl Resolver for RepoImporter {
    fn identity(&self) -> ResolverIdentity {
        ResolverIdentity::new("repo", self.namespace.as_str())
    }

    fn claims(&self, fullname: &str) -> bool {
        self.remainder(fullname).is_some_and(|name| self.index.contains(name))
    }

    fn load(&self, fullname: &str, host: &ImportHost<'_>) -> PluginResult<Arc<PluginModule>> {
        let descriptor = self.remainder(fullname)
            .and_then(|name| self.index.get(name))
            .ok_or_else(|| PluginError::module_not_found(fullname))?;

        let module = Arc::new(PluginModule::from_descriptor(fullname, descriptor, self.snapshot.revision()));

        // cached before the body runs so circular imports see the partial module
        host.modules().insert(Arc::clone(&module));

        match self.execute(&module, descriptor, host) {
            Ok(namespace) => {
                module.complete(namespace);
                info!("Loaded plugin module {} from {}", fullname, module.origin());
                Ok(module)
            }
            Err(e) => {
                let message = match &e {
                    PluginError::PluginExecution { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                module.fail(message);
                host.context().discard_registrations_from(fullname);
                warn!("Failed to load plugin module {}: {}", fullname, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentProvider, MemoryContentProvider};

    fn importer(paths: &[&str]) -> RepoImporter {
        let snapshot = MemoryContentProvider::with_files(paths.iter().map(|p| (*p, "")))
            .current_snapshot()
            .unwrap();
        RepoImporter::new("gitpress.plugins", snapshot, "plugins")
    }

    #[test]
    fn test_claims_requires_namespace_and_index_entry() {
        let importer = importer(&["plugins/hello.rhai", "plugins/pkg/__init__.rhai", "plugins/pkg/sub.rhai"]);

        assert!(importer.claims("gitpress.plugins.hello"));
        assert!(importer.claims("gitpress.plugins.pkg"));
        assert!(importer.claims("gitpress.plugins.pkg.sub"));

        assert!(!importer.claims("gitpress.plugins"));
        assert!(!importer.claims("gitpress.plugins.missing"));
        assert!(!importer.claims("gitpress.pluginshello"));
        assert!(!importer.claims("hello"));
        assert!(!importer.claims("other.plugins.hello"));
    }

    #[test]
    fn test_identity_ignores_snapshot() {
        let a = importer(&["plugins/a.rhai"]);
        let b = importer(&["plugins/b.rhai"]);
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.identity().to_string(), "repo:gitpress.plugins");
    }

    #[test]
    fn test_qualified_names() {
        let importer = importer(&["plugins/b.rhai", "plugins/a/__init__.rhai"]);
        assert_eq!(importer.qualified_names(), vec!["gitpress.plugins.a", "gitpress.plugins.b"]);
    }

    #[test]
    fn test_static_resolver_for_namespace() {
        let resolver = StaticResolver::for_namespace("gitpress.plugins", "plugins");
        assert!(resolver.claims("gitpress"));
        assert!(resolver.claims("gitpress.plugins"));
        assert!(!resolver.claims("gitpress.plugins.hello"));
        assert_eq!(resolver.modules["gitpress.plugins"].search_path(), &["plugins".to_string()]);
        assert!(resolver.modules["gitpress"].is_package());
    }
}
