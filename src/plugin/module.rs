//! Loaded plugin modules and the process-wide module table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use parking_lot::RwLock;
use rhai::{Dynamic, Module, AST};
use log::debug;
use crate::content::RevisionId;
use super::index::ModuleDescriptor;

/// Package modules carry a search path for their sub-modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    Package { search_path: Vec<String> },
    Leaf,
}

/// Lifecycle of a module object in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Inserted into the table, body still executing
    Loading,
    Ready,
    /// Body raised; the object stays cached until evicted
    Failed,
}

struct ModuleBody {
    state: ModuleState,
    namespace: Arc<Module>,
    ast: Option<Arc<AST>>,
    failure: Option<String>,
}

/// An executable module object
pub struct PluginModule {
    name: String,
    origin: String,
    kind: ModuleKind,
    revision: Option<RevisionId>,
    body: RwLock<ModuleBody>,
}

impl PluginModule {
    /// Empty module for a repository file, attributed to `repo:<path>`
    pub fn from_descriptor(name: &str, descriptor: &ModuleDescriptor, revision: &RevisionId) -> Self {
        let kind = match descriptor.search_path() {
            Some(dir) => ModuleKind::Package { search_path: vec![dir] },
            None => ModuleKind::Leaf,
        };
        Self::with_state(name, format!("repo:{}", descriptor.path), kind, Some(revision.clone()), ModuleState::Loading)
    }

    /// Host-provided module that is ready from the start
    pub fn builtin(name: &str, kind: ModuleKind) -> Self {
        Self::with_state(name, format!("builtin:{}", name), kind, None, ModuleState::Ready)
    }

    fn with_state(name: &str, origin: String, kind: ModuleKind, revision: Option<RevisionId>, state: ModuleState) -> Self {
        let mut namespace = Module::new();
        namespace.set_id(name);
        Self {
            name: name.to_string(),
            origin,
            kind,
            revision,
            body: RwLock::new(ModuleBody { state, namespace: Arc::new(namespace), ast: None, failure: None }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Synthetic origin; never a local filesystem path
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn is_package(&self) -> bool {
        matches!(self.kind, ModuleKind::Package { .. })
    }

    pub fn search_path(&self) -> &[String] {
        match &self.kind {
            ModuleKind::Package { search_path } => search_path,
            ModuleKind::Leaf => &[],
        }
    }

    pub fn revision(&self) -> Option<&RevisionId> {
        self.revision.as_ref()
    }

    pub fn state(&self) -> ModuleState {
        self.body.read().state
    }

    /// Exported namespace; empty while the body is still executing
    pub fn namespace(&self) -> Arc<Module> {
        Arc::clone(&self.body.read().namespace)
    }

    /// Compiled body, used to call functions the module registered as callbacks
    pub fn ast(&self) -> Option<Arc<AST>> {
        self.body.read().ast.clone()
    }

    /// Exported top-level variable
    pub fn variable(&self, name: &str) -> Option<Dynamic> {
        self.body.read().namespace.get_var(name)
    }

    pub(crate) fn attach_ast(&self, ast: Arc<AST>) {
        self.body.write().ast = Some(ast);
    }

    pub(crate) fn complete(&self, mut namespace: Module) {
        namespace.set_id(self.name.as_str());
        namespace.build_index();
        let mut body = self.body.write();
        body.namespace = Arc::new(namespace);
        body.state = ModuleState::Ready;
    }

    /// Error message of a failed body
    pub fn failure(&self) -> Option<String> {
        self.body.read().failure.clone()
    }

    pub(crate) fn fail(&self, message: String) {
        let mut body = self.body.write();
        body.state = ModuleState::Failed;
        body.failure = Some(message);
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

struct TableInner {
    revision: Option<RevisionId>,
    modules: HashMap<String, Arc<PluginModule>>,
}

/// Process-wide module cache: name -> executed module, bound to one content revision
pub struct ModuleTable {
    inner: RwLock<TableInner>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TableInner { revision: None, modules: HashMap::new() }),
        }
    }

    /// Bind the table to `revision`, dropping every module when it changes.
    /// Returns true when the table was cleared.
    pub fn bind(&self, revision: &RevisionId) -> bool {
        let mut inner = self.inner.write();
        if inner.revision.as_ref() == Some(revision) {
            return false;
        }
        debug!("Module table rebound to {} ({} modules dropped)", revision, inner.modules.len());
        inner.revision = Some(revision.clone());
        inner.modules.clear();
        true
    }

    pub fn revision(&self) -> Option<RevisionId> {
        self.inner.read().revision.clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<PluginModule>> {
        self.inner.read().modules.get(name).cloned()
    }

    pub fn insert(&self, module: Arc<PluginModule>) {
        self.inner.write().modules.insert(module.name().to_string(), module);
    }

    pub fn evict(&self, name: &str) -> Option<Arc<PluginModule>> {
        self.inner.write().modules.remove(name)
    }

    /// Cached module names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().modules.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ModuleTable {
    fn default() -> Self {
        Self::new()
    }
}
