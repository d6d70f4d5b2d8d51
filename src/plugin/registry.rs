//! Plugin objects
//!
//! A [`Plugin`] is registered by module code during a load pass and carries
//! the setup callbacks that run against the application once every module of
//! the pass has executed.

use std::fmt;
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use rhai::{Dynamic, FnPtr, Map};
use crate::app::AppHandle;
use super::context::LoadContext;
use super::error::PluginResult;
use super::module::PluginModule;

/// Rust-side setup callback
pub type NativeCallback = Arc<dyn Fn(&AppHandle) -> PluginResult<()> + Send + Sync>;

/// A setup callback attached with `init_plugin`
#[derive(Clone)]
pub enum SetupCallback {
    Native(NativeCallback),
    /// Script function pointer, bound to the module that attached it
    Script { func: FnPtr, module: Arc<PluginModule> },
}

impl fmt::Debug for SetupCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupCallback::Native(_) => write!(f, "Native"),
            SetupCallback::Script { func, module } => write!(f, "Script({} in {})", func.fn_name(), module.origin()),
        }
    }
}

struct PluginInner {
    name: String,
    id: String,
    callbacks: Mutex<Vec<SetupCallback>>,
}

/// Plugin handle; clones share identity and callbacks
#[derive(Clone)]
pub struct Plugin {
    inner: Arc<PluginInner>,
}

impl Plugin {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let name = name.into();
        // id is the prefix for plugin-scoped names
        let id = name.replace('.', "_");
        Self {
            inner: Arc::new(PluginInner { name, id, callbacks: Mutex::new(Vec::new()) }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn attach(&self, callback: SetupCallback) {
        self.inner.callbacks.lock().push(callback);
    }

    /// Attach a Rust setup callback
    pub fn init_plugin_native<F>(&self, callback: F) -> &Self
    where
        F: Fn(&AppHandle) -> PluginResult<()> + Send + Sync + 'static,
    {
        self.attach(SetupCallback::Native(Arc::new(callback)));
        self
    }

    /// Callbacks in attach order
    pub fn callbacks(&self) -> Vec<SetupCallback> {
        self.inner.callbacks.lock().clone()
    }

    pub fn callback_count(&self) -> usize {
        self.inner.callbacks.lock().len()
    }

    /// Plugin-local namespace for the active load pass
    pub fn globals(&self, context: &LoadContext) -> PluginResult<PluginGlobals> {
        context.globals_for(self)
    }

    pub fn is_same(&self, other: &Plugin) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.inner.name)
            .field("callbacks", &self.callback_count())
            .finish()
    }
}

/// Per-pass key/value namespace of one plugin
#[derive(Clone, Default)]
pub struct PluginGlobals {
    values: Arc<RwLock<Map>>,
}

impl PluginGlobals {
    pub fn get(&self, key: &str) -> Option<Dynamic> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Dynamic) {
        self.values.write().insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_same(&self, other: &PluginGlobals) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}
