//! Load Pass Context
//!
//! One [`LoadContext`] exists per load pass. It collects the plugins that
//! module code registers, owns the per-pass plugin globals, and tracks which
//! module is executing. It is passed explicitly to the engine and importer;
//! once the pass finishes every registration operation fails.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use parking_lot::Mutex;
use log::{debug, info};
use rhai::{Dynamic, Engine};
use crate::app::AppHandle;
use super::error::{PluginError, PluginResult};
use super::module::PluginModule;
use super::registry::{Plugin, PluginGlobals, SetupCallback};

struct Registration {
    plugin: Plugin,
    module: Option<String>,
}

pub struct LoadContext {
    pass: u64,
    active: AtomicBool,
    /// Cleared once activation starts; the registry is closed from then on
    accepting: AtomicBool,
    registry: Mutex<Vec<Registration>>,
    globals: Mutex<HashMap<String, PluginGlobals>>,
    /// Executing-module stack of each thread importing through this pass
    executing: Mutex<HashMap<ThreadId, Vec<Arc<PluginModule>>>>,
}

/// Marks a module as executing until dropped
pub struct ExecutionFrame<'a> {
    context: &'a LoadContext,
}

impl Drop for ExecutionFrame<'_> {
    fn drop(&mut self) {
        let mut executing = self.context.executing.lock();
        let id = thread::current().id();
        if let Some(stack) = executing.get_mut(&id) {
            stack.pop();
            if stack.is_empty() {
                executing.remove(&id);
            }
        }
    }
}

impl LoadContext {
    pub fn new(pass: u64) -> Self {
        Self {
            pass,
            active: AtomicBool::new(true),
            accepting: AtomicBool::new(true),
            registry: Mutex::new(Vec::new()),
            globals: Mutex::new(HashMap::new()),
            executing: Mutex::new(HashMap::new()),
        }
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn ensure_active(&self, operation: &str) -> PluginResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(PluginError::no_active_context(format!("{} after load pass {} finished", operation, self.pass)))
        }
    }

    /// Context of a pass that has already ended; imports through it cannot register plugins
    pub fn inactive(pass: u64) -> Self {
        let context = Self::new(pass);
        context.active.store(false, Ordering::Release);
        context
    }

    /// Append `plugin` to this pass's registry, tagged with the executing module
    pub fn register_plugin(&self, plugin: Plugin) -> PluginResult<()> {
        self.ensure_active("register_plugin")?;
        if !self.accepting.load(Ordering::Acquire) {
            return Err(PluginError::no_active_context(format!(
                "register_plugin while load pass {} is activating plugins",
                self.pass
            )));
        }
        let module = self.current_module().map(|m| m.name().to_string());
        debug!(
            "Plugin {} registered in load pass {} by {}",
            plugin.name(),
            self.pass,
            module.as_deref().unwrap_or("host")
        );
        self.registry.lock().push(Registration { plugin, module });
        Ok(())
    }

    /// Drop the registrations made by `module`; its body failed
    pub fn discard_registrations_from(&self, module: &str) -> usize {
        let mut registry = self.registry.lock();
        let before = registry.len();
        registry.retain(|entry| entry.module.as_deref() != Some(module));
        let discarded = before - registry.len();
        if discarded > 0 {
            debug!("Discarded {} plugin registrations from failed module {}", discarded, module);
        }
        discarded
    }

    /// Plugins registered so far, in registration order
    pub fn registered(&self) -> Vec<Plugin> {
        self.registry.lock().iter().map(|entry| entry.plugin.clone()).collect()
    }

    /// Lazily created namespace of `plugin`, keyed by its id
    pub fn globals_for(&self, plugin: &Plugin) -> PluginResult<PluginGlobals> {
        self.ensure_active("plugin globals")?;
        let key = format!("{}_globals", plugin.id());
        Ok(self.globals.lock().entry(key).or_default().clone())
    }

    pub fn enter(&self, module: Arc<PluginModule>) -> ExecutionFrame<'_> {
        self.executing.lock().entry(thread::current().id()).or_default().push(module);
        ExecutionFrame { context: self }
    }

    /// Innermost module executing on the calling thread
    pub fn current_module(&self) -> Option<Arc<PluginModule>> {
        self.executing
            .lock()
            .get(&thread::current().id())
            .and_then(|stack| stack.last().cloned())
    }

    /// Run the setup callbacks of every registered plugin, in registration
    /// order and then attach order, against `app`. Returns the plugin names.
    ///
    /// The registry is emptied and closed: a callback that registers another
    /// plugin fails with `NoActiveContext`. The first failing callback aborts
    /// activation.
    pub fn drain_and_activate(&self, engine: &Engine, app: &AppHandle) -> PluginResult<Vec<String>> {
        self.ensure_active("drain_and_activate")?;
        self.accepting.store(false, Ordering::Release);
        let plugins = std::mem::take(&mut *self.registry.lock());
        let mut activated = Vec::with_capacity(plugins.len());

        for Registration { plugin, .. } in plugins {
            for callback in plugin.callbacks() {
                self.invoke(engine, app, &plugin, callback)?;
            }
            info!("Activated plugin {}", plugin.name());
            activated.push(plugin.name().to_string());
        }
        Ok(activated)
    }

    fn invoke(&self, engine: &Engine, app: &AppHandle, plugin: &Plugin, callback: SetupCallback) -> PluginResult<()> {
        match callback {
            SetupCallback::Native(f) => f(app),
            SetupCallback::Script { func, module } => {
                let ast = module.ast().ok_or_else(|| {
                    PluginError::plugin_execution(module.origin(), "module has no compiled body")
                })?;
                let _frame = self.enter(Arc::clone(&module));
                func.call::<Dynamic>(engine, &ast, (app.clone(),))
                    .map(|_| ())
                    .map_err(|e| PluginError::plugin_execution(
                        module.origin(),
                        format!("setup callback of plugin {} failed: {}", plugin.name(), e),
                    ))
            }
        }
    }

    /// End the pass; later registrations fail with `NoActiveContext`
    pub fn finish(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.globals.lock().clear();
            self.registry.lock().clear();
            debug!("Load pass {} finished", self.pass);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppHandle;
    use crate::plugin::module::ModuleKind;
    use serde_json::json;

    #[test]
    fn test_registration_after_finish_fails() {
        let context = LoadContext::new(1);
        context.register_plugin(Plugin::new("early")).unwrap();
        assert_eq!(context.registered().len(), 1);

        context.finish();
        let err = context.register_plugin(Plugin::new("late")).unwrap_err();
        assert!(matches!(err, PluginError::NoActiveContext { .. }));
        assert!(context.globals_for(&Plugin::new("late")).is_err());
    }

    #[test]
    fn test_globals_are_per_plugin_id_and_per_pass() {
        let first = LoadContext::new(1);
        let plugin = Plugin::new("a.b");
        let globals = plugin.globals(&first).unwrap();
        globals.set("seen", Dynamic::TRUE);

        // same id -> same namespace within the pass
        assert!(globals.is_same(&Plugin::new("a_b").globals(&first).unwrap()));
        assert!(!globals.is_same(&Plugin::new("other").globals(&first).unwrap()));

        let second = LoadContext::new(2);
        let fresh = plugin.globals(&second).unwrap();
        assert!(!fresh.contains("seen"));
    }

    #[test]
    fn test_activation_order() {
        let context = LoadContext::new(1);
        let app = AppHandle::default();

        let first = Plugin::new("first");
        first
            .init_plugin_native(|app| { app.push_to("order", json!("first.1")); Ok(()) })
            .init_plugin_native(|app| { app.push_to("order", json!("first.2")); Ok(()) });
        let second = Plugin::new("second");
        second.init_plugin_native(|app| { app.push_to("order", json!("second.1")); Ok(()) });

        context.register_plugin(first).unwrap();
        context.register_plugin(second).unwrap();

        let activated = context.drain_and_activate(&Engine::new(), &app).unwrap();
        assert_eq!(activated, vec!["first", "second"]);
        assert_eq!(app.get("order"), Some(json!(["first.1", "first.2", "second.1"])));
        assert!(context.registered().is_empty());
    }

    #[test]
    fn test_registration_during_activation_fails() {
        let context = Arc::new(LoadContext::new(1));
        let app = AppHandle::default();

        let outer = Plugin::new("outer");
        let ctx = Arc::clone(&context);
        outer.init_plugin_native(move |_| ctx.register_plugin(Plugin::new("inner")));
        context.register_plugin(outer).unwrap();

        let err = context.drain_and_activate(&Engine::new(), &app).unwrap_err();
        assert!(matches!(err, PluginError::NoActiveContext { .. }));
        assert!(context.registered().is_empty());
    }

    #[test]
    fn test_executing_module_is_per_thread() {
        let context = LoadContext::new(1);
        let _frame = context.enter(Arc::new(PluginModule::builtin("gitpress.plugins.main", ModuleKind::Leaf)));

        thread::scope(|scope| {
            scope.spawn(|| {
                assert!(context.current_module().is_none());
                let _frame = context.enter(Arc::new(PluginModule::builtin("gitpress.plugins.worker", ModuleKind::Leaf)));
                assert_eq!(context.current_module().unwrap().name(), "gitpress.plugins.worker");
            });
        });

        assert_eq!(context.current_module().unwrap().name(), "gitpress.plugins.main");
    }

    #[test]
    fn test_failing_callback_aborts_activation() {
        let context = LoadContext::new(1);
        let app = AppHandle::default();

        let broken = Plugin::new("broken");
        broken.init_plugin_native(|_| Err(PluginError::plugin_execution("native:broken", "nope")));
        let after = Plugin::new("after");
        after.init_plugin_native(|app| { app.set("after", json!(true)); Ok(()) });

        context.register_plugin(broken).unwrap();
        context.register_plugin(after).unwrap();

        let err = context.drain_and_activate(&Engine::new(), &app).unwrap_err();
        assert_eq!(err.origin(), Some("native:broken"));
        assert!(!app.has("after"));
    }
}
