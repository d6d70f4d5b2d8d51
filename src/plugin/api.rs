//! Script capability API
//!
//! The only functions and types plugin scripts can reach. Everything else the
//! application offers is unreachable from script code.
//!
//! ```rhai
//! let p = plugin("hello");
//! p.init_plugin(|app| app.set("hello", true));
//! register_plugin(p);
//! ```

use std::sync::Arc;
use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, ImmutableString};
use crate::app::AppHandle;
use super::context::LoadContext;
use super::error::PluginError;
use super::registry::{Plugin, PluginGlobals, SetupCallback};
use super::version;

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

fn script_error(error: PluginError) -> Box<EvalAltResult> {
    error.to_string().into()
}

/// Register the plugin API on `engine`, bound to the load pass `context`
pub fn register_capabilities(engine: &mut Engine, context: &Arc<LoadContext>) {
    register_plugin_type(engine, context);
    register_globals_type(engine);
    register_app_type(engine);
    register_host_functions(engine, context);
}

fn register_plugin_type(engine: &mut Engine, context: &Arc<LoadContext>) {
    engine.register_type_with_name::<Plugin>("Plugin");
    engine.register_fn("plugin", |name: &str| Plugin::new(name));
    engine.register_get("name", |p: &mut Plugin| p.name().to_string());
    engine.register_get("id", |p: &mut Plugin| p.id().to_string());
    engine.register_fn("to_string", |p: &mut Plugin| format!("Plugin({})", p.name()));

    let ctx = Arc::clone(context);
    engine.register_fn("init_plugin", move |p: &mut Plugin, func: FnPtr| -> ScriptResult<Plugin> {
        let module = ctx.current_module().ok_or_else(|| {
            script_error(PluginError::no_active_context("init_plugin outside module execution"))
        })?;
        p.attach(SetupCallback::Script { func, module });
        Ok(p.clone())
    });

    let ctx = Arc::clone(context);
    engine.register_fn("globals", move |p: &mut Plugin| -> ScriptResult<PluginGlobals> {
        p.globals(&ctx).map_err(script_error)
    });
}

fn register_globals_type(engine: &mut Engine) {
    engine.register_type_with_name::<PluginGlobals>("PluginGlobals");
    engine.register_indexer_get(|g: &mut PluginGlobals, key: ImmutableString| {
        g.get(&key).unwrap_or(Dynamic::UNIT)
    });
    engine.register_indexer_set(|g: &mut PluginGlobals, key: ImmutableString, value: Dynamic| {
        g.set(&key, value)
    });
    engine.register_fn("contains", |g: &mut PluginGlobals, key: &str| g.contains(key));
    engine.register_fn("len", |g: &mut PluginGlobals| g.len() as i64);
}

fn register_app_type(engine: &mut Engine) {
    engine.register_type_with_name::<AppHandle>("App");

    engine.register_fn("config", |app: &mut AppHandle, key: &str| -> ScriptResult<Dynamic> {
        match app.config(key) {
            Some(value) => rhai::serde::to_dynamic(value),
            None => Ok(Dynamic::UNIT),
        }
    });
    engine.register_fn("set_config", |app: &mut AppHandle, key: &str, value: Dynamic| -> ScriptResult<()> {
        app.set_config(key, rhai::serde::from_dynamic(&value.flatten())?);
        Ok(())
    });
    engine.register_fn("get", |app: &mut AppHandle, key: &str| -> ScriptResult<Dynamic> {
        match app.get(key) {
            Some(value) => rhai::serde::to_dynamic(value),
            None => Ok(Dynamic::UNIT),
        }
    });
    engine.register_fn("set", |app: &mut AppHandle, key: &str, value: Dynamic| -> ScriptResult<()> {
        app.set(key, rhai::serde::from_dynamic(&value.flatten())?);
        Ok(())
    });
    engine.register_fn("has", |app: &mut AppHandle, key: &str| app.has(key));
    engine.register_fn("push", |app: &mut AppHandle, key: &str, value: Dynamic| -> ScriptResult<()> {
        app.push_to(key, rhai::serde::from_dynamic(&value.flatten())?);
        Ok(())
    });
    engine.register_fn("add_route", |app: &mut AppHandle, rule: &str, body: &str| app.add_route(rule, body));
}

fn register_host_functions(engine: &mut Engine, context: &Arc<LoadContext>) {
    let ctx = Arc::clone(context);
    engine.register_fn("register_plugin", move |p: Plugin| -> ScriptResult<()> {
        ctx.register_plugin(p).map_err(script_error)
    });

    let ctx = Arc::clone(context);
    engine.register_fn("current_module", move || -> String {
        ctx.current_module().map(|m| m.name().to_string()).unwrap_or_default()
    });

    engine.register_fn("api_version", version::get_api_version);
    engine.register_fn("require_api", |required: i64| -> ScriptResult<()> {
        version::check_api(required).map_err(script_error)
    });
}
