//! Running application handle
//!
//! [`AppHandle`] is the object setup callbacks receive. Clones share state,
//! so a callback may keep the handle it was given.

use std::collections::BTreeMap;
use std::sync::Arc;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use log::debug;

/// URL rule contributed by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub rule: String,
    pub body: String,
}

/// Application state visible to plugins
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppState {
    pub config: BTreeMap<String, Value>,
    pub extensions: BTreeMap<String, Value>,
    pub routes: Vec<Route>,
}

#[derive(Clone, Default)]
pub struct AppHandle {
    base_config: Arc<BTreeMap<String, Value>>,
    state: Arc<RwLock<AppState>>,
}

impl AppHandle {
    /// Handle whose configuration starts from, and resets to, `base_config`
    pub fn with_config(base_config: BTreeMap<String, Value>) -> Self {
        let state = AppState { config: base_config.clone(), ..AppState::default() };
        Self {
            base_config: Arc::new(base_config),
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn config(&self, key: &str) -> Option<Value> {
        self.state.read().config.get(key).cloned()
    }

    pub fn set_config(&self, key: &str, value: Value) {
        self.state.write().config.insert(key.to_string(), value);
    }

    /// Extension value set by a plugin
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().extensions.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.state.write().extensions.insert(key.to_string(), value);
    }

    pub fn has(&self, key: &str) -> bool {
        self.state.read().extensions.contains_key(key)
    }

    /// Append `value` to the array extension `key`, creating it if needed.
    /// A non-array value under `key` is wrapped into the array first.
    pub fn push_to(&self, key: &str, value: Value) {
        let mut state = self.state.write();
        let entry = state.extensions.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(value),
            other => {
                let previous = other.take();
                *other = Value::Array(vec![previous, value]);
            }
        }
    }

    /// Add or replace the route for `rule`
    pub fn add_route(&self, rule: &str, body: &str) {
        let mut state = self.state.write();
        let route = Route { rule: rule.to_string(), body: body.to_string() };
        match state.routes.iter_mut().find(|r| r.rule == rule) {
            Some(existing) => *existing = route,
            None => state.routes.push(route),
        }
    }

    pub fn route(&self, rule: &str) -> Option<Route> {
        self.state.read().routes.iter().find(|r| r.rule == rule).cloned()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.state.read().routes.clone()
    }

    /// Drop everything plugins contributed and restore the base configuration
    pub fn reset(&self) {
        let mut state = self.state.write();
        debug!(
            "Resetting application state ({} extensions, {} routes)",
            state.extensions.len(),
            state.routes.len()
        );
        *state = AppState { config: (*self.base_config).clone(), ..AppState::default() };
    }

    pub fn snapshot(&self) -> AppState {
        self.state.read().clone()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(&*self.state.read()).unwrap_or(Value::Null)
    }

    pub fn is_same(&self, other: &AppHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("AppHandle")
            .field("config", &state.config.len())
            .field("extensions", &state.extensions.len())
            .field("routes", &state.routes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extensions() {
        let app = AppHandle::default();
        assert!(!app.has("marker"));
        app.set("marker", json!(true));
        assert!(app.has("marker"));
        assert_eq!(app.get("marker"), Some(json!(true)));
    }

    #[test]
    fn test_push_to() {
        let app = AppHandle::default();
        app.push_to("list", json!(1));
        app.push_to("list", json!(2));
        assert_eq!(app.get("list"), Some(json!([1, 2])));

        app.set("scalar", json!("a"));
        app.push_to("scalar", json!("b"));
        assert_eq!(app.get("scalar"), Some(json!(["a", "b"])));
    }

    #[test]
    fn test_routes_replace_by_rule() {
        let app = AppHandle::default();
        app.add_route("/hello", "one");
        app.add_route("/other", "x");
        app.add_route("/hello", "two");

        assert_eq!(app.routes().len(), 2);
        assert_eq!(app.route("/hello").unwrap().body, "two");
    }

    #[test]
    fn test_reset_restores_base_config() {
        let mut base = BTreeMap::new();
        base.insert("title".to_string(), json!("My Blog"));
        let app = AppHandle::with_config(base);

        app.set_config("title", json!("Changed"));
        app.set("marker", json!(1));
        app.add_route("/x", "y");
        let clone = app.clone();

        app.reset();
        assert_eq!(clone.config("title"), Some(json!("My Blog")));
        assert!(!clone.has("marker"));
        assert!(clone.routes().is_empty());
        assert!(clone.is_same(&app));
    }

    #[test]
    fn test_json_snapshot() {
        let app = AppHandle::default();
        app.add_route("/a", "b");
        let json = app.to_json();
        assert_eq!(json["routes"][0]["rule"], json!("/a"));
        assert!(json["extensions"].as_object().unwrap().is_empty());
    }
}
