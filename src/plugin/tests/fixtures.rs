//! Script and store fixtures shared by the plugin tests

use std::sync::Arc;
use crate::app::Application;
use crate::config::SiteConfig;
use crate::content::{ContentProvider, MemoryContentProvider};

/// Registers `hello`, whose callback sets the `hello` marker
pub const HELLO: &str = r#"
let p = plugin("hello");
p.init_plugin(|app| app.set("hello", "world"));
register_plugin(p);
"#;

/// Registers a plugin, then raises
pub const BAD: &str = r#"
register_plugin(plugin("bad").init_plugin(|app| app.set("bad", true)));
throw "boom";
"#;

pub const PKG_INIT: &str = r#"
export const KIND = "package";
"#;

pub const PKG_SUB: &str = r#"
import "gitpress.plugins.pkg" as pkg;
export const PARENT_KIND = pkg::KIND;
"#;

/// Plugin that counts how often its module body ran
pub fn counting(name: &str) -> String {
    format!(r#"
let p = plugin("{name}");
p.init_plugin(|app| app.push("bodies", "{name}"));
register_plugin(p);
"#)
}

pub fn memory_store(files: &[(&str, &str)]) -> Arc<MemoryContentProvider> {
    Arc::new(MemoryContentProvider::with_files(files.iter().copied()))
}

pub fn site_config() -> SiteConfig {
    SiteConfig::new("/unused").with_plugins_enabled()
}

pub fn application_over(provider: &Arc<MemoryContentProvider>) -> Application {
    Application::new(site_config(), Arc::clone(provider) as Arc<dyn ContentProvider>)
}
