//! Module Index Builder
//!
//! Maps tracked repository paths below the plugin root onto dotted module
//! names. `plugins/pkg/__init__.rhai` becomes the package `pkg`,
//! `plugins/pkg/sub.rhai` the leaf module `pkg.sub`.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use log::debug;
use regex::Regex;
use crate::content::{RevisionId, Snapshot};

/// File that turns a directory into a package
pub const PACKAGE_INIT: &str = "__init__.rhai";

/// Suffix of plugin source files
pub const SOURCE_SUFFIX: &str = ".rhai";

const PATH_SEPARATOR: char = '/';

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static identifier pattern"))
}

/// True when every dot-separated segment of `name` is an identifier
pub fn is_dotted_identifier(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(|segment| identifier_pattern().is_match(segment))
}

/// Where a module's source lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub path: String,
    pub is_package: bool,
}

impl ModuleDescriptor {
    /// Directory searched for sub-modules; only packages have one
    pub fn search_path(&self) -> Option<String> {
        if !self.is_package {
            return None;
        }
        self.path.rsplit_once(PATH_SEPARATOR).map(|(dir, _)| dir.to_string())
    }
}

/// Module name -> descriptor, rebuilt from scratch for every snapshot
#[derive(Debug, Clone)]
pub struct ModuleIndex {
    revision: RevisionId,
    plugin_root: String,
    modules: BTreeMap<String, ModuleDescriptor>,
}

impl ModuleIndex {
    /// Scan `snapshot` for modules under `plugin_root`
    pub fn build(snapshot: &Snapshot, plugin_root: &str) -> Self {
        let plugin_root = normalize_root(plugin_root);
        let prefix = format!("{}{}", plugin_root, PATH_SEPARATOR);
        let mut modules = BTreeMap::new();

        for path in snapshot.paths() {
            let Some(remainder) = path.strip_prefix(&prefix) else {
                continue;
            };
            let Some((name, is_package)) = module_name_for(remainder) else {
                continue;
            };

            let descriptor = ModuleDescriptor { path: path.clone(), is_package };
            if let Some(previous) = modules.insert(name.clone(), descriptor) {
                // later path wins; the store is not trusted to be well formed
                debug!("Module {} defined by both {} and {}, using {}", name, previous.path, path, path);
            }
        }

        debug!("Indexed {} plugin modules under {}/ at {}", modules.len(), plugin_root, snapshot.revision());
        Self {
            revision: snapshot.revision().clone(),
            plugin_root,
            modules,
        }
    }

    pub fn revision(&self) -> &RevisionId {
        &self.revision
    }

    pub fn plugin_root(&self) -> &str {
        &self.plugin_root
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Module names in sorted order; packages come before their sub-modules
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleDescriptor)> {
        self.modules.iter().map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn normalize_root(root: &str) -> String {
    let root = root.strip_prefix("./").unwrap_or(root);
    root.trim_end_matches(PATH_SEPARATOR).to_string()
}

/// Derive `(module name, is_package)` from a path relative to the plugin root
fn module_name_for(remainder: &str) -> Option<(String, bool)> {
    // init file directly at the root would shadow the namespace itself
    if remainder == PACKAGE_INIT {
        return None;
    }

    let package_suffix = format!("{}{}", PATH_SEPARATOR, PACKAGE_INIT);
    let (stem, is_package) = if let Some(dir) = remainder.strip_suffix(package_suffix.as_str()) {
        (dir, true)
    } else if let Some(stem) = remainder.strip_suffix(SOURCE_SUFFIX) {
        (stem, false)
    } else {
        return None;
    };

    if stem.is_empty() {
        return None;
    }

    let pattern = identifier_pattern();
    let segments: Vec<&str> = stem.split(PATH_SEPARATOR).collect();
    if !segments.iter().all(|segment| pattern.is_match(segment)) {
        debug!("Skipping plugin path with non-identifier segments: {}", remainder);
        return None;
    }

    Some((segments.join("."), is_package))
}
