use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::PathBuf;
use anyhow::{Context, Result};
use serde::Serialize;
use toml::Value;
use log::{debug, info};
use crate::content::RevisionSelector;
use crate::plugin::index::is_dotted_identifier;

/// Configuration storage - section_name -> key -> value
pub type Configuration = HashMap<String, HashMap<String, String>>;

pub const DEFAULT_PLUGIN_DIR: &str = "plugins";
pub const DEFAULT_NAMESPACE: &str = "gitpress.plugins";
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;
pub const DEFAULT_POSTS_PER_PAGE: i64 = 10;

/// `[plugins]` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSettings {
    pub enable: bool,
    pub dir: String,
    pub namespace: String,
    pub auto_reload: bool,
    /// Operation budget per script run; 0 is unlimited
    pub max_operations: u64,
    pub max_call_depth: usize,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enable: false,
            dir: DEFAULT_PLUGIN_DIR.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            auto_reload: false,
            max_operations: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Everything the application needs to serve a site
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub repo_path: PathBuf,
    pub revision: RevisionSelector,
    pub plugins: PluginSettings,
    /// Site settings exposed read-only to plugins through `App.config`
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl SiteConfig {
    pub fn new<P: Into<PathBuf>>(repo_path: P) -> Self {
        Self {
            repo_path: repo_path.into(),
            revision: RevisionSelector::Default,
            plugins: PluginSettings::default(),
            settings: default_site_settings(),
        }
    }

    /// Same configuration with plugins switched on
    pub fn with_plugins_enabled(mut self) -> Self {
        self.plugins.enable = true;
        self
    }
}

fn default_site_settings() -> BTreeMap<String, serde_json::Value> {
    use serde_json::json;
    let mut settings = BTreeMap::new();
    settings.insert("author".to_string(), json!("Your Name Here"));
    settings.insert("title".to_string(), json!("Your Title Here"));
    settings.insert("tagline".to_string(), json!("Your tagline here"));
    settings.insert("posts-per-page".to_string(), json!(DEFAULT_POSTS_PER_PAGE));
    settings.insert("content-dir".to_string(), json!("content"));
    settings.insert("templates-dir".to_string(), json!("templates"));
    settings.insert("static-dir".to_string(), json!("static"));
    settings.insert("attachment-dir".to_string(), json!("content/attachments"));
    settings.insert("post-ext".to_string(), json!(".rst"));
    settings.insert("show-rst-source".to_string(), json!(true));
    settings.insert("opengraph".to_string(), json!(false));
    settings
}

/// Configuration manager
pub struct ConfigManager {
    config: Configuration,
    config_file_path: Option<PathBuf>,
    selected_section: Option<String>,
}

impl ConfigManager {
    /// Create a new ConfigManager from a Configuration (primarily for testing)
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config,
            config_file_path: None,
            selected_section: None,
        }
    }

    /// Load configuration using discovery hierarchy
    pub fn load() -> Result<Self> {
        debug!("Starting configuration discovery");

        let config_paths = discover_config_files()?;

        for path in config_paths {
            debug!("Attempting to load config from: {}", path.display());
            if path.exists() {
                info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(path);
            }
        }

        info!("No configuration file found, using empty configuration");
        Ok(Self::from_config(Configuration::new()))
    }

    /// Load configuration from explicit file path
    pub fn load_from_file(path: PathBuf) -> Result<Self> {
        debug!("Loading configuration from file: {}", path.display());

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = parse_toml_config(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Successfully loaded configuration from: {}", path.display());
        Ok(Self {
            config,
            config_file_path: Some(path),
            selected_section: None,
        })
    }

    pub fn config_file_path(&self) -> Option<&PathBuf> {
        self.config_file_path.as_ref()
    }

    /// Get value from configuration with section fallback
    pub fn get_value(&self, section: &str, key: &str) -> Option<&String> {
        // Priority: selected_section -> specified section -> base
        if let Some(selected) = &self.selected_section {
            if let Some(value) = self.config.get(selected).and_then(|s| s.get(key)) {
                return Some(value);
            }
        }

        if let Some(value) = self.config.get(section).and_then(|s| s.get(key)) {
            return Some(value);
        }

        self.config.get("base").and_then(|s| s.get(key))
    }

    /// Select configuration section for --config-name
    pub fn select_section(&mut self, section: String) {
        debug!("Selecting configuration section: {}", section);
        self.selected_section = Some(section);
    }

    /// Get boolean value with type conversion
    pub fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>> {
        match self.get_value(section, key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(anyhow::anyhow!("Invalid boolean value for {}.{}: {}", section, key, value)),
            },
            None => Ok(None),
        }
    }

    /// Get an unsigned integer value with type conversion
    pub fn get_number<T: std::str::FromStr>(&self, section: &str, key: &str) -> Result<Option<T>> {
        match self.get_value(section, key) {
            Some(value) => value.parse::<T>()
                .map(Some)
                .map_err(|_| anyhow::anyhow!("Invalid number for {}.{}: {}", section, key, value)),
            None => Ok(None),
        }
    }

    /// Get log level value with type conversion
    pub fn get_log_level(&self, section: &str, key: &str) -> Result<Option<log::LevelFilter>> {
        match self.get_value(section, key) {
            Some(value) => Ok(Some(crate::logging::parse_log_level(value)?)),
            None => Ok(None),
        }
    }

    /// Get path value with type conversion
    pub fn get_path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.get_value(section, key).map(PathBuf::from)
    }

    /// Get plugin loader settings from the `[plugins]` section
    pub fn get_plugin_settings(&self) -> Result<PluginSettings> {
        let mut settings = PluginSettings::default();

        if let Some(enable) = self.get_bool("plugins", "enable")? {
            settings.enable = enable;
        }
        if let Some(dir) = self.get_value("plugins", "dir") {
            settings.dir = dir.clone();
        }
        if let Some(namespace) = self.get_value("plugins", "namespace") {
            if !is_dotted_identifier(namespace) {
                anyhow::bail!("Invalid plugin namespace in config: {}", namespace);
            }
            settings.namespace = namespace.clone();
        }
        if let Some(auto_reload) = self.get_bool("plugins", "auto-reload")? {
            settings.auto_reload = auto_reload;
        }
        if let Some(max_operations) = self.get_number::<u64>("plugins", "max-operations")? {
            settings.max_operations = max_operations;
        }
        if let Some(max_call_depth) = self.get_number::<usize>("plugins", "max-call-depth")? {
            if max_call_depth == 0 {
                anyhow::bail!("plugins.max-call-depth must be greater than zero");
            }
            settings.max_call_depth = max_call_depth;
        }

        Ok(settings)
    }

    /// Get site configuration from the `[site]` and `[plugins]` sections
    pub fn get_site_config(&self) -> Result<SiteConfig> {
        let repo_path = match self.get_path("site", "repo-path") {
            Some(path) => path,
            None => env::current_dir().context("Failed to get current directory")?,
        };
        let mut config = SiteConfig::new(repo_path);

        if let Some(revision) = self.get_value("site", "revision") {
            config.revision = revision.parse()
                .with_context(|| format!("Invalid revision in config: {}", revision))?;
        }

        for key in ["author", "title", "tagline", "title-html", "content-dir", "templates-dir",
                    "static-dir", "attachment-dir", "post-ext", "robots-txt"] {
            if let Some(value) = self.get_value("site", key) {
                config.settings.insert(key.to_string(), serde_json::Value::String(value.clone()));
            }
        }
        for key in ["show-rst-source", "opengraph"] {
            if let Some(value) = self.get_bool("site", key)? {
                config.settings.insert(key.to_string(), serde_json::Value::Bool(value));
            }
        }
        if let Some(per_page) = self.get_number::<i64>("site", "posts-per-page")? {
            if per_page < 1 {
                anyhow::bail!("site.posts-per-page must be at least 1");
            }
            config.settings.insert("posts-per-page".to_string(), serde_json::json!(per_page));
        }
        config.settings.insert("revision".to_string(), serde_json::json!(config.revision.to_string()));

        config.plugins = self.get_plugin_settings()?;
        Ok(config)
    }
}

/// Discover configuration files in order of precedence
fn discover_config_files() -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    // 1. Environment variable $GITPRESS_CONFIG
    if let Ok(env_path) = env::var("GITPRESS_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    // 2. XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("gitpress").join("config.toml"));
    }

    // 3. Home directory
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".gitpress.toml"));
    }

    // 4. Project local
    paths.push(PathBuf::from("./.gitpress.toml"));

    debug!("Config discovery paths: {:?}", paths);
    Ok(paths)
}

/// Parse TOML content to string-based configuration
fn parse_toml_config(content: &str) -> Result<Configuration> {
    let toml_value: Value = content.parse()
        .context("Failed to parse TOML content")?;

    let mut config = Configuration::new();

    if let Value::Table(table) = toml_value {
        flatten_toml_table(&table, String::new(), &mut config);
    }

    debug!("Parsed configuration: {:?}", config);
    Ok(config)
}

/// Recursively flatten TOML tables into section.subsection format
fn flatten_toml_table(table: &toml::Table, prefix: String, config: &mut Configuration) {
    for (key, value) in table {
        let section_name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };

        match value {
            Value::Table(subtable) => {
                if subtable.values().all(|v| !matches!(v, Value::Table(_))) {
                    // leaf table: a configuration section
                    let mut section_map = HashMap::new();
                    for (subkey, subvalue) in subtable {
                        section_map.insert(subkey.clone(), toml_value_to_string(subvalue));
                    }
                    config.insert(section_name, section_map);
                } else {
                    flatten_toml_table(subtable, section_name, config);
                }
            }
            _ => {
                // top-level key outside any section
                let mut section_map = HashMap::new();
                section_map.insert("value".to_string(), toml_value_to_string(value));
                config.insert(section_name, section_map);
            }
        }
    }
}

/// Convert TOML Value to string representation
fn toml_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Array(_) | Value::Table(_) => value.to_string(),
        _ => String::new(),
    }
}
