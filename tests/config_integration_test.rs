use gitpress::config::ConfigManager;
use gitpress::content::RevisionSelector;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_file_integration() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("gitpress.toml");

    let config_content = r#"
[base]
console-level = "debug"
log-format = "json"

[site]
repo-path = "/srv/blog"
revision = "working-dir"
title = "Notes"
posts-per-page = 5
opengraph = false

[plugins]
enable = true
dir = "ext"
namespace = "notes.ext"
auto-reload = true
max-operations = 100000
"#;

    fs::write(&config_path, config_content).expect("Failed to write config file");

    let manager = ConfigManager::load_from_file(config_path.clone()).unwrap();
    assert_eq!(manager.config_file_path(), Some(&config_path));

    let site = manager.get_site_config().unwrap();
    assert_eq!(site.repo_path, std::path::PathBuf::from("/srv/blog"));
    assert_eq!(site.revision, RevisionSelector::WorkingDir);
    assert_eq!(site.settings["title"], serde_json::json!("Notes"));
    assert_eq!(site.settings["posts-per-page"], serde_json::json!(5));
    assert_eq!(site.settings["opengraph"], serde_json::json!(false));
    assert_eq!(site.settings["revision"], serde_json::json!("working-dir"));

    assert!(site.plugins.enable);
    assert!(site.plugins.auto_reload);
    assert_eq!(site.plugins.dir, "ext");
    assert_eq!(site.plugins.namespace, "notes.ext");
    assert_eq!(site.plugins.max_operations, 100_000);
}

#[test]
fn test_config_section_selection() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("gitpress.toml");

    let config_content = r#"
[plugins]
enable = false

[staging]
enable = true
namespace = "staging.plugins"
"#;

    fs::write(&config_path, config_content).expect("Failed to write config file");

    let mut manager = ConfigManager::load_from_file(config_path).unwrap();
    assert!(!manager.get_plugin_settings().unwrap().enable);

    manager.select_section("staging".to_string());
    let settings = manager.get_plugin_settings().unwrap();
    assert!(settings.enable);
    assert_eq!(settings.namespace, "staging.plugins");
}

#[test]
fn test_invalid_plugin_settings_rejected() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("gitpress.toml");
    fs::write(&config_path, "[plugins]\nnamespace = \"not a namespace\"\n").expect("Failed to write config file");

    let manager = ConfigManager::load_from_file(config_path).unwrap();
    assert!(manager.get_site_config().is_err());
}

#[test]
fn test_missing_config_file() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let result = ConfigManager::load_from_file(temp_dir.path().join("absent.toml"));
    assert!(result.is_err());
}
