// Integration tests for the gitpress binary
// Runs the built executable against temporary repositories

use git2::{Repository, Signature};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn gitpress(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gitpress"))
        .args(args)
        .env_remove("GITPRESS_CONFIG")
        .output()
        .expect("Failed to execute gitpress")
}

fn repo_with(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let repo = Repository::init(temp_dir.path()).expect("Failed to init repository");
    let mut index = repo.index().expect("Failed to get index");
    for (path, content) in files {
        let full = temp_dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(&full, content).unwrap();
        index.add_path(Path::new(path)).expect("Failed to add file");
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::now("Test User", "test@example.com").unwrap();
    repo.commit(Some("HEAD"), &signature, &signature, "initial", &tree, &[]).unwrap();
    temp_dir
}

#[test]
fn test_list_modules() {
    let repo = repo_with(&[
        ("plugins/hello.rhai", ""),
        ("plugins/blog/__init__.rhai", ""),
        ("plugins/blog/tags.rhai", ""),
    ]);
    let repo_path = repo.path().to_string_lossy().to_string();

    let output = gitpress(&["--repo", &repo_path, "--no-color", "--quiet", "--list-modules"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gitpress.plugins.hello"));
    assert!(stdout.contains("gitpress.plugins.blog.tags"));
    assert!(stdout.contains("plugins/blog/__init__.rhai"));
}

#[test]
fn test_load_plugins_prints_report() {
    let repo = repo_with(&[
        ("plugins/hello.rhai", r#"register_plugin(plugin("hello").init_plugin(|app| app.set("hello", "world")));"#),
    ]);
    let repo_path = repo.path().to_string_lossy().to_string();

    let output = gitpress(&["--repo", &repo_path, "--quiet", "--enable-plugins", "--load-plugins"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(report["report"]["activated"], serde_json::json!(["hello"]));
    assert_eq!(report["app"]["extensions"]["hello"], serde_json::json!("world"));
}

#[test]
fn test_load_plugins_requires_enable() {
    let repo = repo_with(&[("plugins/hello.rhai", "")]);
    let repo_path = repo.path().to_string_lossy().to_string();

    let output = gitpress(&["--repo", &repo_path, "--quiet", "--load-plugins"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Plugins are disabled"));
}

#[test]
fn test_failing_plugin_exits_with_error() {
    let repo = repo_with(&[("plugins/bad.rhai", r#"throw "boom";"#)]);
    let repo_path = repo.path().to_string_lossy().to_string();

    let output = gitpress(&["--repo", &repo_path, "--quiet", "--enable-plugins", "--load-plugins"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("repo:plugins/bad.rhai"));
}

#[test]
fn test_invalid_revision_rejected() {
    let output = gitpress(&["--revision", "tip"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("tip"));
}

#[test]
fn test_status_of_missing_repository() {
    let output = gitpress(&["--repo", "/definitely/does/not/exist", "--no-color", "--quiet"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Unavailable"));
}
