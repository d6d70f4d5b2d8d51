//! Command line actions

use anyhow::Result;
use colored::Colorize;
use log::{debug, info};
use crate::config::SiteConfig;
use crate::content::{ContentProvider, GitContentProvider};
use crate::plugin::version;
use crate::plugin::index::ModuleIndex;
use super::application::Application;

/// Print the plugin modules found at the configured revision
pub fn list_modules(site: &SiteConfig) -> Result<()> {
    let provider = GitContentProvider::new(&site.repo_path, site.revision);
    let snapshot = provider.current_snapshot()?;
    let index = ModuleIndex::build(&snapshot, &site.plugins.dir);
    debug!("Listing {} modules at {}", index.len(), snapshot.revision());

    println!("{} {} ({})", "Plugin modules at".bold(), snapshot.revision(), site.revision);
    if index.is_empty() {
        println!("  none under {}/", index.plugin_root());
        return Ok(());
    }

    for (name, descriptor) in index.iter() {
        let kind = if descriptor.is_package { "package" } else { "module" };
        println!(
            "  {:<40} {:<8} {}",
            format!("{}.{}", site.plugins.namespace, name).cyan(),
            kind,
            descriptor.path.dimmed()
        );
    }
    Ok(())
}

/// Run one load pass and print the report plus the resulting application state as JSON
pub fn load_plugins(site: &SiteConfig) -> Result<()> {
    if !site.plugins.enable {
        anyhow::bail!("Plugins are disabled; pass --enable-plugins or set plugins.enable = true");
    }

    let application = Application::open(site.clone());
    let report = application.load_plugins()?;
    info!("Load pass {} finished with {} failures", report.pass, report.failures.len());

    let output = serde_json::json!({
        "report": &report,
        "app": application.app().to_json(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    match report.first_failure() {
        Some(failure) => Err(failure.clone().into()),
        None => Ok(()),
    }
}

/// Print repository and plugin status
pub fn show_status(site: &SiteConfig) -> Result<()> {
    let provider = GitContentProvider::new(&site.repo_path, site.revision);

    println!("{} {}", "Repository:".bold(), site.repo_path.display());
    println!("{} {}", "Serving:".bold(), site.revision);

    match provider.current_snapshot() {
        Ok(snapshot) => {
            let index = ModuleIndex::build(&snapshot, &site.plugins.dir);
            println!("{} {}", "Revision:".bold(), snapshot.revision());
            println!("{} {}", "Tracked files:".bold(), snapshot.paths().len());
            println!("{} {} under {}/", "Plugin modules:".bold(), index.len(), index.plugin_root());
        }
        Err(e) if e.is_recoverable() => {
            println!("{} {}", "Unavailable:".yellow().bold(), e);
        }
        Err(e) => return Err(e.into()),
    }

    let plugins = if site.plugins.enable { "enabled".green() } else { "disabled".red() };
    println!("{} {} (namespace {})", "Plugins:".bold(), plugins, site.plugins.namespace);

    let api = version::get_version_info();
    println!("{} {} ({})", "Plugin API:".bold(), api["api_version"], api["release_date"].as_str().unwrap_or_default());
    Ok(())
}
