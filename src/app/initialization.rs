//! Application initialization and configuration

use anyhow::{Context, Result};
use log::{debug, error};
use crate::{cli, config, logging};
use crate::plugin::index::is_dotted_identifier;
use super::repository::resolve_repository_path;

pub fn load_configuration(args: &cli::Args) -> Result<config::ConfigManager> {
    let mut manager = if let Some(config_file) = &args.config_file {
        debug!("Loading configuration from explicit file: {}", config_file.display());
        config::ConfigManager::load_from_file(config_file.clone())?
    } else {
        config::ConfigManager::load()?
    };

    if let Some(section_name) = &args.config_name {
        debug!("Selecting configuration section: {}", section_name);
        manager.select_section(section_name.clone());
    }

    Ok(manager)
}

/// Site configuration from the config file, overridden by command line flags
pub fn build_site_config(args: &cli::Args, config: &config::ConfigManager) -> Result<config::SiteConfig> {
    let mut site = config.get_site_config()?;

    let repository = args.repository.clone()
        .or_else(|| config.get_value("site", "repo-path").cloned());
    site.repo_path = resolve_repository_path(repository.as_deref())?;

    if let Some(revision) = &args.revision {
        site.revision = revision.parse()
            .with_context(|| format!("Invalid --revision value: {}", revision))?;
        site.settings.insert("revision".to_string(), serde_json::json!(site.revision.to_string()));
    }
    if let Some(dir) = &args.plugin_dir {
        site.plugins.dir = dir.clone();
    }
    if let Some(namespace) = &args.namespace {
        if !is_dotted_identifier(namespace) {
            anyhow::bail!("Invalid --namespace value: {}", namespace);
        }
        site.plugins.namespace = namespace.clone();
    }
    if args.enable_plugins {
        site.plugins.enable = true;
    }

    debug!("Site configuration: repo {} revision {} plugins {:?}",
        site.repo_path.display(), site.revision, site.plugins);
    Ok(site)
}

pub fn configure_logging(args: &cli::Args, config: &config::ConfigManager) -> Result<logging::LogConfig> {
    use log::LevelFilter;
    use std::str::FromStr;

    let console_level = if args.debug {
        LevelFilter::Trace
    } else if args.verbose {
        LevelFilter::Debug
    } else if args.quiet {
        LevelFilter::Error
    } else {
        match config.get_log_level("base", "console-level") {
            Ok(Some(level)) => {
                debug!("Using console log level from config: {:?}", level);
                level
            }
            Ok(None) => LevelFilter::Info,
            Err(e) => {
                debug!("Invalid console-level in config, using default: {}", e);
                LevelFilter::Info
            }
        }
    };

    debug!("Console log level set to: {:?}", console_level);

    let format = if !args.log_format.is_empty() && args.log_format != "text" {
        logging::LogFormat::from_str(&args.log_format)
            .map_err(|e| anyhow::anyhow!(e))?
    } else {
        match config.get_value("base", "log-format") {
            Some(format_str) => {
                debug!("Using log format from config: {}", format_str);
                logging::LogFormat::from_str(format_str)
                    .unwrap_or(logging::LogFormat::Text)
            }
            None => logging::LogFormat::Text,
        }
    };

    debug!("Log format set to: {:?}", format);

    let log_file_path = args.log_file.clone()
        .or_else(|| config.get_path("base", "log-file"));

    let file_log_level = match &args.log_file_level {
        Some(level_str) => Some(logging::parse_log_level(level_str)?),
        None => {
            match config.get_log_level("base", "file-log-level") {
                Ok(Some(level)) => {
                    debug!("Using file log level from config: {:?}", level);
                    Some(level)
                }
                Ok(None) => None,
                Err(e) => {
                    debug!("Invalid file-log-level in config, using None: {}", e);
                    None
                }
            }
        }
    };

    let (destination, file_level) = match (log_file_path.as_ref(), file_log_level) {
        (Some(file_path), Some(level)) => {
            debug!("File logging enabled: {} (level: {:?})", file_path.display(), level);
            (logging::LogDestination::Both(file_path.clone()), Some(level))
        }
        (Some(file_path), None) => {
            debug!("File logging enabled: {} (level: {:?} - same as console)", file_path.display(), console_level);
            (logging::LogDestination::Both(file_path.clone()), Some(console_level))
        }
        (None, None) => {
            debug!("Console-only logging enabled");
            (logging::LogDestination::Console, None)
        }
        (None, Some(_)) => {
            error!("Log file level specified without log file - this should have been caught during validation");
            return Err(anyhow::anyhow!("Log file level specified without log file"));
        }
    };

    Ok(logging::LogConfig {
        console_level,
        file_level,
        format,
        destination,
        enable_colours: !args.no_color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn manager(entries: &[(&str, &str, &str)]) -> config::ConfigManager {
        let mut configuration = config::Configuration::new();
        for (section, key, value) in entries {
            configuration
                .entry(section.to_string())
                .or_insert_with(HashMap::new)
                .insert(key.to_string(), value.to_string());
        }
        config::ConfigManager::from_config(configuration)
    }

    #[test]
    fn test_cli_overrides_config() {
        let repo = TempDir::new().unwrap();
        let repo_path = repo.path().to_string_lossy().to_string();
        let args = cli::Args::try_parse_from([
            "gitpress", "--repo", repo_path.as_str(), "--revision", "working-dir",
            "--plugin-dir", "ext", "--namespace", "blog.ext", "--enable-plugins",
        ]).unwrap();
        let config = manager(&[("plugins", "dir", "plugins"), ("site", "revision", "default")]);

        let site = build_site_config(&args, &config).unwrap();
        assert_eq!(site.revision, crate::content::RevisionSelector::WorkingDir);
        assert_eq!(site.plugins.dir, "ext");
        assert_eq!(site.plugins.namespace, "blog.ext");
        assert!(site.plugins.enable);
        assert_eq!(site.settings["revision"], serde_json::json!("working-dir"));
    }

    #[test]
    fn test_logging_from_config() {
        let args = cli::Args::try_parse_from(["gitpress", "--no-color"]).unwrap();
        let config = manager(&[
            ("base", "console-level", "warn"),
            ("base", "log-format", "json"),
            ("base", "log-file", "/tmp/gitpress-test.log"),
        ]);

        let log_config = configure_logging(&args, &config).unwrap();
        assert_eq!(log_config.console_level, log::LevelFilter::Warn);
        assert_eq!(log_config.format, logging::LogFormat::Json);
        assert_eq!(log_config.file_level, Some(log::LevelFilter::Warn));
        assert!(!log_config.enable_colours);
    }

    #[test]
    fn test_cli_log_flags_win() {
        let args = cli::Args::try_parse_from(["gitpress", "--debug"]).unwrap();
        let config = manager(&[("base", "console-level", "error")]);

        let log_config = configure_logging(&args, &config).unwrap();
        assert_eq!(log_config.console_level, log::LevelFilter::Trace);
        assert_eq!(log_config.destination, logging::LogDestination::Console);
    }
}
