use clap::Parser;
use anyhow::Result;
use std::path::PathBuf;
use log::{debug, info};
use crate::content::RevisionSelector;
use crate::plugin::index::is_dotted_identifier;

/// Git-backed blog engine
#[derive(Parser, Debug)]
#[command(name = "gitpress")]
#[command(about = "A blog engine serving posts and plugins straight out of a git repository")]
#[command(version)]
pub struct Args {
    /// Path to the content repository (defaults to the configured repo-path or the current directory)
    #[arg(short = 'r', long = "repo", alias = "repository", value_name = "PATH")]
    pub repository: Option<String>,

    /// Revision to serve: default (committed tip) or working-dir
    #[arg(long, value_name = "REVISION")]
    pub revision: Option<String>,

    /// Directory inside the repository holding plugin sources
    #[arg(long, value_name = "DIR")]
    pub plugin_dir: Option<String>,

    /// Module namespace plugins are imported under
    #[arg(long, value_name = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Execute plugin code found in the repository
    #[arg(long)]
    pub enable_plugins: bool,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level for file output (independent of console level)
    #[arg(long, value_name = "LEVEL")]
    pub log_file_level: Option<String>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Configuration section name
    #[arg(long, value_name = "SECTION")]
    pub config_name: Option<String>,

    /// Disable coloured output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// List the plugin modules found at the selected revision
    #[arg(long, conflicts_with = "load_plugins")]
    pub list_modules: bool,

    /// Run one plugin load pass and print the report as JSON
    #[arg(long)]
    pub load_plugins: bool,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    debug!("Validating CLI argument combinations");

    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();

    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    match args.log_format.to_lowercase().as_str() {
        "text" | "json" => {},
        _ => return Err(anyhow::anyhow!(
            "Invalid log format '{}'. Valid options: text, json", args.log_format
        )),
    }

    if let Some(ref level) = args.log_file_level {
        match level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {},
            _ => return Err(anyhow::anyhow!(
                "Invalid log file level '{}'. Valid levels: error, warn, info, debug, trace", level
            )),
        }
    }

    if args.log_file_level.is_some() && args.log_file.is_none() {
        return Err(anyhow::anyhow!(
            "--log-file-level requires --log-file to be specified"
        ));
    }

    if let Some(ref revision) = args.revision {
        revision.parse::<RevisionSelector>()?;
    }

    if let Some(ref namespace) = args.namespace {
        if !is_dotted_identifier(namespace) {
            return Err(anyhow::anyhow!(
                "Invalid namespace '{}': expected dot-separated identifiers", namespace
            ));
        }
    }

    info!("CLI arguments validated successfully");
    Ok(())
}
