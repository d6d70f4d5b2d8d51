use anyhow::Result;
use std::process;
use log::error;
use gitpress::{app, cli, logging};

fn main() {
    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::parse_args();

    cli::validate_args(&args)?;

    let config_manager = app::load_configuration(&args)?;

    let log_config = app::configure_logging(&args, &config_manager)?;
    logging::init_logger(log_config)?;

    if args.no_color {
        colored::control::set_override(false);
    }

    let site = app::build_site_config(&args, &config_manager)?;

    if args.list_modules {
        return app::list_modules(&site);
    }

    if args.load_plugins {
        return app::load_plugins(&site);
    }

    app::show_status(&site)
}
