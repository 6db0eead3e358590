// src/bin/ecmc-cmd.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use ecmc_cmd::{
    cli::{Cli, dispatcher},
    core::{paths, settings::Settings},
    state::AppContext,
    t,
};

/// Sets up logging, loads settings, dispatches the action and reports errors
/// in one place.
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run_cli(cli) {
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `-v` picks the level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let settings_path = match &cli.global.config {
        Some(path) => path.clone(),
        None => paths::settings_path()?,
    };
    let settings = Settings::load(&settings_path)
        .with_context(|| format!(t!("main.error.settings"), path = settings_path.display()))?
        .merged_with(cli.global.to_overrides());

    let context = AppContext::new(settings);
    dispatcher::dispatch(cli.args, &context)
}
