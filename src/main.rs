//! CLI entry point for grabber.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use grabber_core::config;

mod cli;
mod commands;
mod terminal;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // The configured log level feeds the filter, so load before tracing starts.
    // Load errors are reported by the command that needs the configuration.
    let loaded = config::load(cli.config.as_deref());
    let configured_level = loaded
        .as_ref()
        .ok()
        .and_then(|loaded| loaded.config.common.log_level.clone());

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config > default (info)
    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    terminal::init_tracing(
        terminal::default_level(cli.verbose, cli.quiet, configured_level.as_deref()),
        no_color,
    );

    debug!(?cli, "CLI arguments parsed");
    match &loaded {
        Ok(loaded) => {
            debug!(path = ?loaded.path, overrides = loaded.env_overrides.len(), "Configuration loaded");
        }
        Err(err) => debug!(error = %err, "Configuration could not be loaded"),
    }

    commands::dispatch(&cli, loaded).await
}
