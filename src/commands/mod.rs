//! CLI command handlers and routing.

mod config;
mod ebook;

use anyhow::Result;

use grabber_core::config::{ConfigError, LoadedConfig};

use crate::cli::{Cli, Command, ConfigCommand, EbookCommand};

pub use config::{
    run_config_init_command, run_config_paths_command, run_config_show_command,
    run_config_validate_command,
};
pub use ebook::{run_ebook_download_command, run_ebook_login_command, run_ebook_logout_command};

/// Runs the command selected on the command line.
///
/// `loaded` is the configuration resolved for this run. Commands that must work
/// with a broken or missing configuration (`config init`, `config paths`,
/// `config validate`) do not require it to have loaded.
pub async fn dispatch(cli: &Cli, loaded: Result<LoadedConfig, ConfigError>) -> Result<()> {
    match &cli.command {
        Command::Ebook { command } => {
            let loaded = loaded?;
            match command {
                EbookCommand::Download { url } => run_ebook_download_command(loaded.config, url).await,
                EbookCommand::Login => run_ebook_login_command(loaded.config).await,
                EbookCommand::Logout => run_ebook_logout_command(loaded.config).await,
            }
        }
        Command::Config { command } => match command {
            ConfigCommand::Show => run_config_show_command(&loaded?),
            ConfigCommand::Init { path, force } => run_config_init_command(path, *force),
            ConfigCommand::Validate { config_file } => {
                run_config_validate_command(config_file.as_deref().or(cli.config.as_deref()))
            }
            ConfigCommand::Paths => run_config_paths_command(loaded.ok().as_ref()),
        },
    }
}
