//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use grabber_core::config::LOCAL_CONFIG_FILE;

/// Download ebooks and other media from supported sites.
///
/// Grabber drives a headless Chromium through the site's own viewer and keeps
/// the signed-in session between runs.
#[derive(Parser, Debug)]
#[command(name = "grabber")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Read configuration from PATH instead of the default locations
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Download ebooks and manage the site session
    Ebook {
        #[command(subcommand)]
        command: EbookCommand,
    },

    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// `grabber ebook ...`
#[derive(Subcommand, Debug, Clone)]
pub enum EbookCommand {
    /// Download the episode or series at URL
    Download {
        /// Episode or series URL (e.g. https://bigcomics.jp/episodes/<id>/)
        url: String,
    },

    /// Open a browser window to sign in and save the session
    Login,

    /// Forget the saved session cookies
    Logout,
}

/// `grabber config ...`
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a configuration file with every default spelled out
    Init {
        /// Where to write the file
        #[arg(long, default_value = LOCAL_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Check a configuration file and exit non-zero if it is invalid
    Validate {
        /// File to check (defaults to the file that would be loaded)
        #[arg(long, value_name = "PATH")]
        config_file: Option<PathBuf>,
    },

    /// List the configuration, cache and database locations
    Paths,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_ebook_download_parses_url() {
        let cli = Cli::try_parse_from([
            "grabber",
            "ebook",
            "download",
            "https://bigcomics.jp/episodes/abc123/",
        ])
        .unwrap();
        match cli.command {
            Command::Ebook {
                command: EbookCommand::Download { url },
            } => assert_eq!(url, "https://bigcomics.jp/episodes/abc123/"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_download_requires_url() {
        let result = Cli::try_parse_from(["grabber", "ebook", "download"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let cli = Cli::try_parse_from(["grabber", "-vv", "config", "show"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["grabber", "config", "show", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["grabber", "-q", "-v", "config", "show"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_global_config_path() {
        let cli = Cli::try_parse_from(["grabber", "ebook", "login", "--config", "alt.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(matches!(
            cli.command,
            Command::Ebook {
                command: EbookCommand::Login
            }
        ));
    }

    #[test]
    fn test_cli_config_init_defaults() {
        let cli = Cli::try_parse_from(["grabber", "config", "init"]).unwrap();
        match cli.command {
            Command::Config {
                command: ConfigCommand::Init { path, force },
            } => {
                assert_eq!(path, PathBuf::from("grabber.toml"));
                assert!(!force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_config_validate_file() {
        let cli =
            Cli::try_parse_from(["grabber", "config", "validate", "--config-file", "x.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                command: ConfigCommand::Validate { config_file: Some(_) }
            }
        ));
    }

    #[test]
    fn test_cli_subcommand_is_required() {
        let err = Cli::try_parse_from(["grabber"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Cli::try_parse_from(["grabber", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
