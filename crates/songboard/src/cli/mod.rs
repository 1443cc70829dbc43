//! Command-line interface for songboard.
//!
//! This module provides the CLI structure for the `songboard` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, ListCommand, ServeCommand};

/// songboard - A live song-request board for DJ events
///
/// Serves a display screen for the DJ and a submission form for the crowd,
/// both backed by one shared request list.
#[derive(Debug, Parser)]
#[command(name = "songboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the request board server
    Serve(ServeCommand),

    /// Print the current request list
    List(ListCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn cli_with(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::List(ListCommand {
                limit: None,
                json: false,
            }),
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "songboard");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(cli_with(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli_with(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli_with(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli_with(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli_with(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["songboard", "serve"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Serve(ServeCommand { bind: None })
        ));
    }

    #[test]
    fn test_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["songboard", "serve", "--bind", "127.0.0.1:9000"]).unwrap();
        let Command::Serve(cmd) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(cmd.bind.as_deref(), Some("127.0.0.1:9000"));
    }

    #[test]
    fn test_parse_list() {
        let cli = Cli::try_parse_from(["songboard", "list", "-n", "5", "--json"]).unwrap();
        let Command::List(cmd) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(cmd.limit, Some(5));
        assert!(cmd.json);
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["songboard", "config", "validate", "-f", "/tmp/board.toml"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = Cli::try_parse_from(["songboard", "-c", "/custom/config.toml", "list"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["songboard", "serve", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["songboard", "list", "-q"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["songboard", "daemon"]).is_err());
    }
}
