//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on, overriding the configuration
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Show at most N requests, newest first
    #[arg(short = 'n', long, value_name = "N")]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_command_debug() {
        let cmd = ListCommand {
            limit: Some(10),
            json: true,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("limit"));
        assert!(debug_str.contains("10"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        assert!(format!("{cmd:?}").contains("Show"));
    }
}
