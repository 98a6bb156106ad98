// SPDX-FileCopyrightText: 2026 Leadline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leadline - lead routing between chat and commerce platforms.
//!
//! This is the binary entry point for the Leadline service.

mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use leadline_config::LeadlineConfig;

/// Leadline - lead routing between chat and commerce platforms.
#[derive(Parser, Debug)]
#[command(name = "leadline", version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file (defaults to the standard lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Leadline service.
    Serve,
    /// Show service and platform connection status.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<LeadlineConfig, Vec<leadline_config::ConfigError>> {
    match path {
        Some(path) => {
            let config = leadline_config::load_config_from_path(path).map_err(|e| {
                vec![leadline_config::ConfigError {
                    message: format!("failed to load {}: {e}", path.display()),
                }]
            })?;
            leadline_config::validation::validate_config(&config)?;
            Ok(config)
        }
        None => leadline_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            leadline_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        None => {
            println!("leadline: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_loads_config_defaults() {
        let config = leadline_config::load_and_validate_str("").expect("defaults should be valid");
        assert_eq!(config.service.name, "leadline");
    }

    #[test]
    fn explicit_config_path_errors_are_rendered() {
        let missing = PathBuf::from("/definitely/not/here.toml");
        let result = load_config(Some(&missing));
        assert!(result.is_err());
    }
}
