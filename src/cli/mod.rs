//! Command-line interface for inspecting plan files.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use output::{output, truncate, CommandOutput};

#[derive(Parser, Debug)]
#[command(name = "swarmcore")]
#[command(about = "swarmcore - inspect and validate agent swarm plans", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .swarmcore/config.yaml plus SWARMCORE_* overrides)
    #[arg(short, long, global = true, env = "SWARMCORE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a plan for unknown dependencies and cycles
    Validate(commands::validate::ValidateArgs),

    /// Show every group with its todo progress and readiness
    Status(commands::status::StatusArgs),

    /// List the groups that can start now
    Ready(commands::ready::ReadyArgs),
}

/// Print a command error and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
