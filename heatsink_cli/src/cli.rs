//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(
    name = "heatsinkd",
    version,
    about = "Closed-loop fan control for two-speed PWM fans"
)]
pub struct Cli {
    /// Log and report errors as JSON lines instead of pretty text
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        default_value = "info",
        global = true
    )]
    pub log_level: String,

    /// Also write JSON-lines logs to this file
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run thermal control for every configured heatsink until Ctrl-C
    Run {
        /// Heatsink config (JSON, or TOML when the name ends in .toml)
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
        /// Use in-memory fans and simulated sensors instead of device files
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
        /// Stop on its own after this long (e.g. "30s", "1m30s")
        #[arg(long, value_name = "DURATION", value_parser = parse_run_for)]
        run_for: Option<Duration>,
    },
    /// Validate the config, resolve device globs and read every sensor once
    Check {
        /// Heatsink config (JSON, or TOML when the name ends in .toml)
        #[arg(long, value_name = "FILE")]
        config: PathBuf,
    },
}

fn parse_run_for(s: &str) -> Result<Duration, String> {
    heatsink_config::parse_duration(s).map_err(|e| e.to_string())
}
