//! Command-line surface.

use clap::Parser;
use std::path::PathBuf;

/// Diagnostic supervisor for MQTT telemetry streams.
#[derive(Debug, Parser)]
#[command(name = "mqguard", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "/etc/mqguard.conf")]
    pub config: PathBuf,

    /// Raise the default log level to debug.
    #[arg(short, long)]
    pub verbose: bool,
}
