//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal usize
fn parse_hex_usize(s: &str) -> Result<usize, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<usize>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the bus argument
fn bus_help() -> String {
    format!(
        "Bus to use [available: {}]",
        spixfer_link::link_names_short()
    )
}

#[derive(Parser)]
#[command(name = "spixfer")]
#[command(author, version, about = "Handshake-gated SPI file transfer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Transfer options shared by commands that build frames
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TransferArgs {
    /// Transfer configuration file (TOML format, `[transfer]` table)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Total frame size in bytes, header included (default: 1024)
    #[arg(long, value_parser = parse_hex_usize)]
    pub frame_size: Option<usize>,

    /// Give up when the peer stays busy this long (default: 5000)
    #[arg(long, conflicts_with = "wait_forever")]
    pub timeout_ms: Option<u64>,

    /// Wait for the peer without a deadline
    #[arg(long)]
    pub wait_forever: bool,

    /// Interval between readiness samples in microseconds (default: 1000)
    #[arg(long)]
    pub poll_us: Option<u32>,

    /// Fail after this many unacknowledged START frames (default: unbounded)
    #[arg(long)]
    pub max_start_attempts: Option<u32>,

    /// Do not send END when the source fails mid-transfer
    #[arg(long)]
    pub no_end_on_failure: bool,

    /// Only warn when bytes sent differ from the file size
    #[arg(long)]
    pub lenient: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a file to the peripheral
    Send {
        /// Bus to use
        #[arg(short, long, help = bus_help())]
        bus: String,

        /// Readiness line (e.g. linux_gpio:gpiochip=0,line=25); the dummy bus brings its own
        #[arg(short, long)]
        ready: Option<String>,

        /// File to send
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        transfer: TransferArgs,

        /// Do not show a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show how a file would be framed, without touching hardware
    Plan {
        /// File to frame
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        transfer: TransferArgs,

        /// List every DATA frame
        #[arg(long)]
        frames: bool,
    },

    /// List available buses and readiness lines
    ListLinks,
}
