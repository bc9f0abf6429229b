//! spixfer - Handshake-gated SPI file transfer
//!
//! Pushes a file to an SPI peripheral in fixed-size frames. The peripheral
//! gates every bus transaction with a readiness line: the controller only
//! clocks the next frame once the line is asserted.
//!
//! # Architecture
//!
//! The CLI only deals with link strings and a `TransferConfig`:
//! - **spixfer-link** opens the bus and readiness line by name
//! - **spixfer-core** frames the file and sequences the transfer
//!
//! The same session logic runs against real hardware (`linux_spi` +
//! `linux_gpio`) and against the in-memory `dummy` peripheral.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Send {
            bus,
            ready,
            file,
            transfer,
            no_progress,
        } => {
            let config = commands::load_config(&transfer)?;
            commands::send::run_send(&bus, ready.as_deref(), &file, config, !no_progress)
        }
        Commands::Plan {
            file,
            transfer,
            frames,
        } => {
            let config = commands::load_config(&transfer)?;
            commands::plan::run_plan(&file, &config, frames)
        }
        Commands::ListLinks => {
            commands::list_links();
            Ok(())
        }
    }
}
