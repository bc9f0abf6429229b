//! CLI command implementations
//!
//! ## Send
//!
//! `send` opens a link (bus plus readiness line) and runs one transfer
//! session with an indicatif progress bar.
//!
//! ## Plan
//!
//! `plan` runs the frame builder over a file without any hardware and
//! prints the resulting frame sequence.

mod list;
pub mod plan;
pub mod send;

pub use list::list_links;

use crate::cli::TransferArgs;
use spixfer_core::TransferConfig;

/// Build the transfer configuration from a config file and CLI overrides
///
/// Explicit flags win over values from the file.
pub fn load_config(args: &TransferArgs) -> Result<TransferConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            log::debug!("Loading transfer configuration from {}", path.display());
            TransferConfig::from_toml_file(path)
                .map_err(|e| format!("Failed to load {}: {}", path.display(), e))?
        }
        None => TransferConfig::default(),
    };

    if let Some(frame_size) = args.frame_size {
        config.frame_size = frame_size;
    }
    if args.wait_forever {
        config.wait.timeout_us = None;
    } else if let Some(ms) = args.timeout_ms {
        config.wait = config.wait.with_timeout_ms(ms);
    }
    if let Some(us) = args.poll_us {
        config.wait = config.wait.with_poll_interval_us(us);
    }
    if args.max_start_attempts.is_some() {
        config.max_start_attempts = args.max_start_attempts;
    }
    if args.no_end_on_failure {
        config.send_end_on_failure = false;
    }
    if args.lenient {
        config.strict_length_check = false;
    }

    config
        .layout()
        .map_err(|e| format!("Invalid transfer configuration: {}", e))?;
    Ok(config)
}
