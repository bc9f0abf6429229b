//! Send command implementation

use indicatif::{ProgressBar, ProgressStyle};
use spixfer_core::{NoProgress, TransferConfig, TransferObserver, TransferReport};
use spixfer_link::open_link;
use std::path::Path;
use std::time::Duration;

/// Create a standard progress bar style
fn create_progress_bar_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
        .progress_chars("#>-"))
}

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

/// Progress reporter using indicatif progress bars
///
/// Shows a spinner while the peer is being asked to enter receive mode,
/// then a byte progress bar for the DATA phase.
pub struct IndicatifProgress {
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self { current_bar: None }
    }

    fn create_spinner(&mut self, message: String) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()));
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.abandon();
        }
    }
}

impl TransferObserver for IndicatifProgress {
    fn handshake_attempt(&mut self, attempt: u32, acknowledged: bool) {
        if acknowledged {
            return;
        }
        let message = format!("Peer busy, START attempt {}...", attempt);
        if let Some(pb) = &self.current_bar {
            pb.set_message(message);
        } else {
            self.create_spinner(message);
        }
    }

    fn started(&mut self, total_bytes: Option<u64>) {
        self.finish("Peer ready");
        let pb = match total_bytes {
            Some(total) => {
                let pb = ProgressBar::new(total);
                pb.set_style(
                    create_progress_bar_style().unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    create_spinner_style().unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb
            }
        };
        self.current_bar = Some(pb);
    }

    fn frame_sent(&mut self, index: u64, _len: usize, bytes_sent: u64) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(bytes_sent);
            if pb.length().is_none() {
                pb.set_message(format!("{} bytes in {} frames", bytes_sent, index));
            }
        }
    }

    fn completed(&mut self, _report: &TransferReport) {
        self.finish("Transfer complete");
    }
}

/// Print the final report of a transfer
fn print_report(report: &TransferReport) {
    println!(
        "Sent {} bytes in {} DATA frames ({} transactions, {} START attempt{})",
        report.bytes_sent,
        report.data_frames,
        report.frames_sent,
        report.start_attempts,
        if report.start_attempts == 1 { "" } else { "s" }
    );
}

/// Run the send command
pub fn run_send(
    bus: &str,
    ready: Option<&str>,
    path: &Path,
    config: TransferConfig,
    show_progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut link = open_link(bus, ready)?;

    log::info!(
        "Frame size {} bytes, readiness timeout {}",
        config.frame_size,
        match config.wait.timeout_us {
            Some(us) => format!("{} ms", us / 1000),
            None => "disabled".to_string(),
        }
    );

    let result = if show_progress {
        let mut progress = IndicatifProgress::new();
        link.send_file(path, config, None, &mut progress)
    } else {
        link.send_file(path, config, None, &mut NoProgress)
    };
    let report = result.map_err(|e| format!("Transfer of {} failed: {}", path.display(), e))?;

    print_report(&report);
    Ok(())
}
