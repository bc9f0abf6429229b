//! Transfer configuration
//!
//! With the `std` feature, a configuration can be loaded from a TOML file:
//!
//! ```toml
//! [transfer]
//! frame_size = "1 KiB"
//! ready_timeout_ms = 5000
//! poll_interval_us = 1000
//! max_start_attempts = 50
//! send_end_on_failure = true
//! strict_length_check = true
//! ```
//!
//! Every key is optional; missing keys keep their default.

use crate::error::{Error, Result};
use crate::frame::{FrameLayout, DEFAULT_FRAME_SIZE};
use crate::ready::WaitPolicy;

/// Settings for one transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Total bytes per frame (header + payload)
    pub frame_size: usize,
    /// Readiness wait policy applied before every bus transaction
    pub wait: WaitPolicy,
    /// Give up after this many unacknowledged START frames; `None` retries forever
    pub max_start_attempts: Option<u32>,
    /// Send a best-effort END frame when the source fails mid-transfer
    pub send_end_on_failure: bool,
    /// Treat a mismatch between bytes sent and source size as an error
    pub strict_length_check: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            wait: WaitPolicy::default(),
            max_start_attempts: None,
            send_end_on_failure: true,
            strict_length_check: true,
        }
    }
}

impl TransferConfig {
    /// Set the total frame size in bytes
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Set the readiness wait policy
    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Bound the number of START frames sent during the handshake
    pub fn with_max_start_attempts(mut self, attempts: Option<u32>) -> Self {
        self.max_start_attempts = attempts;
        self
    }

    /// Choose whether a best-effort END frame follows a source failure
    pub fn with_end_on_failure(mut self, enabled: bool) -> Self {
        self.send_end_on_failure = enabled;
        self
    }

    /// Choose whether a length mismatch fails the transfer
    pub fn with_strict_length_check(mut self, strict: bool) -> Self {
        self.strict_length_check = strict;
        self
    }

    /// Validate the configuration and return the frame layout it implies
    pub fn layout(&self) -> Result<FrameLayout> {
        if self.max_start_attempts == Some(0) || self.wait.poll_interval_us == 0 {
            return Err(Error::InvalidConfig);
        }
        FrameLayout::new(self.frame_size)
    }
}

#[cfg(feature = "std")]
mod toml_file {
    use std::format;
    use std::path::Path;
    use std::string::String;

    use super::TransferConfig;
    use crate::error::{Error, Result};

    /// TOML configuration file structure
    #[derive(Debug, Default, serde::Deserialize)]
    struct TomlConfigFile {
        #[serde(default)]
        transfer: TomlTransfer,
    }

    /// `[transfer]` table
    #[derive(Debug, Default, serde::Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TomlTransfer {
        #[serde(default, deserialize_with = "deserialize_size")]
        frame_size: Option<usize>,
        ready_timeout_ms: Option<u64>,
        #[serde(default)]
        wait_forever: bool,
        poll_interval_us: Option<u32>,
        max_start_attempts: Option<u32>,
        send_end_on_failure: Option<bool>,
        strict_length_check: Option<bool>,
    }

    /// Deserialize a size that can be an integer, hex string or "1 KiB"
    fn deserialize_size<'de, D>(deserializer: D) -> core::result::Result<Option<usize>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::Deserialize;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum SizeOrInt {
            Int(usize),
            Str(String),
        }

        match Option::<SizeOrInt>::deserialize(deserializer)? {
            None => Ok(None),
            Some(SizeOrInt::Int(n)) => Ok(Some(n)),
            Some(SizeOrInt::Str(s)) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
        }
    }

    /// Parse a size string like "1 KiB", "0x400" or "1024"
    pub(super) fn parse_size(s: &str) -> core::result::Result<usize, String> {
        let s = s.trim();

        if let Ok(n) = s.parse::<usize>() {
            return Ok(n);
        }

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return usize::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
        }

        let lower = s.to_lowercase();
        let (num, multiplier) = if let Some(n) = lower.strip_suffix("kib") {
            (n.trim(), 1024)
        } else if let Some(n) = lower.strip_suffix("kb") {
            (n.trim(), 1024)
        } else if let Some(n) = lower.strip_suffix("b") {
            (n.trim(), 1)
        } else {
            return Err(format!("invalid size: {}", s));
        };

        let num: usize = num.parse().map_err(|_| format!("invalid size: {}", s))?;
        num.checked_mul(multiplier)
            .ok_or_else(|| format!("size too large: {}", s))
    }

    impl TransferConfig {
        /// Load a configuration from a TOML file
        pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|e| {
                log::error!("Failed to read {}: {}", path.display(), e);
                Error::NotFound
            })?;
            Self::from_toml_str(&content)
        }

        /// Parse a configuration from a TOML string
        pub fn from_toml_str(content: &str) -> Result<Self> {
            let file: TomlConfigFile = toml::from_str(content).map_err(|e| {
                log::error!("Invalid transfer configuration: {}", e);
                Error::InvalidConfig
            })?;
            let t = file.transfer;

            let mut config = TransferConfig::default();
            if let Some(frame_size) = t.frame_size {
                config.frame_size = frame_size;
            }
            if t.wait_forever {
                config.wait.timeout_us = None;
            } else if let Some(ms) = t.ready_timeout_ms {
                config.wait = config.wait.with_timeout_ms(ms);
            }
            if let Some(us) = t.poll_interval_us {
                config.wait.poll_interval_us = us;
            }
            config.max_start_attempts = t.max_start_attempts;
            if let Some(enabled) = t.send_end_on_failure {
                config.send_end_on_failure = enabled;
            }
            if let Some(strict) = t.strict_length_check {
                config.strict_length_check = strict;
            }

            config.layout()?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = TransferConfig::default();
        let layout = config.layout().unwrap();
        assert_eq!(layout.frame_size(), 1024);
        assert_eq!(layout.payload_capacity(), 1021);
    }

    #[test]
    fn test_invalid_configs() {
        let config = TransferConfig::default().with_frame_size(2);
        assert_eq!(config.layout(), Err(Error::InvalidFrameSize));

        let config = TransferConfig::default().with_max_start_attempts(Some(0));
        assert_eq!(config.layout(), Err(Error::InvalidConfig));

        let config = TransferConfig::default().with_wait(WaitPolicy::unbounded(0));
        assert_eq!(config.layout(), Err(Error::InvalidConfig));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_toml() {
        let config = TransferConfig::from_toml_str(
            r#"
            [transfer]
            frame_size = "2 KiB"
            ready_timeout_ms = 250
            poll_interval_us = 500
            max_start_attempts = 10
            send_end_on_failure = false
            "#,
        )
        .unwrap();

        assert_eq!(config.frame_size, 2048);
        assert_eq!(config.wait.timeout_us, Some(250_000));
        assert_eq!(config.wait.poll_interval_us, 500);
        assert_eq!(config.max_start_attempts, Some(10));
        assert!(!config.send_end_on_failure);
        assert!(config.strict_length_check);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_toml_defaults_and_errors() {
        assert_eq!(
            TransferConfig::from_toml_str("").unwrap(),
            TransferConfig::default()
        );

        let config = TransferConfig::from_toml_str("[transfer]\nframe_size = 0x80\nwait_forever = true\n")
            .unwrap();
        assert_eq!(config.frame_size, 128);
        assert_eq!(config.wait.timeout_us, None);

        assert_eq!(
            TransferConfig::from_toml_str("[transfer]\nframe_size = 1\n"),
            Err(Error::InvalidFrameSize)
        );
        assert_eq!(
            TransferConfig::from_toml_str("[transfer]\nbogus = 1\n"),
            Err(Error::InvalidConfig)
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_size() {
        assert_eq!(toml_file::parse_size("1024"), Ok(1024));
        assert_eq!(toml_file::parse_size("0x400"), Ok(1024));
        assert_eq!(toml_file::parse_size("4 KiB"), Ok(4096));
        assert_eq!(toml_file::parse_size("128B"), Ok(128));
        assert!(toml_file::parse_size("lots").is_err());
        assert!(toml_file::parse_size("18014398509481984 KiB").is_err());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_toml_oversized_frame() {
        assert_eq!(
            TransferConfig::from_toml_str("[transfer]\nframe_size = \"18014398509481984 KiB\"\n"),
            Err(Error::InvalidConfig)
        );
    }
}
