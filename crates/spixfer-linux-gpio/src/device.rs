//! Linux GPIO readiness line implementation
//!
//! This module provides the `LinuxGpioReady` struct that implements the
//! `ReadySignal` trait using Linux's GPIO character device interface
//! (gpiocdev).

use crate::error::{LinuxGpioError, Result};

use gpiocdev::line::{Bias, Offset, Value};
use gpiocdev::request::{Config, Request};

use spixfer_core::error::{Error as CoreError, Result as CoreResult};
use spixfer_core::ready::ReadySignal;

use std::time::Duration;

/// Pull resistor applied to the readiness line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBias {
    /// Pull the line low so a disconnected peer reads as busy
    PullDown,
    /// Pull the line high
    PullUp,
    /// No pull resistor
    Disabled,
}

impl LineBias {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "pull-down" | "pulldown" | "down" => Some(Self::PullDown),
            "pull-up" | "pullup" | "up" => Some(Self::PullUp),
            "disabled" | "none" | "off" => Some(Self::Disabled),
            _ => None,
        }
    }

    fn as_gpiocdev(self) -> Bias {
        match self {
            Self::PullDown => Bias::PullDown,
            Self::PullUp => Bias::PullUp,
            Self::Disabled => Bias::Disabled,
        }
    }
}

/// Configuration for requesting a readiness line
#[derive(Debug, Clone)]
pub struct LinuxGpioReadyConfig {
    /// GPIO chip device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Line offset of the readiness input
    pub line: Offset,
    /// Pull resistor (default: pull-down)
    pub bias: LineBias,
    /// Treat a low level as "ready"
    pub active_low: bool,
}

impl Default for LinuxGpioReadyConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            line: 0,
            bias: LineBias::PullDown,
            active_low: false,
        }
    }
}

impl LinuxGpioReadyConfig {
    /// Create a new configuration for one line on a chip
    pub fn new(device: impl Into<String>, line: Offset) -> Self {
        Self {
            device: device.into(),
            line,
            ..Default::default()
        }
    }

    /// Set the pull resistor
    pub fn with_bias(mut self, bias: LineBias) -> Self {
        self.bias = bias;
        self
    }

    /// Invert the line polarity
    pub fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }
}

/// Readiness line read through the GPIO character device
pub struct LinuxGpioReady {
    request: Request,
    line: Offset,
}

impl LinuxGpioReady {
    /// Request the readiness line as an input
    pub fn open(config: &LinuxGpioReadyConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }

        log::debug!(
            "linux_gpio: Requesting line {} on {}",
            config.line,
            config.device
        );

        let mut req_config = Config::default();
        req_config
            .with_line(config.line)
            .as_input()
            .with_bias(config.bias.as_gpiocdev());
        if config.active_low {
            req_config.as_active_low();
        }

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer("spixfer")
            .request()
            .map_err(|e| LinuxGpioError::LineRequestFailed {
                path: config.device.clone(),
                line: config.line,
                source: e,
            })?;

        log::info!(
            "linux_gpio: Opened {} (line={}, bias={:?}, active_low={})",
            config.device,
            config.line,
            config.bias,
            config.active_low
        );

        Ok(Self {
            request,
            line: config.line,
        })
    }

    /// Read the logical line level
    pub fn is_active(&self) -> Result<bool> {
        let value = self
            .request
            .value(self.line)
            .map_err(LinuxGpioError::GetValueFailed)?;
        Ok(value == Value::Active)
    }
}

impl ReadySignal for LinuxGpioReady {
    fn sample(&mut self) -> CoreResult<bool> {
        self.is_active().map_err(|e| {
            log::error!("linux_gpio: {}", e);
            CoreError::SignalFault
        })
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(us as u64));
    }
}

/// Parse readiness line options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `line=N` - Line offset of the readiness input (required)
/// - `bias=pull-down|pull-up|disabled` - Pull resistor (default: pull-down)
/// - `active_low=0|1` - Invert polarity (default: 0)
pub fn parse_options(
    options: &[(&str, &str)],
) -> std::result::Result<LinuxGpioReadyConfig, String> {
    let mut config = LinuxGpioReadyConfig::default();
    let mut have_line = false;
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "gpiochip" => {
                gpiochip = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid gpiochip value: {}", value))?,
                );
            }
            "line" => {
                config.line = value
                    .parse()
                    .map_err(|_| format!("Invalid line value: {}", value))?;
                have_line = true;
            }
            "bias" => {
                config.bias = LineBias::parse(value)
                    .ok_or_else(|| format!("Invalid bias value: {}", value))?;
            }
            "active_low" => {
                config.active_low = match *value {
                    "1" | "true" | "yes" => true,
                    "0" | "false" | "no" => false,
                    _ => return Err(format!("Invalid active_low value: {}", value)),
                };
            }
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        if let Some(n) = gpiochip {
            config.device = format!("/dev/gpiochip{}", n);
        } else {
            return Err("Either 'dev' or 'gpiochip' must be specified.\n\
                 e.g. linux_gpio:dev=/dev/gpiochip0,line=25"
                .to_string());
        }
    } else if gpiochip.is_some() {
        return Err("Only one of 'dev' or 'gpiochip' can be specified".to_string());
    }

    if !have_line {
        return Err("Missing required parameter: line".to_string());
    }

    Ok(config)
}
