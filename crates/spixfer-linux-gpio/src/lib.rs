//! spixfer-linux-gpio - Linux GPIO readiness line support
//!
//! This crate reads the peripheral's handshake line through the Linux
//! character device GPIO interface (gpiocdev). The line is requested as an
//! input with a pull-down by default, so a peripheral that is not connected
//! or not powered reads as "not ready".
//!
//! # Example
//!
//! ```no_run
//! use spixfer_linux_gpio::{LinuxGpioReady, LinuxGpioReadyConfig};
//! use spixfer_core::ReadySignal;
//!
//! let config = LinuxGpioReadyConfig::new("/dev/gpiochip0", 25);
//! let mut ready = LinuxGpioReady::open(&config)?;
//! println!("Peer ready: {}", ready.sample()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with spixfer CLI
//!
//! ```bash
//! spixfer send -b linux_spi:dev=/dev/spidev0.0 -r linux_gpio:gpiochip=0,line=25 -f image.bin
//!
//! # Peer drives the line low when ready
//! spixfer send -b linux_spi:dev=/dev/spidev0.0 \
//!     -r linux_gpio:dev=/dev/gpiochip0,line=25,bias=pull-up,active_low=1 -f image.bin
//! ```

pub mod device;
pub mod error;

// Re-exports
pub use device::{parse_options, LineBias, LinuxGpioReady, LinuxGpioReadyConfig};
pub use error::{LinuxGpioError, Result};
