//! spixfer-linux-spi - Linux spidev bus support
//!
//! This crate provides an [`SpiBus`](spixfer_core::SpiBus) backed by the
//! Linux `/dev/spidevX.Y` character device interface.
//!
//! # Overview
//!
//! The Linux SPI driver exposes SPI controllers through character devices
//! at `/dev/spidevX.Y` where X is the bus number and Y is the chip select.
//! Each transfer frame is clocked as one full-duplex message.
//!
//! # Example
//!
//! ```no_run
//! use spixfer_linux_spi::{LinuxSpi, LinuxSpiConfig};
//! use spixfer_core::{SpiBus, Transaction};
//!
//! let config = LinuxSpiConfig::new("/dev/spidev0.0")
//!     .with_speed(5_000_000)
//!     .with_mode(0);
//! let mut spi = LinuxSpi::open(&config)?;
//!
//! let tx = [0x80u8; 16];
//! let mut rx = [0u8; 16];
//! spi.transact(&mut Transaction::new(&tx, &mut rx)?)?;
//! println!("Peer replied {:02X}", rx[0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with spixfer CLI
//!
//! ```bash
//! spixfer send -b linux_spi:dev=/dev/spidev0.0,spispeed=5000 \
//!     -r linux_gpio:gpiochip=0,line=25 -f firmware.bin
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - The spidev buffer (`spidev.bufsiz`, 4096 by default) must hold a whole frame

pub mod device;
pub mod error;

// Re-exports
pub use device::{mode, parse_options, LinuxSpi, LinuxSpiConfig};
pub use error::{LinuxSpiError, Result};
