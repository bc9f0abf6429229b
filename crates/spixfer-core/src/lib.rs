//! spixfer-core - Core library for handshake-gated SPI file transfer
//!
//! This crate implements the controller side of a simple chunked file
//! transfer protocol. A file is cut into fixed-size frames (opcode, length,
//! zero-padded payload) and each frame is pushed to the peripheral in one
//! full-duplex SPI transaction. The peripheral gates every transaction with
//! a single handshake line that it asserts when it is ready.
//!
//! The crate is `no_std` (it needs `alloc` for the frame buffers) so the same
//! sequencing logic can run on a microcontroller or on a Linux host.
//!
//! # Features
//!
//! - `std` - Enable standard library support: `std::fs::File` as a byte
//!   source, `std::error::Error` impls and TOML configuration loading
//!
//! # Example
//!
//! ```ignore
//! use spixfer_core::{FrameBuilder, SliceSource, TransferConfig, TransferSession};
//!
//! fn send<B: SpiBus, R: ReadySignal>(bus: &mut B, ready: &mut R, image: &[u8]) {
//!     let builder = FrameBuilder::open(SliceSource::new(image))?;
//!     let mut session = TransferSession::new(builder, TransferConfig::default())?;
//!     let report = session.run(bus, ready, &mut NoProgress)?;
//!     println!("Sent {} bytes in {} frames", report.bytes_sent, report.data_frames);
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod config;
pub mod error;
pub mod frame;
pub mod ready;
pub mod sequencer;
pub mod source;

pub use bus::{SpiBus, Transaction};
pub use config::TransferConfig;
pub use error::{Error, Result};
pub use frame::{FrameLayout, FrameView, Opcode};
pub use ready::{wait_ready, CancelFlag, ReadySignal, WaitOutcome, WaitPolicy};
pub use sequencer::{
    NoProgress, SessionState, TransferObserver, TransferReport, TransferSession,
};
pub use source::{ByteSource, Chunk, FrameBuilder, FrameStats, SliceSource};
