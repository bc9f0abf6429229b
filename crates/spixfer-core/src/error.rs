//! Error types for spixfer-core
//!
//! This module provides a no_std compatible error type shared by the frame
//! codec, the frame builder and the transfer sequencer.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Source errors
    /// Source file could not be opened for reading
    NotFound,
    /// Source read failed mid-transfer (device error or truncated source)
    ReadError,

    // Peer errors
    /// Peer never acknowledged the START frame within the allowed attempts
    PeerNotReady,
    /// Readiness signal was not asserted before the wait deadline
    PeerTimeout,
    /// Transfer was cancelled while waiting for the readiness signal
    Cancelled,

    // Link errors
    /// SPI bus transaction failed
    BusFault,
    /// Readiness signal could not be sampled
    SignalFault,

    // Framing errors
    /// Frame carries an opcode outside the protocol's closed set
    InvalidOpcode(u8),
    /// Frame length field exceeds the payload area
    LengthOverflow,
    /// Frame size is too small to hold a header or too large for the length field
    InvalidFrameSize,
    /// Provided buffer is too small for the operation
    BufferTooSmall,

    // Integrity errors
    /// Bytes sent do not match the size recorded when the source was opened
    LengthMismatch {
        /// Size recorded when the source was opened
        expected: u64,
        /// Bytes actually carried by DATA frames
        actual: u64,
    },

    // Configuration errors
    /// Transfer configuration is invalid
    InvalidConfig,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "source file not found"),
            Self::ReadError => write!(f, "source read failed"),
            Self::PeerNotReady => write!(f, "peer did not acknowledge transfer start"),
            Self::PeerTimeout => write!(f, "timed out waiting for peer readiness signal"),
            Self::Cancelled => write!(f, "transfer cancelled"),
            Self::BusFault => write!(f, "SPI bus transaction failed"),
            Self::SignalFault => write!(f, "readiness signal could not be sampled"),
            Self::InvalidOpcode(op) => write!(f, "invalid frame opcode 0x{:02X}", op),
            Self::LengthOverflow => write!(f, "frame length exceeds payload capacity"),
            Self::InvalidFrameSize => write!(f, "invalid frame size"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "length mismatch: source was {} bytes, sent {} bytes",
                expected, actual
            ),
            Self::InvalidConfig => write!(f, "invalid transfer configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
