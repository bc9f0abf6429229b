//! Frame wire format
//!
//! Every bus transaction carries exactly one fixed-size frame:
//!
//! | Offset | Size        | Field   |
//! |--------|-------------|---------|
//! | 0      | 1           | opcode  |
//! | 1      | 2           | length (big-endian payload byte count) |
//! | 3      | size - 3    | payload, zero-padded past `length` |
//!
//! The encoder always rewrites the whole buffer so no byte of a previous
//! frame can leak into the next transaction.

use crate::error::{Error, Result};

/// Size of the opcode + length header
pub const HEADER_LEN: usize = 3;

/// Default total frame size in bytes
pub const DEFAULT_FRAME_SIZE: usize = 1024;

/// Largest payload the 16-bit length field can describe
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

// ============================================================================
// Opcodes
// ============================================================================

/// Frame opcode
///
/// The set is closed: a peripheral receiving any other value must treat the
/// frame as corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Announce the start of a transfer; retried until the peer acknowledges
    Start = 0x80,
    /// Carries one chunk of the source file
    Data = 0x81,
    /// Announce the end of the transfer; payload is ignored
    End = 0x82,
}

impl Opcode {
    /// Decode an opcode byte
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x80 => Ok(Self::Start),
            0x81 => Ok(Self::Data),
            0x82 => Ok(Self::End),
            other => Err(Error::InvalidOpcode(other)),
        }
    }

    /// Raw opcode byte
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Short name for logging
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Data => "DATA",
            Self::End => "END",
        }
    }
}

impl core::fmt::Display for Opcode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Validated frame geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    frame_size: usize,
}

impl FrameLayout {
    /// Create a layout for frames of `frame_size` total bytes
    ///
    /// The frame must have room for the header plus at least one payload
    /// byte, and the payload area must fit the 16-bit length field.
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size <= HEADER_LEN || frame_size - HEADER_LEN > MAX_PAYLOAD {
            return Err(Error::InvalidFrameSize);
        }
        Ok(Self { frame_size })
    }

    /// Total bytes per frame (and per bus transaction)
    pub const fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Payload bytes available after the header
    pub const fn payload_capacity(&self) -> usize {
        self.frame_size - HEADER_LEN
    }

    /// Transaction length in bits, as handed to the bus driver
    pub const fn bit_len(&self) -> usize {
        self.frame_size * 8
    }

    /// Number of DATA frames needed for a source of `total` bytes
    pub fn data_frames_for(&self, total: u64) -> u64 {
        total.div_ceil(self.payload_capacity() as u64)
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Write a frame header into the first `HEADER_LEN` bytes of `buf`
fn write_header(buf: &mut [u8], opcode: Opcode, len: u16) {
    buf[0] = opcode.as_u8();
    buf[1..HEADER_LEN].copy_from_slice(&len.to_be_bytes());
}

/// Encode a complete frame, overwriting all of `buf`
///
/// `payload` is ignored for START and END frames, which are always sent
/// with a zero length and an all-zero payload area.
pub fn encode_frame(buf: &mut [u8], opcode: Opcode, payload: &[u8]) -> Result<()> {
    if buf.len() <= HEADER_LEN {
        return Err(Error::BufferTooSmall);
    }

    let payload = match opcode {
        Opcode::Data => payload,
        Opcode::Start | Opcode::End => &[],
    };

    let capacity = buf.len() - HEADER_LEN;
    if payload.len() > capacity || payload.len() > MAX_PAYLOAD {
        return Err(Error::LengthOverflow);
    }

    write_header(buf, opcode, payload.len() as u16);
    let (body, padding) = buf[HEADER_LEN..].split_at_mut(payload.len());
    body.copy_from_slice(payload);
    padding.fill(0);
    Ok(())
}

/// Turn a buffer whose payload area already holds `len` chunk bytes into a
/// DATA frame
///
/// This lets the frame builder read straight into the transmit buffer; the
/// header is written and everything past `len` is zeroed.
pub fn seal_data_frame(buf: &mut [u8], len: usize) -> Result<()> {
    if buf.len() <= HEADER_LEN {
        return Err(Error::BufferTooSmall);
    }
    if len > buf.len() - HEADER_LEN || len > MAX_PAYLOAD {
        return Err(Error::LengthOverflow);
    }

    write_header(buf, Opcode::Data, len as u16);
    buf[HEADER_LEN + len..].fill(0);
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Borrowed view of a received frame
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    /// Frame opcode
    pub opcode: Opcode,
    /// Declared payload length
    pub len: usize,
    raw: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Parse a frame from a raw transaction buffer
    pub fn parse(raw: &'a [u8]) -> Result<Self> {
        if raw.len() <= HEADER_LEN {
            return Err(Error::BufferTooSmall);
        }

        let opcode = Opcode::from_u8(raw[0])?;
        let len = u16::from_be_bytes([raw[1], raw[2]]) as usize;
        if len > raw.len() - HEADER_LEN {
            return Err(Error::LengthOverflow);
        }

        Ok(Self { opcode, len, raw })
    }

    /// Payload trimmed to the declared length
    pub fn payload(&self) -> &'a [u8] {
        &self.raw[HEADER_LEN..HEADER_LEN + self.len]
    }

    /// Padding bytes after the declared payload
    pub fn padding(&self) -> &'a [u8] {
        &self.raw[HEADER_LEN + self.len..]
    }

    /// Total size of the frame on the wire
    pub fn wire_len(&self) -> usize {
        self.raw.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_bounds() {
        assert_eq!(FrameLayout::new(3), Err(Error::InvalidFrameSize));
        assert_eq!(
            FrameLayout::new(MAX_PAYLOAD + HEADER_LEN + 1),
            Err(Error::InvalidFrameSize)
        );

        let layout = FrameLayout::new(1024).unwrap();
        assert_eq!(layout.payload_capacity(), 1021);
        assert_eq!(layout.bit_len(), 8192);
        assert_eq!(FrameLayout::default(), layout);
    }

    #[test]
    fn test_data_frame_count() {
        let layout = FrameLayout::new(1024).unwrap();
        assert_eq!(layout.data_frames_for(0), 0);
        assert_eq!(layout.data_frames_for(1), 1);
        assert_eq!(layout.data_frames_for(1021), 1);
        assert_eq!(layout.data_frames_for(1022), 2);
        assert_eq!(layout.data_frames_for(3 * 1021), 3);
    }

    #[test]
    fn test_encode_data_frame() {
        let mut buf = [0xAAu8; 16];
        encode_frame(&mut buf, Opcode::Data, &[1, 2, 3, 4, 5]).unwrap();

        assert_eq!(&buf[..8], &[0x81, 0x00, 0x05, 1, 2, 3, 4, 5]);
        assert!(buf[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_start_and_end_carry_no_payload() {
        let mut buf = [0x55u8; 8];
        encode_frame(&mut buf, Opcode::End, &[9, 9, 9]).unwrap();
        assert_eq!(buf, [0x82, 0, 0, 0, 0, 0, 0, 0]);

        encode_frame(&mut buf, Opcode::Start, &[]).unwrap();
        assert_eq!(buf[0], 0x80);
        assert!(buf[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut buf = [0u8; 8];
        assert_eq!(
            encode_frame(&mut buf, Opcode::Data, &[0u8; 6]),
            Err(Error::LengthOverflow)
        );
        assert_eq!(
            encode_frame(&mut buf[..3], Opcode::Data, &[]),
            Err(Error::BufferTooSmall)
        );
    }

    #[test]
    fn test_seal_clears_stale_bytes() {
        // Leftovers from a previous, longer frame
        let mut buf = [0xEEu8; 10];
        buf[3] = 7;
        buf[4] = 8;
        seal_data_frame(&mut buf, 2).unwrap();

        assert_eq!(buf, [0x81, 0, 2, 7, 8, 0, 0, 0, 0, 0]);
        assert_eq!(seal_data_frame(&mut buf, 8), Err(Error::LengthOverflow));
    }

    #[test]
    fn test_parse_frame() {
        let raw = [0x81, 0x00, 0x02, 0xDE, 0xAD, 0x00, 0x00];
        let frame = FrameView::parse(&raw).unwrap();
        assert_eq!(frame.opcode, Opcode::Data);
        assert_eq!(frame.payload(), &[0xDE, 0xAD]);
        assert_eq!(frame.padding(), &[0, 0]);
        assert_eq!(frame.wire_len(), 7);
    }

    #[test]
    fn test_parse_rejects_bad_frames() {
        assert!(matches!(
            FrameView::parse(&[0x10, 0, 0, 0]),
            Err(Error::InvalidOpcode(0x10))
        ));
        assert!(matches!(
            FrameView::parse(&[0x81, 0, 5, 0, 0]),
            Err(Error::LengthOverflow)
        ));
    }

    #[test]
    fn test_opcode_values() {
        assert_eq!(Opcode::Start.as_u8(), 128);
        assert_eq!(Opcode::Data.as_u8(), 129);
        assert_eq!(Opcode::End.as_u8(), 130);
        for op in [Opcode::Start, Opcode::Data, Opcode::End] {
            assert_eq!(Opcode::from_u8(op.as_u8()), Ok(op));
        }
    }
}
