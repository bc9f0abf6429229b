//! Frame builder: slicing a byte source into DATA frame payloads
//!
//! The builder reads the source sequentially into the payload area of the
//! transmit buffer and reports end-of-stream precisely. When the total size
//! of the source is known up front, an explicit remaining-bytes counter is
//! the only end-of-stream signal: the chunk that brings it to zero is marked
//! as the last one, so a source whose size is an exact multiple of the chunk
//! capacity is never truncated and never needs an extra probing read.
//!
//! Sources of unknown size fall back to the short-read convention: a chunk
//! shorter than requested is the last one, and a call on an already drained
//! source returns [`Chunk::Empty`].

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::frame::{seal_data_frame, FrameLayout, HEADER_LEN};

/// A sequential byte source
pub trait ByteSource {
    /// Read up to `buf.len()` bytes, returning how many were read
    ///
    /// Returning `Ok(0)` means the source is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Total size of the source in bytes, if it can be determined
    fn size_hint(&mut self) -> Result<Option<u64>> {
        Ok(None)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn size_hint(&mut self) -> Result<Option<u64>> {
        (**self).size_hint()
    }
}

/// In-memory byte source
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// Create a source reading from `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteSource for SliceSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = core::cmp::min(buf.len(), self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn size_hint(&mut self) -> Result<Option<u64>> {
        Ok(Some(self.data.len() as u64))
    }
}

#[cfg(feature = "std")]
impl ByteSource for std::fs::File {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match std::io::Read::read(self, buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("Source read failed: {}", e);
                    return Err(Error::ReadError);
                }
            }
        }
    }

    fn size_hint(&mut self) -> Result<Option<u64>> {
        use std::io::{Seek, SeekFrom};

        // Pipes and FIFOs cannot seek; treat them as unsized
        let pos = match self.stream_position() {
            Ok(pos) => pos,
            Err(e) => {
                log::debug!("Source is not seekable: {}", e);
                return Ok(None);
            }
        };
        // Seek to the end and back to where we were
        let end = self.seek(SeekFrom::End(0)).map_err(|_| Error::ReadError)?;
        self.seek(SeekFrom::Start(pos)).map_err(|_| Error::ReadError)?;
        Ok(Some(end.saturating_sub(pos)))
    }
}

/// Result of one [`FrameBuilder::next_chunk`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunk {
    /// `len` bytes were read (`len > 0`); `last` is set on the final chunk
    Data {
        /// Bytes read into the buffer
        len: usize,
        /// No further chunk follows
        last: bool,
    },
    /// The source was already exhausted before this call
    Empty,
}

/// Counters reported when a builder is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Size recorded when the source was opened (if known)
    pub total: Option<u64>,
    /// Bytes delivered as `Chunk::Data`
    pub bytes_delivered: u64,
}

/// Sequential chunker over a [`ByteSource`]
pub struct FrameBuilder<S> {
    source: S,
    total: Option<u64>,
    remaining: Option<u64>,
    delivered: u64,
    exhausted: bool,
}

impl<S: ByteSource> FrameBuilder<S> {
    /// Open a source, asking it for its total size up front
    pub fn open(mut source: S) -> Result<Self> {
        let total = source.size_hint()?;
        match total {
            Some(total) => log::debug!("Opened source ({} bytes)", total),
            None => log::debug!("Opened source (size unknown)"),
        }
        Ok(Self::with_total(source, total))
    }

    /// Open a source whose size is supplied by the caller
    pub fn open_with_size(source: S, total: u64) -> Self {
        Self::with_total(source, Some(total))
    }

    fn with_total(source: S, total: Option<u64>) -> Self {
        Self {
            source,
            total,
            remaining: total,
            delivered: 0,
            exhausted: false,
        }
    }

    /// Size recorded when the source was opened
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Bytes delivered so far
    pub fn bytes_delivered(&self) -> u64 {
        self.delivered
    }

    /// Whether the end of the source has been reached
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Read the next chunk into `buf`
    ///
    /// At most `buf.len()` bytes are read. Once a chunk has been reported as
    /// `last` (or `Empty` has been returned) the source is not read again.
    pub fn next_chunk(&mut self, buf: &mut [u8]) -> Result<Chunk> {
        if buf.is_empty() {
            return Err(Error::BufferTooSmall);
        }
        if self.exhausted {
            return Ok(Chunk::Empty);
        }

        let want = match self.remaining {
            Some(remaining) => core::cmp::min(buf.len() as u64, remaining) as usize,
            None => buf.len(),
        };
        if want == 0 {
            self.exhausted = true;
            return Ok(Chunk::Empty);
        }

        let len = self.fill(&mut buf[..want])?;

        if let Some(remaining) = self.remaining {
            if len < want {
                log::error!(
                    "Source ended early: expected {} more bytes, got {}",
                    remaining,
                    len
                );
                self.exhausted = true;
                return Err(Error::ReadError);
            }
            let remaining = remaining - len as u64;
            self.remaining = Some(remaining);
            self.exhausted = remaining == 0;
        } else if len == 0 {
            self.exhausted = true;
            return Ok(Chunk::Empty);
        } else {
            // Short read marks the end of an unsized source
            self.exhausted = len < buf.len();
        }

        self.delivered += len as u64;
        Ok(Chunk::Data {
            len,
            last: self.exhausted,
        })
    }

    /// Fill `buf` until it is full or the source reports no more data
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.source.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Iterate over the encoded DATA frames for this source
    pub fn frames(self, layout: FrameLayout) -> Frames<S> {
        Frames {
            builder: self,
            layout,
            done: false,
        }
    }

    /// Release the source and report what was delivered
    pub fn close(self) -> FrameStats {
        FrameStats {
            total: self.total,
            bytes_delivered: self.delivered,
        }
    }
}

#[cfg(feature = "std")]
impl FrameBuilder<std::fs::File> {
    /// Open a file on the local filesystem
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            log::error!("Failed to open {}: {}", path.display(), e);
            match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    Error::NotFound
                }
                _ => Error::ReadError,
            }
        })?;
        Self::open(file)
    }
}

/// Iterator over encoded DATA frames, see [`FrameBuilder::frames`]
pub struct Frames<S> {
    builder: FrameBuilder<S>,
    layout: FrameLayout,
    done: bool,
}

impl<S: ByteSource> Frames<S> {
    /// Release the underlying builder
    pub fn close(self) -> FrameStats {
        self.builder.close()
    }
}

impl<S: ByteSource> Iterator for Frames<S> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut frame = vec![0u8; self.layout.frame_size()];
        let chunk = self.builder.next_chunk(&mut frame[HEADER_LEN..]);
        match chunk {
            Ok(Chunk::Data { len, last }) => {
                self.done = last;
                Some(seal_data_frame(&mut frame, len).map(|()| frame))
            }
            Ok(Chunk::Empty) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
