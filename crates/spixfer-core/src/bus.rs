//! SPI bus abstraction
//!
//! The controller is the only side that can start a bus cycle. Every cycle
//! is full-duplex: the transmit buffer is shifted out while the receive
//! buffer is filled with whatever the peripheral shifts back.

use crate::error::{Error, Result};

/// A single full-duplex SPI transaction
///
/// Both buffers have the same length; the transaction clocks exactly
/// `tx.len() * 8` bits.
pub struct Transaction<'a> {
    /// Bytes shifted out to the peripheral
    pub tx: &'a [u8],
    /// Bytes shifted in from the peripheral
    pub rx: &'a mut [u8],
}

impl<'a> Transaction<'a> {
    /// Pair a transmit and receive buffer
    ///
    /// Fails with `BufferTooSmall` if the buffers differ in length.
    pub fn new(tx: &'a [u8], rx: &'a mut [u8]) -> Result<Self> {
        if tx.len() != rx.len() {
            return Err(Error::BufferTooSmall);
        }
        Ok(Self { tx, rx })
    }

    /// Transaction length in bytes
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Whether the transaction carries no data
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Transaction length in bits
    pub fn bit_len(&self) -> usize {
        self.tx.len() * 8
    }
}

/// SPI bus master
///
/// Implementations perform one blocking, full-duplex transfer per call. A
/// failed transfer is reported as an error; it is never retried by the
/// transfer sequencer.
pub trait SpiBus {
    /// Largest transaction the bus can perform in one go, in bytes
    fn max_transfer_len(&self) -> usize {
        usize::MAX
    }

    /// Perform one full-duplex transaction
    fn transact(&mut self, xfer: &mut Transaction<'_>) -> Result<()>;
}

impl<B: SpiBus + ?Sized> SpiBus for &mut B {
    fn max_transfer_len(&self) -> usize {
        (**self).max_transfer_len()
    }

    fn transact(&mut self, xfer: &mut Transaction<'_>) -> Result<()> {
        (**self).transact(xfer)
    }
}

impl<B: SpiBus + ?Sized> SpiBus for alloc::boxed::Box<B> {
    fn max_transfer_len(&self) -> usize {
        (**self).max_transfer_len()
    }

    fn transact(&mut self, xfer: &mut Transaction<'_>) -> Result<()> {
        (**self).transact(xfer)
    }
}
