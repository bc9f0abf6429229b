//! Readiness signal and the gated wait primitive
//!
//! The peripheral asserts a single digital line when it can accept the next
//! bus transaction. The controller polls that line with a fixed yield
//! between samples. A wait ends when the line is seen asserted, when the
//! caller's deadline expires, or when a cancellation flag is raised.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

/// Default interval between readiness samples (one scheduler tick)
pub const DEFAULT_POLL_INTERVAL_US: u32 = 1_000;

/// Default time to wait for the readiness signal before giving up
pub const DEFAULT_READY_TIMEOUT_US: u64 = 5_000_000;

/// Source of the peripheral's readiness signal
pub trait ReadySignal {
    /// Sample the signal; `true` means the peripheral is ready
    fn sample(&mut self) -> Result<bool>;

    /// Yield for the specified number of microseconds between samples
    fn delay_us(&mut self, us: u32);
}

impl<R: ReadySignal + ?Sized> ReadySignal for &mut R {
    fn sample(&mut self) -> Result<bool> {
        (**self).sample()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

impl<R: ReadySignal + ?Sized> ReadySignal for alloc::boxed::Box<R> {
    fn sample(&mut self) -> Result<bool> {
        (**self).sample()
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// How long and how often to poll the readiness signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between two samples in microseconds
    pub poll_interval_us: u32,
    /// Give up after this many microseconds; `None` waits forever
    pub timeout_us: Option<u64>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval_us: DEFAULT_POLL_INTERVAL_US,
            timeout_us: Some(DEFAULT_READY_TIMEOUT_US),
        }
    }
}

impl WaitPolicy {
    /// Poll forever, like a peripheral that is trusted to come back
    pub fn unbounded(poll_interval_us: u32) -> Self {
        Self {
            poll_interval_us,
            timeout_us: None,
        }
    }

    /// Set the timeout in milliseconds
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_us = Some(ms.saturating_mul(1000));
        self
    }

    /// Set the poll interval in microseconds
    pub fn with_poll_interval_us(mut self, us: u32) -> Self {
        self.poll_interval_us = us;
        self
    }
}

/// Outcome of [`wait_ready`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The signal was observed asserted
    Ready,
    /// The deadline expired first
    TimedOut,
    /// The cancellation flag was raised first
    Cancelled,
}

/// Cancellation token checked between readiness samples
///
/// Can live in a `static` or an `Arc` so another thread (or a signal
/// handler) can abort a transfer stuck on an unresponsive peer.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    /// Create a flag in the not-cancelled state
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear a previous cancellation request
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

/// Block until the readiness signal is asserted, the deadline expires or
/// the transfer is cancelled
///
/// Elapsed time is accounted from the poll interval, so no wall clock is
/// needed. Cancellation is checked before every sample; the deadline only
/// after a negative sample, so a peer that is already ready is never
/// reported as timed out.
pub fn wait_ready<R: ReadySignal + ?Sized>(
    signal: &mut R,
    policy: &WaitPolicy,
    cancel: Option<&CancelFlag>,
) -> Result<WaitOutcome> {
    let mut waited_us: u64 = 0;
    let mut samples: u64 = 0;

    loop {
        if cancel.is_some_and(CancelFlag::is_cancelled) {
            log::debug!("Readiness wait cancelled after {} samples", samples);
            return Ok(WaitOutcome::Cancelled);
        }

        samples += 1;
        if signal.sample()? {
            if samples > 1 {
                log::trace!("Peer ready after {} samples", samples);
            }
            return Ok(WaitOutcome::Ready);
        }

        if let Some(timeout_us) = policy.timeout_us {
            if waited_us >= timeout_us {
                log::debug!("Readiness wait timed out after {} us", waited_us);
                return Ok(WaitOutcome::TimedOut);
            }
        }

        signal.delay_us(policy.poll_interval_us);
        waited_us = waited_us.saturating_add(policy.poll_interval_us as u64);
    }
}
