//! spixfer-dummy - In-memory transfer peripheral for testing
//!
//! This crate provides a dummy peripheral that speaks the receiving side of
//! the transfer protocol in memory. It implements [`SpiBus`] and hands out a
//! linked [`ReadySignal`], so a whole transfer can be exercised without real
//! hardware. The emulated line drops after every transaction for a
//! configurable number of samples, and any transaction clocked while the
//! line was not seen asserted is recorded as a gating violation.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use alloc::{boxed::Box, format};
use core::cell::RefCell;

use spixfer_core::bus::{SpiBus, Transaction};
use spixfer_core::error::{Error, Result};
use spixfer_core::frame::{FrameView, Opcode};
use spixfer_core::ready::ReadySignal;

/// First byte of the reply to an accepted START frame
pub const ACK_BYTE: u8 = 0x01;

/// Configuration for the dummy peripheral
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DummyConfig {
    /// Reply to this many START frames with a zero byte before accepting one
    pub busy_starts: u32,
    /// Samples the ready line stays low before the first transaction
    pub boot_samples: u32,
    /// Samples the ready line stays low after every transaction
    pub busy_samples: u32,
    /// Stop asserting the ready line once this many transactions happened
    pub stall_after: Option<u64>,
    /// Fail the transaction with this 1-based index
    pub fail_at: Option<u64>,
}

/// Receiver state of the emulated peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for a START frame
    Idle,
    /// START accepted, collecting DATA frames
    Receiving,
    /// END received
    Done,
}

#[derive(Debug)]
struct PeripheralState {
    config: DummyConfig,
    receiver: ReceiverState,
    busy_starts_left: u32,
    low_remaining: u32,
    armed: bool,
    frame_size: Option<usize>,
    data: Vec<u8>,
    opcodes: Vec<Opcode>,
    start_requests: u32,
    transactions: u64,
    violations: u32,
    protocol_errors: u32,
    samples: u64,
    delayed_us: u64,
}

impl PeripheralState {
    fn new(config: DummyConfig) -> Self {
        Self {
            receiver: ReceiverState::Idle,
            busy_starts_left: config.busy_starts,
            low_remaining: config.boot_samples,
            armed: false,
            frame_size: None,
            data: Vec::new(),
            opcodes: Vec::new(),
            start_requests: 0,
            transactions: 0,
            violations: 0,
            protocol_errors: 0,
            samples: 0,
            delayed_us: 0,
            config,
        }
    }

    fn stalled(&self) -> bool {
        self.config
            .stall_after
            .is_some_and(|n| self.transactions >= n)
    }

    fn sample(&mut self) -> bool {
        self.samples += 1;
        let ready = if self.stalled() {
            false
        } else if self.low_remaining > 0 {
            self.low_remaining -= 1;
            false
        } else {
            true
        };
        self.armed = ready;
        ready
    }

    fn protocol_error(&mut self, what: &str) {
        log::warn!("dummy: Protocol error: {}", what);
        self.protocol_errors += 1;
    }

    fn transact(&mut self, xfer: &mut Transaction<'_>) -> Result<()> {
        if !self.armed {
            log::warn!("dummy: Transaction while ready line was not asserted");
            self.violations += 1;
        }
        self.armed = false;
        self.transactions += 1;

        if self.config.fail_at == Some(self.transactions) {
            log::debug!("dummy: Injecting bus fault at transaction {}", self.transactions);
            return Err(Error::BusFault);
        }

        self.low_remaining = self.config.busy_samples;
        xfer.rx.fill(0);

        match self.frame_size {
            None => self.frame_size = Some(xfer.len()),
            Some(size) if size != xfer.len() => {
                self.protocol_error("frame size changed mid-session");
            }
            Some(_) => {}
        }

        let frame = match FrameView::parse(xfer.tx) {
            Ok(frame) => frame,
            Err(e) => {
                self.protocol_error(&format!("undecodable frame: {}", e));
                return Ok(());
            }
        };
        self.opcodes.push(frame.opcode);

        if frame.padding().iter().any(|&b| b != 0) {
            self.protocol_error("non-zero padding");
        }

        match frame.opcode {
            Opcode::Start => {
                self.start_requests += 1;
                if self.busy_starts_left > 0 {
                    self.busy_starts_left -= 1;
                    log::debug!("dummy: Busy, rejecting START");
                } else {
                    if self.receiver != ReceiverState::Idle {
                        log::debug!("dummy: START restarts reception");
                        self.data.clear();
                    }
                    self.receiver = ReceiverState::Receiving;
                    xfer.rx[0] = ACK_BYTE;
                    log::debug!("dummy: START accepted");
                }
            }
            Opcode::Data => {
                if self.receiver == ReceiverState::Receiving {
                    self.data.extend_from_slice(frame.payload());
                    log::trace!("dummy: DATA {} bytes", frame.len);
                } else {
                    self.protocol_error("DATA outside of a session");
                }
            }
            Opcode::End => {
                if self.receiver == ReceiverState::Receiving {
                    self.receiver = ReceiverState::Done;
                    log::debug!("dummy: END, received {} bytes", self.data.len());
                } else {
                    self.protocol_error("END outside of a session");
                }
            }
        }

        Ok(())
    }
}

/// Dummy transfer peripheral
///
/// Cloning shares the same emulated device.
#[derive(Debug, Clone)]
pub struct DummyPeripheral {
    state: Rc<RefCell<PeripheralState>>,
}

impl DummyPeripheral {
    /// Create a new dummy peripheral with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(PeripheralState::new(config))),
        }
    }

    /// Create a peripheral that is always ready and accepts the first START
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Ready line driven by this peripheral
    pub fn ready_line(&self) -> DummyReadyLine {
        DummyReadyLine {
            state: Rc::clone(&self.state),
        }
    }

    /// Receiver state
    pub fn receiver_state(&self) -> ReceiverState {
        self.state.borrow().receiver
    }

    /// Whether an END frame closed a session
    pub fn is_complete(&self) -> bool {
        self.receiver_state() == ReceiverState::Done
    }

    /// Bytes reassembled from DATA payloads
    pub fn received(&self) -> Vec<u8> {
        self.state.borrow().data.clone()
    }

    /// Opcodes of every decoded frame, in order
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.state.borrow().opcodes.clone()
    }

    /// Frame size seen on the first transaction
    pub fn frame_size(&self) -> Option<usize> {
        self.state.borrow().frame_size
    }

    /// Number of START frames received, accepted or not
    pub fn start_requests(&self) -> u32 {
        self.state.borrow().start_requests
    }

    /// Number of bus transactions
    pub fn transactions(&self) -> u64 {
        self.state.borrow().transactions
    }

    /// Transactions clocked without a preceding asserted sample
    pub fn violations(&self) -> u32 {
        self.state.borrow().violations
    }

    /// Malformed or out-of-sequence frames
    pub fn protocol_errors(&self) -> u32 {
        self.state.borrow().protocol_errors
    }

    /// Number of ready line samples
    pub fn samples(&self) -> u64 {
        self.state.borrow().samples
    }

    /// Total time the controller yielded between samples
    pub fn delayed_us(&self) -> u64 {
        self.state.borrow().delayed_us
    }
}

impl SpiBus for DummyPeripheral {
    fn transact(&mut self, xfer: &mut Transaction<'_>) -> Result<()> {
        self.state.borrow_mut().transact(xfer)
    }
}

/// Ready line of a [`DummyPeripheral`]
///
/// Delays are only accounted, never slept.
#[derive(Debug, Clone)]
pub struct DummyReadyLine {
    state: Rc<RefCell<PeripheralState>>,
}

impl ReadySignal for DummyReadyLine {
    fn sample(&mut self) -> Result<bool> {
        Ok(self.state.borrow_mut().sample())
    }

    fn delay_us(&mut self, us: u32) {
        self.state.borrow_mut().delayed_us += us as u64;
    }
}

/// Parse dummy peripheral options from a list of key-value pairs
///
/// # Supported Options
///
/// - `busy_starts=N` - Reject the first N START frames
/// - `boot=N` - Ready line low for N samples before the first transaction
/// - `busy=N` - Ready line low for N samples after every transaction
/// - `stall_after=N` - Ready line stays low after N transactions
/// - `fail_at=N` - Transaction N fails with a bus fault
pub fn parse_options(options: &[(&str, &str)]) -> core::result::Result<DummyConfig, String> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        let invalid = || format!("Invalid {} value: {}", key, value);
        match *key {
            "busy_starts" => config.busy_starts = value.parse().map_err(|_| invalid())?,
            "boot" => config.boot_samples = value.parse().map_err(|_| invalid())?,
            "busy" => config.busy_samples = value.parse().map_err(|_| invalid())?,
            "stall_after" => config.stall_after = Some(value.parse().map_err(|_| invalid())?),
            "fail_at" => {
                let n: u64 = value.parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err("fail_at counts from 1".to_string());
                }
                config.fail_at = Some(n);
            }
            _ => {
                log::warn!("dummy: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

/// Create a dummy peripheral and return its bus and ready line boxed
///
/// This is a convenience function for use in the link registry.
pub fn open_dummy(
    options: &[(&str, &str)],
) -> core::result::Result<(Box<dyn SpiBus>, Box<dyn ReadySignal>), String> {
    let config = parse_options(options)?;
    log::info!("dummy: Opened emulated peripheral ({:?})", config);
    let peripheral = DummyPeripheral::new(config);
    let ready = peripheral.ready_line();
    Ok((Box::new(peripheral), Box::new(ready)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use spixfer_core::source::{ByteSource, FrameBuilder, SliceSource};
    use spixfer_core::{
        NoProgress, SessionState, TransferConfig, TransferReport, TransferSession, WaitPolicy,
    };

    fn send(
        peripheral: &DummyPeripheral,
        data: &[u8],
        config: TransferConfig,
    ) -> Result<TransferReport> {
        let mut bus = peripheral.clone();
        let mut ready = peripheral.ready_line();
        let builder = FrameBuilder::open(SliceSource::new(data))?;
        let mut session = TransferSession::new(builder, config)?;
        session.run(&mut bus, &mut ready, &mut NoProgress)
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
    }

    #[test]
    fn test_empty_file() {
        let peripheral = DummyPeripheral::new_default();
        let report = send(&peripheral, &[], TransferConfig::default()).unwrap();

        assert_eq!(peripheral.opcodes(), vec![Opcode::Start, Opcode::End]);
        assert!(peripheral.is_complete());
        assert!(peripheral.received().is_empty());
        assert_eq!(report.data_frames, 0);
        assert_eq!(report.frames_sent, 2);
    }

    #[test]
    fn test_exactly_one_payload() {
        let data = pattern(1021);
        let peripheral = DummyPeripheral::new_default();
        let report = send(&peripheral, &data, TransferConfig::default()).unwrap();

        assert_eq!(
            peripheral.opcodes(),
            vec![Opcode::Start, Opcode::Data, Opcode::End]
        );
        assert_eq!(peripheral.received(), data);
        assert_eq!(peripheral.frame_size(), Some(1024));
        assert_eq!(report.bytes_sent, 1021);
        assert_eq!(report.data_frames, 1);
    }

    #[test]
    fn test_one_byte_over_payload() {
        let data = pattern(1022);
        let peripheral = DummyPeripheral::new_default();
        let report = send(&peripheral, &data, TransferConfig::default()).unwrap();

        assert_eq!(
            peripheral.opcodes(),
            vec![Opcode::Start, Opcode::Data, Opcode::Data, Opcode::End]
        );
        assert_eq!(peripheral.received(), data);
        assert_eq!(report.data_frames, 2);
        assert_eq!(peripheral.protocol_errors(), 0);
    }

    #[test]
    fn test_exact_multiple_of_payload() {
        let data = pattern(2 * 1021);
        let peripheral = DummyPeripheral::new_default();
        let report = send(&peripheral, &data, TransferConfig::default()).unwrap();

        assert_eq!(
            peripheral.opcodes(),
            vec![Opcode::Start, Opcode::Data, Opcode::Data, Opcode::End]
        );
        assert_eq!(peripheral.received(), data);
        assert_eq!(report.bytes_sent, 2042);
        assert_eq!(report.data_frames, 2);
        assert_eq!(peripheral.protocol_errors(), 0);
    }

    /// Hides its size, so the builder relies on short reads
    struct Unsized<'a>(SliceSource<'a>);

    impl ByteSource for Unsized<'_> {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.0.read(buf)
        }
    }

    #[test]
    fn test_unsized_exact_multiple() {
        let data = pattern(2 * 1021);
        let peripheral = DummyPeripheral::new_default();
        let mut bus = peripheral.clone();
        let mut ready = peripheral.ready_line();
        let builder = FrameBuilder::open(Unsized(SliceSource::new(&data))).unwrap();
        assert_eq!(builder.total(), None);
        let mut session = TransferSession::new(builder, TransferConfig::default()).unwrap();

        let report = session.run(&mut bus, &mut ready, &mut NoProgress).unwrap();
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(
            peripheral.opcodes(),
            vec![Opcode::Start, Opcode::Data, Opcode::Data, Opcode::End]
        );
        assert_eq!(peripheral.received(), data);
        assert_eq!(report.bytes_sent, 2042);
        assert_eq!(peripheral.violations(), 0);
    }

    #[test]
    fn test_busy_start_replies() {
        let peripheral = DummyPeripheral::new(DummyConfig {
            busy_starts: 3,
            ..Default::default()
        });
        let data = pattern(100);
        let report = send(&peripheral, &data, TransferConfig::default()).unwrap();

        assert_eq!(peripheral.start_requests(), 4);
        assert_eq!(report.start_attempts, 4);
        assert_eq!(report.frames_sent, 6);
        assert_eq!(peripheral.received(), data);
    }

    #[test]
    fn test_never_transacts_while_deasserted() {
        let peripheral = DummyPeripheral::new(DummyConfig {
            busy_starts: 2,
            boot_samples: 10,
            busy_samples: 4,
            ..Default::default()
        });
        let data = pattern(5000);
        send(&peripheral, &data, TransferConfig::default()).unwrap();

        assert_eq!(peripheral.violations(), 0);
        assert_eq!(peripheral.received(), data);
        // 3 START + 5 DATA + END; every transaction but the last is followed by 4 low samples
        assert_eq!(peripheral.transactions(), 9);
        assert_eq!(peripheral.delayed_us(), (10 + 4 * 8) * 1000);
    }

    #[test]
    fn test_detects_ungated_transaction() {
        let mut peripheral = DummyPeripheral::new_default();
        let tx = [0x80, 0, 0, 0];
        let mut rx = [0u8; 4];
        peripheral
            .transact(&mut Transaction::new(&tx, &mut rx).unwrap())
            .unwrap();

        assert_eq!(peripheral.violations(), 1);
        assert_eq!(rx[0], ACK_BYTE);
    }

    #[test]
    fn test_small_frames() {
        let data = pattern(1000);
        let peripheral = DummyPeripheral::new_default();
        let config = TransferConfig::default().with_frame_size(64);
        let report = send(&peripheral, &data, config).unwrap();

        assert_eq!(peripheral.frame_size(), Some(64));
        assert_eq!(report.data_frames, 17);
        assert_eq!(peripheral.received(), data);
    }

    #[test]
    fn test_stalled_peer_times_out() {
        let peripheral = DummyPeripheral::new(DummyConfig {
            stall_after: Some(2),
            ..Default::default()
        });
        let config = TransferConfig::default().with_wait(WaitPolicy::default().with_timeout_ms(20));
        let result = send(&peripheral, &pattern(3000), config);

        assert_eq!(result, Err(Error::PeerTimeout));
        assert_eq!(peripheral.transactions(), 2);
        assert!(!peripheral.is_complete());
        assert_eq!(peripheral.violations(), 0);
    }

    #[test]
    fn test_bus_fault_sends_no_end() {
        let peripheral = DummyPeripheral::new(DummyConfig {
            fail_at: Some(3),
            ..Default::default()
        });
        let result = send(&peripheral, &pattern(3000), TransferConfig::default());

        assert_eq!(result, Err(Error::BusFault));
        assert_eq!(peripheral.transactions(), 3);
        assert_eq!(peripheral.opcodes(), vec![Opcode::Start, Opcode::Data]);
        assert_eq!(peripheral.receiver_state(), ReceiverState::Receiving);
    }

    #[test]
    fn test_start_attempt_limit() {
        let peripheral = DummyPeripheral::new(DummyConfig {
            busy_starts: 10,
            ..Default::default()
        });
        let config = TransferConfig::default().with_max_start_attempts(Some(3));
        let result = send(&peripheral, &pattern(10), config);

        assert_eq!(result, Err(Error::PeerNotReady));
        assert_eq!(peripheral.start_requests(), 3);
        assert_eq!(peripheral.receiver_state(), ReceiverState::Idle);
    }

    /// Delivers `good` bytes, then fails
    struct Truncated {
        good: usize,
    }

    impl ByteSource for Truncated {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.good == 0 {
                return Err(Error::ReadError);
            }
            let n = buf.len().min(self.good);
            buf[..n].fill(0xAA);
            self.good -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_read_error_closes_peer_session() {
        let peripheral = DummyPeripheral::new_default();
        let mut bus = peripheral.clone();
        let mut ready = peripheral.ready_line();
        let builder = FrameBuilder::open_with_size(Truncated { good: 1500 }, 4000);
        let mut session = TransferSession::new(builder, TransferConfig::default()).unwrap();

        let result = session.run(&mut bus, &mut ready, &mut NoProgress);
        assert_eq!(result, Err(Error::ReadError));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(peripheral.is_complete());
        assert_eq!(peripheral.received().len(), 1021);
        assert_eq!(peripheral.violations(), 0);
    }

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[
            ("busy_starts", "3"),
            ("boot", "5"),
            ("busy", "2"),
            ("stall_after", "7"),
            ("fail_at", "9"),
        ])
        .unwrap();
        assert_eq!(config.busy_starts, 3);
        assert_eq!(config.boot_samples, 5);
        assert_eq!(config.busy_samples, 2);
        assert_eq!(config.stall_after, Some(7));
        assert_eq!(config.fail_at, Some(9));

        assert!(parse_options(&[("busy", "x")]).is_err());
        assert!(parse_options(&[("fail_at", "0")]).is_err());
        assert_eq!(parse_options(&[]).unwrap(), DummyConfig::default());
    }
}
