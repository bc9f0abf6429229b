//! Transfer sequencer
//!
//! Drives one file transfer to completion, one frame per bus transaction:
//!
//! ```text
//! Idle -> AwaitingPeerReady -> Transferring -> Completing -> Completed
//!               |  ^                |              |
//!               +--+ (busy reply)   +--------------+--> Failed
//! ```
//!
//! Every transaction is preceded by a readiness wait; the bus is only
//! clocked right after the peripheral's handshake line was observed
//! asserted. The session owns the frame builder, both frame buffers and all
//! counters, and releases the source exactly once when it reaches a
//! terminal state.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::bus::{SpiBus, Transaction};
use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::frame::{encode_frame, seal_data_frame, FrameLayout, Opcode, HEADER_LEN};
use crate::ready::{wait_ready, CancelFlag, ReadySignal, WaitOutcome};
use crate::source::{ByteSource, Chunk, FrameBuilder, FrameStats};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing sent yet
    Idle,
    /// Sending START until the peer acknowledges
    AwaitingPeerReady,
    /// Sending DATA frames
    Transferring,
    /// Sending the END frame
    Completing,
    /// END was sent and the length check passed
    Completed,
    /// Aborted; see the error returned by the failing step
    Failed,
}

impl SessionState {
    /// Whether the session has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Summary of a transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Source size recorded when it was opened (if known)
    pub total_bytes: Option<u64>,
    /// Payload bytes carried by DATA frames
    pub bytes_sent: u64,
    /// Number of DATA frames sent
    pub data_frames: u64,
    /// Number of START frames sent, including the acknowledged one
    pub start_attempts: u32,
    /// Number of bus transactions performed (START + DATA + END)
    pub frames_sent: u64,
}

/// Progress callbacks for a transfer
pub trait TransferObserver {
    /// Called after each START frame with whether the peer acknowledged it
    fn handshake_attempt(&mut self, attempt: u32, acknowledged: bool);

    /// Called once the peer has acknowledged and data is about to flow
    fn started(&mut self, total_bytes: Option<u64>);

    /// Called after each DATA frame
    fn frame_sent(&mut self, index: u64, len: usize, bytes_sent: u64);

    /// Called when the transfer completed successfully
    fn completed(&mut self, report: &TransferReport);
}

/// A no-op progress reporter
pub struct NoProgress;

impl TransferObserver for NoProgress {
    fn handshake_attempt(&mut self, _attempt: u32, _acknowledged: bool) {}
    fn started(&mut self, _total_bytes: Option<u64>) {}
    fn frame_sent(&mut self, _index: u64, _len: usize, _bytes_sent: u64) {}
    fn completed(&mut self, _report: &TransferReport) {}
}

/// One file transfer
pub struct TransferSession<S> {
    builder: Option<FrameBuilder<S>>,
    stats: Option<FrameStats>,
    config: TransferConfig,
    layout: FrameLayout,
    cancel: Option<Arc<CancelFlag>>,
    tx: Vec<u8>,
    rx: Vec<u8>,
    state: SessionState,
    failure: Option<Error>,
    total: Option<u64>,
    bytes_sent: u64,
    data_frames: u64,
    start_attempts: u32,
    frames_sent: u64,
}

impl<S: ByteSource> TransferSession<S> {
    /// Create a session for an opened source
    pub fn new(builder: FrameBuilder<S>, config: TransferConfig) -> Result<Self> {
        let layout = config.layout()?;
        let total = builder.total();

        Ok(Self {
            builder: Some(builder),
            stats: None,
            config,
            layout,
            cancel: None,
            tx: vec![0u8; layout.frame_size()],
            rx: vec![0u8; layout.frame_size()],
            state: SessionState::Idle,
            failure: None,
            total,
            bytes_sent: 0,
            data_frames: 0,
            start_attempts: 0,
            frames_sent: 0,
        })
    }

    /// Abort readiness waits when `cancel` is raised
    pub fn with_cancel(mut self, cancel: Arc<CancelFlag>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Frame geometry in use
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Counters so far
    pub fn report(&self) -> TransferReport {
        TransferReport {
            total_bytes: self.total,
            bytes_sent: self.bytes_sent,
            data_frames: self.data_frames,
            start_attempts: self.start_attempts,
            frames_sent: self.frames_sent,
        }
    }

    /// Frame builder counters, available once the source has been released
    pub fn source_stats(&self) -> Option<FrameStats> {
        self.stats
    }

    /// Run the session until it completes or fails
    pub fn run<B, R, O>(&mut self, bus: &mut B, ready: &mut R, observer: &mut O) -> Result<TransferReport>
    where
        B: SpiBus + ?Sized,
        R: ReadySignal + ?Sized,
        O: TransferObserver + ?Sized,
    {
        while !self.state.is_terminal() {
            self.step(bus, ready, observer)?;
        }

        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.report()),
        }
    }

    /// Advance by one state transition (at most one bus transaction)
    ///
    /// Any error moves the session to `Failed` and releases the source.
    pub fn step<B, R, O>(&mut self, bus: &mut B, ready: &mut R, observer: &mut O) -> Result<SessionState>
    where
        B: SpiBus + ?Sized,
        R: ReadySignal + ?Sized,
        O: TransferObserver + ?Sized,
    {
        match self.advance(bus, ready, observer) {
            Ok(state) => Ok(state),
            Err(e) => Err(self.fail(bus, ready, e)),
        }
    }

    fn advance<B, R, O>(&mut self, bus: &mut B, ready: &mut R, observer: &mut O) -> Result<SessionState>
    where
        B: SpiBus + ?Sized,
        R: ReadySignal + ?Sized,
        O: TransferObserver + ?Sized,
    {
        match self.state {
            SessionState::Idle => {
                if self.layout.frame_size() > bus.max_transfer_len() {
                    log::error!(
                        "Frame size {} exceeds bus transfer limit {}",
                        self.layout.frame_size(),
                        bus.max_transfer_len()
                    );
                    return Err(Error::InvalidFrameSize);
                }
                log::info!("Waiting for peer to enter receive mode...");
                self.state = SessionState::AwaitingPeerReady;
            }

            SessionState::AwaitingPeerReady => {
                if let Some(max) = self.config.max_start_attempts {
                    if self.start_attempts >= max {
                        log::error!("Peer did not acknowledge START after {} attempts", max);
                        return Err(Error::PeerNotReady);
                    }
                }

                encode_frame(&mut self.tx, Opcode::Start, &[])?;
                self.start_attempts += 1;
                self.exchange(bus, ready, Opcode::Start)?;

                let acknowledged = self.rx[0] != 0;
                observer.handshake_attempt(self.start_attempts, acknowledged);
                if acknowledged {
                    log::info!(
                        "Peer acknowledged START (attempt {}, reply 0x{:02X})",
                        self.start_attempts,
                        self.rx[0]
                    );
                    observer.started(self.total);
                    self.state = SessionState::Transferring;
                } else {
                    log::debug!("Peer busy, retrying START (attempt {})", self.start_attempts);
                }
            }

            SessionState::Transferring => {
                let builder = self.builder.as_mut().ok_or(Error::ReadError)?;
                match builder.next_chunk(&mut self.tx[HEADER_LEN..])? {
                    Chunk::Data { len, last } => {
                        seal_data_frame(&mut self.tx, len)?;
                        self.exchange(bus, ready, Opcode::Data)?;

                        self.bytes_sent += len as u64;
                        self.data_frames += 1;
                        log::debug!(
                            "Sent DATA frame {} ({} bytes, {} total)",
                            self.data_frames,
                            len,
                            self.bytes_sent
                        );
                        observer.frame_sent(self.data_frames, len, self.bytes_sent);

                        if last {
                            self.state = SessionState::Completing;
                        }
                    }
                    Chunk::Empty => {
                        log::debug!("Source exhausted after {} DATA frames", self.data_frames);
                        self.state = SessionState::Completing;
                    }
                }
            }

            SessionState::Completing => {
                encode_frame(&mut self.tx, Opcode::End, &[])?;
                self.exchange(bus, ready, Opcode::End)?;
                self.release();
                self.check_length()?;

                self.state = SessionState::Completed;
                let report = self.report();
                log::info!(
                    "Transfer complete: {} bytes in {} DATA frames",
                    report.bytes_sent,
                    report.data_frames
                );
                observer.completed(&report);
            }

            SessionState::Completed | SessionState::Failed => {}
        }

        Ok(self.state)
    }

    /// Wait for the readiness signal, then clock the current frame out
    fn exchange<B, R>(&mut self, bus: &mut B, ready: &mut R, opcode: Opcode) -> Result<()>
    where
        B: SpiBus + ?Sized,
        R: ReadySignal + ?Sized,
    {
        match wait_ready(ready, &self.config.wait, self.cancel.as_deref())? {
            WaitOutcome::Ready => {}
            WaitOutcome::TimedOut => {
                log::error!("Peer not ready for {} frame", opcode);
                return Err(Error::PeerTimeout);
            }
            WaitOutcome::Cancelled => return Err(Error::Cancelled),
        }

        self.rx.fill(0);
        let mut xfer = Transaction::new(&self.tx, &mut self.rx)?;
        bus.transact(&mut xfer).map_err(|e| {
            log::error!("{} frame transaction failed: {}", opcode, e);
            Error::BusFault
        })?;

        self.frames_sent += 1;
        Ok(())
    }

    /// Compare what was sent with what the source claimed to hold
    fn check_length(&self) -> Result<()> {
        let delivered = self.stats.map_or(self.bytes_sent, |s| s.bytes_delivered);
        let expected = self.total.unwrap_or(delivered);

        if expected == self.bytes_sent && delivered == self.bytes_sent {
            return Ok(());
        }

        log::warn!(
            "Length mismatch: source was {} bytes, sent {} bytes",
            expected,
            self.bytes_sent
        );
        if self.config.strict_length_check {
            return Err(Error::LengthMismatch {
                expected,
                actual: self.bytes_sent,
            });
        }
        Ok(())
    }

    /// Move to `Failed`, sending a best-effort END after a source failure
    fn fail<B, R>(&mut self, bus: &mut B, ready: &mut R, err: Error) -> Error
    where
        B: SpiBus + ?Sized,
        R: ReadySignal + ?Sized,
    {
        if err == Error::ReadError
            && self.state == SessionState::Transferring
            && self.config.send_end_on_failure
        {
            log::warn!("Source read failed, sending END so the peer can leave receive mode");
            let sent = encode_frame(&mut self.tx, Opcode::End, &[])
                .and_then(|()| self.exchange(bus, ready, Opcode::End));
            if let Err(e) = sent {
                log::error!("Best-effort END frame failed: {}", e);
            }
        }

        log::error!("Transfer failed in state {:?}: {}", self.state, err);
        self.state = SessionState::Failed;
        self.failure = Some(err);
        self.release();
        err
    }

    /// Release the source, keeping its counters
    fn release(&mut self) {
        if let Some(builder) = self.builder.take() {
            self.stats = Some(builder.close());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameView;
    use crate::ready::WaitPolicy;
    use crate::source::SliceSource;

    /// Records every frame; answers START with 0 for the first `busy` attempts
    #[derive(Default)]
    struct MockBus {
        frames: Vec<Vec<u8>>,
        busy: usize,
        fail_at: Option<usize>,
        max_len: Option<usize>,
    }

    impl MockBus {
        fn opcodes(&self) -> Vec<Opcode> {
            self.frames
                .iter()
                .map(|f| Opcode::from_u8(f[0]).unwrap())
                .collect()
        }

        fn data_payload(&self) -> Vec<u8> {
            let mut out = Vec::new();
            for raw in &self.frames {
                let frame = FrameView::parse(raw).unwrap();
                if frame.opcode == Opcode::Data {
                    out.extend_from_slice(frame.payload());
                }
            }
            out
        }
    }

    impl SpiBus for MockBus {
        fn max_transfer_len(&self) -> usize {
            self.max_len.unwrap_or(usize::MAX)
        }

        fn transact(&mut self, xfer: &mut Transaction<'_>) -> Result<()> {
            if self.fail_at == Some(self.frames.len()) {
                return Err(Error::BusFault);
            }
            self.frames.push(xfer.tx.to_vec());
            if xfer.tx[0] == Opcode::Start.as_u8() {
                xfer.rx[0] = if self.busy > 0 {
                    self.busy -= 1;
                    0
                } else {
                    0xA5
                };
            }
            Ok(())
        }
    }

    /// Readiness line that is always asserted (or never, if `dead`)
    #[derive(Default)]
    struct Line {
        dead: bool,
    }

    impl ReadySignal for Line {
        fn sample(&mut self) -> Result<bool> {
            Ok(!self.dead)
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    /// Source that fails after `ok` bytes
    struct Broken {
        ok: usize,
    }

    impl ByteSource for Broken {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.ok == 0 {
                return Err(Error::ReadError);
            }
            let n = buf.len().min(self.ok);
            self.ok -= n;
            Ok(n)
        }

        fn size_hint(&mut self) -> Result<Option<u64>> {
            Ok(Some(4096))
        }
    }

    fn config() -> TransferConfig {
        TransferConfig::default()
            .with_frame_size(16)
            .with_wait(WaitPolicy::unbounded(1).with_timeout_ms(1))
    }

    fn session(data: &[u8]) -> TransferSession<SliceSource<'_>> {
        let builder = FrameBuilder::open(SliceSource::new(data)).unwrap();
        TransferSession::new(builder, config()).unwrap()
    }

    #[test]
    fn test_state_sequence() {
        let data = [7u8; 20];
        let mut session = session(&data);
        let mut bus = MockBus::default();
        let mut line = Line::default();

        let mut states = Vec::new();
        while !session.state().is_terminal() {
            states.push(session.step(&mut bus, &mut line, &mut NoProgress).unwrap());
        }

        assert_eq!(
            states,
            [
                SessionState::AwaitingPeerReady,
                SessionState::Transferring,
                SessionState::Transferring,
                SessionState::Completing,
                SessionState::Completed,
            ]
        );
        assert_eq!(bus.data_payload(), data);
        assert_eq!(
            session.source_stats(),
            Some(FrameStats {
                total: Some(20),
                bytes_delivered: 20
            })
        );
    }

    #[test]
    fn test_busy_peer_is_retried() {
        let mut session = session(&[1, 2, 3]);
        let mut bus = MockBus {
            busy: 3,
            ..Default::default()
        };

        let report = session
            .run(&mut bus, &mut Line::default(), &mut NoProgress)
            .unwrap();
        assert_eq!(report.start_attempts, 4);
        assert_eq!(
            bus.opcodes(),
            [
                Opcode::Start,
                Opcode::Start,
                Opcode::Start,
                Opcode::Start,
                Opcode::Data,
                Opcode::End
            ]
        );
    }

    #[test]
    fn test_start_attempt_limit() {
        let builder = FrameBuilder::open(SliceSource::new(&[1])).unwrap();
        let mut session =
            TransferSession::new(builder, config().with_max_start_attempts(Some(2))).unwrap();
        let mut bus = MockBus {
            busy: 10,
            ..Default::default()
        };

        let err = session
            .run(&mut bus, &mut Line::default(), &mut NoProgress)
            .unwrap_err();
        assert_eq!(err, Error::PeerNotReady);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(bus.frames.len(), 2);
    }

    #[test]
    fn test_read_error_sends_best_effort_end() {
        let builder = FrameBuilder::open(Broken { ok: 13 }).unwrap();
        let mut session = TransferSession::new(builder, config()).unwrap();
        let mut bus = MockBus::default();

        let err = session
            .run(&mut bus, &mut Line::default(), &mut NoProgress)
            .unwrap_err();
        assert_eq!(err, Error::ReadError);
        assert_eq!(
            bus.opcodes(),
            [Opcode::Start, Opcode::Data, Opcode::End]
        );
        assert_eq!(session.source_stats().map(|s| s.bytes_delivered), Some(13));
    }

    #[test]
    fn test_read_error_without_end() {
        let builder = FrameBuilder::open(Broken { ok: 0 }).unwrap();
        let mut session =
            TransferSession::new(builder, config().with_end_on_failure(false)).unwrap();
        let mut bus = MockBus::default();

        assert_eq!(
            session.run(&mut bus, &mut Line::default(), &mut NoProgress),
            Err(Error::ReadError)
        );
        assert_eq!(bus.opcodes(), [Opcode::Start]);
    }

    #[test]
    fn test_bus_fault_is_fatal() {
        let data = [0u8; 40];
        let mut session = session(&data);
        let mut bus = MockBus {
            fail_at: Some(2),
            ..Default::default()
        };

        assert_eq!(
            session.run(&mut bus, &mut Line::default(), &mut NoProgress),
            Err(Error::BusFault)
        );
        // No END after a bus fault
        assert_eq!(bus.opcodes(), [Opcode::Start, Opcode::Data]);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_peer_timeout() {
        let mut session = session(&[1]);
        let mut bus = MockBus::default();

        assert_eq!(
            session.run(&mut bus, &mut Line { dead: true }, &mut NoProgress),
            Err(Error::PeerTimeout)
        );
        assert!(bus.frames.is_empty());
    }

    #[test]
    fn test_cancelled_wait() {
        let cancel = Arc::new(CancelFlag::new());
        cancel.cancel();
        let mut session = session(&[1]).with_cancel(cancel);
        let mut bus = MockBus::default();

        assert_eq!(
            session.run(&mut bus, &mut Line::default(), &mut NoProgress),
            Err(Error::Cancelled)
        );
    }

    #[test]
    fn test_frame_larger_than_bus_limit() {
        let mut session = session(&[1]);
        let mut bus = MockBus {
            max_len: Some(8),
            ..Default::default()
        };

        assert_eq!(
            session.run(&mut bus, &mut Line::default(), &mut NoProgress),
            Err(Error::InvalidFrameSize)
        );
    }

    #[test]
    fn test_length_check() {
        let data = [3u8; 10];
        let mut session = session(&data);
        session.bytes_sent = 5;
        assert_eq!(
            session.check_length(),
            Err(Error::LengthMismatch {
                expected: 10,
                actual: 5
            })
        );

        session.config.strict_length_check = false;
        assert_eq!(session.check_length(), Ok(()));

        session.bytes_sent = 10;
        session.config.strict_length_check = true;
        assert_eq!(session.check_length(), Ok(()));
    }

    #[test]
    fn test_failed_session_reports_cause() {
        let mut session = session(&[1]);
        let mut bus = MockBus::default();
        let mut dead = Line { dead: true };
        assert_eq!(
            session.run(&mut bus, &mut dead, &mut NoProgress),
            Err(Error::PeerTimeout)
        );
        assert_eq!(
            session.run(&mut bus, &mut Line::default(), &mut NoProgress),
            Err(Error::PeerTimeout)
        );
    }

    #[test]
    fn test_stepping_terminal_state_is_noop() {
        let mut session = session(&[]);
        let mut bus = MockBus::default();
        let mut line = Line::default();
        session.run(&mut bus, &mut line, &mut NoProgress).unwrap();

        let sent = bus.frames.len();
        assert_eq!(
            session.step(&mut bus, &mut line, &mut NoProgress),
            Ok(SessionState::Completed)
        );
        assert_eq!(bus.frames.len(), sent);
    }
}
