//! LinkHandle - a bus paired with the readiness line that gates it

use std::path::Path;
use std::sync::Arc;

use spixfer_core::source::{ByteSource, FrameBuilder};
use spixfer_core::{
    CancelFlag, ReadySignal, Result, SpiBus, TransferConfig, TransferObserver, TransferReport,
    TransferSession,
};

/// An opened bus and readiness line
///
/// The handle owns both halves of the link. Transfers run one at a time;
/// the bus is never shared between sessions.
pub struct LinkHandle {
    bus: Box<dyn SpiBus>,
    ready: Box<dyn ReadySignal>,
    bus_name: String,
    ready_name: String,
}

impl LinkHandle {
    pub(crate) fn new(
        bus: Box<dyn SpiBus>,
        ready: Box<dyn ReadySignal>,
        bus_name: impl Into<String>,
        ready_name: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            ready,
            bus_name: bus_name.into(),
            ready_name: ready_name.into(),
        }
    }

    /// Name of the bus backend
    pub fn bus_name(&self) -> &str {
        &self.bus_name
    }

    /// Name of the readiness line backend
    pub fn ready_name(&self) -> &str {
        &self.ready_name
    }

    /// Largest transaction the bus accepts
    pub fn max_transfer_len(&self) -> usize {
        self.bus.max_transfer_len()
    }

    /// Borrow the bus and readiness line for a manual session
    pub fn parts(&mut self) -> (&mut dyn SpiBus, &mut dyn ReadySignal) {
        (self.bus.as_mut(), self.ready.as_mut())
    }

    /// Run a complete transfer of `builder` over this link
    pub fn send<S, O>(
        &mut self,
        builder: FrameBuilder<S>,
        config: TransferConfig,
        cancel: Option<Arc<CancelFlag>>,
        observer: &mut O,
    ) -> Result<TransferReport>
    where
        S: ByteSource,
        O: TransferObserver + ?Sized,
    {
        let mut session = TransferSession::new(builder, config)?;
        if let Some(cancel) = cancel {
            session = session.with_cancel(cancel);
        }
        log::debug!(
            "Starting transfer over {} gated by {}",
            self.bus_name,
            self.ready_name
        );
        session.run(self.bus.as_mut(), self.ready.as_mut(), observer)
    }

    /// Open a file and transfer it over this link
    pub fn send_file<O>(
        &mut self,
        path: impl AsRef<Path>,
        config: TransferConfig,
        cancel: Option<Arc<CancelFlag>>,
        observer: &mut O,
    ) -> Result<TransferReport>
    where
        O: TransferObserver + ?Sized,
    {
        let path = path.as_ref();
        log::info!("Sending {}", path.display());
        let builder = FrameBuilder::open_path(path)?;
        self.send(builder, config, cancel, observer)
    }
}
