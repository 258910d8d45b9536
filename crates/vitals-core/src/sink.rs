//! Reading sinks.
//!
//! A sink is anything notified synchronously with each new [`Reading`]. The
//! engine isolates failures per sink: an error or a panic is logged and the
//! next sink still runs.

use crate::error::SinkError;
use crate::reading::Reading;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::info;

/// Consumer of generated readings. Must tolerate concurrent invocation.
pub trait Sink: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "anonymous"
    }

    fn accept(&self, reading: &Reading) -> Result<(), SinkError>;
}

impl<F> Sink for F
where
    F: Fn(&Reading) -> Result<(), SinkError> + Send + Sync,
{
    fn accept(&self, reading: &Reading) -> Result<(), SinkError> {
        self(reading)
    }
}

/// Handle returned by `add_sink`, used to unregister the sink later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SinkId(pub(crate) u64);

// ============================================================================
// Channel sink
// ============================================================================

/// Forwards copies of readings into a bounded channel.
///
/// A full channel drops the reading and reports [`SinkError::Full`]; the
/// generation loop never blocks on a slow consumer.
pub struct ChannelSink {
    name: String,
    tx: Sender<Reading>,
}

impl ChannelSink {
    /// Create the sink and the receiving end of its channel.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, Receiver<Reading>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                name: name.into(),
                tx,
            },
            rx,
        )
    }
}

impl Sink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&self, reading: &Reading) -> Result<(), SinkError> {
        match self.tx.try_send(reading.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SinkError::Full(self.name.clone())),
            Err(TrySendError::Disconnected(_)) => Err(SinkError::Disconnected(self.name.clone())),
        }
    }
}

// ============================================================================
// Logging sink
// ============================================================================

/// Emits one structured log line per reading.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl Sink for LoggingSink {
    fn name(&self) -> &str {
        "vitals-log"
    }

    fn accept(&self, reading: &Reading) -> Result<(), SinkError> {
        let v = reading.vitals();
        info!(
            sequence = reading.sequence(),
            mode = %reading.mode(),
            patient = reading.patient_id(),
            hr = v.heart_rate,
            bp = %format_args!("{}/{}", v.bp_systolic, v.bp_diastolic),
            spo2 = v.spo2,
            temp = v.temperature,
            rr = v.respiratory_rate,
            "Generated vitals"
        );
        Ok(())
    }
}
