use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier of a printer peripheral, valid for the hardware's
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrinterId(pub Uuid);

impl std::fmt::Display for PrinterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection state of a printer as observed by business logic. The single
/// source of truth for consumers; overridden ahead of hardware confirmation
/// during orchestrated transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Snapshot of a nearby printer. The advertised name may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    pub name: Option<String>,
    pub state: PrinterState,
}

/// Diff against the previously observed set of nearby printers. Consumers
/// apply these incrementally instead of re-reading the full list.
#[derive(Debug, Clone, PartialEq)]
pub enum NearbyPrinterChange {
    Add(Printer),
    Update(Printer),
    Remove(PrinterId),
}

/// Everything the service reports outward, delivered over a single channel.
#[derive(Debug, Clone)]
pub enum PrinterEvent {
    Change(NearbyPrinterChange),
    PrintProgress { sent: usize, total: usize },
    Error(PrinterError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrinterError {
    /// The adapter is not powered on, or no writable characteristic is
    /// available for printing.
    #[error("device not ready")]
    DeviceNotReady,
    /// Adapter-reported connect failure, or a failed acknowledged write
    /// during a transfer.
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    /// A connect or print request is already in flight.
    #[error("operation already in progress")]
    Busy,
}
