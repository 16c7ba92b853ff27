//! BLE Adapter Capability
//!
//! Abstracts the platform BLE stack behind a command/event boundary. A
//! backend receives an event sender at construction and pushes every
//! completion and notification through it as an [`AdapterEvent`]; the trait
//! methods themselves only issue commands and never block.

use crate::domain::models::{PrinterId, PrinterState};
use uuid::Uuid;

/// Power and authorization state of the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unknown,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

/// GATT write mode. Chunked transfers require [`WriteMode::WithResponse`]
/// so each chunk is paced on the peripheral's acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    WithResponse,
    WithoutResponse,
}

/// Adapter-level snapshot of a discovered peripheral. This is the handle
/// the registry stores and resolves for connect/disconnect calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Peripheral {
    pub id: PrinterId,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub state: PrinterState,
}

/// A GATT characteristic exposed by a connected peripheral.
#[derive(Debug, Clone, PartialEq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub service: Uuid,
    pub writable: bool,
    pub writable_without_response: bool,
}

impl Characteristic {
    pub fn supports_acknowledged_write(&self) -> bool {
        self.writable
    }
}

/// Events pushed by an adapter backend. Delivery order matches the order
/// the underlying hardware events occurred.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    StateChanged(AdapterState),
    /// Discovery or advertisement refresh; repeated for RSSI/name updates.
    Discovered(Peripheral),
    /// The adapter's out-of-range/timeout policy declared the peripheral gone.
    Lost(PrinterId),
    Connected(PrinterId),
    ConnectFailed {
        id: PrinterId,
        reason: String,
    },
    Disconnected {
        id: PrinterId,
        error: Option<String>,
    },
    ServicesDiscovered {
        id: PrinterId,
        services: Vec<Uuid>,
    },
    CharacteristicsDiscovered {
        id: PrinterId,
        service: Uuid,
        characteristics: Vec<Characteristic>,
    },
    WriteAcknowledged {
        id: PrinterId,
        error: Option<String>,
    },
}

/// Capability the platform BLE stack provides to the service. Every method
/// is non-blocking command issuance; results arrive asynchronously on the
/// backend's event channel.
pub trait BleAdapter: Send {
    fn state(&self) -> AdapterState;

    /// Begin discovery restricted to peripherals advertising one of the
    /// given services.
    fn start_scan(&mut self, services: &[Uuid]);
    fn stop_scan(&mut self);

    fn connect(&mut self, id: &PrinterId);
    /// Cancels a pending connect or tears down an established connection;
    /// completion arrives as [`AdapterEvent::Disconnected`].
    fn cancel_connect(&mut self, id: &PrinterId);

    fn discover_services(&mut self, id: &PrinterId, services: &[Uuid]);
    fn discover_characteristics(&mut self, id: &PrinterId, service: Uuid);

    fn write(&mut self, id: &PrinterId, characteristic: &Characteristic, data: &[u8], mode: WriteMode);

    /// Peripherals the adapter currently retains a connection to, restricted
    /// to those exposing one of the given services.
    fn connected_peripherals(&self, services: &[Uuid]) -> Vec<PrinterId>;
}
