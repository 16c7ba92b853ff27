//! BLE receipt-printer connection management.
//!
//! Tracks nearby printers as an incrementally-diffed registry, drives a
//! timeout-guarded connect state machine, and prints by streaming a byte
//! buffer to the printer's writable characteristic in acknowledgment-paced
//! chunks. The platform BLE stack is consumed through the
//! [`BleAdapter`] capability; everything observable leaves through a single
//! [`PrinterEvent`] channel.

pub mod domain;
pub mod infrastructure;

pub use domain::config::{LogSettings, PrinterConfig};
pub use domain::models::{
    NearbyPrinterChange, Printer, PrinterError, PrinterEvent, PrinterId, PrinterState,
};
pub use infrastructure::bluetooth::adapter::{
    AdapterEvent, AdapterState, BleAdapter, Characteristic, Peripheral, WriteMode,
};
pub use infrastructure::bluetooth::service::{PrinterCommand, PrinterService};
pub use infrastructure::bluetooth::session::WritableEndpoint;
pub use infrastructure::logging::{init_logger, LoggingGuard};
