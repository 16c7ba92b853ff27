//! Device Registry
//!
//! Tracks discovered printer peripherals by identifier and turns raw
//! discovery/loss callbacks into Add/Update/Remove diffs. Scan filtering
//! already restricts what reaches the registry, so everything handed to
//! [`DeviceRegistry::on_discovered`] is tracked.

use crate::domain::models::{NearbyPrinterChange, Printer, PrinterId, PrinterState};
use crate::infrastructure::bluetooth::adapter::Peripheral;
use std::collections::HashMap;
use tracing::debug;

struct Entry {
    peripheral: Peripheral,
    printer: Printer,
}

/// Identifier → (adapter handle, last known printer snapshot). An entry
/// exists iff the adapter has discovered or retained the peripheral, and is
/// removed only on an explicit loss event.
#[derive(Default)]
pub struct DeviceRegistry {
    entries: HashMap<PrinterId, Entry>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a discovery or advertisement refresh. First sighting derives
    /// the printer state from the adapter snapshot; later sightings refresh
    /// the handle and name but never touch the state, which may be under an
    /// orchestrated override.
    pub fn on_discovered(&mut self, peripheral: Peripheral) -> NearbyPrinterChange {
        let id = peripheral.id;
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.printer.name = peripheral.name.clone();
                entry.peripheral = peripheral;
                NearbyPrinterChange::Update(entry.printer.clone())
            }
            None => {
                debug!(printer = %id, name = ?peripheral.name, "printer discovered");
                let printer = Printer {
                    id,
                    name: peripheral.name.clone(),
                    state: peripheral.state,
                };
                self.entries.insert(id, Entry {
                    peripheral,
                    printer: printer.clone(),
                });
                NearbyPrinterChange::Add(printer)
            }
        }
    }

    /// Drop the entry for a peripheral the adapter reported lost. Unknown
    /// identifiers produce no event.
    pub fn on_lost(&mut self, id: &PrinterId) -> Option<NearbyPrinterChange> {
        self.entries.remove(id).map(|_| {
            debug!(printer = %id, "printer lost");
            NearbyPrinterChange::Remove(*id)
        })
    }

    /// Resolve a printer back to the adapter handle needed for
    /// connect/disconnect calls. Read-only; emits nothing.
    pub fn lookup(&self, id: &PrinterId) -> Option<&Peripheral> {
        self.entries.get(id).map(|e| &e.peripheral)
    }

    pub fn printer(&self, id: &PrinterId) -> Option<&Printer> {
        self.entries.get(id).map(|e| &e.printer)
    }

    /// Orchestrated state override. Goes through the registry so the stored
    /// snapshot and the emitted diff cannot diverge.
    pub fn set_state(&mut self, id: &PrinterId, state: PrinterState) -> Option<NearbyPrinterChange> {
        self.entries.get_mut(id).map(|entry| {
            entry.printer.state = state;
            NearbyPrinterChange::Update(entry.printer.clone())
        })
    }

    pub fn printers(&self) -> Vec<Printer> {
        self.entries.values().map(|e| e.printer.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn peripheral(id: PrinterId, name: &str, rssi: i16) -> Peripheral {
        Peripheral {
            id,
            name: Some(name.to_string()),
            rssi: Some(rssi),
            state: PrinterState::Disconnected,
        }
    }

    fn id() -> PrinterId {
        PrinterId(Uuid::new_v4())
    }

    #[test]
    fn first_sighting_adds_then_updates() {
        let mut registry = DeviceRegistry::new();
        let id = id();

        let change = registry.on_discovered(peripheral(id, "TM-P20", -60));
        assert!(matches!(change, NearbyPrinterChange::Add(ref p) if p.id == id));

        let change = registry.on_discovered(peripheral(id, "TM-P20", -55));
        assert!(matches!(change, NearbyPrinterChange::Update(ref p) if p.id == id));
        assert_eq!(registry.lookup(&id).unwrap().rssi, Some(-55));
    }

    #[test]
    fn refresh_keeps_orchestrated_state() {
        let mut registry = DeviceRegistry::new();
        let id = id();
        registry.on_discovered(peripheral(id, "TM-P20", -60));
        registry.set_state(&id, PrinterState::Connecting);

        let change = registry.on_discovered(peripheral(id, "TM-P20", -50));
        match change {
            NearbyPrinterChange::Update(p) => assert_eq!(p.state, PrinterState::Connecting),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn lookup_resolves_the_handle_that_produced_the_add() {
        let mut registry = DeviceRegistry::new();
        let id = id();
        let handle = peripheral(id, "TM-P20", -60);
        registry.on_discovered(handle.clone());

        assert_eq!(registry.lookup(&id), Some(&handle));

        registry.on_lost(&id);
        assert_eq!(registry.lookup(&id), None);
    }

    #[test]
    fn lost_removes_and_unknown_is_silent() {
        let mut registry = DeviceRegistry::new();
        let id = id();
        registry.on_discovered(peripheral(id, "TM-P20", -60));

        assert_eq!(registry.on_lost(&id), Some(NearbyPrinterChange::Remove(id)));
        // No Remove may ever precede an Add for an identifier.
        assert_eq!(registry.on_lost(&id), None);
        assert_eq!(registry.on_lost(&PrinterId(Uuid::new_v4())), None);
    }

    #[test]
    fn set_state_on_unknown_id_is_silent() {
        let mut registry = DeviceRegistry::new();
        assert_eq!(registry.set_state(&id(), PrinterState::Connecting), None);
    }

    #[test]
    fn printers_snapshots_all_entries() {
        let mut registry = DeviceRegistry::new();
        registry.on_discovered(peripheral(id(), "a", -40));
        registry.on_discovered(peripheral(id(), "b", -50));
        assert_eq!(registry.printers().len(), 2);
    }
}
