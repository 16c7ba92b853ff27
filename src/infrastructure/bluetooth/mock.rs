//! Mock adapter for tests and downstream consumers without a radio.
//!
//! Records every issued command in a shared log and leaves event injection
//! to the test, which holds a clone of the adapter event sender.

use crate::domain::models::PrinterId;
use crate::infrastructure::bluetooth::adapter::{
    AdapterEvent, AdapterState, BleAdapter, Characteristic, WriteMode,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// One recorded adapter command, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    StartScan(Vec<Uuid>),
    StopScan,
    Connect(PrinterId),
    CancelConnect(PrinterId),
    DiscoverServices(PrinterId, Vec<Uuid>),
    DiscoverCharacteristics(PrinterId, Uuid),
    Write {
        id: PrinterId,
        characteristic: Uuid,
        data: Vec<u8>,
        mode: WriteMode,
    },
}

pub struct MockAdapter {
    state: Arc<Mutex<AdapterState>>,
    log: Arc<Mutex<Vec<MockCommand>>>,
    connected: Arc<Mutex<Vec<PrinterId>>>,
    events: mpsc::UnboundedSender<AdapterEvent>,
}

impl MockAdapter {
    pub fn new(events: mpsc::UnboundedSender<AdapterEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(AdapterState::PoweredOn)),
            log: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Shared command log; clone before moving the adapter into the service.
    pub fn log(&self) -> Arc<Mutex<Vec<MockCommand>>> {
        self.log.clone()
    }

    /// Shared power-state cell, for flipping the radio mid-test.
    pub fn state_cell(&self) -> Arc<Mutex<AdapterState>> {
        self.state.clone()
    }

    /// Peripherals reported by [`BleAdapter::connected_peripherals`].
    pub fn set_connected(&self, ids: Vec<PrinterId>) {
        *self.connected.lock().unwrap() = ids;
    }

    /// Inject an event as the hardware would.
    pub fn push(&self, event: AdapterEvent) {
        let _ = self.events.send(event);
    }

    fn record(&self, command: MockCommand) {
        self.log.lock().unwrap().push(command);
    }
}

impl BleAdapter for MockAdapter {
    fn state(&self) -> AdapterState {
        *self.state.lock().unwrap()
    }

    fn start_scan(&mut self, services: &[Uuid]) {
        self.record(MockCommand::StartScan(services.to_vec()));
    }

    fn stop_scan(&mut self) {
        self.record(MockCommand::StopScan);
    }

    fn connect(&mut self, id: &PrinterId) {
        self.record(MockCommand::Connect(*id));
    }

    fn cancel_connect(&mut self, id: &PrinterId) {
        self.record(MockCommand::CancelConnect(*id));
    }

    fn discover_services(&mut self, id: &PrinterId, services: &[Uuid]) {
        self.record(MockCommand::DiscoverServices(*id, services.to_vec()));
    }

    fn discover_characteristics(&mut self, id: &PrinterId, service: Uuid) {
        self.record(MockCommand::DiscoverCharacteristics(*id, service));
    }

    fn write(&mut self, id: &PrinterId, characteristic: &Characteristic, data: &[u8], mode: WriteMode) {
        self.record(MockCommand::Write {
            id: *id,
            characteristic: characteristic.uuid,
            data: data.to_vec(),
            mode,
        });
    }

    fn connected_peripherals(&self, _services: &[Uuid]) -> Vec<PrinterId> {
        self.connected.lock().unwrap().clone()
    }
}
