//! Characteristic Session
//!
//! Per-connection discovery of services and characteristics, restricted to
//! the configured sets, ending in a single writable endpoint. If no
//! matching writable characteristic exists the peripheral stays connected
//! but unusable for printing, which callers observe as `can_print == false`.

use crate::domain::config::PrinterConfig;
use crate::domain::models::PrinterId;
use crate::infrastructure::bluetooth::adapter::Characteristic;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The single write target for print transfers. Available only after
/// characteristic discovery succeeds on a connected peripheral.
#[derive(Debug, Clone, PartialEq)]
pub struct WritableEndpoint {
    pub printer: PrinterId,
    pub characteristic: Characteristic,
}

pub struct CharacteristicSession {
    service_uuids: Vec<Uuid>,
    characteristic_uuids: Vec<Uuid>,
    endpoint: Option<WritableEndpoint>,
}

impl CharacteristicSession {
    pub fn new(config: &PrinterConfig) -> Self {
        Self {
            service_uuids: config.service_uuids.clone(),
            characteristic_uuids: config.characteristic_uuids.clone(),
            endpoint: None,
        }
    }

    /// The connection completed; service discovery should start for these
    /// services.
    pub fn on_connected(&self, id: &PrinterId) -> Vec<Uuid> {
        debug!(printer = %id, "connected, starting service discovery");
        self.service_uuids.clone()
    }

    /// Services came back; returns the matched subset needing characteristic
    /// discovery.
    pub fn on_services_discovered(&self, id: &PrinterId, services: &[Uuid]) -> Vec<Uuid> {
        let matched: Vec<Uuid> = services
            .iter()
            .filter(|s| self.service_uuids.contains(s))
            .copied()
            .collect();
        if matched.is_empty() {
            warn!(printer = %id, "no matching service on peripheral");
        }
        matched
    }

    /// Characteristics came back; selects the first one supporting an
    /// acknowledged write and stores it as the endpoint. Returns the
    /// endpoint when this discovery made the session ready. A session that
    /// already holds an endpoint keeps it.
    pub fn on_characteristics_discovered(
        &mut self,
        id: PrinterId,
        characteristics: Vec<Characteristic>,
    ) -> Option<&WritableEndpoint> {
        if self.endpoint.is_some() {
            return None;
        }

        let selected = characteristics.into_iter().find(|c| self.accepts(c));
        match selected {
            Some(characteristic) => {
                info!(printer = %id, characteristic = %characteristic.uuid, "writable endpoint ready");
                self.endpoint = Some(WritableEndpoint {
                    printer: id,
                    characteristic,
                });
                self.endpoint.as_ref()
            }
            None => {
                warn!(printer = %id, "no writable characteristic found");
                None
            }
        }
    }

    fn accepts(&self, characteristic: &Characteristic) -> bool {
        characteristic.supports_acknowledged_write()
            && (self.characteristic_uuids.is_empty()
                || self.characteristic_uuids.contains(&characteristic.uuid))
    }

    /// Drop the endpoint if it belongs to this peripheral. Returns whether
    /// an endpoint was invalidated.
    pub fn clear(&mut self, id: &PrinterId) -> bool {
        if self.endpoint.as_ref().is_some_and(|e| &e.printer == id) {
            self.endpoint = None;
            return true;
        }
        false
    }

    /// Unconditional teardown, for when the radio itself goes away.
    pub fn clear_all(&mut self) {
        self.endpoint = None;
    }

    pub fn endpoint(&self) -> Option<&WritableEndpoint> {
        self.endpoint.as_ref()
    }
}
