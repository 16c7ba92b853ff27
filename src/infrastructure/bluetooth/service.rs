//! Printer Service
//!
//! The connection orchestrator. Owns the adapter, the device registry, the
//! characteristic session and the transfer slot; drives scan, connect and
//! disconnect transitions; arms the connect timeout; and merges everything
//! into a single outbound [`PrinterEvent`] stream.
//!
//! State machine per printer:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
//! ```
//!
//! Failures have no state of their own; they resolve back to Disconnected
//! plus an out-of-band error report. The connect timeout is the single
//! built-in recovery mechanism; nothing is retried automatically.

use crate::domain::config::PrinterConfig;
use crate::domain::models::{
    NearbyPrinterChange, Printer, PrinterError, PrinterEvent, PrinterId, PrinterState,
};
use crate::infrastructure::bluetooth::adapter::{AdapterEvent, AdapterState, BleAdapter, WriteMode};
use crate::infrastructure::bluetooth::registry::DeviceRegistry;
use crate::infrastructure::bluetooth::session::{CharacteristicSession, WritableEndpoint};
use crate::infrastructure::bluetooth::transfer::ChunkedTransfer;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Requests accepted by [`PrinterService::run`]. Connect and print carry a
/// per-request completion channel, so concurrent requests cannot clobber
/// one another.
#[derive(Debug)]
pub enum PrinterCommand {
    StartScan,
    StopScan,
    Connect {
        printer: Printer,
        done: oneshot::Sender<Result<(), PrinterError>>,
    },
    Disconnect(Printer),
    DisconnectAll,
    Print {
        data: Vec<u8>,
        done: oneshot::Sender<Result<(), PrinterError>>,
    },
}

struct PendingConnect {
    id: PrinterId,
    deadline: Instant,
    done: oneshot::Sender<Result<(), PrinterError>>,
}

struct ActivePrint {
    endpoint: WritableEndpoint,
    transfer: ChunkedTransfer,
    done: oneshot::Sender<Result<(), PrinterError>>,
}

pub struct PrinterService {
    adapter: Box<dyn BleAdapter>,
    config: PrinterConfig,
    registry: DeviceRegistry,
    session: CharacteristicSession,
    event_tx: mpsc::UnboundedSender<PrinterEvent>,
    scanning: bool,
    pending_connect: Option<PendingConnect>,
    active_print: Option<ActivePrint>,
}

impl PrinterService {
    pub fn new(
        adapter: Box<dyn BleAdapter>,
        config: PrinterConfig,
        event_tx: mpsc::UnboundedSender<PrinterEvent>,
    ) -> Self {
        let session = CharacteristicSession::new(&config);
        Self {
            adapter,
            config,
            registry: DeviceRegistry::new(),
            session,
            event_tx,
            scanning: false,
            pending_connect: None,
            active_print: None,
        }
    }

    /// Drive the service until the command or adapter channel closes. All
    /// registry and endpoint mutation happens on this loop; observers only
    /// ever see owned snapshots over the event channel.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PrinterCommand>,
        mut adapter_events: mpsc::UnboundedReceiver<AdapterEvent>,
    ) {
        loop {
            let deadline = self.connect_deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = adapter_events.recv() => match event {
                    Some(event) => self.handle_adapter_event(event),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.handle_connect_timeout();
                }
            }
        }
        debug!("channel closed, printer service loop exiting");
    }

    pub fn handle_command(&mut self, command: PrinterCommand) {
        match command {
            PrinterCommand::StartScan => {
                if let Err(err) = self.start_scan() {
                    self.emit(PrinterEvent::Error(err));
                }
            }
            PrinterCommand::StopScan => self.stop_scan(),
            PrinterCommand::Connect { printer, done } => self.connect(&printer, done),
            PrinterCommand::Disconnect(printer) => self.disconnect(&printer),
            PrinterCommand::DisconnectAll => self.disconnect_all(),
            PrinterCommand::Print { data, done } => self.print(data, done),
        }
    }

    /// Begin discovery restricted to the configured services. Idempotent
    /// while a scan is running.
    pub fn start_scan(&mut self) -> Result<(), PrinterError> {
        if self.adapter.state() != AdapterState::PoweredOn {
            return Err(PrinterError::DeviceNotReady);
        }
        if self.scanning {
            return Ok(());
        }
        info!("starting printer scan");
        self.adapter.start_scan(&self.config.service_uuids);
        self.scanning = true;
        Ok(())
    }

    /// Always safe; connected printers are unaffected.
    pub fn stop_scan(&mut self) {
        if self.scanning {
            info!("stopping printer scan");
            self.adapter.stop_scan();
            self.scanning = false;
        }
    }

    /// Request a connection. Emits Update(Connecting) synchronously so
    /// observers get instantaneous feedback, then arms the connect deadline
    /// and issues the adapter connect. A request for an unknown printer is
    /// dropped; a request while another connect is pending is rejected with
    /// [`PrinterError::Busy`].
    pub fn connect(&mut self, printer: &Printer, done: oneshot::Sender<Result<(), PrinterError>>) {
        if self.pending_connect.is_some() {
            let _ = done.send(Err(PrinterError::Busy));
            return;
        }
        if self.registry.lookup(&printer.id).is_none() {
            warn!(printer = %printer.id, "connect requested for unknown printer");
            return;
        }

        info!(printer = %printer.id, "connecting");
        if let Some(change) = self.registry.set_state(&printer.id, PrinterState::Connecting) {
            self.emit_change(change);
        }
        self.pending_connect = Some(PendingConnect {
            id: printer.id,
            deadline: Instant::now() + self.config.connect_timeout(),
            done,
        });
        self.adapter.connect(&printer.id);
    }

    /// Request a disconnect. The transition to Disconnected arrives
    /// asynchronously via the adapter's disconnect event.
    pub fn disconnect(&mut self, printer: &Printer) {
        if self.registry.lookup(&printer.id).is_none() {
            warn!(printer = %printer.id, "disconnect requested for unknown printer");
            return;
        }
        info!(printer = %printer.id, "disconnecting");
        if let Some(change) = self.registry.set_state(&printer.id, PrinterState::Disconnecting) {
            self.emit_change(change);
        }
        self.adapter.cancel_connect(&printer.id);
    }

    /// Cancel every connection the adapter retains to a matching peripheral.
    pub fn disconnect_all(&mut self) {
        for id in self.adapter.connected_peripherals(&self.config.service_uuids) {
            info!(printer = %id, "disconnecting");
            if let Some(change) = self.registry.set_state(&id, PrinterState::Disconnecting) {
                self.emit_change(change);
            }
            self.adapter.cancel_connect(&id);
        }
    }

    /// Deliver a byte buffer to the writable endpoint in acknowledged,
    /// ack-paced chunks. Progress is reported on the event stream as
    /// `(sent, total)` pairs starting at `(0, total)`; completion resolves
    /// the request channel. Fails immediately with
    /// [`PrinterError::DeviceNotReady`] when no endpoint is available, and
    /// with [`PrinterError::Busy`] while another transfer is in flight.
    pub fn print(&mut self, data: Vec<u8>, done: oneshot::Sender<Result<(), PrinterError>>) {
        if self.active_print.is_some() {
            let _ = done.send(Err(PrinterError::Busy));
            return;
        }
        let endpoint = match self.session.endpoint() {
            Some(endpoint) => endpoint.clone(),
            None => {
                let _ = done.send(Err(PrinterError::DeviceNotReady));
                return;
            }
        };
        let connected = self
            .registry
            .printer(&endpoint.printer)
            .is_some_and(|p| p.state == PrinterState::Connected);
        if !connected || self.adapter.state() != AdapterState::PoweredOn {
            let _ = done.send(Err(PrinterError::DeviceNotReady));
            return;
        }

        let mut transfer = ChunkedTransfer::new(data, self.config.chunk_divisor);
        let total = transfer.total();
        info!(printer = %endpoint.printer, total, "starting print transfer");
        self.emit(PrinterEvent::PrintProgress { sent: 0, total });

        if transfer.is_complete() {
            let _ = done.send(Ok(()));
            return;
        }
        if let Some(chunk) = transfer.next_chunk() {
            self.adapter.write(
                &endpoint.printer,
                &endpoint.characteristic,
                chunk,
                WriteMode::WithResponse,
            );
        }
        self.active_print = Some(ActivePrint {
            endpoint,
            transfer,
            done,
        });
    }

    pub fn handle_adapter_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::StateChanged(state) => self.on_adapter_state(state),
            AdapterEvent::Discovered(peripheral) => {
                let change = self.registry.on_discovered(peripheral);
                self.emit_change(change);
            }
            AdapterEvent::Lost(id) => {
                if let Some(change) = self.registry.on_lost(&id) {
                    self.emit_change(change);
                }
            }
            AdapterEvent::Connected(id) => {
                let services = self.session.on_connected(&id);
                self.adapter.discover_services(&id, &services);
            }
            AdapterEvent::ConnectFailed { id, reason } => self.on_connect_failed(id, reason),
            AdapterEvent::Disconnected { id, error } => self.on_disconnected(id, error),
            AdapterEvent::ServicesDiscovered { id, services } => {
                for service in self.session.on_services_discovered(&id, &services) {
                    self.adapter.discover_characteristics(&id, service);
                }
            }
            AdapterEvent::CharacteristicsDiscovered {
                id, characteristics, ..
            } => {
                let ready = self
                    .session
                    .on_characteristics_discovered(id, characteristics)
                    .cloned();
                if let Some(endpoint) = ready {
                    self.on_endpoint_ready(endpoint);
                }
            }
            AdapterEvent::WriteAcknowledged { id, error } => self.on_write_acknowledged(id, error),
        }
    }

    /// Recovery for connect attempts that never receive a hardware
    /// completion: force the printer back to Disconnected and cancel the
    /// underlying connection.
    pub fn handle_connect_timeout(&mut self) {
        let Some(pending) = self.pending_connect.take() else {
            return;
        };
        warn!(printer = %pending.id, "connect attempt timed out");
        if self.registry.lookup(&pending.id).is_some() {
            if let Some(change) = self.registry.set_state(&pending.id, PrinterState::Disconnected)
            {
                self.emit_change(change);
            }
            self.adapter.cancel_connect(&pending.id);
        }
        let _ = pending
            .done
            .send(Err(PrinterError::ConnectFailed("connect attempt timed out".into())));
    }

    /// Deadline of the pending connect attempt, if one is armed.
    pub fn connect_deadline(&self) -> Option<Instant> {
        self.pending_connect.as_ref().map(|p| p.deadline)
    }

    pub fn nearby_printers(&self) -> Vec<Printer> {
        self.registry.printers()
    }

    pub fn can_print(&self) -> bool {
        self.session.endpoint().is_some()
    }

    pub fn is_available(&self) -> bool {
        self.adapter.state() == AdapterState::PoweredOn
    }

    pub fn is_permitted(&self) -> bool {
        self.adapter.state() != AdapterState::Unauthorized
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    fn on_adapter_state(&mut self, state: AdapterState) {
        info!(?state, "adapter state changed");
        if state == AdapterState::PoweredOn {
            return;
        }
        // Radio gone: scans and connections do not survive.
        self.scanning = false;
        self.session.clear_all();
        if let Some(pending) = self.pending_connect.take() {
            let _ = pending.done.send(Err(PrinterError::DeviceNotReady));
        }
        if let Some(print) = self.active_print.take() {
            let _ = print.done.send(Err(PrinterError::DeviceNotReady));
        }
    }

    fn on_endpoint_ready(&mut self, endpoint: WritableEndpoint) {
        let id = endpoint.printer;
        // The deadline is cleared before the success update goes out, so a
        // timeout-driven Disconnected can never follow a Connected for the
        // same attempt.
        let pending = if self.pending_connect.as_ref().is_some_and(|p| p.id == id) {
            self.pending_connect.take()
        } else {
            None
        };
        if let Some(change) = self.registry.set_state(&id, PrinterState::Connected) {
            self.emit_change(change);
        }
        info!(printer = %id, "printer connected and ready");
        if let Some(pending) = pending {
            let _ = pending.done.send(Ok(()));
        }
    }

    fn on_connect_failed(&mut self, id: PrinterId, reason: String) {
        error!(printer = %id, %reason, "connect failed");
        let err = PrinterError::ConnectFailed(reason);
        self.emit(PrinterEvent::Error(err.clone()));
        if self.pending_connect.as_ref().is_some_and(|p| p.id == id) {
            if let Some(pending) = self.pending_connect.take() {
                let _ = pending.done.send(Err(err));
            }
        }
    }

    /// Solicited and unsolicited disconnects take the same path: reflect
    /// the adapter's state and invalidate the writable endpoint.
    fn on_disconnected(&mut self, id: PrinterId, error: Option<String>) {
        match &error {
            Some(reason) => warn!(printer = %id, %reason, "printer disconnected with error"),
            None => info!(printer = %id, "printer disconnected"),
        }
        if self.session.clear(&id) {
            debug!(printer = %id, "writable endpoint invalidated");
        }
        if let Some(change) = self.registry.set_state(&id, PrinterState::Disconnected) {
            self.emit_change(change);
        }
        if self.pending_connect.as_ref().is_some_and(|p| p.id == id) {
            if let Some(pending) = self.pending_connect.take() {
                let _ = pending
                    .done
                    .send(Err(PrinterError::ConnectFailed("disconnected".into())));
            }
        }
        if self
            .active_print
            .as_ref()
            .is_some_and(|p| p.endpoint.printer == id)
        {
            if let Some(print) = self.active_print.take() {
                let _ = print.done.send(Err(PrinterError::ConnectFailed(
                    "disconnected during transfer".into(),
                )));
            }
        }
    }

    fn on_write_acknowledged(&mut self, id: PrinterId, error: Option<String>) {
        let Some(mut print) = self.active_print.take() else {
            debug!(printer = %id, "write acknowledgment with no transfer in flight");
            return;
        };
        if print.endpoint.printer != id {
            self.active_print = Some(print);
            return;
        }

        if let Some(reason) = error {
            error!(printer = %id, %reason, "acknowledged write failed, aborting transfer");
            let err = PrinterError::ConnectFailed(reason);
            self.emit(PrinterEvent::Error(err.clone()));
            let _ = print.done.send(Err(err));
            return;
        }

        let sent = print.transfer.sent();
        let total = print.transfer.total();
        self.emit(PrinterEvent::PrintProgress { sent, total });

        if print.transfer.is_complete() {
            info!(printer = %id, total, "print transfer complete");
            let _ = print.done.send(Ok(()));
            return;
        }
        if let Some(chunk) = print.transfer.next_chunk() {
            self.adapter.write(
                &print.endpoint.printer,
                &print.endpoint.characteristic,
                chunk,
                WriteMode::WithResponse,
            );
        }
        self.active_print = Some(print);
    }

    fn emit(&self, event: PrinterEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_change(&self, change: NearbyPrinterChange) {
        self.emit(PrinterEvent::Change(change));
    }
}
