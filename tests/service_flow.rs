//! End-to-end flows through the printer service command loop.

use bleprint::infrastructure::bluetooth::mock::{MockAdapter, MockCommand};
use bleprint::{
    AdapterEvent, Characteristic, NearbyPrinterChange, Peripheral, Printer, PrinterCommand,
    PrinterConfig, PrinterError, PrinterEvent, PrinterId, PrinterState,
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

const SERVICE: Uuid = Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb);
const WRITE_CHAR: Uuid = Uuid::from_u128(0x00002af1_0000_1000_8000_00805f9b34fb);

struct Harness {
    commands: mpsc::UnboundedSender<PrinterCommand>,
    adapter: mpsc::UnboundedSender<AdapterEvent>,
    events: mpsc::UnboundedReceiver<PrinterEvent>,
    log: std::sync::Arc<std::sync::Mutex<Vec<MockCommand>>>,
}

fn spawn_service(config: PrinterConfig) -> Harness {
    let (adapter_tx, adapter_rx) = mpsc::unbounded_channel();
    let mock = MockAdapter::new(adapter_tx.clone());
    let log = mock.log();
    let (event_tx, events) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let service = bleprint::PrinterService::new(Box::new(mock), config, event_tx);
    tokio::spawn(service.run(command_rx, adapter_rx));

    Harness {
        commands: command_tx,
        adapter: adapter_tx,
        events,
        log,
    }
}

async fn next_event(harness: &mut Harness) -> PrinterEvent {
    tokio::time::timeout(Duration::from_secs(5), harness.events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

async fn next_change(harness: &mut Harness) -> NearbyPrinterChange {
    loop {
        if let PrinterEvent::Change(change) = next_event(harness).await {
            return change;
        }
    }
}

fn peripheral(id: PrinterId) -> Peripheral {
    Peripheral {
        id,
        name: Some("TM-P20".to_string()),
        rssi: Some(-61),
        state: PrinterState::Disconnected,
    }
}

fn write_char() -> Characteristic {
    Characteristic {
        uuid: WRITE_CHAR,
        service: SERVICE,
        writable: true,
        writable_without_response: false,
    }
}

async fn discover_printer(harness: &mut Harness) -> Printer {
    let id = PrinterId(Uuid::new_v4());
    harness
        .adapter
        .send(AdapterEvent::Discovered(peripheral(id)))
        .unwrap();
    match next_change(harness).await {
        NearbyPrinterChange::Add(printer) => printer,
        other => panic!("expected Add, got {other:?}"),
    }
}

#[tokio::test]
async fn scan_connect_print_disconnect() {
    let mut harness = spawn_service(PrinterConfig::default());

    harness.commands.send(PrinterCommand::StartScan).unwrap();
    let printer = discover_printer(&mut harness).await;

    // Connect: instantaneous Connecting feedback, then Connected once the
    // writable characteristic is found.
    let (done, connected) = oneshot::channel();
    harness
        .commands
        .send(PrinterCommand::Connect {
            printer: printer.clone(),
            done,
        })
        .unwrap();
    match next_change(&mut harness).await {
        NearbyPrinterChange::Update(p) => assert_eq!(p.state, PrinterState::Connecting),
        other => panic!("expected Connecting update, got {other:?}"),
    }

    harness
        .adapter
        .send(AdapterEvent::Connected(printer.id))
        .unwrap();
    harness
        .adapter
        .send(AdapterEvent::ServicesDiscovered {
            id: printer.id,
            services: vec![SERVICE],
        })
        .unwrap();
    harness
        .adapter
        .send(AdapterEvent::CharacteristicsDiscovered {
            id: printer.id,
            service: SERVICE,
            characteristics: vec![write_char()],
        })
        .unwrap();

    match next_change(&mut harness).await {
        NearbyPrinterChange::Update(p) => assert_eq!(p.state, PrinterState::Connected),
        other => panic!("expected Connected update, got {other:?}"),
    }
    assert_eq!(connected.await.unwrap(), Ok(()));

    // Print 1000 bytes in five acknowledged chunks.
    let (done, printed) = oneshot::channel();
    harness
        .commands
        .send(PrinterCommand::Print {
            data: vec![0x1B; 1000],
            done,
        })
        .unwrap();
    for _ in 0..5 {
        harness
            .adapter
            .send(AdapterEvent::WriteAcknowledged {
                id: printer.id,
                error: None,
            })
            .unwrap();
    }
    assert_eq!(printed.await.unwrap(), Ok(()));

    let mut progress = Vec::new();
    while let Ok(event) = harness.events.try_recv() {
        if let PrinterEvent::PrintProgress { sent, total } = event {
            progress.push((sent, total));
        }
    }
    assert_eq!(progress.first(), Some(&(0, 1000)));
    assert_eq!(progress.last(), Some(&(1000, 1000)));
    assert!(progress.windows(2).all(|w| w[0].0 <= w[1].0));

    // Disconnect: Disconnecting immediately, Disconnected on confirmation.
    harness
        .commands
        .send(PrinterCommand::Disconnect(printer.clone()))
        .unwrap();
    match next_change(&mut harness).await {
        NearbyPrinterChange::Update(p) => assert_eq!(p.state, PrinterState::Disconnecting),
        other => panic!("expected Disconnecting update, got {other:?}"),
    }
    harness
        .adapter
        .send(AdapterEvent::Disconnected {
            id: printer.id,
            error: None,
        })
        .unwrap();
    match next_change(&mut harness).await {
        NearbyPrinterChange::Update(p) => assert_eq!(p.state, PrinterState::Disconnected),
        other => panic!("expected Disconnected update, got {other:?}"),
    }
}

#[tokio::test]
async fn stalled_connect_recovers_through_the_timeout() {
    let config = PrinterConfig {
        connect_timeout_secs: 0,
        ..PrinterConfig::default()
    };
    let mut harness = spawn_service(config);
    let printer = discover_printer(&mut harness).await;

    let (done, connected) = oneshot::channel();
    harness
        .commands
        .send(PrinterCommand::Connect {
            printer: printer.clone(),
            done,
        })
        .unwrap();

    match next_change(&mut harness).await {
        NearbyPrinterChange::Update(p) => assert_eq!(p.state, PrinterState::Connecting),
        other => panic!("expected Connecting update, got {other:?}"),
    }
    // No hardware completion ever arrives; the deadline forces recovery.
    match next_change(&mut harness).await {
        NearbyPrinterChange::Update(p) => assert_eq!(p.state, PrinterState::Disconnected),
        other => panic!("expected Disconnected update, got {other:?}"),
    }
    assert!(matches!(
        connected.await,
        Ok(Err(PrinterError::ConnectFailed(_)))
    ));

    let cancels = harness
        .log
        .lock()
        .unwrap()
        .iter()
        .filter(|c| matches!(c, MockCommand::CancelConnect(_)))
        .count();
    assert_eq!(cancels, 1);
}

#[tokio::test]
async fn print_without_a_connection_is_rejected() {
    let mut harness = spawn_service(PrinterConfig::default());

    let (done, printed) = oneshot::channel();
    harness
        .commands
        .send(PrinterCommand::Print {
            data: vec![1, 2, 3],
            done,
        })
        .unwrap();

    assert_eq!(printed.await.unwrap(), Err(PrinterError::DeviceNotReady));
    assert!(harness.events.try_recv().is_err());
}
