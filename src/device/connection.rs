use std::convert::Infallible;
use std::future::Future;
use btleplug::api::{BDAddr, Characteristic, Manager as _, Peripheral as _};
use btleplug::platform::{Manager, Peripheral};
use futures::channel::mpsc::{channel, Sender};
use futures::{SinkExt, StreamExt};
use iced::subscription::{self, Subscription};
use log::{debug, info, warn};
use tokio::time::{sleep, timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::device::address::parse_address;
use crate::device::command::{send_command, RelayLink};
use crate::device::constants::{
    make_relay_command_uuid, make_relay_service_uuid, CONNECTION_CHECK_INTERVAL,
    IS_CONNECTED_DEADLINE, LOCATE_DEADLINE, POLL_DELAY,
};
use crate::device::scan::{find_peripheral, start_scanning, stop_scanning, ScanSession};
use crate::device::types::{DeviceCommand, DeviceEvent, DeviceHandle, DeviceState};
use crate::error::DeviceError;

/// Finds the peripheral with the given address, scanning for it if the adapters have not seen it yet.
pub async fn locate_peripheral(manager: &Manager, address: BDAddr) -> Result<Peripheral, DeviceError> {
    let adapters = manager.adapters().await?;
    if let Some(peripheral) = find_peripheral(&adapters, address).await {
        return Ok(peripheral);
    }

    info!("Device {} not seen yet, scanning for it...", address);
    let adapters = start_scanning(manager).await?;
    let deadline = Instant::now() + Duration::from_millis(LOCATE_DEADLINE);

    while Instant::now() < deadline {
        sleep(Duration::from_millis(POLL_DELAY)).await;

        if let Some(peripheral) = find_peripheral(&adapters, address).await {
            stop_scanning(&adapters).await;
            return Ok(peripheral);
        }
    }

    stop_scanning(&adapters).await;
    Err(DeviceError::PeripheralNotFound { address: address.to_string() })
}

async fn resolve_command_characteristic(peripheral: &Peripheral) -> Result<Characteristic, DeviceError> {
    let relay_service_uuid = make_relay_service_uuid();
    let relay_command_uuid = make_relay_command_uuid();

    info!("Connected; Discovering services...");
    peripheral.discover_services().await?;

    for service in peripheral.services() {
        if service.uuid != relay_service_uuid {
            continue;
        }

        for characteristic in &service.characteristics {
            if characteristic.uuid == relay_command_uuid {
                info!("Using characteristic {:?} {:?}", service.uuid, characteristic.uuid);
                return Ok(characteristic.clone());
            }
        }
    }

    Err(DeviceError::MissingCharacteristic)
}

// the OS keeps the link up after a failed setup unless told otherwise
async fn disconnect_on_error<T, F, Fut>(result: Result<T, DeviceError>, disconnect: F) -> Result<T, DeviceError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), btleplug::Error>>,
{
    if result.is_err() {
        if let Err(err) = disconnect().await {
            warn!("Failed to disconnect after setup failed: {:?}", err);
        }
    }
    result
}

async fn connect_peripheral(peripheral: &Peripheral) -> Result<Characteristic, DeviceError> {
    info!("Connecting to peripheral...");
    peripheral.connect().await?;

    let result = resolve_command_characteristic(peripheral).await;
    disconnect_on_error(result, || peripheral.disconnect()).await
}

/// Connects to the relay board at `address` (as typed by the user) and resolves its command characteristic.
pub async fn open_link(manager: &Manager, address: &str) -> Result<RelayLink, DeviceError> {
    let address = parse_address(address)?;
    let peripheral = locate_peripheral(manager, address).await?;
    let characteristic = connect_peripheral(&peripheral).await?;

    info!("Peripheral {} ready", address);
    Ok(RelayLink { peripheral, characteristic, address })
}

pub async fn close_link(link: &RelayLink) {
    info!("Disconnecting from {}", link.address);
    if let Err(err) = link.peripheral.disconnect().await {
        warn!("Failed to disconnect: {:?}", err);
    }
}

struct ConnectionWorker {
    manager: Option<Manager>,
    events: Sender<DeviceEvent>,
    scan: Option<ScanSession>,
    link: Option<RelayLink>,
    last_connection_check: Instant,
    previous_state: Option<DeviceState>,
}

impl ConnectionWorker {
    async fn emit(&mut self, event: DeviceEvent) {
        if let Err(err) = self.events.send(event).await {
            warn!("Failed to send DeviceEvent: {}", err);
        }
    }

    async fn set_state(&mut self, state: DeviceState) {
        if self.previous_state.as_ref() == Some(&state) {
            return;
        }

        debug!("Device state {:?}", state);
        self.previous_state = Some(state.clone());
        self.emit(DeviceEvent::StateChange(state)).await;
    }

    async fn report(&mut self, err: DeviceError) {
        warn!("{:?}", err);

        if err.is_permission_denied() {
            self.set_state(DeviceState::NoPermission).await;
        }
        self.emit(DeviceEvent::Error(err.to_string())).await;
    }

    /// Reports `err` and moves to `fallback`, unless the failure was a permission problem, in
    /// which case the state stays `NoPermission`.
    async fn fail(&mut self, err: DeviceError, fallback: DeviceState) {
        let no_permission = err.is_permission_denied();
        self.report(err).await;
        if !no_permission {
            self.set_state(fallback).await;
        }
    }

    async fn available_manager(&mut self) -> Option<Manager> {
        if self.manager.is_none() {
            self.emit(DeviceEvent::Error("Bluetooth is not available".to_string())).await;
        }
        self.manager.clone()
    }

    async fn handle(&mut self, command: DeviceCommand) {
        match command {
            DeviceCommand::StartScan { duration, name_filter } => {
                let Some(manager) = self.available_manager().await else {
                    return;
                };
                if self.scan.is_some() {
                    debug!("Already scanning");
                    return;
                }
                if self.link.is_some() {
                    self.report(DeviceError::AlreadyConnected).await;
                    return;
                }

                match ScanSession::start(&manager, duration, name_filter).await {
                    Ok(session) => {
                        self.scan = Some(session);
                        self.set_state(DeviceState::Scanning).await;
                    },
                    Err(err) => {
                        self.fail(err, DeviceState::Idle).await;
                    },
                }
            },
            DeviceCommand::Connect { address } => {
                if self.link.is_some() {
                    self.disconnect().await;
                    return;
                }

                let Some(manager) = self.available_manager().await else {
                    return;
                };

                if let Some(scan) = self.scan.take() {
                    info!("Stopping scan before connecting");
                    scan.stop().await;
                }

                self.set_state(DeviceState::Connecting).await;
                match open_link(&manager, &address).await {
                    Ok(link) => {
                        let address = link.address.to_string();
                        self.link = Some(link);
                        self.last_connection_check = Instant::now();
                        self.set_state(DeviceState::Connected { address }).await;
                    },
                    Err(err) => {
                        self.fail(err, DeviceState::Disconnected).await;
                    },
                }
            },
            DeviceCommand::Disconnect => {
                self.disconnect().await;
            },
            DeviceCommand::Send { command } => {
                let Some(link) = self.link.clone() else {
                    self.report(DeviceError::NotConnected).await;
                    return;
                };

                match send_command(&link, &command).await {
                    Ok(()) => self.emit(DeviceEvent::CommandSent(command)).await,
                    Err(err) => self.report(err).await,
                }
            },
        }
    }

    async fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            self.set_state(DeviceState::Disconnecting).await;
            close_link(&link).await;
            self.set_state(DeviceState::Disconnected).await;
        }
    }

    async fn check_connection(&mut self) {
        let connected = match &self.link {
            None => return,
            Some(link) => {
                if self.last_connection_check.elapsed() < Duration::from_millis(CONNECTION_CHECK_INTERVAL) {
                    return;
                }
                timeout(Duration::from_millis(IS_CONNECTED_DEADLINE), link.peripheral.is_connected()).await
            },
        };
        self.last_connection_check = Instant::now();

        let lost = match connected {
            Err(_) => {
                warn!("Checking for connection status took too long");
                true
            },
            Ok(Err(err)) => {
                warn!("Error checking for connection state: {:?}", err);
                true
            },
            Ok(Ok(false)) => {
                warn!("Connection lost");
                true
            },
            Ok(Ok(true)) => false,
        };

        if lost {
            self.link = None;
            self.set_state(DeviceState::Disconnected).await;
        }
    }

    async fn tick(&mut self) {
        let (found, expired) = match self.scan.as_mut() {
            Some(scan) => (scan.poll().await, scan.is_expired()),
            None => (Vec::new(), false),
        };

        for device in found {
            self.emit(DeviceEvent::DeviceFound(device)).await;
        }

        if expired {
            if let Some(scan) = self.scan.take() {
                info!("Scan complete; {} matching devices", scan.found_count());
                scan.stop().await;
            }
            self.set_state(DeviceState::ScanComplete).await;
        }

        self.check_connection().await;
    }

    async fn shutdown(&mut self) {
        if let Some(scan) = self.scan.take() {
            scan.stop().await;
        }
        self.disconnect().await;
    }
}

async fn connection_task(cancel: CancellationToken, events: Sender<DeviceEvent>) -> Infallible {
    let (command_sender, mut commands) = channel::<DeviceCommand>(16);

    let manager = match Manager::new().await {
        Ok(manager) => Some(manager),
        Err(err) => {
            warn!("Failed to create bluetooth manager: {:?}", err);
            None
        },
    };

    let mut worker = ConnectionWorker {
        manager,
        events,
        scan: None,
        link: None,
        last_connection_check: Instant::now(),
        previous_state: None,
    };

    worker.emit(DeviceEvent::Ready(DeviceHandle::new(command_sender))).await;
    let initial_state = if worker.manager.is_some() { DeviceState::Idle } else { DeviceState::Unavailable };
    worker.set_state(initial_state).await;

    'mainloop: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break 'mainloop;
            },
            Some(command) = commands.next() => {
                worker.handle(command).await;
            },
            _ = sleep(Duration::from_millis(POLL_DELAY)) => {
                worker.tick().await;
            },
        }
    }

    info!("Connection task stopping");
    worker.shutdown().await;

    // note: subscription::channel expects the future to never resolve (Infallible)
    futures::future::pending().await
}

/// Runs the BLE connection task for the lifetime of the application. The first event is
/// `DeviceEvent::Ready`, carrying the handle used to send `DeviceCommand`s to the task.
pub fn connection_subscription(cancel: CancellationToken) -> Subscription<DeviceEvent> {
    struct Connection;

    subscription::channel(
        std::any::TypeId::of::<Connection>(),
        64,
        move |events| async move {
            connection_task(cancel, events).await
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc::Receiver;

    fn worker_without_bluetooth() -> (ConnectionWorker, Receiver<DeviceEvent>) {
        let (events, receiver) = channel::<DeviceEvent>(16);
        let worker = ConnectionWorker {
            manager: None,
            events,
            scan: None,
            link: None,
            last_connection_check: Instant::now(),
            previous_state: None,
        };
        (worker, receiver)
    }

    fn drain(receiver: &mut Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = receiver.try_next() {
            events.push(event);
        }
        events
    }

    fn states(events: &[DeviceEvent]) -> Vec<DeviceState> {
        events.iter().filter_map(|event| match event {
            DeviceEvent::StateChange(state) => Some(state.clone()),
            _ => None,
        }).collect()
    }

    fn errors(events: &[DeviceEvent]) -> Vec<String> {
        events.iter().filter_map(|event| match event {
            DeviceEvent::Error(message) => Some(message.clone()),
            _ => None,
        }).collect()
    }

    #[tokio::test]
    async fn send_without_link_reports_not_connected() {
        let (mut worker, mut receiver) = worker_without_bluetooth();

        worker.handle(DeviceCommand::Send { command: "1ON".to_string() }).await;

        let events = drain(&mut receiver);
        assert_eq!(errors(&events), vec!["Not connected".to_string()]);
        assert!(!events.iter().any(|event| matches!(event, DeviceEvent::CommandSent(_))));
    }

    #[tokio::test]
    async fn permission_failure_keeps_no_permission_state() {
        let (mut worker, mut receiver) = worker_without_bluetooth();

        worker.fail(DeviceError::from(btleplug::Error::PermissionDenied), DeviceState::Disconnected).await;

        let events = drain(&mut receiver);
        assert_eq!(states(&events), vec![DeviceState::NoPermission]);
        assert_eq!(errors(&events).len(), 1);
    }

    #[tokio::test]
    async fn other_failures_move_to_the_fallback_state() {
        let (mut worker, mut receiver) = worker_without_bluetooth();

        worker.fail(DeviceError::MissingCharacteristic, DeviceState::Disconnected).await;

        let events = drain(&mut receiver);
        assert_eq!(states(&events), vec![DeviceState::Disconnected]);
        assert_eq!(errors(&events), vec![DeviceError::MissingCharacteristic.to_string()]);
    }

    #[tokio::test]
    async fn failed_setup_disconnects() {
        let disconnected = std::cell::Cell::new(false);

        let result: Result<(), DeviceError> = disconnect_on_error(
            Err(DeviceError::MissingCharacteristic),
            || async { disconnected.set(true); Ok(()) },
        ).await;

        assert!(matches!(result, Err(DeviceError::MissingCharacteristic)));
        assert!(disconnected.get());
    }

    #[tokio::test]
    async fn failed_disconnect_keeps_the_setup_error() {
        let result: Result<(), DeviceError> = disconnect_on_error(
            Err(DeviceError::Btle { source: btleplug::Error::NotConnected }),
            || async { Err(btleplug::Error::DeviceNotFound) },
        ).await;

        assert!(matches!(result, Err(DeviceError::Btle { source: btleplug::Error::NotConnected })));
    }

    #[tokio::test]
    async fn successful_setup_stays_connected() {
        let disconnected = std::cell::Cell::new(false);

        let result = disconnect_on_error(
            Ok(7),
            || async { disconnected.set(true); Ok(()) },
        ).await;

        assert_eq!(result.unwrap(), 7);
        assert!(!disconnected.get());
    }

    #[tokio::test]
    async fn scan_and_connect_need_bluetooth() {
        let (mut worker, mut receiver) = worker_without_bluetooth();

        worker.handle(DeviceCommand::StartScan { duration: Duration::from_secs(1), name_filter: "ESP32".to_string() }).await;
        worker.handle(DeviceCommand::Connect { address: "24:0A:C4:00:11:22".to_string() }).await;

        let events = drain(&mut receiver);
        assert_eq!(errors(&events), vec!["Bluetooth is not available".to_string(); 2]);
        assert!(states(&events).is_empty());
    }

    #[tokio::test]
    async fn disconnect_without_link_does_nothing() {
        let (mut worker, mut receiver) = worker_without_bluetooth();
        worker.handle(DeviceCommand::Disconnect).await;
        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn repeated_state_is_emitted_once() {
        let (mut worker, mut receiver) = worker_without_bluetooth();

        worker.set_state(DeviceState::Idle).await;
        worker.set_state(DeviceState::Idle).await;
        worker.set_state(DeviceState::Scanning).await;

        assert_eq!(states(&drain(&mut receiver)), vec![DeviceState::Idle, DeviceState::Scanning]);
    }
}
