use std::fmt;
use std::time::Duration;
use futures::channel::mpsc::Sender;
use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Initial,
    // the bluetooth manager could not be created
    Unavailable,
    NoPermission,
    Idle,
    Scanning,
    ScanComplete,
    Connecting,
    Connected { address: String },
    Disconnecting,
    Disconnected,
}

impl DeviceState {
    pub fn is_connected(&self) -> bool {
        matches!(self, DeviceState::Connected { .. })
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, DeviceState::Scanning | DeviceState::Connecting | DeviceState::Disconnecting)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundDevice {
    pub name: String,
    pub address: String,
}

impl FoundDevice {
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.address)
    }
}

impl fmt::Display for FoundDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    StartScan {
        duration: Duration,
        name_filter: String,
    },
    // toggles: disconnects instead if a device is already connected
    Connect {
        address: String,
    },
    Disconnect,
    Send {
        command: String,
    },
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Ready(DeviceHandle),
    StateChange(DeviceState),
    DeviceFound(FoundDevice),
    CommandSent(String),
    Error(String),
}

/// Sending side of the connection task, handed to the GUI through `DeviceEvent::Ready`.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    sender: Sender<DeviceCommand>,
}

impl DeviceHandle {
    pub fn new(sender: Sender<DeviceCommand>) -> Self {
        DeviceHandle { sender }
    }

    /// Returns false if the command could not be queued.
    pub fn request(&mut self, command: DeviceCommand) -> bool {
        match self.sender.try_send(command) {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to queue device command: {}", err);
                false
            },
        }
    }
}
