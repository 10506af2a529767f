use iced::Event;

use crate::config::types::Config;
use crate::device::types::DeviceEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaySwitch {
    On,
    Off,
}

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    ApplyDirtyConfig,
    ConfigLoadComplete((Config, Option<String>)), // config + error message
    ConfigSaveComplete(Option<String>), // error message if the save failed
    DeviceEvent(DeviceEvent),
    NoticeConfirmed,
    AddressInput(String),
    DeviceSelected(String), // label of a FoundDevice
    ScanPress,
    ConnectPress,
    RelayPress(usize, RelaySwitch),
    CommandInput(String),
    CommandSubmit,
}
