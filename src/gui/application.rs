use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::executor;
use iced::time::every as iced_time_every;
use iced::theme::{self, Theme};
use iced::widget::{
    Column, button, column, container, horizontal_rule, row, text, text_input,
};
use std::time::Duration;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::{Config, RelayConfig};
use crate::device::address::parse_address;
use crate::device::connection::connection_subscription;
use crate::device::scan::address_from_label;
use crate::device::types::{DeviceCommand, DeviceEvent, DeviceHandle, DeviceState, FoundDevice};
use crate::error::{AppRunError, DeviceError, APP_TITLE};
use crate::gui::status::{can_connect, can_scan, connect_button_label, controls_enabled, status_text};
use crate::gui::style::DeviceListButtonStyle;
use crate::gui::types::{Message, RelaySwitch};

pub struct ApplicationFlags {
    config_io: ConfigIO,
}

pub struct RelayApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away
    notices: Vec<String>,

    // current config, might not be saved to disk yet
    config_io: ConfigIO,
    config: Config,
    // nothing is saved before the stored config has been read
    config_loaded: bool,
    config_dirty: bool,
    // this flag is used to make sure that a user is not spammed with save configuration errors
    displayed_config_save_error: bool,

    // None until the connection task has started
    device: Option<DeviceHandle>,
    device_state: DeviceState,
    found_devices: Vec<FoundDevice>,

    address_input: String,
    command_input: String,
}

impl RelayApplication {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.read().await {
                Ok(config) => (config, None),
                Err(err) => {
                    let mut error_message: Option<String> = None;

                    if err.is_file_not_found_error() {
                        info!("Config file not found, using defaults");
                    } else {
                        error!("Failed to load config: {:?}", &err);
                        error_message = Some(format!("Failed to load config: {}", &err));
                    }
                    (Config::default(), error_message)
                }
            }
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    fn save_config(&self) -> Command<Message> {
        let config = self.config.clone();
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.save(config).await {
                Ok(_) => None,
                Err(err) => {
                    error!("Failed to save config: {:?}", &err);
                    Some(format!("Failed to save config: {}", &err))
                },
            }
        };

        Command::perform(fut, Message::ConfigSaveComplete)
    }

    fn request(&mut self, command: DeviceCommand) {
        let queued = match self.device.as_mut() {
            Some(device) => device.request(command),
            None => false,
        };

        if !queued {
            warn!("Bluetooth task is not ready");
            self.notices.push("Bluetooth is not ready yet".to_string());
        }
    }

    fn send(&mut self, command: String) {
        if !self.device_state.is_connected() {
            self.notices.push(DeviceError::NotConnected.to_string());
            return;
        }

        self.request(DeviceCommand::Send { command });
    }

    fn relay_command(&self, index: usize, switch: RelaySwitch) -> Option<String> {
        let relay = self.config.relays.get(index)?;
        let command = match switch {
            RelaySwitch::On => &relay.on_command,
            RelaySwitch::Off => &relay.off_command,
        };
        Some(command.clone())
    }

    fn on_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Ready(handle) => {
                info!("Bluetooth task ready");
                self.device = Some(handle);
            },
            DeviceEvent::StateChange(state) => {
                if state == DeviceState::Scanning {
                    self.found_devices.clear();
                }

                if let DeviceState::Connected { address } = &state {
                    if self.config.last_address.as_ref() != Some(address) {
                        self.config.last_address = Some(address.clone());
                        self.config_dirty = true;
                    }
                }

                self.device_state = state;
            },
            DeviceEvent::DeviceFound(device) => {
                self.address_input = device.address.clone();
                self.found_devices.push(device);
            },
            DeviceEvent::CommandSent(command) => {
                self.notices.push(format!("Sent: {}", command));
            },
            DeviceEvent::Error(message) => {
                self.notices.push(message);
            },
        }
    }
}

impl Application for RelayApplication {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (RelayApplication, Command<Self::Message>) {
        let app = RelayApplication {
            app_cancel: CancellationToken::new(),
            notices: Vec::new(),
            config_io: flags.config_io,
            config: Config::default(),
            config_loaded: false,
            config_dirty: false,
            displayed_config_save_error: false,
            device: None,
            device_state: DeviceState::Initial,
            found_devices: Vec::new(),
            address_input: String::new(),
            command_input: String::new(),
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(APP_TITLE)
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::ConfigLoadComplete((mut config, error_message)) => {
                info!("Config load complete");
                // a connection made before the load finished wins over the stored address
                if self.config.last_address.is_some() {
                    config.last_address = self.config.last_address.take();
                }
                if self.address_input.is_empty() {
                    self.address_input = config.last_address.clone().unwrap_or_default();
                }
                self.config = config;
                self.config_loaded = true;
                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }
            },
            Message::ApplyDirtyConfig => {
                if self.config_loaded && self.config_dirty {
                    self.config_dirty = false;
                    return self.save_config();
                }
            },
            Message::ConfigSaveComplete(error_message) => {
                if !self.displayed_config_save_error {
                    if let Some(error_message) = error_message {
                        self.displayed_config_save_error = true;
                        self.notices.push(error_message);
                    }
                }
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                self.before_close();
                return window::close(id);
            },
            Message::DeviceEvent(event) => {
                self.on_device_event(event);
            },
            Message::AddressInput(value) => {
                self.address_input = value;
            },
            Message::DeviceSelected(label) => {
                self.address_input = address_from_label(&label).to_string();
            },
            Message::ScanPress => {
                let command = DeviceCommand::StartScan {
                    duration: self.config.scan_duration(),
                    name_filter: self.config.name_filter.clone(),
                };
                self.request(command);
            },
            Message::ConnectPress => {
                if self.device_state.is_connected() {
                    self.request(DeviceCommand::Disconnect);
                }
                else {
                    match parse_address(&self.address_input) {
                        Ok(_) => {
                            let address = self.address_input.trim().to_string();
                            self.request(DeviceCommand::Connect { address });
                        },
                        Err(err) => self.notices.push(err.to_string()),
                    }
                }
            },
            Message::RelayPress(index, switch) => {
                if let Some(command) = self.relay_command(index, switch) {
                    self.send(command);
                }
            },
            Message::CommandInput(value) => {
                self.command_input = value;
            },
            Message::CommandSubmit => {
                if !self.command_input.is_empty() {
                    self.send(self.command_input.clone());
                }
            },

            _ => {}
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            event::listen().map(Message::EventOccurred),
            iced_time_every(Duration::from_secs(1)).map(|_| Message::ApplyDirtyConfig),
            connection_subscription(self.app_cancel.clone()).map(Message::DeviceEvent),
        ])
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        let state = &self.device_state;
        let enabled = controls_enabled(state);

        let relay_row = |index: usize, relay: &RelayConfig| -> Element<Message> {
            row![
                text(&relay.label).width(120),

                button(text("On"))
                    .style(theme::Button::Positive)
                    .on_press_maybe(enabled.then_some(Message::RelayPress(index, RelaySwitch::On))),

                button(text("Off"))
                    .style(theme::Button::Destructive)
                    .on_press_maybe(enabled.then_some(Message::RelayPress(index, RelaySwitch::Off))),
            ]
            .align_items(Alignment::Center)
            .spacing(20)
            .into()
        };

        let mut address_input = text_input("Device MAC", &self.address_input);
        if can_connect(state) && !state.is_connected() {
            address_input = address_input
                .on_input(Message::AddressInput)
                .on_submit(Message::ConnectPress);
        }

        let mut command_input = text_input("Command", &self.command_input);
        if enabled {
            command_input = command_input
                .on_input(Message::CommandInput)
                .on_submit(Message::CommandSubmit);
        }

        let found_devices = Column::with_children(
            self.found_devices
                .iter()
                .map(|device| {
                    button(text(device.label()).size(14))
                        .style(theme::Button::Custom(Box::new(DeviceListButtonStyle)))
                        .on_press(Message::DeviceSelected(device.label()))
                })
                .map(Element::from)
        )
            .spacing(4);

        container(
            column![
                text(status_text(state)).size(20),

                row![
                    address_input.width(Length::Fill),

                    button(text("Scan devices"))
                        .on_press_maybe(can_scan(state).then_some(Message::ScanPress)),

                    button(text(connect_button_label(state)))
                        .style(if state.is_connected() { theme::Button::Secondary } else { theme::Button::Primary })
                        .on_press_maybe(can_connect(state).then_some(Message::ConnectPress)),
                ]
                    .align_items(Alignment::Center)
                    .spacing(10),

                found_devices,

                horizontal_rule(10),

                Column::with_children(
                    self.config.relays
                        .iter()
                        .enumerate()
                        .map(|(index, relay)| relay_row(index, relay))
                )
                    .spacing(15),

                horizontal_rule(10),

                row![
                    command_input.width(Length::Fill),

                    button(text("Send"))
                        .on_press_maybe(enabled.then_some(Message::CommandSubmit)),
                ]
                    .align_items(Alignment::Center)
                    .spacing(10),
            ]
                .spacing(20)
                .width(Length::Fill),
        )
        .width(Length::Fill)
        .padding(20)
        .into()
    }
}

pub fn run_application() -> Result<(), AppRunError> {
    let config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("esp32-relay-control".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(520.0, 640.0);

    // this function will call process::exit() unless there was a startup error
    RelayApplication::run(settings)?;
    Ok(())
}
