#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use log::info;
use esp32_relay_control::{init_logging, run};
use esp32_relay_control::error::{error_msgbox, AppRunError, ConfigError, APP_TITLE};
use msgbox::IconType;

// Bluetooth access on macOS requires a usage description in Info.plist. This embedded copy is
// used when launching the binary directly, instead of from an app bundle.
#[cfg(target_os = "macos")]
embed_plist::embed_info_plist!(concat!(env!("OUT_DIR"), "/Info.plist"));

fn main() -> Result<(), AppRunError> {
    init_logging();
    info!("{}", APP_TITLE);

    match run() {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            if let Err(err) = msgbox::create(APP_TITLE, "This application has already been started", IconType::Error) {
                eprintln!("Failed to create msgbox: {:?}", err);
            }
            Ok(())
        },
        Err(err) => {
            error_msgbox("Unexpected error", &err);
            Err(err)
        }
        Ok(_) => Ok(())
    }
}
