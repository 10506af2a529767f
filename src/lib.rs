use std::env;
use std::str::FromStr;
use log::LevelFilter;
use crate::gui::application::run_application;
use crate::error::AppRunError;

pub mod config;
pub mod device;
pub mod error;
pub mod gui;

fn log_level() -> LevelFilter {
    match env::var("LOG_LEVEL") {
        Ok(level) => LevelFilter::from_str(&level).unwrap_or_else(|_| {
            eprintln!("Ignoring invalid LOG_LEVEL {:?}", level);
            LevelFilter::Info
        }),
        Err(_) => LevelFilter::Info,
    }
}

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log_level())
        // btleplug is chatty on debug
        .level_for("btleplug", LevelFilter::Warn)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        match fern::log_file(&log_file) {
            Ok(file) => dispatch = dispatch.chain(file),
            Err(err) => eprintln!("Failed to open LOG_FILE {}: {}", log_file, err),
        }
    }

    if let Err(err) = dispatch.apply() {
        eprintln!("Failed to initialize logger: {}", err);
    }
}

pub fn run() -> Result<(), AppRunError> {
    run_application()?;
    Ok(())
}
