use std::process::ExitCode;
use std::time::Duration;
use btleplug::platform::Manager;
use btleplug::api::Manager as _;
use clap::{Parser, Subcommand};
use log::error;
use tokio::time::sleep;
use esp32_relay_control::init_logging;
use esp32_relay_control::device::command::send_command;
use esp32_relay_control::device::connection::{close_link, open_link};
use esp32_relay_control::device::constants::{DEFAULT_NAME_FILTER, DEFAULT_SCAN_SECONDS, MAX_SCAN_SECONDS, POLL_DELAY};
use esp32_relay_control::device::scan::ScanSession;
use esp32_relay_control::error::DeviceError;

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Scan for ESP32 relay boards and send them commands over Bluetooth LE", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Scan for relay boards and print each one as "name - address"
    Scan {
        /// How long to scan for, in seconds
        #[arg(long, default_value_t = DEFAULT_SCAN_SECONDS, value_parser = clap::value_parser!(u64).range(1..=MAX_SCAN_SECONDS))]
        seconds: u64,

        /// Only report devices whose name contains this text (case-insensitive)
        #[arg(long, default_value = DEFAULT_NAME_FILTER)]
        filter: String,
    },

    /// Connect to a relay board, write each command in order and disconnect
    Send {
        /// Address of the board, for example 24:0A:C4:00:11:22
        address: String,

        #[arg(required = true)]
        commands: Vec<String>,
    },
}

async fn scan(manager: &Manager, seconds: u64, filter: String) -> Result<(), DeviceError> {
    let mut session = ScanSession::start(manager, Duration::from_secs(seconds), filter).await?;

    while !session.is_expired() {
        sleep(Duration::from_millis(POLL_DELAY)).await;
        for device in session.poll().await {
            println!("{}", device);
        }
    }

    session.stop().await;
    Ok(())
}

async fn send(manager: &Manager, address: &str, commands: &[String]) -> Result<(), DeviceError> {
    let link = open_link(manager, address).await?;

    let mut result = Ok(());
    for command in commands {
        result = send_command(&link, command).await;
        if result.is_err() {
            break;
        }
        println!("Sent: {}", command);
    }

    close_link(&link).await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let manager = match Manager::new().await {
        Ok(manager) => manager,
        Err(err) => {
            error!("Bluetooth is not available: {}", err);
            return ExitCode::FAILURE;
        },
    };

    let result = match args.command {
        CliCommand::Scan { seconds, filter } => scan(&manager, seconds, filter).await,
        CliCommand::Send { address, commands } => send(&manager, &address, &commands).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn scan_defaults() {
        let args = Args::try_parse_from(["relay-control-cli", "scan"]).unwrap();
        match args.command {
            CliCommand::Scan { seconds, filter } => {
                assert_eq!(seconds, 10);
                assert_eq!(filter, "ESP32");
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn scan_seconds_are_bounded() {
        assert!(Args::try_parse_from(["relay-control-cli", "scan", "--seconds", "18446744073709551615"]).is_err());
        assert!(Args::try_parse_from(["relay-control-cli", "scan", "--seconds", "0"]).is_err());

        let args = Args::try_parse_from(["relay-control-cli", "scan", "--seconds", "120"]).unwrap();
        assert!(matches!(args.command, CliCommand::Scan { seconds: 120, .. }));
    }

    #[test]
    fn send_requires_a_command() {
        assert!(Args::try_parse_from(["relay-control-cli", "send", "24:0A:C4:00:11:22"]).is_err());

        let args = Args::try_parse_from(["relay-control-cli", "send", "24:0A:C4:00:11:22", "1ON", "2OFF"]).unwrap();
        match args.command {
            CliCommand::Send { address, commands } => {
                assert_eq!(address, "24:0A:C4:00:11:22");
                assert_eq!(commands, vec!["1ON".to_string(), "2OFF".to_string()]);
            },
            other => panic!("unexpected command {:?}", other),
        }
    }
}
