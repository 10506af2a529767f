use uuid::Uuid;

/**
 * How often (milliseconds) the connection task wakes up to advance a scan or check the
 * connection status.
 */
pub const POLL_DELAY: u64 = 250;

/**
 * How often (milliseconds) to check if the connected peripheral is still connected.
 */
pub const CONNECTION_CHECK_INTERVAL: u64 = 1000;

/**
 * How long (milliseconds) a write to a characteristic may take.
 */
pub const WRITE_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) checking if the peripheral is still connected may take
 */
pub const IS_CONNECTED_DEADLINE: u64 = 2000;

/**
 * How long (milliseconds) to scan for a peripheral with a given address before giving up on
 * connecting to it.
 */
pub const LOCATE_DEADLINE: u64 = 8000;

/**
 * How long (seconds) a scan started by the user lasts.
 */
pub const DEFAULT_SCAN_SECONDS: u64 = 10;

/**
 * Upper bound (seconds) for a single scan.
 */
pub const MAX_SCAN_SECONDS: u64 = 120;

/**
 * Only devices with a name containing this text (case-insensitive) are reported while scanning.
 */
pub const DEFAULT_NAME_FILTER: &str = "ESP32";

/**
 * The UUID of the Bluetooth BLE service exposed by the relay board firmware
 */
pub const RELAY_SERVICE: &str = "0000ffe0-0000-1000-8000-00805f9b34fb";

/**
 * The UUID of the Bluetooth BLE remote GATT characteristic to write command strings to.
 */
pub const RELAY_COMMAND_CHARACTERISTIC: &str = "0000ffe1-0000-1000-8000-00805f9b34fb";

pub const fn make_relay_service_uuid() -> Uuid {
    Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb)
}

pub const fn make_relay_command_uuid() -> Uuid {
    Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_match_their_string_form() {
        assert_eq!(make_relay_service_uuid(), Uuid::parse_str(RELAY_SERVICE).unwrap());
        assert_eq!(make_relay_command_uuid(), Uuid::parse_str(RELAY_COMMAND_CHARACTERISTIC).unwrap());
    }

    #[test]
    fn uuids_are_parsed_case_insensitively() {
        let upper = Uuid::parse_str("0000FFE1-0000-1000-8000-00805F9B34FB").unwrap();
        assert_eq!(upper, make_relay_command_uuid());
    }
}
