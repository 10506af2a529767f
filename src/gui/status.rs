use crate::device::types::DeviceState;

pub fn status_text(state: &DeviceState) -> &'static str {
    match state {
        DeviceState::Initial => "",
        DeviceState::Unavailable => "Bluetooth is not available",
        DeviceState::NoPermission => "Not allowed to access Bluetooth!",
        DeviceState::Idle => "Not connected",
        DeviceState::Scanning => "Scanning...",
        DeviceState::ScanComplete => "Scan complete",
        DeviceState::Connecting => "Connecting...",
        DeviceState::Connected { .. } => "Connected",
        DeviceState::Disconnecting => "Disconnecting...",
        DeviceState::Disconnected => "Disconnected",
    }
}

pub fn connect_button_label(state: &DeviceState) -> &'static str {
    if state.is_connected() { "Disconnect" } else { "Connect" }
}

/// Relay buttons and the command input only work with a live connection.
pub fn controls_enabled(state: &DeviceState) -> bool {
    state.is_connected()
}

pub fn can_scan(state: &DeviceState) -> bool {
    !state.is_busy()
        && !state.is_connected()
        && !matches!(state, DeviceState::Unavailable | DeviceState::Initial)
}

pub fn can_connect(state: &DeviceState) -> bool {
    !matches!(state, DeviceState::Connecting | DeviceState::Disconnecting | DeviceState::Unavailable | DeviceState::Initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> DeviceState {
        DeviceState::Connected { address: "24:0A:C4:00:11:22".to_string() }
    }

    #[test]
    fn texts() {
        assert_eq!(status_text(&DeviceState::Idle), "Not connected");
        assert_eq!(status_text(&DeviceState::Scanning), "Scanning...");
        assert_eq!(status_text(&DeviceState::ScanComplete), "Scan complete");
        assert_eq!(status_text(&connected()), "Connected");
        assert_eq!(status_text(&DeviceState::Disconnected), "Disconnected");
    }

    #[test]
    fn connect_button_toggles() {
        assert_eq!(connect_button_label(&connected()), "Disconnect");
        assert_eq!(connect_button_label(&DeviceState::Disconnected), "Connect");
        assert_eq!(connect_button_label(&DeviceState::Connecting), "Connect");
    }

    #[test]
    fn controls_follow_the_connection() {
        assert!(controls_enabled(&connected()));
        for state in [DeviceState::Idle, DeviceState::Scanning, DeviceState::Connecting, DeviceState::Disconnecting, DeviceState::Disconnected] {
            assert!(!controls_enabled(&state), "{:?}", state);
        }
    }

    #[test]
    fn scanning_is_disabled_while_busy_or_connected() {
        assert!(can_scan(&DeviceState::Idle));
        assert!(can_scan(&DeviceState::ScanComplete));
        assert!(can_scan(&DeviceState::NoPermission));
        assert!(!can_scan(&DeviceState::Scanning));
        assert!(!can_scan(&connected()));
        assert!(!can_scan(&DeviceState::Unavailable));
        assert!(!can_scan(&DeviceState::Initial));
    }

    #[test]
    fn connect_is_possible_while_scanning() {
        assert!(can_connect(&DeviceState::Scanning));
        assert!(can_connect(&connected()));
        assert!(!can_connect(&DeviceState::Connecting));
        assert!(!can_connect(&DeviceState::Initial));
    }
}
