use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::device::constants::{DEFAULT_NAME_FILTER, DEFAULT_SCAN_SECONDS, MAX_SCAN_SECONDS};

pub const MAX_RELAYS: usize = 8;

/// One row of on/off buttons in the relay panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    pub label: String,
    pub on_command: String,
    pub off_command: String,
}

impl RelayConfig {
    pub fn numbered(number: usize) -> Self {
        RelayConfig {
            label: format!("Relay {}", number),
            on_command: format!("{}ON", number),
            off_command: format!("{}OFF", number),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    // address of the most recently connected device
    pub last_address: Option<String>,
    pub scan_seconds: u64,
    pub name_filter: String,
    pub relays: Vec<RelayConfig>,
}

impl Config {
    pub fn scan_duration(&self) -> Duration {
        Duration::from_secs(self.scan_seconds)
    }

    /// Repairs values that were edited by hand into something usable.
    pub fn normalize(&mut self) {
        self.scan_seconds = self.scan_seconds.clamp(1, MAX_SCAN_SECONDS);

        self.last_address = self.last_address
            .take()
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty());

        self.relays.retain(|relay| !relay.on_command.is_empty() || !relay.off_command.is_empty());
        self.relays.truncate(MAX_RELAYS);
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            last_address: None,
            scan_seconds: DEFAULT_SCAN_SECONDS,
            name_filter: DEFAULT_NAME_FILTER.to_string(),
            relays: (1..=4).map(RelayConfig::numbered).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.last_address, None);
        assert_eq!(config.scan_duration(), Duration::from_secs(10));
        assert_eq!(config.name_filter, "ESP32");
        assert_eq!(config.relays.len(), 4);
        assert_eq!(config.relays[0].on_command, "1ON");
        assert_eq!(config.relays[3].off_command, "4OFF");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{ "lastAddress": "24:0A:C4:00:11:22" }"#).unwrap();
        assert_eq!(config.last_address.as_deref(), Some("24:0A:C4:00:11:22"));
        assert_eq!(config.scan_seconds, DEFAULT_SCAN_SECONDS);
        assert_eq!(config.relays, Config::default().relays);
    }

    #[test]
    fn uses_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json.get("scanSeconds").is_some());
        assert!(json.get("nameFilter").is_some());
        assert_eq!(json["relays"][1]["onCommand"], "2ON");
    }

    #[test]
    fn normalize_repairs_hand_edits() {
        let mut config = Config {
            last_address: Some("   ".to_string()),
            scan_seconds: 0,
            name_filter: "ESP32".to_string(),
            relays: (1..=12).map(RelayConfig::numbered).collect(),
        };
        config.relays[0].on_command.clear();
        config.relays[0].off_command.clear();

        config.normalize();

        assert_eq!(config.last_address, None);
        assert_eq!(config.scan_seconds, 1);
        assert_eq!(config.relays.len(), MAX_RELAYS);
        assert_eq!(config.relays[0].label, "Relay 2");
    }

    #[test]
    fn normalize_caps_scan_duration() {
        let mut config = Config { scan_seconds: 3600, ..Config::default() };
        config.normalize();
        assert_eq!(config.scan_seconds, MAX_SCAN_SECONDS);
    }
}
