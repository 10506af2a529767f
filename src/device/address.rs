use std::str::FromStr;
use btleplug::api::BDAddr;

use crate::error::DeviceError;

/// Parses a user supplied device address such as `24:0A:C4:00:11:22`.
pub fn parse_address(text: &str) -> Result<BDAddr, DeviceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DeviceError::MissingAddress);
    }

    BDAddr::from_str(text).map_err(|_| DeviceError::InvalidAddress { address: text.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_separated_address() {
        let address = parse_address(" 24:0A:C4:00:11:22 ").unwrap();
        assert_eq!(address, BDAddr::from([0x24, 0x0A, 0xC4, 0x00, 0x11, 0x22]));
    }

    #[test]
    fn lowercase_address_is_equal() {
        assert_eq!(parse_address("24:0a:c4:00:11:22").unwrap(), parse_address("24:0A:C4:00:11:22").unwrap());
    }

    #[test]
    fn empty_address_asks_for_input() {
        assert!(matches!(parse_address("   "), Err(DeviceError::MissingAddress)));
    }

    #[test]
    fn garbage_is_rejected() {
        match parse_address("not-an-address") {
            Err(DeviceError::InvalidAddress { address }) => assert_eq!(address, "not-an-address"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
