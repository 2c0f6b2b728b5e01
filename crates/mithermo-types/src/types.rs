//! Core types for thermometer data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Latest values reported by a thermometer.
///
/// Every field is last-value-wins; no history is kept. Which fields are
/// populated depends on the source: the ATC1441 advertisement only carries
/// the 0.1 °C temperature while PVVX and BTHome only carry the precise one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurements {
    /// Temperature in °C at 0.1 resolution.
    pub temperature: f32,
    /// Temperature in °C at 0.01 resolution.
    pub temperature_precise: f32,
    /// Relative humidity in % at 0.01 resolution.
    pub humidity: f32,
    /// Battery level in percent.
    pub battery_level: u8,
    /// Battery voltage in millivolts.
    pub battery_mv: u16,
}

/// Bluetooth MAC address of a thermometer.
///
/// Stored as its six bytes: the text it was parsed from is not kept, and
/// it always renders as uppercase colon-separated hex. Comparison against
/// strings is case-insensitive.
///
/// # Examples
///
/// ```
/// use mithermo_types::DeviceAddress;
///
/// let addr: DeviceAddress = "a4:c1:38:0a:1b:2c".parse().unwrap();
/// assert_eq!(addr.to_string(), "A4:C1:38:0A:1B:2C");
/// assert!(addr.matches("A4:c1:38:0A:1b:2C"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct DeviceAddress([u8; 6]);

impl DeviceAddress {
    /// Build an address from its six bytes, most significant first.
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// The six address bytes.
    #[must_use]
    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Case-insensitive comparison with a textual address.
    ///
    /// Both sides must have the same length, so `"A4C1380A1B2C"` does not match.
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        let own = self.to_string();
        own.len() == other.len() && own.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for DeviceAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split(':');

        for byte in &mut bytes {
            let part = parts
                .next()
                .ok_or_else(|| ParseError::InvalidValue(format!("address '{s}' is too short")))?;
            if part.len() != 2 {
                return Err(ParseError::InvalidValue(format!(
                    "address '{s}' has a malformed octet '{part}'"
                )));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| {
                ParseError::InvalidValue(format!("address '{s}' has a non-hex octet '{part}'"))
            })?;
        }

        if parts.next().is_some() {
            return Err(ParseError::InvalidValue(format!(
                "address '{s}' is too long"
            )));
        }

        Ok(Self(bytes))
    }
}

impl TryFrom<String> for DeviceAddress {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceAddress> for String {
    fn from(addr: DeviceAddress) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: DeviceAddress = "a4:c1:38:aa:bb:0c".parse().unwrap();
        assert_eq!(addr.bytes(), [0xA4, 0xC1, 0x38, 0xAA, 0xBB, 0x0C]);
        assert_eq!(addr.to_string(), "A4:C1:38:AA:BB:0C");
    }

    #[test]
    fn test_parsed_text_is_not_kept() {
        let lower: DeviceAddress = "a4:c1:38:aa:bb:0c".parse().unwrap();
        let upper: DeviceAddress = "A4:C1:38:AA:BB:0C".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), upper.to_string());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert!(" A4:C1:38:AA:BB:0C\n".parse::<DeviceAddress>().is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "A4:C1:38:AA:BB",
            "A4:C1:38:AA:BB:0C:11",
            "A4C138AABB0C",
            "A4:C1:38:AA:BB:0",
            "A4:C1:38:AA:BB:ZZ",
        ] {
            assert!(bad.parse::<DeviceAddress>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let addr = DeviceAddress::new([0xA4, 0xC1, 0x38, 0xAA, 0xBB, 0x0C]);
        assert!(addr.matches("a4:c1:38:aa:bb:0c"));
        assert!(addr.matches("A4:C1:38:AA:BB:0C"));
        assert!(!addr.matches("a4:c1:38:aa:bb:0d"));
        assert!(!addr.matches("a4:c1:38:aa:bb:0c "));
        assert!(!addr.matches("a4c138aabb0c"));
    }

    #[test]
    fn test_measurements_default_is_zeroed() {
        let m = Measurements::default();
        assert_eq!(m.temperature, 0.0);
        assert_eq!(m.battery_level, 0);
        assert_eq!(m.battery_mv, 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_address_serializes_as_string() {
        let addr = DeviceAddress::new([0xA4, 0xC1, 0x38, 0x01, 0x02, 0x03]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"A4:C1:38:01:02:03\"");
        let back: DeviceAddress = serde_json::from_str("\"a4:c1:38:01:02:03\"").unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<DeviceAddress>("\"nope\"").is_err());
    }
}
