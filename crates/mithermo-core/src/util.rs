//! Helpers shared by the scanner, the dispatcher and the BLE transport.

use std::collections::HashMap;

use btleplug::api::BDAddr;
use btleplug::platform::PeripheralId;
use uuid::Uuid;

use mithermo_types::{DeviceAddress, uuids};

use crate::advertisement::AD_TYPE_SERVICE_DATA_16;

/// Address prefix shared by the supported thermometers.
pub const VENDOR_PREFIX: &str = "a4";

/// Whether `address` starts with the vendor prefix, ignoring case.
pub fn has_vendor_prefix(address: &str) -> bool {
    address
        .get(..VENDOR_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(VENDOR_PREFIX))
}

/// Convert a btleplug address.
pub fn device_address(addr: BDAddr) -> DeviceAddress {
    DeviceAddress::new(addr.into_inner())
}

/// Convert to a btleplug address.
pub fn bd_addr(address: &DeviceAddress) -> BDAddr {
    BDAddr::from(address.bytes())
}

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they wrap the
/// Bluetooth address.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{id:?}")
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Identifier used to match a peripheral against a session address.
///
/// Falls back to the peripheral ID where the stack hides the address
/// (reported as all zeros on macOS).
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

/// Rebuild raw AD structures from btleplug's decoded service data.
///
/// Each 16-bit service UUID becomes `[len, 0x16, uuid_lo, uuid_hi, data..]`.
/// The Environmental Sensing entry comes first so the ATC1441 and PVVX
/// decoders, which only look at the first structure, find it. Entries with
/// 128-bit UUIDs or data too long for one structure are skipped.
pub fn service_data_payload(service_data: &HashMap<Uuid, Vec<u8>>) -> Vec<u8> {
    let mut entries: Vec<(u16, &Vec<u8>)> = service_data
        .iter()
        .filter_map(|(uuid, data)| uuids::to_u16(uuid).map(|short| (short, data)))
        .collect();
    entries.sort_by_key(|(short, _)| {
        (
            *short != uuids::PVVX_SERVICE_DATA_UUID16,
            *short,
        )
    });

    let mut payload = Vec::new();
    for (short, data) in entries {
        // length covers the type byte, the UUID and the data
        let Ok(len) = u8::try_from(data.len() + 3) else {
            continue;
        };
        payload.push(len);
        payload.push(AD_TYPE_SERVICE_DATA_16);
        payload.extend_from_slice(&short.to_le_bytes());
        payload.extend_from_slice(data);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_prefix() {
        assert!(has_vendor_prefix("A4:C1:38:00:00:01"));
        assert!(has_vendor_prefix("a4:c1:38:00:00:01"));
        assert!(!has_vendor_prefix("B4:C1:38:00:00:01"));
        assert!(!has_vendor_prefix("a"));
        assert!(!has_vendor_prefix(""));
    }

    #[test]
    fn test_address_conversion() {
        let bd = BDAddr::from([0xA4, 0xC1, 0x38, 0x0A, 0x1B, 0x2C]);
        let address = device_address(bd);
        assert_eq!(address.to_string(), "A4:C1:38:0A:1B:2C");
        assert_eq!(bd_addr(&address), bd);
    }

    #[test]
    fn test_payload_single_entry() {
        let mut data = HashMap::new();
        data.insert(uuids::from_u16(0x181A), vec![1, 2, 3]);
        assert_eq!(
            service_data_payload(&data),
            vec![6, 0x16, 0x1A, 0x18, 1, 2, 3]
        );
    }

    #[test]
    fn test_payload_environmental_sensing_first() {
        let mut data = HashMap::new();
        data.insert(uuids::from_u16(0xFCD2), vec![0x40, 0x01, 0x50]);
        data.insert(uuids::from_u16(0x181A), vec![0xAA]);
        let payload = service_data_payload(&data);
        assert_eq!(&payload[..5], &[4, 0x16, 0x1A, 0x18, 0xAA]);
        assert_eq!(&payload[5..], &[6, 0x16, 0xD2, 0xFC, 0x40, 0x01, 0x50]);
    }

    #[test]
    fn test_payload_skips_long_uuids() {
        let mut data = HashMap::new();
        data.insert(uuids::COMMAND_SERVICE, vec![1]);
        data.insert(Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0), vec![1]);
        let payload = service_data_payload(&data);
        // the command service is a 16-bit UUID, the other one is not
        assert_eq!(payload, vec![4, 0x16, 0x10, 0x1F, 1]);
    }
}
