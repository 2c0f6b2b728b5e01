//! Bluetooth UUIDs used by ATC/PVVX thermometers.
//!
//! All of them are 16-bit assigned numbers expanded onto the Bluetooth base
//! UUID `0000xxxx-0000-1000-8000-00805f9b34fb`.

use uuid::{Uuid, uuid};

// --- Environmental Sensing ---

/// Environmental Sensing service (`181A`).
pub const ENVIRONMENTAL_SENSING_SERVICE: Uuid = uuid!("0000181a-0000-1000-8000-00805f9b34fb");

/// Temperature characteristic, 0.1 °C (`2A1F`).
pub const TEMPERATURE: Uuid = uuid!("00002a1f-0000-1000-8000-00805f9b34fb");

/// Temperature characteristic, 0.01 °C (`2A6E`).
pub const TEMPERATURE_PRECISE: Uuid = uuid!("00002a6e-0000-1000-8000-00805f9b34fb");

/// Humidity characteristic, 0.01 % (`2A6F`).
pub const HUMIDITY: Uuid = uuid!("00002a6f-0000-1000-8000-00805f9b34fb");

// --- Battery ---

/// Battery service (`180F`).
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

/// Battery level characteristic (`2A19`).
pub const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");

// --- Firmware command channel ---

/// Vendor command service (`1F10`).
pub const COMMAND_SERVICE: Uuid = uuid!("00001f10-0000-1000-8000-00805f9b34fb");

/// Vendor command characteristic (`1F1F`), write + notify.
pub const COMMAND: Uuid = uuid!("00001f1f-0000-1000-8000-00805f9b34fb");

// --- Advertisement service data ---

/// 16-bit Environmental Sensing UUID as it appears in PVVX service data.
pub const PVVX_SERVICE_DATA_UUID16: u16 = 0x181A;

/// 16-bit BTHome UUID as it appears in service data.
pub const BTHOME_SERVICE_DATA_UUID16: u16 = 0xFCD2;

/// BTHome service UUID (`FCD2`).
pub const BTHOME_SERVICE: Uuid = uuid!("0000fcd2-0000-1000-8000-00805f9b34fb");

/// Expand a 16-bit assigned number onto the Bluetooth base UUID.
#[must_use]
pub const fn from_u16(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_00805f9b34fb)
}

/// Extract the 16-bit assigned number if `uuid` is on the Bluetooth base UUID.
#[must_use]
pub fn to_u16(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let short = (value >> 96) as u32;
    if value & 0xFFFF_FFFF_FFFF_FFFF_FFFF_FFFF == 0x0000_1000_8000_00805f9b34fb && short <= 0xFFFF {
        Some(short as u16)
    } else {
        None
    }
}
