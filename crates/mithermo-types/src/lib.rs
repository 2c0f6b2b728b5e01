//! Platform-agnostic types for ATC/PVVX custom-firmware BLE thermometers.
//!
//! This crate holds everything that can be expressed without a Bluetooth
//! stack, so it can be shared by the async BLE layer (mithermo-core) and by
//! tools that only handle recorded payloads.
//!
//! # Features
//!
//! - The 13-byte settings frame codec ([`DeviceSettings`])
//! - RF power code table ([`RfTxPower`])
//! - Measurement snapshot and MAC address types
//! - UUID constants for the GATT services and advertisement formats
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use mithermo_types::{DeviceSettings, AdvertisingType};
//!
//! let frame = [0x55, 0x0A, 0x03, 0x00, 0, 0, 40, 10, 169, 49, 20, 0, 4];
//! let mut settings = DeviceSettings::decode(&frame).unwrap();
//! assert_eq!(settings.advertising_type, AdvertisingType::BtHome);
//!
//! settings.show_battery = true;
//! let command = settings.encode();
//! assert_eq!(command[2], 0x23);
//! ```

pub mod error;
pub mod rf_power;
pub mod settings;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use rf_power::RfTxPower;
pub use settings::{AdvertisingType, DeviceSettings, HwVersion, Smiley};
pub use types::{DeviceAddress, Measurements};
pub use uuid as uuids;
