//! Decoders for the advertisement formats emitted by the custom firmware.
//!
//! The firmware advertises in one of three formats, selected by the
//! `advertising_type` setting:
//!
//! | Format | Layout |
//! |--------|--------|
//! | ATC1441 | fixed offsets, big-endian, 0.1 °C |
//! | PVVX | one `0x181A` service-data structure, little-endian, 0.01 °C |
//! | BTHome | `0xFCD2` service data with typed objects |
//!
//! Every decoder takes the raw advertisement payload (AD structures as sent
//! over the air) and writes into a [`Measurements`] in place. On failure the
//! fields already written in the same pass are kept, and the error says why
//! the rest was skipped. No decoder panics on any input.

use bytes::Buf;
use tracing::debug;

use mithermo_types::{AdvertisingType, Measurements, uuids};

use crate::error::{Error, Result};

/// Minimum payload length of an ATC1441 advertisement.
pub const ATC1441_MIN_LEN: usize = 18;

/// Minimum payload length of a PVVX advertisement.
pub const PVVX_MIN_LEN: usize = 19;

/// Length byte of the PVVX service-data structure.
pub const PVVX_STRUCTURE_LEN: u8 = 18;

/// Minimum payload length of a BTHome advertisement.
pub const BTHOME_MIN_LEN: usize = 6;

/// AD type "Service Data - 16-bit UUID".
pub const AD_TYPE_SERVICE_DATA_16: u8 = 0x16;

/// BTHome object ids understood by [`parse_bthome`].
pub mod bthome {
    /// Packet id, 1 byte, ignored.
    pub const PACKET_ID: u8 = 0x00;
    /// Battery level, 1 byte, percent.
    pub const BATTERY: u8 = 0x01;
    /// Temperature, i16 LE, 0.01 °C.
    pub const TEMPERATURE: u8 = 0x02;
    /// Humidity, u16 LE, 0.01 %.
    pub const HUMIDITY: u8 = 0x03;
    /// Battery voltage, u16 LE, mV.
    pub const VOLTAGE: u8 = 0x0C;
}

/// Decode `data` in the format selected by `kind`.
///
/// The Xiaomi format is encrypted and not supported.
pub fn parse_advertisement(
    kind: AdvertisingType,
    data: &[u8],
    measurements: &mut Measurements,
) -> Result<()> {
    match kind {
        AdvertisingType::Atc1441 => parse_atc1441(data, measurements),
        AdvertisingType::Pvvx => parse_pvvx(data, measurements),
        AdvertisingType::BtHome => parse_bthome(data, measurements),
        AdvertisingType::Xiaomi => Err(Error::invalid_advertisement(
            "Xiaomi",
            "format is not supported",
        )),
    }
}

/// Decode an ATC1441 advertisement.
///
/// Format:
/// - bytes 10-11: temperature (i16 BE, 0.1 °C)
/// - byte 12: humidity (%)
/// - byte 13: battery level (%)
/// - bytes 14-15: battery voltage (u16 BE, mV)
pub fn parse_atc1441(data: &[u8], measurements: &mut Measurements) -> Result<()> {
    if data.len() < ATC1441_MIN_LEN {
        return Err(Error::invalid_advertisement(
            "ATC1441",
            format!(
                "requires {} bytes, got {}",
                ATC1441_MIN_LEN,
                data.len()
            ),
        ));
    }

    let mut buf = &data[10..];
    measurements.temperature = f32::from(buf.get_i16()) * 0.1;
    measurements.humidity = f32::from(buf.get_u8());
    measurements.battery_level = buf.get_u8();
    measurements.battery_mv = buf.get_u16();
    Ok(())
}

/// Decode a PVVX advertisement.
///
/// The payload must start with the service-data structure itself:
/// `[18, 0x16, 0x1A, 0x18, mac(6), ...]`.
///
/// Format after the header:
/// - bytes 10-11: temperature (i16 LE, 0.01 °C)
/// - bytes 12-13: humidity (u16 LE, 0.01 %)
/// - bytes 14-15: battery voltage (u16 LE, mV)
/// - byte 16: battery level (%)
pub fn parse_pvvx(data: &[u8], measurements: &mut Measurements) -> Result<()> {
    if data.len() < PVVX_MIN_LEN {
        return Err(Error::invalid_advertisement(
            "PVVX",
            format!("requires {} bytes, got {}", PVVX_MIN_LEN, data.len()),
        ));
    }

    let mut header = data;
    let size = header.get_u8();
    if size != PVVX_STRUCTURE_LEN {
        return Err(Error::invalid_advertisement(
            "PVVX",
            format!("structure length {size}, expected {PVVX_STRUCTURE_LEN}"),
        ));
    }
    let ad_type = header.get_u8();
    if ad_type != AD_TYPE_SERVICE_DATA_16 {
        return Err(Error::invalid_advertisement(
            "PVVX",
            format!("AD type 0x{ad_type:02X} is not 16-bit service data"),
        ));
    }
    let uuid = header.get_u16_le();
    if uuid != uuids::PVVX_SERVICE_DATA_UUID16 {
        return Err(Error::invalid_advertisement(
            "PVVX",
            format!("service UUID 0x{uuid:04X}, expected 0x181A"),
        ));
    }

    let mut buf = &data[10..];
    measurements.temperature_precise = f32::from(buf.get_i16_le()) * 0.01;
    measurements.humidity = f32::from(buf.get_u16_le()) * 0.01;
    measurements.battery_mv = buf.get_u16_le();
    measurements.battery_level = buf.get_u8();
    Ok(())
}

/// Decode a BTHome (v2, unencrypted) advertisement.
///
/// Walks every AD structure. Service data for `0xFCD2` is decoded as
/// `[uuid_lo, uuid_hi, device_info, objects...]`; other structures are
/// skipped. An unknown object id ends the object list of that structure,
/// since its length cannot be known. A truncated object value does the same.
pub fn parse_bthome(data: &[u8], measurements: &mut Measurements) -> Result<()> {
    if data.len() < BTHOME_MIN_LEN {
        return Err(Error::invalid_advertisement(
            "BTHome",
            format!("requires {} bytes, got {}", BTHOME_MIN_LEN, data.len()),
        ));
    }

    let mut found = false;
    let mut index = 0;
    while index < data.len() {
        let length = usize::from(data[index]);
        if length == 0 {
            break;
        }
        if index + 1 + length > data.len() {
            debug!(index, length, "BTHome AD structure runs past the payload");
            break;
        }

        let ad_type = data[index + 1];
        let ad_data = &data[index + 2..index + 1 + length];
        if ad_type == AD_TYPE_SERVICE_DATA_16
            && ad_data.len() >= 3
            && u16::from_le_bytes([ad_data[0], ad_data[1]]) == uuids::BTHOME_SERVICE_DATA_UUID16
        {
            found = true;
            parse_bthome_objects(&ad_data[3..], measurements);
        }

        index += 1 + length;
    }

    if found {
        Ok(())
    } else {
        Err(Error::invalid_advertisement(
            "BTHome",
            "no 0xFCD2 service data",
        ))
    }
}

fn parse_bthome_objects(mut buf: &[u8], measurements: &mut Measurements) {
    while buf.has_remaining() {
        let id = buf.get_u8();
        let needed = match id {
            bthome::PACKET_ID | bthome::BATTERY => 1,
            bthome::TEMPERATURE | bthome::HUMIDITY | bthome::VOLTAGE => 2,
            other => {
                debug!("Unknown BTHome object id 0x{:02X}, stopping", other);
                return;
            }
        };
        if buf.remaining() < needed {
            debug!(
                "Truncated BTHome object 0x{:02X}: needs {} bytes, {} left",
                id,
                needed,
                buf.remaining()
            );
            return;
        }

        match id {
            bthome::PACKET_ID => {
                buf.advance(1);
            }
            bthome::BATTERY => measurements.battery_level = buf.get_u8(),
            bthome::TEMPERATURE => {
                measurements.temperature_precise = f32::from(buf.get_i16_le()) * 0.01;
            }
            bthome::HUMIDITY => measurements.humidity = f32::from(buf.get_u16_le()) * 0.01,
            _ => measurements.battery_mv = buf.get_u16_le(),
        }
    }
}
