//! Device settings frame and its codec.
//!
//! The firmware answers the `0x55` command with a 13-byte frame:
//!
//! | Byte | Content |
//! |------|---------|
//! | 0-1  | header (opcode, length) |
//! | 2    | `lp_measures`, `tx_measures`, `show_battery`, `temp_f_or_c`, `blinking_time_smile`, `comfort_smiley`, `advertising_type` (bits 1-0) |
//! | 3    | `screen_off`, `long_range`, `bt5phy`, `adv_flags`, `adv_crypto`, `smiley` (bits 2-0) |
//! | 4    | temperature offset, i8 in 0.1 °C |
//! | 5    | humidity offset, i8 in 0.1 % |
//! | 6    | advertising interval (62.5 ms steps) |
//! | 7    | measure interval (advertising intervals) |
//! | 8    | RF TX power code |
//! | 9    | connect latency (20 ms steps) |
//! | 10   | LCD update interval (50 ms steps) |
//! | 11   | hardware version id |
//! | 12   | averaging count (measure intervals) |
//!
//! Writing uses a 12-byte command that carries bytes 2-10 and 12 of the above
//! behind a `0x55 0x0A` header. The hardware version is read-only.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::rf_power::RfTxPower;

/// Length of the settings frame notified by the device.
pub const SETTINGS_FRAME_LEN: usize = 13;

/// Length of the settings write command.
pub const SETTINGS_WRITE_LEN: usize = 12;

/// Advertising interval step in milliseconds.
pub const ADVERTISING_INTERVAL_STEP_MS: f32 = 62.5;

/// Connect latency step in milliseconds.
pub const CONNECT_LATENCY_STEP_MS: u16 = 20;

/// LCD update interval step in milliseconds.
pub const LCD_UPDATE_INTERVAL_STEP_MS: u16 = 50;

/// Advertisement payload format selected on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AdvertisingType {
    /// Original ATC1441 custom format (0.1 °C, big-endian).
    #[default]
    Atc1441 = 0,
    /// PVVX custom format (0.01 °C, little-endian).
    Pvvx = 1,
    /// Stock Xiaomi MiBeacon format.
    Xiaomi = 2,
    /// BTHome v2.
    BtHome = 3,
}

impl From<u8> for AdvertisingType {
    /// Only the two low bits are significant.
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => AdvertisingType::Atc1441,
            1 => AdvertisingType::Pvvx,
            2 => AdvertisingType::Xiaomi,
            _ => AdvertisingType::BtHome,
        }
    }
}

impl fmt::Display for AdvertisingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdvertisingType::Atc1441 => "ATC1441",
            AdvertisingType::Pvvx => "PVVX",
            AdvertisingType::Xiaomi => "Xiaomi",
            AdvertisingType::BtHome => "BTHome",
        };
        f.write_str(name)
    }
}

/// Smiley shown on the LCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Smiley {
    #[default]
    Off = 0,
    Happy = 1,
    Sad = 2,
    Ooo = 3,
    POff = 4,
    PHappy = 5,
    PSad = 6,
    POoo = 7,
}

impl From<u8> for Smiley {
    /// Only the three low bits are significant.
    fn from(value: u8) -> Self {
        match value & 0x07 {
            0 => Smiley::Off,
            1 => Smiley::Happy,
            2 => Smiley::Sad,
            3 => Smiley::Ooo,
            4 => Smiley::POff,
            5 => Smiley::PHappy,
            6 => Smiley::PSad,
            _ => Smiley::POoo,
        }
    }
}

/// Hardware revision reported by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HwVersion {
    #[default]
    Lywsd03mmcB14,
    MhoC401,
    Cgg1,
    Lywsd03mmcB19,
    Lywsd03mmcB16,
    Lywsd03mmcB17,
    Cgdk2,
    Cgg1_2022,
    MhoC401_2022,
    Mjwsd05mmc,
    Lywsd03mmcB15,
    MhoC122,
    Extended,
    Tb03f,
    Ts0201,
    Tnk01,
    Th03z,
    Zth01,
    Zth02,
    Plm1,
    /// An id this crate does not know about yet.
    Unknown(u8),
}

impl HwVersion {
    /// The raw id byte.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            HwVersion::Lywsd03mmcB14 => 0,
            HwVersion::MhoC401 => 1,
            HwVersion::Cgg1 => 2,
            HwVersion::Lywsd03mmcB19 => 3,
            HwVersion::Lywsd03mmcB16 => 4,
            HwVersion::Lywsd03mmcB17 => 5,
            HwVersion::Cgdk2 => 6,
            HwVersion::Cgg1_2022 => 7,
            HwVersion::MhoC401_2022 => 8,
            HwVersion::Mjwsd05mmc => 9,
            HwVersion::Lywsd03mmcB15 => 10,
            HwVersion::MhoC122 => 11,
            HwVersion::Extended => 15,
            HwVersion::Tb03f => 16,
            HwVersion::Ts0201 => 17,
            HwVersion::Tnk01 => 18,
            HwVersion::Th03z => 22,
            HwVersion::Zth01 => 27,
            HwVersion::Zth02 => 28,
            HwVersion::Plm1 => 29,
            HwVersion::Unknown(id) => id,
        }
    }

    /// Human readable model name.
    #[must_use]
    pub fn model(self) -> &'static str {
        match self {
            HwVersion::Lywsd03mmcB14 => "LYWSD03MMC B1.4",
            HwVersion::MhoC401 => "MHO-C401",
            HwVersion::Cgg1 => "CGG1",
            HwVersion::Lywsd03mmcB19 => "LYWSD03MMC B1.9",
            HwVersion::Lywsd03mmcB16 => "LYWSD03MMC B1.6",
            HwVersion::Lywsd03mmcB17 => "LYWSD03MMC B1.7",
            HwVersion::Cgdk2 => "CGDK2",
            HwVersion::Cgg1_2022 => "CGG1 2022",
            HwVersion::MhoC401_2022 => "MHO-C401N 2022",
            HwVersion::Mjwsd05mmc => "MJWSD05MMC",
            HwVersion::Lywsd03mmcB15 => "LYWSD03MMC B1.5",
            HwVersion::MhoC122 => "MHO-C122",
            HwVersion::Extended => "Extended",
            HwVersion::Tb03f => "TB-03F",
            HwVersion::Ts0201 => "TS0201",
            HwVersion::Tnk01 => "TNK01",
            HwVersion::Th03z => "TH03Z",
            HwVersion::Zth01 => "ZTH01",
            HwVersion::Zth02 => "ZTH02",
            HwVersion::Plm1 => "PLM1",
            HwVersion::Unknown(_) => "unknown",
        }
    }
}

impl From<u8> for HwVersion {
    fn from(value: u8) -> Self {
        match value {
            0 => HwVersion::Lywsd03mmcB14,
            1 => HwVersion::MhoC401,
            2 => HwVersion::Cgg1,
            3 => HwVersion::Lywsd03mmcB19,
            4 => HwVersion::Lywsd03mmcB16,
            5 => HwVersion::Lywsd03mmcB17,
            6 => HwVersion::Cgdk2,
            7 => HwVersion::Cgg1_2022,
            8 => HwVersion::MhoC401_2022,
            9 => HwVersion::Mjwsd05mmc,
            10 => HwVersion::Lywsd03mmcB15,
            11 => HwVersion::MhoC122,
            15 => HwVersion::Extended,
            16 => HwVersion::Tb03f,
            17 => HwVersion::Ts0201,
            18 => HwVersion::Tnk01,
            22 => HwVersion::Th03z,
            27 => HwVersion::Zth01,
            28 => HwVersion::Zth02,
            29 => HwVersion::Plm1,
            other => HwVersion::Unknown(other),
        }
    }
}

impl fmt::Display for HwVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwVersion::Unknown(id) => write!(f, "unknown ({id})"),
            known => f.write_str(known.model()),
        }
    }
}

/// Complete device configuration as stored by the firmware.
///
/// Writes are read-modify-write: fetch the current value, change one field and
/// send the whole struct back with [`DeviceSettings::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceSettings {
    /// Low-power measurement mode.
    pub lp_measures: bool,
    /// Transmit measurements over the connection.
    pub tx_measures: bool,
    /// Show battery level on the LCD.
    pub show_battery: bool,
    /// Display Fahrenheit instead of Celsius.
    pub temp_f_or_c: bool,
    pub blinking_time_smile: bool,
    pub comfort_smiley: bool,
    /// Advertisement payload format.
    pub advertising_type: AdvertisingType,
    pub smiley: Smiley,
    /// Encrypted advertisements.
    pub adv_crypto: bool,
    pub adv_flags: bool,
    /// Use BLE 5 PHY.
    pub bt5phy: bool,
    /// Coded PHY long range.
    pub long_range: bool,
    pub screen_off: bool,
    /// Temperature calibration offset in °C (0.1 resolution).
    pub temp_offset: f32,
    /// Humidity calibration offset in % (0.1 resolution).
    pub humidity_offset: f32,
    /// Factory temperature calibration. Not carried by the settings frame.
    pub temp_offset_cal: i8,
    /// Factory humidity calibration. Not carried by the settings frame.
    pub humidity_offset_cal: i8,
    /// Advertising interval in 62.5 ms steps.
    pub advertising_interval: u8,
    /// Measure interval in advertising intervals.
    pub measure_interval: u8,
    pub rf_tx_power: RfTxPower,
    /// Connect latency in 20 ms steps.
    pub connect_latency: u8,
    /// LCD refresh interval in 50 ms steps.
    pub lcd_update_interval: u8,
    /// Read-only hardware id.
    pub hw_version: HwVersion,
    /// Averaging window in measure intervals.
    pub averaging_measurements: u8,
}

impl DeviceSettings {
    /// Decode the settings frame notified by the device.
    ///
    /// Bytes 0 and 1 are the frame header and are ignored; bytes past 12 are
    /// ignored as well.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` contains fewer than
    /// [`SETTINGS_FRAME_LEN`] (13) bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use mithermo_types::{AdvertisingType, DeviceSettings};
    ///
    /// let frame = [0x55, 0x0A, 0x85, 0x00, 0xFB, 0x05, 40, 10, 169, 49, 20, 4, 0];
    /// let settings = DeviceSettings::decode(&frame).unwrap();
    /// assert!(settings.lp_measures);
    /// assert_eq!(settings.advertising_type, AdvertisingType::Pvvx);
    /// assert_eq!(settings.temp_offset, -0.5);
    /// ```
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn decode(data: &[u8]) -> ParseResult<Self> {
        if data.len() < SETTINGS_FRAME_LEN {
            return Err(ParseError::insufficient(SETTINGS_FRAME_LEN, data.len()));
        }

        let flags = data[2];
        let radio = data[3];

        Ok(Self {
            lp_measures: flags & 0x80 != 0,
            tx_measures: flags & 0x40 != 0,
            show_battery: flags & 0x20 != 0,
            temp_f_or_c: flags & 0x10 != 0,
            blinking_time_smile: flags & 0x08 != 0,
            comfort_smiley: flags & 0x04 != 0,
            advertising_type: AdvertisingType::from(flags),
            screen_off: radio & 0x80 != 0,
            long_range: radio & 0x40 != 0,
            bt5phy: radio & 0x20 != 0,
            adv_flags: radio & 0x10 != 0,
            adv_crypto: radio & 0x08 != 0,
            smiley: Smiley::from(radio),
            temp_offset: f32::from(data[4] as i8) / 10.0,
            humidity_offset: f32::from(data[5] as i8) / 10.0,
            temp_offset_cal: 0,
            humidity_offset_cal: 0,
            advertising_interval: data[6],
            measure_interval: data[7],
            rf_tx_power: RfTxPower::from_code(data[8]),
            connect_latency: data[9],
            lcd_update_interval: data[10],
            hw_version: HwVersion::from(data[11]),
            averaging_measurements: data[12],
        })
    }

    /// Encode the 12-byte settings write command.
    ///
    /// Offsets are scaled by 10, rounded and saturated to `i8`.
    #[must_use]
    pub fn encode(&self) -> [u8; SETTINGS_WRITE_LEN] {
        let flags = u8::from(self.lp_measures) << 7
            | u8::from(self.tx_measures) << 6
            | u8::from(self.show_battery) << 5
            | u8::from(self.temp_f_or_c) << 4
            | u8::from(self.blinking_time_smile) << 3
            | u8::from(self.comfort_smiley) << 2
            | self.advertising_type as u8;
        let radio = u8::from(self.screen_off) << 7
            | u8::from(self.long_range) << 6
            | u8::from(self.bt5phy) << 5
            | u8::from(self.adv_flags) << 4
            | u8::from(self.adv_crypto) << 3
            | self.smiley as u8;

        [
            0x55,
            0x0A,
            flags,
            radio,
            encode_offset(self.temp_offset),
            encode_offset(self.humidity_offset),
            self.advertising_interval,
            self.measure_interval,
            self.rf_tx_power.code(),
            self.connect_latency,
            self.lcd_update_interval,
            self.averaging_measurements,
        ]
    }

    // ==================== Derived timing ====================

    /// Advertising interval in milliseconds, truncated.
    #[must_use]
    pub fn advertising_interval_ms(&self) -> u16 {
        (f32::from(self.advertising_interval) * ADVERTISING_INTERVAL_STEP_MS) as u16
    }

    /// Measure interval in milliseconds.
    #[must_use]
    pub fn measure_interval_ms(&self) -> u32 {
        u32::from(self.measure_interval) * u32::from(self.advertising_interval_ms())
    }

    /// Connect latency in milliseconds.
    #[must_use]
    pub fn connect_latency_ms(&self) -> u16 {
        u16::from(self.connect_latency) * CONNECT_LATENCY_STEP_MS
    }

    /// LCD update interval in milliseconds.
    #[must_use]
    pub fn lcd_update_interval_ms(&self) -> u16 {
        u16::from(self.lcd_update_interval) * LCD_UPDATE_INTERVAL_STEP_MS
    }

    /// Averaging window in milliseconds.
    #[must_use]
    pub fn averaging_measurements_ms(&self) -> u32 {
        self.measure_interval_ms() * u32::from(self.averaging_measurements)
    }

    /// Averaging window in whole seconds.
    #[must_use]
    pub fn averaging_measurements_sec(&self) -> u32 {
        self.averaging_measurements_ms() / 1000
    }

    /// Output power of the configured RF code in dBm.
    #[must_use]
    pub fn rf_tx_power_dbm(&self) -> f32 {
        self.rf_tx_power.dbm()
    }

    // ==================== Millisecond setters ====================
    //
    // All conversions truncate toward zero and saturate at 255 steps.

    /// Set the advertising interval from milliseconds.
    pub fn set_advertising_interval_ms(&mut self, ms: u16) {
        self.advertising_interval = (f32::from(ms) / ADVERTISING_INTERVAL_STEP_MS) as u8;
    }

    /// Set the measure interval from milliseconds.
    ///
    /// The step is the current advertising interval, so set that first.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if the advertising interval is zero.
    pub fn set_measure_interval_ms(&mut self, ms: u32) -> ParseResult<()> {
        let step = u32::from(self.advertising_interval_ms());
        if step == 0 {
            return Err(ParseError::InvalidValue(
                "advertising interval is zero, cannot derive measure interval steps".to_string(),
            ));
        }
        self.measure_interval = saturate_steps(ms / step);
        Ok(())
    }

    /// Set the connect latency from milliseconds.
    pub fn set_connect_latency_ms(&mut self, ms: u16) {
        self.connect_latency = saturate_steps(u32::from(ms / CONNECT_LATENCY_STEP_MS));
    }

    /// Set the LCD update interval from milliseconds.
    pub fn set_lcd_update_interval_ms(&mut self, ms: u16) {
        self.lcd_update_interval = saturate_steps(u32::from(ms / LCD_UPDATE_INTERVAL_STEP_MS));
    }

    /// Set the averaging window from milliseconds.
    ///
    /// The step is the current measure interval.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if the measure interval is zero.
    pub fn set_averaging_measurements_ms(&mut self, ms: u32) -> ParseResult<()> {
        let step = self.measure_interval_ms();
        if step == 0 {
            return Err(ParseError::InvalidValue(
                "measure interval is zero, cannot derive averaging steps".to_string(),
            ));
        }
        self.averaging_measurements = saturate_steps(ms / step);
        Ok(())
    }

    /// Set the averaging window from seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if the measure interval is zero.
    pub fn set_averaging_measurements_sec(&mut self, sec: u32) -> ParseResult<()> {
        self.set_averaging_measurements_ms(sec.saturating_mul(1000))
    }

    /// Set RF power to the tabulated code closest to `dbm`.
    pub fn set_rf_tx_power_dbm(&mut self, dbm: f32) {
        self.rf_tx_power = RfTxPower::nearest(dbm);
    }
}

fn encode_offset(offset: f32) -> u8 {
    ((offset * 10.0).round() as i8) as u8
}

fn saturate_steps(steps: u32) -> u8 {
    u8::try_from(steps).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> [u8; 13] {
        [
            0x55, 0x0A, // header
            0b1010_0101, // lp, show_battery, comfort_smiley, PVVX
            0b0101_0011, // long_range, adv_flags, smiley=Ooo
            0x0F, // temp offset = 1.5
            0xF6, // humidity offset = -1.0
            40, // 2500 ms
            10, // measure interval
            169, // 0.04 dBm
            49, // 980 ms
            20, // 1000 ms
            4,  // B1.6
            8,  // averaging
        ]
    }

    #[test]
    fn test_decode_sample_frame() {
        let s = DeviceSettings::decode(&sample_frame()).unwrap();

        assert!(s.lp_measures);
        assert!(!s.tx_measures);
        assert!(s.show_battery);
        assert!(!s.temp_f_or_c);
        assert!(!s.blinking_time_smile);
        assert!(s.comfort_smiley);
        assert_eq!(s.advertising_type, AdvertisingType::Pvvx);

        assert!(!s.screen_off);
        assert!(s.long_range);
        assert!(!s.bt5phy);
        assert!(s.adv_flags);
        assert!(!s.adv_crypto);
        assert_eq!(s.smiley, Smiley::Ooo);

        assert!((s.temp_offset - 1.5).abs() < f32::EPSILON);
        assert!((s.humidity_offset + 1.0).abs() < f32::EPSILON);
        assert_eq!(s.advertising_interval, 40);
        assert_eq!(s.measure_interval, 10);
        assert_eq!(s.rf_tx_power.code(), 169);
        assert_eq!(s.connect_latency, 49);
        assert_eq!(s.lcd_update_interval, 20);
        assert_eq!(s.hw_version, HwVersion::Lywsd03mmcB16);
        assert_eq!(s.averaging_measurements, 8);
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let err = DeviceSettings::decode(&sample_frame()[..12]).unwrap_err();
        assert_eq!(err, ParseError::insufficient(13, 12));
        assert!(err.to_string().contains("requires 13 bytes"));

        assert!(DeviceSettings::decode(&[]).is_err());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut long = sample_frame().to_vec();
        long.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(
            DeviceSettings::decode(&long).unwrap(),
            DeviceSettings::decode(&sample_frame()).unwrap()
        );
    }

    #[test]
    fn test_encode_layout() {
        let s = DeviceSettings::decode(&sample_frame()).unwrap();
        let out = s.encode();
        assert_eq!(
            out,
            [0x55, 0x0A, 0b1010_0101, 0b0101_0011, 0x0F, 0xF6, 40, 10, 169, 49, 20, 8]
        );
    }

    #[test]
    fn test_encode_drops_hw_version_and_calibration() {
        let mut s = DeviceSettings::decode(&sample_frame()).unwrap();
        s.hw_version = HwVersion::Plm1;
        s.temp_offset_cal = 12;
        s.humidity_offset_cal = -7;
        let before = DeviceSettings::decode(&sample_frame()).unwrap().encode();
        assert_eq!(s.encode(), before);
    }

    #[test]
    fn test_offset_saturates() {
        let s = DeviceSettings {
            temp_offset: 50.0,
            humidity_offset: -50.0,
            ..Default::default()
        };
        let out = s.encode();
        assert_eq!(out[4] as i8, i8::MAX);
        assert_eq!(out[5] as i8, i8::MIN);
    }

    #[test]
    fn test_hw_version_unknown_is_preserved() {
        assert_eq!(HwVersion::from(12), HwVersion::Unknown(12));
        assert_eq!(HwVersion::from(12).id(), 12);
        assert_eq!(HwVersion::from(29), HwVersion::Plm1);
        assert_eq!(HwVersion::Plm1.id(), 29);
        assert_eq!(HwVersion::Unknown(200).to_string(), "unknown (200)");
        assert_eq!(HwVersion::MhoC401_2022.to_string(), "MHO-C401N 2022");
    }

    #[test]
    fn test_timing_conversions() {
        let s = DeviceSettings::decode(&sample_frame()).unwrap();
        assert_eq!(s.advertising_interval_ms(), 2500);
        assert_eq!(s.measure_interval_ms(), 25_000);
        assert_eq!(s.connect_latency_ms(), 980);
        assert_eq!(s.lcd_update_interval_ms(), 1000);
        assert_eq!(s.averaging_measurements_ms(), 200_000);
        assert_eq!(s.averaging_measurements_sec(), 200);
    }

    #[test]
    fn test_advertising_ms_truncates() {
        let s = DeviceSettings {
            advertising_interval: 5,
            ..Default::default()
        };
        // 5 * 62.5 = 312.5
        assert_eq!(s.advertising_interval_ms(), 312);
    }

    #[test]
    fn test_setters_truncate() {
        let mut s = DeviceSettings::decode(&sample_frame()).unwrap();

        s.set_advertising_interval_ms(1000);
        assert_eq!(s.advertising_interval, 16);

        // 16 * 62.5 = 1000 ms per step
        s.set_measure_interval_ms(10_999).unwrap();
        assert_eq!(s.measure_interval, 10);

        s.set_connect_latency_ms(59);
        assert_eq!(s.connect_latency, 2);

        s.set_lcd_update_interval_ms(149);
        assert_eq!(s.lcd_update_interval, 2);

        // measure interval is now 10_000 ms
        s.set_averaging_measurements_ms(35_000).unwrap();
        assert_eq!(s.averaging_measurements, 3);

        s.set_averaging_measurements_sec(60).unwrap();
        assert_eq!(s.averaging_measurements, 6);
    }

    #[test]
    fn test_setters_saturate() {
        let mut s = DeviceSettings {
            advertising_interval: 1,
            measure_interval: 1,
            ..Default::default()
        };
        s.set_measure_interval_ms(1_000_000).unwrap();
        assert_eq!(s.measure_interval, u8::MAX);
        s.set_advertising_interval_ms(u16::MAX);
        assert_eq!(s.advertising_interval, u8::MAX);
    }

    #[test]
    fn test_zero_divisor_is_rejected() {
        let mut s = DeviceSettings::default();
        assert!(s.set_measure_interval_ms(1000).is_err());
        assert!(s.set_averaging_measurements_ms(1000).is_err());
        assert_eq!(s.measure_interval, 0);
        assert_eq!(s.averaging_measurements, 0);
    }

    #[test]
    fn test_rf_power_by_dbm() {
        let mut s = DeviceSettings::default();
        s.set_rf_tx_power_dbm(10.0);
        assert_eq!(s.rf_tx_power.code(), 58);
        assert!((s.rf_tx_power_dbm() - 10.01).abs() < f32::EPSILON);
    }

    #[test]
    fn test_enum_masks() {
        assert_eq!(AdvertisingType::from(0xFF), AdvertisingType::BtHome);
        assert_eq!(AdvertisingType::from(0x02), AdvertisingType::Xiaomi);
        assert_eq!(Smiley::from(0xF8), Smiley::Off);
        assert_eq!(Smiley::from(0x07), Smiley::POoo);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_settings_serialization() {
        let s = DeviceSettings::decode(&sample_frame()).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"advertising_type\":\"Pvvx\""));
        assert!(json.contains("\"rf_tx_power\":169"));
        let back: DeviceSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
