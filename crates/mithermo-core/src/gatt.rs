//! The GATT services and characteristics a session works with.

use std::fmt;

use bytes::Buf;
use uuid::Uuid;

use mithermo_types::{Measurements, ParseError, ParseResult, uuids};

/// Services resolved and cached by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    EnvironmentalSensing,
    Battery,
    Command,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [
        ServiceKind::EnvironmentalSensing,
        ServiceKind::Battery,
        ServiceKind::Command,
    ];

    pub fn uuid(self) -> Uuid {
        match self {
            ServiceKind::EnvironmentalSensing => uuids::ENVIRONMENTAL_SENSING_SERVICE,
            ServiceKind::Battery => uuids::BATTERY_SERVICE,
            ServiceKind::Command => uuids::COMMAND_SERVICE,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceKind::EnvironmentalSensing => "environmental sensing",
            ServiceKind::Battery => "battery",
            ServiceKind::Command => "command",
        };
        f.write_str(name)
    }
}

/// Characteristics resolved and cached by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacteristicKind {
    /// `2A1F`, 0.1 °C.
    Temperature,
    /// `2A6E`, 0.01 °C.
    TemperaturePrecise,
    /// `2A6F`, 0.01 %.
    Humidity,
    /// `2A19`, percent.
    BatteryLevel,
    /// `1F1F`, vendor command channel.
    Command,
}

impl CharacteristicKind {
    pub const ALL: [CharacteristicKind; 5] = [
        CharacteristicKind::Temperature,
        CharacteristicKind::TemperaturePrecise,
        CharacteristicKind::Humidity,
        CharacteristicKind::BatteryLevel,
        CharacteristicKind::Command,
    ];

    /// The four measurement characteristics.
    pub const DATA: [CharacteristicKind; 4] = [
        CharacteristicKind::Temperature,
        CharacteristicKind::TemperaturePrecise,
        CharacteristicKind::Humidity,
        CharacteristicKind::BatteryLevel,
    ];

    pub fn uuid(self) -> Uuid {
        match self {
            CharacteristicKind::Temperature => uuids::TEMPERATURE,
            CharacteristicKind::TemperaturePrecise => uuids::TEMPERATURE_PRECISE,
            CharacteristicKind::Humidity => uuids::HUMIDITY,
            CharacteristicKind::BatteryLevel => uuids::BATTERY_LEVEL,
            CharacteristicKind::Command => uuids::COMMAND,
        }
    }

    /// The service the characteristic lives in.
    pub fn service(self) -> ServiceKind {
        match self {
            CharacteristicKind::Temperature
            | CharacteristicKind::TemperaturePrecise
            | CharacteristicKind::Humidity => ServiceKind::EnvironmentalSensing,
            CharacteristicKind::BatteryLevel => ServiceKind::Battery,
            CharacteristicKind::Command => ServiceKind::Command,
        }
    }

    pub fn is_data(self) -> bool {
        !matches!(self, CharacteristicKind::Command)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Decode a characteristic value into `measurements`.
    ///
    /// Only the field belonging to this characteristic is touched. The
    /// command characteristic carries no measurement and is rejected.
    pub fn apply(self, value: &[u8], measurements: &mut Measurements) -> ParseResult<()> {
        let mut buf = value;
        match self {
            CharacteristicKind::Temperature => {
                require(value, 2)?;
                measurements.temperature = f32::from(buf.get_i16_le()) / 10.0;
            }
            CharacteristicKind::TemperaturePrecise => {
                require(value, 2)?;
                measurements.temperature_precise = f32::from(buf.get_i16_le()) / 100.0;
            }
            CharacteristicKind::Humidity => {
                require(value, 2)?;
                measurements.humidity = f32::from(buf.get_u16_le()) / 100.0;
            }
            CharacteristicKind::BatteryLevel => {
                require(value, 1)?;
                measurements.battery_level = buf.get_u8();
            }
            CharacteristicKind::Command => {
                return Err(ParseError::InvalidValue(
                    "command characteristic carries no measurement".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CharacteristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharacteristicKind::Temperature => "temperature",
            CharacteristicKind::TemperaturePrecise => "precise temperature",
            CharacteristicKind::Humidity => "humidity",
            CharacteristicKind::BatteryLevel => "battery level",
            CharacteristicKind::Command => "command",
        };
        f.write_str(name)
    }
}

fn require(value: &[u8], len: usize) -> ParseResult<()> {
    if value.len() < len {
        Err(ParseError::insufficient(len, value.len()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_characteristic_services() {
        assert_eq!(
            CharacteristicKind::Humidity.service().uuid(),
            uuids::ENVIRONMENTAL_SENSING_SERVICE
        );
        assert_eq!(
            CharacteristicKind::BatteryLevel.service(),
            ServiceKind::Battery
        );
        assert_eq!(CharacteristicKind::Command.service(), ServiceKind::Command);
        assert!(CharacteristicKind::DATA.iter().all(|c| c.is_data()));
        assert!(!CharacteristicKind::Command.is_data());
    }

    #[test]
    fn test_indices_are_dense() {
        for (i, kind) in CharacteristicKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        for (i, kind) in ServiceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_apply_values() {
        let mut m = Measurements::default();

        CharacteristicKind::Temperature
            .apply(&215i16.to_le_bytes(), &mut m)
            .unwrap();
        assert!((m.temperature - 21.5).abs() < 1e-4);

        CharacteristicKind::TemperaturePrecise
            .apply(&(-512i16).to_le_bytes(), &mut m)
            .unwrap();
        assert!((m.temperature_precise + 5.12).abs() < 1e-4);

        CharacteristicKind::Humidity
            .apply(&5525u16.to_le_bytes(), &mut m)
            .unwrap();
        assert!((m.humidity - 55.25).abs() < 1e-4);

        CharacteristicKind::BatteryLevel.apply(&[87], &mut m).unwrap();
        assert_eq!(m.battery_level, 87);
    }

    #[test]
    fn test_apply_short_value_leaves_field() {
        let mut m = Measurements {
            humidity: 40.0,
            ..Default::default()
        };
        let err = CharacteristicKind::Humidity.apply(&[0x01], &mut m).unwrap_err();
        assert_eq!(err, ParseError::insufficient(2, 1));
        assert_eq!(m.humidity, 40.0);

        assert!(CharacteristicKind::BatteryLevel.apply(&[], &mut m).is_err());
    }

    #[test]
    fn test_apply_command_rejected() {
        let mut m = Measurements::default();
        assert!(CharacteristicKind::Command.apply(&[0x55], &mut m).is_err());
    }
}
