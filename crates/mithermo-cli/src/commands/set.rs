//! Set command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use mithermo_core::{
    AdvertisingType, ConnectionMode, DeviceSession, DeviceSettings, Smiley, Transport,
};

use crate::cli::{DeviceSetting, TemperatureUnit};
use crate::config::Config;
use crate::util::{confirm, open_session, require_device};

/// Format the setting change description for confirmation prompt.
fn describe_setting_change(setting: &DeviceSetting) -> String {
    let toggle = |name: &str, enabled: bool| {
        format!("{} {}?", if enabled { "Enable" } else { "Disable" }, name)
    };
    match setting {
        DeviceSetting::LowPower { enabled } => toggle("low power measuring", *enabled),
        DeviceSetting::TransmitMeasures { enabled } => {
            toggle("measurements in advertisements", *enabled)
        }
        DeviceSetting::ShowBattery { enabled } => toggle("battery display", *enabled),
        DeviceSetting::Unit { unit } => format!("Show temperatures in {:?}?", unit),
        DeviceSetting::BlinkingSmile { enabled } => toggle("the blinking smiley", *enabled),
        DeviceSetting::ComfortSmiley { enabled } => toggle("the comfort smiley", *enabled),
        DeviceSetting::Advertising { format } => {
            format!("Advertise in {} format?", AdvertisingType::from(*format))
        }
        DeviceSetting::Smiley { smiley } => format!("Show smiley {:?}?", Smiley::from(*smiley)),
        DeviceSetting::AdvCrypto { enabled } => toggle("advertisement encryption", *enabled),
        DeviceSetting::AdvFlags { enabled } => toggle("advertisement flags", *enabled),
        DeviceSetting::Bt5Phy { enabled } => toggle("the Bluetooth 5 PHY", *enabled),
        DeviceSetting::LongRange { enabled } => toggle("long range advertising", *enabled),
        DeviceSetting::ScreenOff { enabled } => {
            if *enabled {
                "Turn the screen off?".to_string()
            } else {
                "Turn the screen on?".to_string()
            }
        }
        DeviceSetting::TempOffset { offset } => {
            format!("Change temperature offset to {:+.1} °C?", offset)
        }
        DeviceSetting::HumidityOffset { offset } => {
            format!("Change humidity offset to {:+.1} %?", offset)
        }
        DeviceSetting::AdvertisingInterval { ms } => {
            format!("Change advertising interval to {} ms?", ms)
        }
        DeviceSetting::MeasureInterval { ms } => {
            format!("Change measurement interval to {} ms?", ms)
        }
        DeviceSetting::TxPower { dbm } => format!("Change transmit power to {:.1} dBm?", dbm),
        DeviceSetting::ConnectLatency { ms } => {
            format!("Change connection latency to {} ms?", ms)
        }
        DeviceSetting::LcdInterval { ms } => format!("Change LCD refresh to {} ms?", ms),
        DeviceSetting::Averaging { seconds } => {
            format!("Change averaging window to {} s?", seconds)
        }
    }
}

/// Apply `setting` through the matching session setter.
pub async fn apply_setting<T: Transport>(
    session: &DeviceSession<T>,
    setting: &DeviceSetting,
) -> mithermo_core::Result<DeviceSettings> {
    match *setting {
        DeviceSetting::LowPower { enabled } => session.set_low_power_measures(enabled).await,
        DeviceSetting::TransmitMeasures { enabled } => {
            session.set_transmit_measures(enabled).await
        }
        DeviceSetting::ShowBattery { enabled } => session.set_show_battery(enabled).await,
        DeviceSetting::Unit { unit } => {
            session
                .set_temp_f_or_c(unit == TemperatureUnit::Fahrenheit)
                .await
        }
        DeviceSetting::BlinkingSmile { enabled } => session.set_blinking_time_smile(enabled).await,
        DeviceSetting::ComfortSmiley { enabled } => session.set_comfort_smiley(enabled).await,
        DeviceSetting::Advertising { format } => session.set_advertising_type(format.into()).await,
        DeviceSetting::Smiley { smiley } => session.set_smiley(smiley.into()).await,
        DeviceSetting::AdvCrypto { enabled } => session.set_adv_crypto(enabled).await,
        DeviceSetting::AdvFlags { enabled } => session.set_adv_flags(enabled).await,
        DeviceSetting::Bt5Phy { enabled } => session.set_bt5phy(enabled).await,
        DeviceSetting::LongRange { enabled } => session.set_long_range(enabled).await,
        DeviceSetting::ScreenOff { enabled } => session.set_screen_off(enabled).await,
        DeviceSetting::TempOffset { offset } => session.set_temp_offset(offset).await,
        DeviceSetting::HumidityOffset { offset } => session.set_humidity_offset(offset).await,
        DeviceSetting::AdvertisingInterval { ms } => session.set_advertising_interval_ms(ms).await,
        DeviceSetting::MeasureInterval { ms } => session.set_measure_interval_ms(ms).await,
        DeviceSetting::TxPower { dbm } => session.set_rf_tx_power_dbm(dbm).await,
        DeviceSetting::ConnectLatency { ms } => session.set_connect_latency_ms(ms).await,
        DeviceSetting::LcdInterval { ms } => session.set_lcd_update_interval_ms(ms).await,
        DeviceSetting::Averaging { seconds } => {
            session.set_averaging_measurements_sec(seconds).await
        }
    }
}

/// Describe the value the device reported back for `setting`.
fn describe_result(setting: &DeviceSetting, s: &DeviceSettings) -> String {
    let on_off = |b: bool| if b { "on" } else { "off" };
    match setting {
        DeviceSetting::LowPower { .. } => format!("Low power measuring {}", on_off(s.lp_measures)),
        DeviceSetting::TransmitMeasures { .. } => {
            format!("Measurements in advertisements {}", on_off(s.tx_measures))
        }
        DeviceSetting::ShowBattery { .. } => format!("Battery display {}", on_off(s.show_battery)),
        DeviceSetting::Unit { .. } => format!(
            "Display unit set to {}",
            if s.temp_f_or_c { "°F" } else { "°C" }
        ),
        DeviceSetting::BlinkingSmile { .. } => {
            format!("Blinking smiley {}", on_off(s.blinking_time_smile))
        }
        DeviceSetting::ComfortSmiley { .. } => {
            format!("Comfort smiley {}", on_off(s.comfort_smiley))
        }
        DeviceSetting::Advertising { .. } => {
            format!("Advertising format set to {}", s.advertising_type)
        }
        DeviceSetting::Smiley { .. } => format!("Smiley set to {:?}", s.smiley),
        DeviceSetting::AdvCrypto { .. } => {
            format!("Advertisement encryption {}", on_off(s.adv_crypto))
        }
        DeviceSetting::AdvFlags { .. } => format!("Advertisement flags {}", on_off(s.adv_flags)),
        DeviceSetting::Bt5Phy { .. } => format!("Bluetooth 5 PHY {}", on_off(s.bt5phy)),
        DeviceSetting::LongRange { .. } => format!("Long range {}", on_off(s.long_range)),
        DeviceSetting::ScreenOff { .. } => format!("Screen off {}", on_off(s.screen_off)),
        DeviceSetting::TempOffset { .. } => {
            format!("Temperature offset set to {:+.1} °C", s.temp_offset)
        }
        DeviceSetting::HumidityOffset { .. } => {
            format!("Humidity offset set to {:+.1} %", s.humidity_offset)
        }
        DeviceSetting::AdvertisingInterval { .. } => format!(
            "Advertising interval set to {} ms",
            s.advertising_interval_ms()
        ),
        DeviceSetting::MeasureInterval { .. } => {
            format!("Measurement interval set to {} ms", s.measure_interval_ms())
        }
        DeviceSetting::TxPower { .. } => {
            format!("Transmit power set to {:.1} dBm", s.rf_tx_power_dbm())
        }
        DeviceSetting::ConnectLatency { .. } => {
            format!("Connection latency set to {} ms", s.connect_latency_ms())
        }
        DeviceSetting::LcdInterval { .. } => {
            format!("LCD refresh set to {} ms", s.lcd_update_interval_ms())
        }
        DeviceSetting::Averaging { .. } => format!(
            "Averaging window set to {} s",
            s.averaging_measurements_sec()
        ),
    }
}

pub async fn cmd_set(
    device: Option<String>,
    timeout: Duration,
    setting: DeviceSetting,
    quiet: bool,
    force: bool,
    config: &Config,
) -> Result<()> {
    let address = require_device(device, config)?;

    if !confirm(&describe_setting_change(&setting), force)? {
        eprintln!("Cancelled.");
        return Ok(());
    }

    let session = open_session(address, ConnectionMode::Advertising, timeout, config).await?;
    let result = apply_setting(&session, &setting).await;
    session.disconnect().await.ok();
    let settings = result.context("Failed to change setting")?;

    if !quiet {
        println!("{}", describe_result(&setting, &settings));
    }
    Ok(())
}
