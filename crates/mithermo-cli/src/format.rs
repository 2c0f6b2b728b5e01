//! Output formatting utilities for text, JSON, and CSV output.

use anyhow::Result;
use mithermo_core::{DeviceSettings, DiscoveredDevice, Measurements};
use owo_colors::OwoColorize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use Fahrenheit for temperatures.
    pub fahrenheit: bool,
    /// Omit header row in CSV output.
    pub no_header: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool, fahrenheit: bool) -> Self {
        Self {
            no_color,
            fahrenheit,
            ..Default::default()
        }
    }

    /// Create with no_header option for CSV output.
    #[must_use]
    pub fn with_no_header(mut self, no_header: bool) -> Self {
        self.no_header = no_header;
        self
    }

    /// Create with compact JSON option.
    #[must_use]
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize a value, pretty-printed unless compact.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }

    pub fn convert_temp(&self, celsius: f32) -> f32 {
        if self.fahrenheit {
            celsius * 9.0 / 5.0 + 32.0
        } else {
            celsius
        }
    }

    pub fn temp_unit(&self) -> &'static str {
        if self.fahrenheit { "°F" } else { "°C" }
    }

    pub fn format_temp(&self, celsius: f32) -> String {
        format!("{:.2}{}", self.convert_temp(celsius), self.temp_unit())
    }

    fn temp_csv_header(&self) -> &'static str {
        if self.fahrenheit {
            "temperature_f"
        } else {
            "temperature_c"
        }
    }

    fn label(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.dimmed().to_string()
        }
    }
}

/// Escape a CSV field.
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn battery_text(level: u8, no_color: bool) -> String {
    let text = format!("{}%", level);
    if no_color {
        text
    } else if level < 15 {
        text.red().to_string()
    } else if level < 40 {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

fn timestamp(time: Option<OffsetDateTime>) -> String {
    time.and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default()
}

// ==================== Scan ====================

#[derive(Serialize)]
struct ScanEntry<'a> {
    address: &'a str,
    name: Option<&'a str>,
    rssi: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurements: Option<Measurements>,
}

fn scan_entries(devices: &[DiscoveredDevice]) -> Vec<ScanEntry<'_>> {
    devices
        .iter()
        .map(|d| ScanEntry {
            address: &d.address,
            name: d.name.as_deref(),
            rssi: d.rssi,
            measurements: d.measurements(),
        })
        .collect()
}

pub fn format_scan_json(devices: &[DiscoveredDevice], opts: &FormatOptions) -> Result<String> {
    opts.as_json(&scan_entries(devices))
}

pub fn format_scan_text(devices: &[DiscoveredDevice], opts: &FormatOptions) -> String {
    use tabled::settings::Style;
    use tabled::{Table, Tabled};

    if devices.is_empty() {
        return "No thermometers found\n".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "Address")]
        address: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Signal")]
        signal: String,
        #[tabled(rename = "Temperature")]
        temperature: String,
        #[tabled(rename = "Humidity")]
        humidity: String,
        #[tabled(rename = "Battery")]
        battery: String,
    }

    let rows: Vec<DeviceRow> = scan_entries(devices)
        .into_iter()
        .map(|entry| {
            let name = entry.name.unwrap_or("Unknown");
            let (temperature, humidity, battery) = match entry.measurements {
                Some(m) => (
                    opts.format_temp(m.temperature_precise),
                    format!("{:.1}%", m.humidity),
                    battery_text(m.battery_level, opts.no_color),
                ),
                None => ("-".to_string(), "-".to_string(), "-".to_string()),
            };
            DeviceRow {
                address: entry.address.to_string(),
                name: if opts.no_color {
                    name.to_string()
                } else {
                    format!("{}", name.cyan())
                },
                signal: entry
                    .rssi
                    .map(|r| format!("{} dBm", r))
                    .unwrap_or_else(|| "N/A".to_string()),
                temperature,
                humidity,
                battery,
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    format!("Found {} device(s)\n\n{}\n", devices.len(), table)
}

pub fn format_scan_csv(devices: &[DiscoveredDevice], opts: &FormatOptions) -> String {
    let mut out = String::new();
    if !opts.no_header {
        out.push_str(&format!(
            "address,name,rssi,{},humidity,battery\n",
            opts.temp_csv_header()
        ));
    }
    for entry in scan_entries(devices) {
        let (temp, humidity, battery) = match entry.measurements {
            Some(m) => (
                format!("{:.2}", opts.convert_temp(m.temperature_precise)),
                format!("{:.2}", m.humidity),
                m.battery_level.to_string(),
            ),
            None => Default::default(),
        };
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            entry.address,
            csv_escape(entry.name.unwrap_or("")),
            entry.rssi.map(|r| r.to_string()).unwrap_or_default(),
            temp,
            humidity,
            battery
        ));
    }
    out
}

// ==================== Measurements ====================

#[derive(Serialize)]
struct MeasurementEntry<'a> {
    device: &'a str,
    temperature: f32,
    unit: &'static str,
    humidity: f32,
    battery_level: u8,
    battery_mv: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<String>,
}

pub fn format_measurements_text(
    device: &str,
    m: &Measurements,
    time: Option<OffsetDateTime>,
    opts: &FormatOptions,
) -> String {
    let mut out = format!("{}\n", device);
    out.push_str(&format!(
        "  {} {}\n",
        opts.label("Temperature:"),
        opts.format_temp(m.temperature_precise)
    ));
    out.push_str(&format!(
        "  {} {:.2}%\n",
        opts.label("Humidity:   "),
        m.humidity
    ));
    out.push_str(&format!(
        "  {} {} ({} mV)\n",
        opts.label("Battery:    "),
        battery_text(m.battery_level, opts.no_color),
        m.battery_mv
    ));
    if let Some(t) = time {
        out.push_str(&format!(
            "  {} {}\n",
            opts.label("Updated:    "),
            timestamp(Some(t))
        ));
    }
    out
}

pub fn format_measurements_json(
    device: &str,
    m: &Measurements,
    time: Option<OffsetDateTime>,
    opts: &FormatOptions,
) -> Result<String> {
    opts.as_json(&MeasurementEntry {
        device,
        temperature: opts.convert_temp(m.temperature_precise),
        unit: if opts.fahrenheit { "F" } else { "C" },
        humidity: m.humidity,
        battery_level: m.battery_level,
        battery_mv: m.battery_mv,
        time: time.map(|t| timestamp(Some(t))),
    })
}

pub fn format_measurements_csv_header(opts: &FormatOptions) -> String {
    format!(
        "time,device,{},humidity,battery,battery_mv\n",
        opts.temp_csv_header()
    )
}

pub fn format_measurements_csv_line(
    device: &str,
    m: &Measurements,
    time: Option<OffsetDateTime>,
    opts: &FormatOptions,
) -> String {
    format!(
        "{},{},{:.2},{:.2},{},{}\n",
        timestamp(time),
        device,
        opts.convert_temp(m.temperature_precise),
        m.humidity,
        m.battery_level,
        m.battery_mv
    )
}

pub fn format_measurements_csv(
    device: &str,
    m: &Measurements,
    time: Option<OffsetDateTime>,
    opts: &FormatOptions,
) -> String {
    let mut out = String::new();
    if !opts.no_header {
        out.push_str(&format_measurements_csv_header(opts));
    }
    out.push_str(&format_measurements_csv_line(device, m, time, opts));
    out
}

/// One line per update in watch mode.
pub fn format_watch_line(
    device: &str,
    m: &Measurements,
    time: OffsetDateTime,
    opts: &FormatOptions,
) -> String {
    let clock = format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    );
    let clock = if opts.no_color {
        clock
    } else {
        clock.dimmed().to_string()
    };
    format!(
        "[{}] {}  {}  {:.1}%  {}\n",
        clock,
        device,
        opts.format_temp(m.temperature_precise),
        m.humidity,
        battery_text(m.battery_level, opts.no_color)
    )
}

// ==================== Settings ====================

#[derive(Serialize)]
struct SettingsEntry<'a> {
    device: &'a str,
    model: &'static str,
    #[serde(flatten)]
    settings: &'a DeviceSettings,
    advertising_interval_ms: u16,
    measure_interval_ms: u32,
    connect_latency_ms: u16,
    lcd_update_interval_ms: u16,
    averaging_measurements_sec: u32,
    rf_tx_power_dbm: f32,
}

pub fn format_settings_json(
    device: &str,
    settings: &DeviceSettings,
    opts: &FormatOptions,
) -> Result<String> {
    opts.as_json(&SettingsEntry {
        device,
        model: settings.hw_version.model(),
        settings,
        advertising_interval_ms: settings.advertising_interval_ms(),
        measure_interval_ms: settings.measure_interval_ms(),
        connect_latency_ms: settings.connect_latency_ms(),
        lcd_update_interval_ms: settings.lcd_update_interval_ms(),
        averaging_measurements_sec: settings.averaging_measurements_sec(),
        rf_tx_power_dbm: settings.rf_tx_power_dbm(),
    })
}

pub fn format_settings_text(device: &str, s: &DeviceSettings, opts: &FormatOptions) -> String {
    let on_off = |b: bool| if b { "on" } else { "off" };
    let rows: Vec<(&str, String)> = vec![
        ("Hardware", format!("{} ({})", s.hw_version, s.hw_version.model())),
        ("Advertising", s.advertising_type.to_string()),
        (
            "Adv. interval",
            format!("{} ms", s.advertising_interval_ms()),
        ),
        ("Measure interval", format!("{} ms", s.measure_interval_ms())),
        ("TX power", format!("{:.1} dBm", s.rf_tx_power_dbm())),
        ("Temp offset", format!("{:+.1} °C", s.temp_offset)),
        ("Humidity offset", format!("{:+.1} %", s.humidity_offset)),
        (
            "Display unit",
            if s.temp_f_or_c { "°F" } else { "°C" }.to_string(),
        ),
        ("Smiley", format!("{:?}", s.smiley)),
        ("Comfort smiley", on_off(s.comfort_smiley).to_string()),
        ("Blinking smile", on_off(s.blinking_time_smile).to_string()),
        ("Show battery", on_off(s.show_battery).to_string()),
        ("Screen off", on_off(s.screen_off).to_string()),
        ("Low power", on_off(s.lp_measures).to_string()),
        ("Transmit measures", on_off(s.tx_measures).to_string()),
        ("Adv. crypto", on_off(s.adv_crypto).to_string()),
        ("Adv. flags", on_off(s.adv_flags).to_string()),
        ("BT5 PHY", on_off(s.bt5phy).to_string()),
        ("Long range", on_off(s.long_range).to_string()),
        (
            "Connect latency",
            format!("{} ms", s.connect_latency_ms()),
        ),
        (
            "LCD interval",
            format!("{} ms", s.lcd_update_interval_ms()),
        ),
        (
            "Averaging",
            format!("{} s", s.averaging_measurements_sec()),
        ),
    ];

    let mut out = format!("{}\n", device);
    for (name, value) in rows {
        out.push_str(&format!(
            "  {} {}\n",
            opts.label(&format!("{:<18}", format!("{}:", name))),
            value
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mithermo_core::HwVersion;

    fn sample() -> Measurements {
        Measurements {
            temperature: 21.5,
            temperature_precise: 21.47,
            humidity: 55.25,
            battery_level: 87,
            battery_mv: 2870,
        }
    }

    fn plain() -> FormatOptions {
        FormatOptions::new(true, false)
    }

    #[test]
    fn test_convert_temp() {
        let opts = FormatOptions::new(true, true);
        assert!((opts.convert_temp(0.0) - 32.0).abs() < f32::EPSILON);
        assert!((opts.convert_temp(100.0) - 212.0).abs() < 0.001);
        assert_eq!(plain().format_temp(21.47), "21.47°C");
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("ATC_0A1B2C"), "ATC_0A1B2C");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_measurements_text_plain() {
        let text = format_measurements_text("A4:C1:38:0A:1B:2C", &sample(), None, &plain());
        assert!(text.starts_with("A4:C1:38:0A:1B:2C\n"));
        assert!(text.contains("21.47°C"));
        assert!(text.contains("55.25%"));
        assert!(text.contains("87% (2870 mV)"));
        assert!(!text.contains("Updated"));
    }

    #[test]
    fn test_measurements_csv_header_toggle() {
        let m = sample();
        let with_header = format_measurements_csv("dev", &m, None, &plain());
        assert!(with_header.starts_with("time,device,temperature_c"));
        assert_eq!(with_header.lines().count(), 2);

        let opts = plain().with_no_header(true);
        let without = format_measurements_csv("dev", &m, None, &opts);
        assert_eq!(without, ",dev,21.47,55.25,87,2870\n");
    }

    #[test]
    fn test_measurements_json_uses_selected_unit() {
        let opts = FormatOptions::new(true, true).with_compact(true);
        let json = format_measurements_json("dev", &sample(), None, &opts).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["unit"], "F");
        assert_eq!(value["battery_level"], 87);
        assert!(value.get("time").is_none());
        assert!(!json.trim_end().contains('\n'));
    }

    #[test]
    fn test_settings_text_lists_derived_values() {
        let settings = DeviceSettings {
            hw_version: HwVersion::from(3),
            advertising_interval: 40,
            ..Default::default()
        };
        let text = format_settings_text("dev", &settings, &plain());
        assert!(text.contains("2500 ms"));
        assert!(text.contains("LYWSD03MMC"));
    }

    #[test]
    fn test_scan_text_empty() {
        assert_eq!(format_scan_text(&[], &plain()), "No thermometers found\n");
    }

    #[test]
    fn test_scan_text_renders_table() {
        let mut payload = vec![18, 0x16, 0x1A, 0x18, 0x2C, 0x1B, 0x0A, 0x38, 0xC1, 0xA4];
        payload.extend_from_slice(&2147i16.to_le_bytes());
        payload.extend_from_slice(&5525u16.to_le_bytes());
        payload.extend_from_slice(&2870u16.to_le_bytes());
        payload.extend_from_slice(&[87, 0x01, 0x05]);
        let devices = [
            DiscoveredDevice {
                address: "A4:C1:38:0A:1B:2C".to_string(),
                name: Some("ATC_0A1B2C".to_string()),
                rssi: Some(-61),
                payload,
            },
            DiscoveredDevice {
                address: "A4:C1:38:00:00:01".to_string(),
                name: None,
                rssi: None,
                payload: Vec::new(),
            },
        ];

        let text = format_scan_text(&devices, &plain());
        assert!(text.starts_with("Found 2 device(s)"));
        assert!(text.contains('╭'), "expected a rounded table:\n{text}");
        for cell in [
            "Address",
            "A4:C1:38:0A:1B:2C",
            "ATC_0A1B2C",
            "-61 dBm",
            "21.47°C",
            "87%",
            "Unknown",
            "N/A",
        ] {
            assert!(text.contains(cell), "missing {cell}:\n{text}");
        }
    }
}
