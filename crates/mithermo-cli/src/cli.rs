//! CLI argument definitions using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use mithermo_core::{AdvertisingType, ConnectionMode, Smiley};

/// Connection timeout used when neither the flag nor the config sets one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Scan duration used when neither the flag nor the config sets one.
pub const DEFAULT_SCAN_SECS: u64 = 10;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device MAC address or alias, or use MITHERMO_DEVICE env var
    #[arg(short, long, env = "MITHERMO_DEVICE")]
    pub device: Option<String>,

    /// Connection timeout in seconds (defaults to config, then 30)
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,
}

impl DeviceArgs {
    /// Resolve the timeout: the flag wins over the config value
    pub fn timeout(&self, config_timeout: Option<u64>) -> Duration {
        Duration::from_secs(self.timeout.or(config_timeout).unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Device arguments that support multiple devices
#[derive(Debug, Clone, Args)]
pub struct MultiDeviceArgs {
    /// Device address(es) or aliases, repeated or comma-separated
    #[arg(short, long, value_delimiter = ',', env = "MITHERMO_DEVICE")]
    pub device: Vec<String>,

    /// Timeout in seconds for the initial settings read (per device)
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,
}

impl MultiDeviceArgs {
    /// Resolve the timeout: the flag wins over the config value
    pub fn timeout(&self, config_timeout: Option<u64>) -> Duration {
        Duration::from_secs(self.timeout.or(config_timeout).unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

/// Reusable output format arguments
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Use Fahrenheit for temperature display (overrides --celsius and config)
    #[arg(long, conflicts_with = "celsius")]
    pub fahrenheit: bool,

    /// Use Celsius for temperature display (default, overrides config)
    #[arg(long, conflicts_with = "fahrenheit")]
    pub celsius: bool,

    /// Omit header row in CSV output (useful for appending)
    #[arg(long)]
    pub no_header: bool,
}

impl OutputArgs {
    /// Resolve fahrenheit setting: explicit flags override config
    pub fn resolve_fahrenheit(&self, config_fahrenheit: bool) -> bool {
        if self.fahrenheit {
            true
        } else if self.celsius {
            false
        } else {
            config_fahrenheit
        }
    }
}

/// How `read` obtains its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Listen for advertisements without connecting
    Advertising,
    /// Connect and wait for GATT notifications
    Notification,
    /// Connect and read every characteristic
    Connection,
}

impl From<ModeArg> for ConnectionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Advertising => ConnectionMode::Advertising,
            ModeArg::Notification => ConnectionMode::Notification,
            ModeArg::Connection => ConnectionMode::Connection,
        }
    }
}

#[derive(Parser)]
#[command(name = "mithermo")]
#[command(
    author,
    version,
    about = "CLI for Xiaomi thermometers running the ATC/PVVX firmware",
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "MITHERMO_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan for nearby thermometers
    Scan {
        /// Scan timeout in seconds (defaults to config, then 10)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Show every advertising device, not only A4:C1:38 thermometers
        #[arg(short, long)]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Omit header row in CSV output (useful for appending)
        #[arg(long)]
        no_header: bool,
    },

    /// Read current measurements from a device
    Read {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Where the values come from (defaults to config, then connection)
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Seconds to wait for an advertisement or notification
        #[arg(short, long, default_value = "30")]
        wait: u64,
    },

    /// Continuously print advertised measurements from one or more devices
    Watch {
        #[command(flatten)]
        device: MultiDeviceArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Stop after this many seconds (0 runs until Ctrl+C)
        #[arg(long, default_value = "0")]
        duration: u64,

        /// Skip the initial settings read
        #[arg(long)]
        no_init: bool,
    },

    /// Show the device settings record
    Settings {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change a device setting
    Set {
        #[command(flatten)]
        device: DeviceArgs,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,

        #[command(subcommand)]
        setting: DeviceSetting,
    },

    /// Restore the firmware's default settings
    Reset {
        #[command(flatten)]
        device: DeviceArgs,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Set the device clock
    Clock {
        #[command(flatten)]
        device: DeviceArgs,

        /// Unix timestamp to write (defaults to now)
        #[arg(long)]
        epoch: Option<u32>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage device aliases (friendly names)
    Alias {
        #[command(subcommand)]
        action: AliasSubcommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Alias subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum AliasSubcommand {
    /// List all device aliases
    List,

    /// Set a device alias
    Set {
        /// Friendly name for the device (e.g., "kitchen", "bedroom")
        name: String,

        /// Device MAC address
        address: String,
    },

    /// Remove a device alias
    #[command(alias = "rm")]
    Remove {
        /// Alias name to remove
        name: String,
    },
}

/// Device settings that can be configured
#[derive(Debug, Clone, Subcommand)]
pub enum DeviceSetting {
    /// Measure less often to save battery
    LowPower {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Include measurements in the advertisement
    TransmitMeasures {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Alternate the humidity digits with the battery level
    ShowBattery {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Temperature unit shown on the LCD
    Unit {
        #[arg(value_enum)]
        unit: TemperatureUnit,
    },

    /// Blink the smiley as a time indicator
    BlinkingSmile {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Drive the smiley from the comfort zone
    ComfortSmiley {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Advertisement format
    Advertising {
        #[arg(value_enum)]
        format: AdvertisingFormat,
    },

    /// Fixed smiley shown on the LCD
    Smiley {
        #[arg(value_enum)]
        smiley: SmileyArg,
    },

    /// Encrypt advertisements
    AdvCrypto {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Include the flags structure in advertisements
    AdvFlags {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Use the Bluetooth 5 PHY
    Bt5Phy {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Use coded PHY long range advertising
    LongRange {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Turn the LCD off
    ScreenOff {
        #[arg(value_parser = parse_bool_arg, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Temperature calibration offset in °C (-12.5 to 12.5)
    TempOffset {
        #[arg(allow_hyphen_values = true)]
        offset: f32,
    },

    /// Humidity calibration offset in % (-12.5 to 12.5)
    HumidityOffset {
        #[arg(allow_hyphen_values = true)]
        offset: f32,
    },

    /// Advertising interval in milliseconds (multiples of 62.5)
    AdvertisingInterval { ms: u16 },

    /// Measurement interval in milliseconds
    MeasureInterval { ms: u32 },

    /// Radio transmit power in dBm (snapped to the nearest supported level)
    TxPower {
        #[arg(allow_hyphen_values = true)]
        dbm: f32,
    },

    /// Connection latency in milliseconds (multiples of 20)
    ConnectLatency { ms: u16 },

    /// LCD refresh interval in milliseconds (multiples of 50)
    LcdInterval { ms: u16 },

    /// Averaging window in seconds
    Averaging { seconds: u32 },
}

/// Temperature unit setting values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// Advertisement format setting values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdvertisingFormat {
    Atc1441,
    Pvvx,
    Xiaomi,
    Bthome,
}

impl From<AdvertisingFormat> for AdvertisingType {
    fn from(format: AdvertisingFormat) -> Self {
        match format {
            AdvertisingFormat::Atc1441 => AdvertisingType::Atc1441,
            AdvertisingFormat::Pvvx => AdvertisingType::Pvvx,
            AdvertisingFormat::Xiaomi => AdvertisingType::Xiaomi,
            AdvertisingFormat::Bthome => AdvertisingType::BtHome,
        }
    }
}

/// Smiley setting values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SmileyArg {
    Off,
    Happy,
    Sad,
    Ooo,
    POff,
    PHappy,
    PSad,
    POoo,
}

impl From<SmileyArg> for Smiley {
    fn from(smiley: SmileyArg) -> Self {
        match smiley {
            SmileyArg::Off => Smiley::Off,
            SmileyArg::Happy => Smiley::Happy,
            SmileyArg::Sad => Smiley::Sad,
            SmileyArg::Ooo => Smiley::Ooo,
            SmileyArg::POff => Smiley::POff,
            SmileyArg::PHappy => Smiley::PHappy,
            SmileyArg::PSad => Smiley::PSad,
            SmileyArg::POoo => Smiley::POoo,
        }
    }
}

/// Parse boolean argument with flexible input
fn parse_bool_arg(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(format!(
            "Invalid boolean value '{}'. Use: true/false, yes/no, on/off, 1/0",
            s
        )),
    }
}

/// Configuration keys
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigKey {
    /// Default device address
    Device,
    /// Default connection mode for `read`
    Mode,
    /// Default connection timeout in seconds
    Timeout,
    /// Default scan duration in seconds
    ScanDuration,
    /// Disable colored output
    NoColor,
    /// Use Fahrenheit for temperature
    Fahrenheit,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}
