//! Command-line interface for Xiaomi thermometers running the ATC/PVVX firmware.
//!
//! Works with LYWSD03MMC, MHO-C401, CGG1 and the other models supported by
//! the custom firmware.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Scan for nearby thermometers and decode their advertisements |
//! | `read` | Read current measurements (advertising, notification or connection mode) |
//! | `watch` | Print advertised measurements from one or more devices |
//! | `settings` | Show the device settings record |
//! | `set` | Change a device setting |
//! | `reset` | Restore the firmware defaults |
//! | `clock` | Set the device clock |
//! | `config` | Manage CLI configuration |
//! | `alias` | Manage friendly device names |
//! | `completions` | Generate shell completions |
//!
//! # Configuration
//!
//! The CLI stores configuration in `~/.config/mithermo/config.toml` (or the
//! platform equivalent). Besides the default device, connection mode and
//! display preferences, a `[session]` table tunes retries and timings.
//!
//! # Environment Variables
//!
//! - `MITHERMO_DEVICE`: Default device address (overridden by `--device` flag)
//! - `NO_COLOR`: Disable colored output when set
//! - `RUST_LOG`: Log filter when neither `--verbose` nor `--quiet` is given
//!
//! # Examples
//!
//! ```bash
//! mithermo scan
//! mithermo read --device A4:C1:38:0A:1B:2C --mode advertising
//! mithermo watch --device kitchen,bedroom --format csv --output temps.csv
//! mithermo set --device kitchen advertising pvvx
//! ```

// The binary lives in main.rs; the library target only re-exports the driver.
pub use mithermo_core;
pub use mithermo_types;
