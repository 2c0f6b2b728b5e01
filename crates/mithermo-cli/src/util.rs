//! Helpers shared by the commands.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mithermo_core::{
    BleConfig, BtleTransport, ConnectionMode, DeviceAddress, DeviceSession, Measurements,
    Transport, scan,
};

use crate::config::{Config, resolve_device};

/// Resolve the target device and parse its address.
pub fn require_device(device: Option<String>, config: &Config) -> Result<DeviceAddress> {
    let Some(identifier) = resolve_device(device, config) else {
        bail!(
            "No device specified. Use --device, set MITHERMO_DEVICE, or run \
             `mithermo config set device <ADDRESS>`.\n\
             Run `mithermo scan` to find nearby thermometers."
        );
    };
    parse_address(&identifier)
}

/// Parse `AA:BB:CC:DD:EE:FF` into a [`DeviceAddress`].
pub fn parse_address(identifier: &str) -> Result<DeviceAddress> {
    identifier
        .parse::<DeviceAddress>()
        .with_context(|| format!("'{}' is not a MAC address or known alias", identifier))
}

/// Open a session over the first Bluetooth adapter.
pub async fn open_session(
    address: DeviceAddress,
    mode: ConnectionMode,
    timeout: Duration,
    config: &Config,
) -> Result<DeviceSession<BtleTransport>> {
    let adapter = scan::get_adapter()
        .await
        .context("No Bluetooth adapter available. Is Bluetooth enabled?")?;
    let ble = BleConfig::new()
        .scan_timeout(timeout)
        .connection_timeout(timeout);
    let session_config = config.session.to_session_config();
    session_config.validate()?;

    Ok(DeviceSession::with_config(
        address,
        BtleTransport::with_adapter(adapter, ble),
        mode,
        session_config,
    ))
}

/// Current values as reported by the session getters for its mode.
pub async fn snapshot<T: Transport>(session: &DeviceSession<T>) -> Measurements {
    Measurements {
        temperature: session.temperature().await,
        temperature_precise: session.temperature_precise().await,
        humidity: session.humidity().await,
        battery_level: session.battery_level().await,
        battery_mv: session.battery_voltage().await,
    }
}

/// Write output to a file or stdout.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    if let Some(path) = output {
        fs::write(path, content)
            .with_context(|| format!("Failed to write to {}", path.display()))?;
    } else {
        print!("{}", content);
        io::stdout().flush()?;
    }
    Ok(())
}

/// Ask before changing the device. `force` skips the prompt.
pub fn confirm(message: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }

    if !io::stdin().is_terminal() {
        eprintln!("Error: Cannot prompt for confirmation in non-interactive mode.");
        eprintln!("Use --force to skip confirmation.");
        return Ok(false);
    }

    print!("{} [y/N]: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
