//! Reset command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use mithermo_core::ConnectionMode;

use crate::config::Config;
use crate::format::{FormatOptions, format_settings_text};
use crate::util::{confirm, open_session, require_device, write_output};

pub async fn cmd_reset(
    device: Option<String>,
    timeout: Duration,
    force: bool,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
    config: &Config,
) -> Result<()> {
    let address = require_device(device, config)?;

    if !confirm(
        &format!("Restore the default settings on {}?", address),
        force,
    )? {
        eprintln!("Cancelled.");
        return Ok(());
    }

    let session = open_session(address, ConnectionMode::Advertising, timeout, config).await?;
    let result = session.reset_settings().await;
    session.disconnect().await.ok();
    let settings = result.context("Failed to reset settings")?;

    if !quiet {
        eprintln!("Settings restored.");
    }
    write_output(output, &format_settings_text(&address.to_string(), &settings, opts))
}
