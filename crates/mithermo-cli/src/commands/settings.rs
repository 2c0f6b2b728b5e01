//! Settings command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use mithermo_core::ConnectionMode;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::format::{FormatOptions, format_settings_json, format_settings_text};
use crate::util::{open_session, require_device, write_output};

pub async fn cmd_settings(
    device: Option<String>,
    timeout: Duration,
    format: OutputFormat,
    output: Option<&PathBuf>,
    opts: &FormatOptions,
    config: &Config,
) -> Result<()> {
    let address = require_device(device, config)?;
    let session = open_session(address, ConnectionMode::Advertising, timeout, config).await?;

    let result = session.read_settings().await;
    session.disconnect().await.ok();
    let settings = result.context("Failed to read settings")?;

    let label = address.to_string();
    let content = match format {
        OutputFormat::Json => format_settings_json(&label, &settings, opts)?,
        OutputFormat::Text | OutputFormat::Csv => format_settings_text(&label, &settings, opts),
    };
    write_output(output, &content)
}
