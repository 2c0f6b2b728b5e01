//! Scan command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use mithermo_core::{ScanOptions, scan};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_scan_csv, format_scan_json, format_scan_text};
use crate::util::write_output;

pub async fn cmd_scan(
    timeout: u64,
    all: bool,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    if !quiet && format == OutputFormat::Text {
        eprintln!("Scanning for thermometers ({}s)...", timeout);
    }

    let options = ScanOptions::new()
        .duration_secs(timeout)
        .filter_vendor_prefix(!all);
    let devices = scan::discover(options)
        .await
        .context("Failed to scan for devices")?;

    let content = match format {
        OutputFormat::Json => format_scan_json(&devices, opts)?,
        OutputFormat::Text => format_scan_text(&devices, opts),
        OutputFormat::Csv => format_scan_csv(&devices, opts),
    };
    write_output(output, &content)
}
