//! Watch command implementation.
//!
//! Listens for advertisements from any number of thermometers through one
//! scan and prints a line whenever one of them reports new values. No link
//! is held open, except briefly to learn each device's advertising format.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use mithermo_core::{
    AdvertisementEvent, AdvertisingType, ConnectionMode, DeviceSession, Measurements,
    ScanDispatcher, ScanOptions, Transport, scan,
};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::OutputFormat;
use crate::config::{Config, resolve_alias};
use crate::format::{
    FormatOptions, format_measurements_csv_header, format_measurements_csv_line,
    format_measurements_json, format_watch_line,
};
use crate::util::{open_session, parse_address};

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub devices: Vec<String>,
    pub timeout: Duration,
    pub duration: Option<Duration>,
    pub init: bool,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
    pub config: &'a Config,
}

pub async fn cmd_watch(args: WatchArgs<'_>) -> Result<()> {
    let WatchArgs {
        devices,
        timeout,
        duration,
        init,
        format,
        output,
        quiet,
        opts,
        config,
    } = args;

    let devices = if devices.is_empty() {
        config.device.clone().into_iter().collect()
    } else {
        devices
    };
    if devices.is_empty() {
        bail!("No device specified. Use --device (repeatable) or set MITHERMO_DEVICE.");
    }

    let dispatcher = ScanDispatcher::new().vendor_filter(false);
    let mut sessions = Vec::with_capacity(devices.len());
    for device in &devices {
        let address = parse_address(&resolve_alias(device, config))?;
        let session = Arc::new(
            open_session(address, ConnectionMode::Advertising, timeout, config).await?,
        );
        session.set_time_tracking(true);
        dispatcher.add(&session);
        sessions.push(session);
    }

    if init {
        if !quiet {
            eprintln!("Reading settings from {} device(s)...", sessions.len());
        }
        if let Err(e) = dispatcher.init_all().await {
            warn!("Some devices could not be initialised: {}", e);
        }
    }

    let Some(first) = sessions.first() else {
        return Ok(());
    };
    let adapter = first.transport().adapter().clone();
    let options = match duration {
        Some(d) => ScanOptions::new().duration(d),
        None => ScanOptions::new().forever(),
    };
    let mut events = scan::advertisements(&adapter, options.all_devices())
        .await
        .context("Failed to start scanning")?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    if !quiet {
        eprintln!("Watching {} device(s). Press Ctrl+C to stop.", sessions.len());
    }

    let mut printer = Printer::new(format, output, opts);
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.next() => match event {
                Some(event) => event,
                None => break,
            },
        };
        if let Some(update) = deliver(&dispatcher, &event).await {
            printer.print(&update)?;
        }
    }

    if let Err(e) = scan::stop(&adapter).await {
        warn!("Failed to stop scan: {}", e);
    }
    if !quiet {
        eprintln!("\nStopped.");
    }
    Ok(())
}

/// A decoded update from one device.
struct Update {
    device: String,
    measurements: Measurements,
    time: OffsetDateTime,
}

/// Route `event` and report an update if it changed the session's values.
async fn deliver<T: Transport>(
    dispatcher: &ScanDispatcher<T>,
    event: &AdvertisementEvent,
) -> Option<Update> {
    let session = dispatcher.find(&event.address)?;
    let before = session.last_read_time();
    dispatcher.dispatch(&event.address, &event.payload).await;
    updated(&session, before)
}

fn updated<T: Transport>(
    session: &DeviceSession<T>,
    before: Option<OffsetDateTime>,
) -> Option<Update> {
    let time = session.last_read_time()?;
    if before == Some(time) {
        return None;
    }
    let mut measurements = session.measurements();
    if session.cached_settings().advertising_type == AdvertisingType::Atc1441 {
        measurements.temperature_precise = measurements.temperature;
    }
    Some(Update {
        device: session.address().to_string(),
        measurements,
        time,
    })
}

struct Printer<'a> {
    format: OutputFormat,
    output: Option<&'a PathBuf>,
    opts: FormatOptions,
    header_written: bool,
}

impl<'a> Printer<'a> {
    fn new(format: OutputFormat, output: Option<&'a PathBuf>, opts: &FormatOptions) -> Self {
        // One JSON object per line
        let opts = opts.with_compact(true);
        Self {
            format,
            output,
            opts,
            header_written: opts.no_header,
        }
    }

    fn render(&mut self, update: &Update) -> Result<String> {
        let mut out = String::new();
        match self.format {
            OutputFormat::Text => out.push_str(&format_watch_line(
                &update.device,
                &update.measurements,
                update.time,
                &self.opts,
            )),
            OutputFormat::Json => out.push_str(&format_measurements_json(
                &update.device,
                &update.measurements,
                Some(update.time),
                &self.opts,
            )?),
            OutputFormat::Csv => {
                if !self.header_written {
                    out.push_str(&format_measurements_csv_header(&self.opts));
                    self.header_written = true;
                }
                out.push_str(&format_measurements_csv_line(
                    &update.device,
                    &update.measurements,
                    Some(update.time),
                    &self.opts,
                ));
            }
        }
        Ok(out)
    }

    fn print(&mut self, update: &Update) -> Result<()> {
        let rendered = self.render(update)?;
        match self.output {
            Some(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                file.write_all(rendered.as_bytes())?;
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(rendered.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}
