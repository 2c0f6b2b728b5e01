//! Read command implementation.
//!
//! The connection mode decides where the values come from:
//! - advertising: the link is only used once to learn the advertising
//!   format, then the command listens until the device advertises
//! - notification: subscribe and wait for the first notification
//! - connection: read every characteristic once

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use mithermo_core::{
    BtleTransport, ConnectionMode, DeviceSession, ScanDispatcher, ScanOptions, Transport, scan,
};
use tokio::time::{Instant, sleep};
use tracing::warn;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::format::{
    FormatOptions, format_measurements_csv, format_measurements_json, format_measurements_text,
};
use crate::util::{open_session, require_device, snapshot, write_output};

/// Arguments for the read command.
pub struct ReadArgs<'a> {
    pub device: Option<String>,
    pub timeout: Duration,
    pub mode: ConnectionMode,
    pub wait: Duration,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
    pub config: &'a Config,
}

pub async fn cmd_read(args: ReadArgs<'_>) -> Result<()> {
    let ReadArgs {
        device,
        timeout,
        mode,
        wait,
        format,
        output,
        quiet,
        opts,
        config,
    } = args;

    let address = require_device(device, config)?;
    if !quiet && format == OutputFormat::Text {
        eprintln!("Reading {} ({} mode)...", address, mode);
    }

    let session = Arc::new(open_session(address, mode, timeout, config).await?);
    session.set_time_tracking(true);

    let result = match mode {
        ConnectionMode::Advertising => read_advertised(&session, wait).await,
        ConnectionMode::Notification => read_notified(&session, wait).await,
        ConnectionMode::Connection => session
            .init()
            .await
            .context("Failed to read from device"),
    };
    if let Err(e) = result {
        session.disconnect().await.ok();
        return Err(e);
    }

    let measurements = snapshot(&session).await;
    let time = session.last_read_time();
    session.disconnect().await.ok();

    let label = address.to_string();
    let content = match format {
        OutputFormat::Json => format_measurements_json(&label, &measurements, time, opts)?,
        OutputFormat::Text => format_measurements_text(&label, &measurements, time, opts),
        OutputFormat::Csv => format_measurements_csv(&label, &measurements, time, opts),
    };
    write_output(output, &content)
}

async fn read_advertised(session: &Arc<DeviceSession<BtleTransport>>, wait: Duration) -> Result<()> {
    let dispatcher = ScanDispatcher::new().vendor_filter(false);
    dispatcher.add(session);
    dispatcher
        .init_all()
        .await
        .context("Failed to read device settings")?;

    let adapter = session.transport().adapter();
    let mut events = scan::advertisements(adapter, ScanOptions::new().duration(wait).all_devices())
        .await
        .context("Failed to start scanning")?;

    let address = session.address().to_string();
    while let Some(event) = events.next().await {
        if !event.address.eq_ignore_ascii_case(&address) {
            continue;
        }
        dispatcher.dispatch(&event.address, &event.payload).await;
        if session.last_read_time().is_some() {
            break;
        }
    }
    if let Err(e) = scan::stop(adapter).await {
        warn!("Failed to stop scan: {}", e);
    }

    if session.last_read_time().is_none() {
        bail!(
            "No advertisement from {} within {}s. Is \"transmit measures\" enabled?",
            address,
            wait.as_secs()
        );
    }
    Ok(())
}

async fn read_notified<T: Transport>(session: &DeviceSession<T>, wait: Duration) -> Result<()> {
    if let Err(e) = session.init().await {
        if !session.has_read_settings() {
            return Err(e).context("Failed to connect to device");
        }
        // Getters fall back to reads for anything not notifying.
        warn!("Notifications partially unavailable: {}", e);
    }

    wait_for_update(session, wait).await;
    if session.last_read_time().is_none() {
        warn!("No notification within {}s, reading instead", wait.as_secs());
    }
    Ok(())
}

/// Sleep until the session reports a measurement or `wait` elapses.
async fn wait_for_update<T: Transport>(session: &DeviceSession<T>, wait: Duration) {
    let deadline = Instant::now() + wait;
    while session.last_read_time().is_none() && Instant::now() < deadline {
        sleep(Duration::from_millis(250)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mithermo_core::uuids::TEMPERATURE_PRECISE;
    use mithermo_core::{MockTransport, TransportLock};

    fn notifying_session() -> (Arc<MockTransport>, DeviceSession<Arc<MockTransport>>) {
        let mock = Arc::new(MockTransport::thermometer());
        let session = DeviceSession::new(
            "A4:C1:38:0A:1B:2C".parse().unwrap(),
            Arc::clone(&mock),
            ConnectionMode::Notification,
        )
        .with_lock(TransportLock::new());
        session.set_time_tracking(true);
        (mock, session)
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_update_returns_on_notification() {
        let (mock, session) = notifying_session();
        session.init().await.unwrap();
        assert!(session.last_read_time().is_none());

        let notifier = {
            let mock = Arc::clone(&mock);
            tokio::spawn(async move {
                sleep(Duration::from_secs(2)).await;
                mock.notify(TEMPERATURE_PRECISE, &2300i16.to_le_bytes());
            })
        };

        let started = Instant::now();
        wait_for_update(&session, Duration::from_secs(30)).await;
        notifier.await.unwrap();

        assert!(session.last_read_time().is_some());
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!((session.measurements().temperature_precise - 23.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_update_gives_up_after_wait() {
        let (_, session) = notifying_session();
        session.init().await.unwrap();

        let started = Instant::now();
        wait_for_update(&session, Duration::from_secs(5)).await;
        assert!(session.last_read_time().is_none());
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_notified_fails_without_link() {
        let (mock, session) = notifying_session();
        mock.set_should_fail_connect(true);
        assert!(read_notified(&session, Duration::from_secs(1)).await.is_err());
    }
}
