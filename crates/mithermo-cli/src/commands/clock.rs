//! Clock command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use mithermo_core::ConnectionMode;
use time::OffsetDateTime;

use crate::config::Config;
use crate::util::{open_session, require_device};

pub async fn cmd_clock(
    device: Option<String>,
    timeout: Duration,
    epoch: Option<u32>,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let address = require_device(device, config)?;
    let session = open_session(address, ConnectionMode::Advertising, timeout, config).await?;

    let result = match epoch {
        Some(epoch) => session.set_clock(epoch).await,
        None => session.set_clock_now().await,
    };
    session.disconnect().await.ok();
    result.context("Failed to set clock")?;

    if !quiet {
        match epoch.and_then(|e| OffsetDateTime::from_unix_timestamp(i64::from(e)).ok()) {
            Some(time) => println!("Clock on {} set to {}", address, time),
            None => println!("Clock on {} set to now", address),
        }
    }
    Ok(())
}
