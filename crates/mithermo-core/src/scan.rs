//! Device discovery and advertisement scanning.
//!
//! The thermometers broadcast their measurements as service data. This
//! module turns btleplug's central events into [`AdvertisementEvent`]s that
//! a [`ScanDispatcher`](crate::ScanDispatcher) can route, and offers a
//! one-shot discovery of nearby devices.
//!
//! btleplug does not expose scan interval and window, so the platform
//! defaults apply. On macOS peripherals are identified by a CoreBluetooth
//! UUID rather than their MAC address, which means addresses reported there
//! will not match a session's address.

use std::collections::HashMap;
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::{BoxStream, StreamExt};
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

use mithermo_types::{AdvertisingType, Measurements};

use crate::advertisement::parse_advertisement;
use crate::error::{Error, Result};
use crate::util::{create_identifier, has_vendor_prefix, service_data_payload};

/// One advertisement, reduced to what the decoders need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementEvent {
    /// Address as text, `AA:BB:CC:DD:EE:FF` on Linux and Windows.
    pub address: String,
    /// Raw AD structures rebuilt from the service data.
    pub payload: Vec<u8>,
    /// Signal strength, when the platform reported one.
    pub rssi: Option<i16>,
}

/// A device seen during [`discover`].
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Address as text (peripheral id on macOS).
    pub address: String,
    /// Advertised local name, e.g. `ATC_0A1B2C`.
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Raw AD structures rebuilt from the last service data.
    pub payload: Vec<u8>,
}

impl DiscoveredDevice {
    /// Decode the advertised measurements, trying PVVX then BTHome.
    ///
    /// ATC1441 needs the 18-byte radio frame, which the rebuilt service data
    /// payload never reaches, so it is not attempted here.
    pub fn measurements(&self) -> Option<Measurements> {
        [AdvertisingType::Pvvx, AdvertisingType::BtHome]
            .into_iter()
            .find_map(|kind| {
                let mut m = Measurements::default();
                parse_advertisement(kind, &self.payload, &mut m).ok()?;
                Some(m)
            })
    }
}

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Stop after this long. `None` scans until the stream is dropped.
    pub duration: Option<Duration>,
    /// Only report addresses with the vendor prefix.
    pub filter_vendor_prefix: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Some(Duration::from_secs(10)),
            filter_vendor_prefix: true,
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Set scan duration in seconds.
    #[must_use]
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Some(Duration::from_secs(secs));
        self
    }

    /// Scan until the stream is dropped.
    #[must_use]
    pub fn forever(mut self) -> Self {
        self.duration = None;
        self
    }

    /// Set whether to filter on the vendor prefix.
    #[must_use]
    pub fn filter_vendor_prefix(mut self, filter: bool) -> Self {
        self.filter_vendor_prefix = filter;
        self
    }

    /// Report every device, not just the thermometers.
    #[must_use]
    pub fn all_devices(self) -> Self {
        self.filter_vendor_prefix(false)
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::DeviceNotFound("no Bluetooth adapter available".to_string()))
}

/// Start an active scan and stream service-data advertisements.
///
/// Scanning stops on the adapter when the duration elapses; dropping the
/// stream early leaves the adapter scanning until [`stop`] is called.
pub async fn advertisements(
    adapter: &Adapter,
    options: ScanOptions,
) -> Result<BoxStream<'static, AdvertisementEvent>> {
    let events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;
    info!(duration = ?options.duration, "Scanning for advertisements");

    let adapter = adapter.clone();
    let filter = options.filter_vendor_prefix;
    let stream = events.filter_map(move |event| {
        let adapter = adapter.clone();
        async move {
            let CentralEvent::ServiceDataAdvertisement { id, service_data } = event else {
                return None;
            };
            let event = to_event(&adapter, &id, &service_data).await?;
            (!filter || has_vendor_prefix(&event.address)).then_some(event)
        }
    });

    Ok(match options.duration {
        Some(duration) => stream.take_until(sleep(duration)).boxed(),
        None => stream.boxed(),
    })
}

/// Stop scanning on `adapter`.
pub async fn stop(adapter: &Adapter) -> Result<()> {
    adapter.stop_scan().await?;
    debug!("Scan stopped");
    Ok(())
}

async fn to_event(
    adapter: &Adapter,
    id: &PeripheralId,
    service_data: &HashMap<Uuid, Vec<u8>>,
) -> Option<AdvertisementEvent> {
    let payload = service_data_payload(service_data);
    if payload.is_empty() {
        return None;
    }
    let peripheral = adapter.peripheral(id).await.ok()?;
    let properties = peripheral.properties().await.ok().flatten();
    let rssi = properties.as_ref().and_then(|p| p.rssi);
    let address = create_identifier(&peripheral.address().to_string(), id);
    Some(AdvertisementEvent {
        address,
        payload,
        rssi,
    })
}

/// Scan for `options.duration` and list the devices seen.
///
/// An empty list indicates no devices were found (not an error).
pub async fn discover(options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    discover_with_adapter(&adapter, options).await
}

/// [`discover`] on a specific adapter.
pub async fn discover_with_adapter(
    adapter: &Adapter,
    options: ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    let duration = options.duration.unwrap_or(Duration::from_secs(10));
    info!("Starting BLE scan for {} seconds...", duration.as_secs());

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(duration).await;
    adapter.stop_scan().await?;

    let mut discovered = Vec::new();
    for peripheral in adapter.peripherals().await? {
        match describe(&peripheral).await {
            Ok(Some(device))
                if !options.filter_vendor_prefix || has_vendor_prefix(&device.address) =>
            {
                debug!(address = %device.address, name = ?device.name, "Found device");
                discovered.push(device);
            }
            Ok(_) => {}
            Err(e) => debug!("Error processing peripheral: {}", e),
        }
    }

    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

async fn describe(peripheral: &Peripheral) -> Result<Option<DiscoveredDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };
    Ok(Some(DiscoveredDevice {
        address: create_identifier(&properties.address.to_string(), &peripheral.id()),
        name: properties.local_name,
        rssi: properties.rssi,
        payload: service_data_payload(&properties.service_data),
    }))
}

/// Find a known peripheral by address, scanning for up to `timeout` if it
/// has not been seen yet.
pub async fn find_peripheral(
    adapter: &Adapter,
    address: &str,
    timeout: Duration,
) -> Result<Peripheral> {
    if let Some(peripheral) = find_known(adapter, address).await? {
        debug!("Found {} without scanning", address);
        return Ok(peripheral);
    }

    info!("Scanning for {} ({:?})", address, timeout);
    adapter.start_scan(ScanFilter::default()).await?;
    let deadline = tokio::time::Instant::now() + timeout;
    let found = loop {
        if let Some(peripheral) = find_known(adapter, address).await? {
            break Some(peripheral);
        }
        if tokio::time::Instant::now() >= deadline {
            break None;
        }
        sleep(Duration::from_millis(250)).await;
    };
    adapter.stop_scan().await?;

    found.ok_or_else(|| Error::DeviceNotFound(address.to_string()))
}

async fn find_known(adapter: &Adapter, address: &str) -> Result<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await? {
        let identifier = create_identifier(&peripheral.address().to_string(), &peripheral.id());
        if identifier.eq_ignore_ascii_case(address) {
            return Ok(Some(peripheral));
        }
    }
    Ok(None)
}
