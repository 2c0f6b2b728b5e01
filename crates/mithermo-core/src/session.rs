//! Connection lifecycle of a single thermometer.
//!
//! A [`DeviceSession`] owns one [`Transport`] link and the GATT handles
//! resolved over it. It moves between three link states:
//!
//! ```text
//! Disconnected ──connect──▶ Connected-Unresolved ──ensure_*──▶ Connected-Ready
//!      ▲                                                            │
//!      └───────────────────────── disconnect ◀──────────────────────┘
//! ```
//!
//! with an independent notifying flag per measurement characteristic. The
//! [`ConnectionMode`] decides where the measurement getters take their values
//! from; see its documentation for the table.
//!
//! Every operation that opens, closes or talks over the command channel holds
//! the shared [`TransportLock`] for its whole duration. Getters, advertisement
//! decoding and notification callbacks never take it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use mithermo_types::{
    AdvertisingType, DeviceAddress, DeviceSettings, Measurements, RfTxPower, Smiley,
};

use crate::advertisement::parse_advertisement;
use crate::commands;
use crate::error::{Error, Result};
use crate::gatt::{CharacteristicKind, ServiceKind};
use crate::lock::TransportLock;
use crate::mode::ConnectionMode;
use crate::retry::{Backoff, RetryConfig, is_retryable_connect, with_retry, with_retry_if};
use crate::traits::{CharacteristicHandle, ServiceHandle, Transport};

/// Timing and retry parameters of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Retry policy for establishing the link.
    pub connect_retry: RetryConfig,
    /// Retry policy for the settings round-trip during [`DeviceSession::init`].
    pub settings_retry: RetryConfig,
    /// Pause between subscribing to the command channel and writing to it.
    pub settle_delay: Duration,
    /// How long to wait for the settings notification.
    pub settings_timeout: Duration,
    /// Upper bound between two checks of the settings flag.
    pub poll_interval: Duration,
    /// Stamp every measurement update with the wall-clock time.
    pub time_tracking: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_retry: RetryConfig::for_connect(),
            settings_retry: RetryConfig::for_settings(),
            settle_delay: Duration::from_secs(1),
            settings_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            time_tracking: false,
        }
    }
}

impl SessionConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of connection attempts.
    #[must_use]
    pub fn connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_retry = self.connect_retry.with_attempts(attempts);
        self
    }

    /// Set the constant delay between connection attempts.
    #[must_use]
    pub fn connect_retry_delay(mut self, delay: Duration) -> Self {
        self.connect_retry = self.connect_retry.with_backoff(Backoff::Constant(delay));
        self
    }

    /// Set the number of settings round-trips tried by `init`.
    #[must_use]
    pub fn settings_attempts(mut self, attempts: u32) -> Self {
        self.settings_retry = self.settings_retry.with_attempts(attempts);
        self
    }

    /// Set the delay between subscribing and writing a command.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the settings notification timeout.
    #[must_use]
    pub fn settings_timeout(mut self, timeout: Duration) -> Self {
        self.settings_timeout = timeout;
        self
    }

    /// Set the settings poll granularity.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable time tracking.
    #[must_use]
    pub fn time_tracking(mut self, enabled: bool) -> Self {
        self.time_tracking = enabled;
        self
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_config("poll interval must be non-zero"));
        }
        if self.settings_timeout.is_zero() {
            return Err(Error::invalid_config("settings timeout must be non-zero"));
        }
        Ok(())
    }
}

/// State touched by notification callbacks as well as by the session.
#[derive(Default)]
struct Shared {
    measurements: RwLock<Measurements>,
    settings: RwLock<DeviceSettings>,
    read_settings: AtomicBool,
    received_settings: AtomicBool,
    settings_arrived: Notify,
    time_tracking: AtomicBool,
    last_read_time: Mutex<Option<OffsetDateTime>>,
}

impl Shared {
    fn touch(&self) {
        if self.time_tracking.load(Ordering::Relaxed) {
            *self.last_read_time.lock() = Some(OffsetDateTime::now_utc());
        }
    }

    fn apply_value(&self, kind: CharacteristicKind, value: &[u8]) {
        let result = kind.apply(value, &mut self.measurements.write());
        match result {
            Ok(()) => self.touch(),
            Err(e) => warn!("Ignoring {} value {:02X?}: {}", kind, value, e),
        }
    }

    fn on_settings_frame(&self, data: &[u8]) {
        if data.is_empty() {
            warn!("Received empty settings notification");
            return;
        }
        if data[0] != commands::SETTINGS {
            debug!("Ignoring command notification 0x{:02X}", data[0]);
            return;
        }
        match DeviceSettings::decode(data) {
            Ok(settings) => {
                *self.settings.write() = settings;
                self.read_settings.store(true, Ordering::SeqCst);
                self.received_settings.store(true, Ordering::SeqCst);
                self.settings_arrived.notify_waiters();
                debug!("Settings frame decoded: {:?}", settings);
            }
            Err(e) => warn!("Invalid settings frame: {}", e),
        }
    }
}

/// Resolved handles and notification state; all of it dies with the link.
#[derive(Debug, Default)]
struct HandleCache {
    services: [Option<ServiceHandle>; 3],
    characteristics: [Option<CharacteristicHandle>; 5],
    notifying: [bool; 5],
}

impl HandleCache {
    fn clear(&mut self) {
        *self = HandleCache::default();
    }
}

/// A session with one ATC/PVVX thermometer.
///
/// # Example
///
/// ```no_run
/// use mithermo_core::{BtleTransport, ConnectionMode, DeviceSession};
///
/// # async fn example() -> mithermo_core::Result<()> {
/// let address = "A4:C1:38:0A:1B:2C".parse()?;
/// let transport = BtleTransport::new().await?;
/// let session = DeviceSession::new(address, transport, ConnectionMode::Connection);
///
/// session.init().await?;
/// println!("{:.2} °C", session.temperature_precise().await);
/// println!("{:.2} %", session.humidity().await);
/// # Ok(())
/// # }
/// ```
pub struct DeviceSession<T: Transport> {
    address: DeviceAddress,
    transport: T,
    config: SessionConfig,
    lock: TransportLock,
    mode: Mutex<ConnectionMode>,
    cache: Mutex<HandleCache>,
    shared: Arc<Shared>,
}

impl<T: Transport> fmt::Debug for DeviceSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("address", &self.address)
            .field("mode", &*self.mode.lock())
            .field("read_settings", &self.has_read_settings())
            .field("cache", &*self.cache.lock())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> DeviceSession<T> {
    /// Create a session with the default config and the process-wide lock.
    pub fn new(address: DeviceAddress, transport: T, mode: ConnectionMode) -> Self {
        Self::with_config(address, transport, mode, SessionConfig::default())
    }

    /// Create a session with a custom config.
    pub fn with_config(
        address: DeviceAddress,
        transport: T,
        mode: ConnectionMode,
        config: SessionConfig,
    ) -> Self {
        let shared = Shared::default();
        shared
            .time_tracking
            .store(config.time_tracking, Ordering::Relaxed);
        Self {
            address,
            transport,
            config,
            lock: TransportLock::global(),
            mode: Mutex::new(mode),
            cache: Mutex::new(HandleCache::default()),
            shared: Arc::new(shared),
        }
    }

    /// Use `lock` instead of the process-wide transport lock.
    #[must_use]
    pub fn with_lock(mut self, lock: TransportLock) -> Self {
        self.lock = lock;
        self
    }

    // --- Accessors ---

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        *self.mode.lock()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_lock(&self) -> &TransportLock {
        &self.lock
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    /// Whether a settings frame has ever been decoded.
    pub fn has_read_settings(&self) -> bool {
        self.shared.read_settings.load(Ordering::SeqCst)
    }

    /// Snapshot of the latest values, without I/O.
    pub fn measurements(&self) -> Measurements {
        *self.shared.measurements.read()
    }

    /// Settings as last decoded, without I/O.
    pub fn cached_settings(&self) -> DeviceSettings {
        *self.shared.settings.read()
    }

    /// Whether notifications are running for `kind`.
    pub fn is_notifying(&self, kind: CharacteristicKind) -> bool {
        self.cache.lock().notifying[kind.index()]
    }

    /// Whether `kind` currently has a resolved handle.
    pub fn is_resolved(&self, kind: CharacteristicKind) -> bool {
        self.cache.lock().characteristics[kind.index()].is_some()
    }

    /// Whether `kind` currently has a resolved handle.
    pub fn is_service_resolved(&self, kind: ServiceKind) -> bool {
        self.cache.lock().services[kind.index()].is_some()
    }

    // --- Time tracking ---

    pub fn set_time_tracking(&self, enabled: bool) {
        self.shared.time_tracking.store(enabled, Ordering::Relaxed);
    }

    pub fn time_tracking(&self) -> bool {
        self.shared.time_tracking.load(Ordering::Relaxed)
    }

    /// When a measurement was last updated, if time tracking is on.
    pub fn last_read_time(&self) -> Option<OffsetDateTime> {
        *self.shared.last_read_time.lock()
    }

    // --- Link lifecycle ---

    /// Drop any existing link and connect again.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.lock.acquire().await;
        self.connect_inner().await
    }

    /// Drop the link and forget every handle. Safe to call repeatedly.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    pub async fn disconnect(&self) -> Result<()> {
        let _guard = self.lock.acquire().await;
        self.disconnect_inner().await
    }

    async fn connect_inner(&self) -> Result<()> {
        if self.transport.is_connected().await {
            debug!("Dropping existing link before reconnecting");
            if let Err(e) = self.disconnect_inner().await {
                warn!("Failed to drop existing link: {}", e);
            }
        } else {
            self.cache.lock().clear();
        }

        let retry = &self.config.connect_retry;
        let address = self.address;
        info!("Connecting...");
        let attempt = || self.transport.connect(&address);
        match with_retry_if(retry, "connect", is_retryable_connect, attempt).await {
            Ok(()) => {
                info!("Connected");
                Ok(())
            }
            Err(e) if is_retryable_connect(&e) => {
                warn!("Giving up after {} attempts: {}", retry.attempts(), e);
                Err(Error::connection_failed(address.to_string(), retry.attempts()))
            }
            Err(e) => {
                warn!("Connection failed: {}", e);
                Err(e)
            }
        }
    }

    async fn ensure_connected_inner(&self) -> Result<()> {
        if self.transport.is_connected().await {
            return Ok(());
        }
        self.connect_inner().await
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.transport.is_connected().await {
            return Ok(());
        }
        let _guard = self.lock.acquire().await;
        self.ensure_connected_inner().await
    }

    async fn disconnect_inner(&self) -> Result<()> {
        let result = self.transport.disconnect().await;
        self.cache.lock().clear();
        match &result {
            Ok(()) => debug!("Disconnected"),
            Err(e) => warn!("Disconnect reported an error: {}", e),
        }
        result
    }

    async fn release_link_if_advertising(&self) {
        if self.connection_mode() == ConnectionMode::Advertising
            && let Err(e) = self.disconnect().await
        {
            warn!("Failed to release link: {}", e);
        }
    }

    // --- Handle resolution ---

    /// Resolve a service, using the cache when possible.
    ///
    /// A service the device does not expose yields [`Error::ServiceNotFound`]
    /// and nothing is cached.
    pub async fn ensure_service(&self, kind: ServiceKind) -> Result<ServiceHandle> {
        if let Some(handle) = self.cache.lock().services[kind.index()] {
            return Ok(handle);
        }
        match self.transport.service(kind.uuid()).await? {
            Some(handle) => {
                self.cache.lock().services[kind.index()] = Some(handle);
                Ok(handle)
            }
            None => {
                warn!("Service {} ({}) not found", kind, kind.uuid());
                Err(Error::ServiceNotFound { uuid: kind.uuid() })
            }
        }
    }

    /// Resolve a characteristic and its service, using the cache when possible.
    pub async fn ensure_characteristic(
        &self,
        kind: CharacteristicKind,
    ) -> Result<CharacteristicHandle> {
        if let Some(handle) = self.cache.lock().characteristics[kind.index()] {
            return Ok(handle);
        }
        let service = self.ensure_service(kind.service()).await?;
        match self.transport.characteristic(&service, kind.uuid()).await? {
            Some(handle) => {
                self.cache.lock().characteristics[kind.index()] = Some(handle);
                Ok(handle)
            }
            None => {
                warn!("Characteristic {} ({}) not found", kind, kind.uuid());
                Err(Error::characteristic_not_found(kind.uuid(), service.uuid))
            }
        }
    }

    /// Resolve all three services. Returns the first miss after trying all.
    pub async fn resolve_all_services(&self) -> Result<()> {
        let mut first = None;
        for kind in ServiceKind::ALL {
            keep_first(&mut first, self.ensure_service(kind).await.map(|_| ()));
        }
        first.map_or(Ok(()), Err)
    }

    /// Resolve all five characteristics. Returns the first miss after trying all.
    pub async fn resolve_all_characteristics(&self) -> Result<()> {
        let mut first = None;
        for kind in CharacteristicKind::ALL {
            keep_first(
                &mut first,
                self.ensure_characteristic(kind).await.map(|_| ()),
            );
        }
        first.map_or(Ok(()), Err)
    }

    // --- Notifications ---

    /// Start notifications for one measurement characteristic.
    pub async fn begin_notify_for(&self, kind: CharacteristicKind) -> Result<()> {
        if !kind.is_data() {
            return Err(Error::invalid_config(format!(
                "{kind} characteristic carries no measurement"
            )));
        }
        let handle = self.ensure_characteristic(kind).await?;
        if !handle.can_notify {
            warn!("Characteristic {} cannot notify", kind);
            return Err(Error::NotifyUnsupported { uuid: handle.uuid });
        }

        let shared = Arc::clone(&self.shared);
        self.transport
            .subscribe(
                &handle,
                Box::new(move |value: &[u8]| shared.apply_value(kind, value)),
            )
            .await?;
        self.cache.lock().notifying[kind.index()] = true;
        debug!("Notifications started for {}", kind);
        Ok(())
    }

    /// Stop notifications for one characteristic. A no-op when not running.
    pub async fn stop_notify_for(&self, kind: CharacteristicKind) -> Result<()> {
        let handle = {
            let mut cache = self.cache.lock();
            if !std::mem::replace(&mut cache.notifying[kind.index()], false) {
                return Ok(());
            }
            cache.characteristics[kind.index()]
        };
        if let Some(handle) = handle {
            self.transport.unsubscribe(&handle).await?;
            debug!("Notifications stopped for {}", kind);
        }
        Ok(())
    }

    /// Start notifications for all four measurement characteristics.
    ///
    /// Every characteristic is attempted; the first failure is returned.
    pub async fn begin_notify(&self) -> Result<()> {
        let mut first = None;
        for kind in CharacteristicKind::DATA {
            keep_first(&mut first, self.begin_notify_for(kind).await);
        }
        first.map_or(Ok(()), Err)
    }

    /// Stop notifications for all four measurement characteristics.
    pub async fn stop_notify(&self) -> Result<()> {
        let mut first = None;
        for kind in CharacteristicKind::DATA {
            keep_first(&mut first, self.stop_notify_for(kind).await);
        }
        first.map_or(Ok(()), Err)
    }

    // --- On-demand reads ---

    /// Read one measurement characteristic now, connecting if needed.
    pub async fn read_characteristic(&self, kind: CharacteristicKind) -> Result<()> {
        self.ensure_connected().await?;
        self.read_inner(kind).await
    }

    /// Read all four measurement characteristics now, connecting if needed.
    pub async fn read_all(&self) -> Result<Measurements> {
        self.ensure_connected().await?;
        self.read_all_inner().await?;
        Ok(self.measurements())
    }

    async fn read_inner(&self, kind: CharacteristicKind) -> Result<()> {
        let handle = self.ensure_characteristic(kind).await?;
        let value = self.transport.read(&handle).await?;
        kind.apply(&value, &mut self.shared.measurements.write())?;
        self.shared.touch();
        Ok(())
    }

    async fn read_all_inner(&self) -> Result<()> {
        let mut first = None;
        for kind in CharacteristicKind::DATA {
            keep_first(&mut first, self.read_inner(kind).await);
        }
        first.map_or(Ok(()), Err)
    }

    /// Read `kind` if the current mode requires it.
    async fn refresh(&self, kind: CharacteristicKind) {
        let should_read = match self.connection_mode() {
            ConnectionMode::Advertising => false,
            ConnectionMode::Notification => !self.is_notifying(kind),
            ConnectionMode::Connection => true,
        };
        if should_read && let Err(e) = self.read_characteristic(kind).await {
            warn!("Could not read {}: {}", kind, e);
        }
    }

    // --- Measurement getters ---

    /// Temperature in °C at 0.1 resolution.
    ///
    /// In advertising mode formats without the legacy field report the
    /// precise value rounded to one decimal.
    pub async fn temperature(&self) -> f32 {
        if self.connection_mode() == ConnectionMode::Advertising {
            let m = self.measurements();
            return if self.advertising_type() == AdvertisingType::Atc1441 {
                m.temperature
            } else {
                (m.temperature_precise * 10.0).round() / 10.0
            };
        }
        self.refresh(CharacteristicKind::Temperature).await;
        self.measurements().temperature
    }

    /// Temperature in °C at 0.01 resolution.
    ///
    /// ATC1441 advertisements only carry 0.1 °C, which is returned instead.
    pub async fn temperature_precise(&self) -> f32 {
        if self.connection_mode() == ConnectionMode::Advertising {
            let m = self.measurements();
            return if self.advertising_type() == AdvertisingType::Atc1441 {
                m.temperature
            } else {
                m.temperature_precise
            };
        }
        self.refresh(CharacteristicKind::TemperaturePrecise).await;
        self.measurements().temperature_precise
    }

    /// Relative humidity in %.
    pub async fn humidity(&self) -> f32 {
        self.refresh(CharacteristicKind::Humidity).await;
        self.measurements().humidity
    }

    /// Battery level in %.
    pub async fn battery_level(&self) -> u8 {
        self.refresh(CharacteristicKind::BatteryLevel).await;
        self.measurements().battery_level
    }

    /// Battery voltage in mV.
    ///
    /// Only advertisements carry a measured voltage. Over GATT it is
    /// estimated linearly from the level, 0 % = 2000 mV and 100 % = 3000 mV.
    pub async fn battery_voltage(&self) -> u16 {
        if self.connection_mode() == ConnectionMode::Advertising {
            return self.measurements().battery_mv;
        }
        self.refresh(CharacteristicKind::BatteryLevel).await;
        2000 + u16::from(self.measurements().battery_level) * 10
    }

    fn advertising_type(&self) -> AdvertisingType {
        self.shared.settings.read().advertising_type
    }

    // --- Advertisements ---

    /// Decode an advertisement from this device.
    ///
    /// The format depends on the device's settings, so until they have been
    /// read the packet is not decoded; a settings round-trip runs instead.
    pub async fn handle_advertisement(&self, payload: &[u8]) -> Result<()> {
        if !self.has_read_settings() {
            info!(address = %self.address, "Settings unknown, reading them before decoding advertisements");
            let result = self.read_settings().await.map(|_| ());
            self.release_link_if_advertising().await;
            return result;
        }

        let kind = self.advertising_type();
        let result = parse_advertisement(kind, payload, &mut self.shared.measurements.write());
        match result {
            Ok(()) => {
                self.shared.touch();
                Ok(())
            }
            Err(e) => {
                warn!(address = %self.address, "Dropping {} advertisement: {}", kind, e);
                Err(e)
            }
        }
    }

    // --- Settings round-trips ---

    /// Ask the device for its settings.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    pub async fn read_settings(&self) -> Result<DeviceSettings> {
        let _guard = self.lock.acquire().await;
        self.settings_round_trip(&[commands::SETTINGS], "read_settings")
            .await?;
        Ok(self.cached_settings())
    }

    /// Write `settings` to the device and adopt the echo it sends back.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    pub async fn send_settings(&self, settings: &DeviceSettings) -> Result<DeviceSettings> {
        let _guard = self.lock.acquire().await;
        self.settings_round_trip(&settings.encode(), "send_settings")
            .await?;
        Ok(self.cached_settings())
    }

    /// Restore factory settings and read them back.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address))]
    pub async fn reset_settings(&self) -> Result<DeviceSettings> {
        let _guard = self.lock.acquire().await;
        self.send_command(&[commands::RESET_SETTINGS]).await?;
        self.shared.read_settings.store(false, Ordering::SeqCst);
        self.shared.received_settings.store(false, Ordering::SeqCst);
        info!("Settings reset");
        self.settings_round_trip(&[commands::SETTINGS], "read_settings")
            .await?;
        Ok(self.cached_settings())
    }

    /// Settings, read from the device first if they were never read.
    ///
    /// On failure the defaults (or the last decoded values) are returned.
    pub async fn settings(&self) -> DeviceSettings {
        if !self.has_read_settings() {
            if let Err(e) = self.read_settings().await {
                warn!(address = %self.address, "Could not read settings: {}", e);
            }
            self.release_link_if_advertising().await;
        }
        self.cached_settings()
    }

    async fn send_command(&self, payload: &[u8]) -> Result<()> {
        self.ensure_connected_inner().await?;
        let command = self.ensure_characteristic(CharacteristicKind::Command).await?;
        self.transport.write(&command, payload, true).await
    }

    async fn settings_round_trip(&self, payload: &[u8], operation: &str) -> Result<()> {
        self.ensure_connected_inner().await?;
        let command = self.ensure_characteristic(CharacteristicKind::Command).await?;
        if !command.can_notify {
            warn!("Command characteristic cannot notify");
            return Err(Error::NotifyUnsupported { uuid: command.uuid });
        }

        self.shared.received_settings.store(false, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        self.transport
            .subscribe(
                &command,
                Box::new(move |data: &[u8]| shared.on_settings_frame(data)),
            )
            .await?;

        let result = async {
            sleep(self.config.settle_delay).await;
            self.transport.write(&command, payload, true).await?;
            self.wait_for_settings(operation).await
        }
        .await;

        if let Err(e) = self.transport.unsubscribe(&command).await {
            warn!("Failed to unsubscribe from command channel: {}", e);
        }
        result
    }

    async fn wait_for_settings(&self, operation: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.settings_timeout;
        loop {
            let arrived = self.shared.settings_arrived.notified();
            if self.shared.received_settings.load(Ordering::SeqCst) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("No settings notification within {:?}", self.config.settings_timeout);
                return Err(Error::timeout(operation, self.config.settings_timeout));
            }
            let step = (deadline - now).min(self.config.poll_interval);
            let _ = timeout(step, arrived).await;
        }
    }

    /// Named setters are thin wrappers over this: read the current settings
    /// (from the device if never read), change them and send them back.
    pub async fn try_update_settings<F>(&self, f: F) -> Result<DeviceSettings>
    where
        F: FnOnce(&mut DeviceSettings) -> Result<()>,
    {
        let result = async {
            let mut settings = if self.has_read_settings() {
                self.cached_settings()
            } else {
                self.read_settings().await?
            };
            f(&mut settings)?;
            self.send_settings(&settings).await
        }
        .await;
        self.release_link_if_advertising().await;
        result
    }

    /// Infallible variant of [`try_update_settings`](Self::try_update_settings).
    pub async fn update_settings<F>(&self, f: F) -> Result<DeviceSettings>
    where
        F: FnOnce(&mut DeviceSettings),
    {
        self.try_update_settings(|s| {
            f(s);
            Ok(())
        })
        .await
    }

    // --- Named setters ---

    pub async fn set_low_power_measures(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.lp_measures = enabled).await
    }

    pub async fn set_transmit_measures(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.tx_measures = enabled).await
    }

    pub async fn set_show_battery(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.show_battery = enabled).await
    }

    /// `true` shows °F on the display.
    pub async fn set_temp_f_or_c(&self, fahrenheit: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.temp_f_or_c = fahrenheit).await
    }

    pub async fn set_blinking_time_smile(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.blinking_time_smile = enabled).await
    }

    pub async fn set_comfort_smiley(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.comfort_smiley = enabled).await
    }

    pub async fn set_adv_crypto(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.adv_crypto = enabled).await
    }

    pub async fn set_adv_flags(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.adv_flags = enabled).await
    }

    pub async fn set_bt5phy(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.bt5phy = enabled).await
    }

    pub async fn set_long_range(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.long_range = enabled).await
    }

    pub async fn set_screen_off(&self, enabled: bool) -> Result<DeviceSettings> {
        self.update_settings(|s| s.screen_off = enabled).await
    }

    pub async fn set_advertising_type(&self, kind: AdvertisingType) -> Result<DeviceSettings> {
        self.update_settings(|s| s.advertising_type = kind).await
    }

    pub async fn set_smiley(&self, smiley: Smiley) -> Result<DeviceSettings> {
        self.update_settings(|s| s.smiley = smiley).await
    }

    /// Temperature offset in °C, 0.1 resolution, ±12.7.
    pub async fn set_temp_offset(&self, offset: f32) -> Result<DeviceSettings> {
        self.update_settings(|s| s.temp_offset = offset).await
    }

    /// Humidity offset in %, 0.1 resolution, ±12.7.
    pub async fn set_humidity_offset(&self, offset: f32) -> Result<DeviceSettings> {
        self.update_settings(|s| s.humidity_offset = offset).await
    }

    pub async fn set_advertising_interval_steps(&self, steps: u8) -> Result<DeviceSettings> {
        self.update_settings(|s| s.advertising_interval = steps).await
    }

    pub async fn set_advertising_interval_ms(&self, ms: u16) -> Result<DeviceSettings> {
        self.update_settings(|s| s.set_advertising_interval_ms(ms))
            .await
    }

    pub async fn set_measure_interval_steps(&self, steps: u8) -> Result<DeviceSettings> {
        self.update_settings(|s| s.measure_interval = steps).await
    }

    pub async fn set_measure_interval_ms(&self, ms: u32) -> Result<DeviceSettings> {
        self.try_update_settings(|s| Ok(s.set_measure_interval_ms(ms)?))
            .await
    }

    pub async fn set_rf_tx_power(&self, power: RfTxPower) -> Result<DeviceSettings> {
        self.update_settings(|s| s.rf_tx_power = power).await
    }

    /// Pick the table entry closest to `dbm`.
    pub async fn set_rf_tx_power_dbm(&self, dbm: f32) -> Result<DeviceSettings> {
        self.update_settings(|s| s.set_rf_tx_power_dbm(dbm)).await
    }

    pub async fn set_connect_latency_steps(&self, steps: u8) -> Result<DeviceSettings> {
        self.update_settings(|s| s.connect_latency = steps).await
    }

    pub async fn set_connect_latency_ms(&self, ms: u16) -> Result<DeviceSettings> {
        self.update_settings(|s| s.set_connect_latency_ms(ms)).await
    }

    pub async fn set_lcd_update_interval_steps(&self, steps: u8) -> Result<DeviceSettings> {
        self.update_settings(|s| s.lcd_update_interval = steps).await
    }

    pub async fn set_lcd_update_interval_ms(&self, ms: u16) -> Result<DeviceSettings> {
        self.update_settings(|s| s.set_lcd_update_interval_ms(ms))
            .await
    }

    pub async fn set_averaging_measurements_steps(&self, steps: u8) -> Result<DeviceSettings> {
        self.update_settings(|s| s.averaging_measurements = steps)
            .await
    }

    pub async fn set_averaging_measurements_ms(&self, ms: u32) -> Result<DeviceSettings> {
        self.try_update_settings(|s| Ok(s.set_averaging_measurements_ms(ms)?))
            .await
    }

    pub async fn set_averaging_measurements_sec(&self, sec: u32) -> Result<DeviceSettings> {
        self.try_update_settings(|s| Ok(s.set_averaging_measurements_sec(sec)?))
            .await
    }

    // --- Clock ---

    /// Set the device clock to `epoch_seconds` (Unix time).
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address, epoch_seconds = epoch_seconds))]
    pub async fn set_clock(&self, epoch_seconds: u32) -> Result<()> {
        let _guard = self.lock.acquire().await;
        self.send_command(&commands::set_clock(epoch_seconds))
            .await?;
        info!("Clock set");
        Ok(())
    }

    /// Set the device clock to `datetime`.
    ///
    /// The firmware keeps a 32-bit counter, so only 1970..2106 is accepted.
    pub async fn set_clock_datetime(&self, datetime: OffsetDateTime) -> Result<()> {
        let epoch = u32::try_from(datetime.unix_timestamp()).map_err(|_| {
            Error::invalid_config(format!("{datetime} does not fit a 32-bit epoch"))
        })?;
        self.set_clock(epoch).await
    }

    /// Set the device clock to the current time.
    pub async fn set_clock_now(&self) -> Result<()> {
        self.set_clock_datetime(OffsetDateTime::now_utc()).await
    }

    // --- Orchestration ---

    /// Bring the session up in its current mode.
    ///
    /// Connects, reads the settings (several attempts, dropping the link
    /// between failures), then sets up the mode: advertising releases the
    /// link, notification subscribes to all four measurements, connection
    /// reads them once.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address, mode = %self.connection_mode()))]
    pub async fn init(&self) -> Result<()> {
        {
            let _guard = self.lock.acquire().await;
            self.ensure_connected_inner().await?;

            let this = self;
            with_retry(&self.config.settings_retry, "read_settings", || async move {
                let result = this
                    .settings_round_trip(&[commands::SETTINGS], "read_settings")
                    .await;
                if result.is_err()
                    && let Err(e) = this.disconnect_inner().await
                {
                    warn!("Failed to drop link after a failed settings read: {}", e);
                }
                result
            })
            .await?;
        }
        info!("Settings read");

        match self.connection_mode() {
            ConnectionMode::Advertising => self.disconnect().await,
            ConnectionMode::Notification => {
                if let Err(e) = self.resolve_all_services().await {
                    debug!("Not every service is available: {}", e);
                }
                if let Err(e) = self.resolve_all_characteristics().await {
                    debug!("Not every characteristic is available: {}", e);
                }
                self.begin_notify().await
            }
            ConnectionMode::Connection => self.read_all_inner().await,
        }
    }

    /// Switch to `mode`, tearing down what the old mode set up first.
    ///
    /// The new mode is recorded even if setting it up fails.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.address, mode = %mode))]
    pub async fn set_connection_mode(&self, mode: ConnectionMode) -> Result<()> {
        let current = self.connection_mode();
        if current == mode {
            return Ok(());
        }
        info!(from = %current, "Changing connection mode");

        if current == ConnectionMode::Notification
            && let Err(e) = self.stop_notify().await
        {
            warn!("Failed to stop notifications: {}", e);
        }
        *self.mode.lock() = mode;

        match (current, mode) {
            (ConnectionMode::Advertising, ConnectionMode::Notification) => {
                self.connect().await?;
                self.begin_notify().await
            }
            (_, ConnectionMode::Connection) => {
                self.connect().await?;
                self.read_all_inner().await
            }
            (_, ConnectionMode::Advertising) => self.disconnect().await,
            (ConnectionMode::Connection, ConnectionMode::Notification) => {
                self.ensure_connected().await?;
                self.begin_notify().await
            }
            (ConnectionMode::Notification, ConnectionMode::Notification) => Ok(()),
        }
    }
}

fn keep_first(first: &mut Option<Error>, result: Result<()>) {
    if let Err(e) = result {
        debug!("{}", e);
        first.get_or_insert(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.connect_retry.attempts(), 5);
        assert_eq!(config.settings_retry.attempts(), 5);
        assert_eq!(config.settle_delay, Duration::from_secs(1));
        assert_eq!(config.settings_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert!(!config.time_tracking);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_session_config_builders() {
        let config = SessionConfig::new()
            .connect_attempts(3)
            .connect_retry_delay(Duration::from_millis(250))
            .settings_attempts(1)
            .settle_delay(Duration::ZERO)
            .time_tracking(true);
        assert_eq!(config.connect_retry.attempts(), 3);
        assert_eq!(
            config.connect_retry.backoff,
            Backoff::Constant(Duration::from_millis(250))
        );
        assert_eq!(config.settings_retry.attempts(), 1);
        assert!(config.settle_delay.is_zero());
        assert!(config.time_tracking);
    }

    #[test]
    fn test_session_config_validation() {
        assert!(
            SessionConfig::new()
                .poll_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            SessionConfig::new()
                .settings_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_settings_frame_sets_flags() {
        let shared = Shared::default();
        shared.on_settings_frame(&[0x56]);
        assert!(!shared.read_settings.load(Ordering::SeqCst));

        shared.on_settings_frame(&[0x55, 0x0A, 0x03]);
        assert!(!shared.read_settings.load(Ordering::SeqCst));

        shared.on_settings_frame(&crate::mock::DEFAULT_SETTINGS_FRAME);
        assert!(shared.read_settings.load(Ordering::SeqCst));
        assert!(shared.received_settings.load(Ordering::SeqCst));
        assert_eq!(
            shared.settings.read().advertising_type,
            AdvertisingType::Pvvx
        );
    }
}
