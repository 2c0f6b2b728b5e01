//! Mock transport for testing.
//!
//! [`MockTransport`] behaves like a thermometer running the custom firmware,
//! without requiring actual BLE hardware:
//!
//! - **GATT tree**: the three services and five characteristics, each of
//!   which can be removed or given other capabilities
//! - **Command channel**: `0x55` is answered with the configured settings
//!   frame, settings writes are echoed back, `0x56` restores the factory frame
//! - **Failure injection**: fail the next N connects, or all of them
//! - **Inspection**: every write is recorded; notifications can be pushed
//!
//! Notifications are delivered synchronously from within `write` or
//! [`MockTransport::notify`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use mithermo_types::{DeviceAddress, uuids};

use crate::commands;
use crate::error::{Error, Result};
use crate::traits::{CharacteristicHandle, NotifyCallback, ServiceHandle, Transport};

/// Settings frame answered by a fresh mock: PVVX advertising, battery shown,
/// 2.5 s advertising, RF code 169, hardware B1.4.
pub const DEFAULT_SETTINGS_FRAME: [u8; 13] = [
    0x55, 0x0A, 0x21, 0x00, 0x00, 0x00, 40, 10, 169, 49, 20, 0x00, 4,
];

type SharedCallback = Arc<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// A mock thermometer link.
///
/// # Example
///
/// ```
/// use mithermo_core::{ConnectionMode, DeviceSession, MockTransport, TransportLock};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let mock = Arc::new(MockTransport::thermometer());
///     let session = DeviceSession::new(
///         "A4:C1:38:00:00:01".parse().unwrap(),
///         Arc::clone(&mock),
///         ConnectionMode::Connection,
///     )
///     .with_lock(TransportLock::new());
///
///     let m = session.read_all().await.unwrap();
///     assert_eq!(m.battery_level, 87);
///     assert_eq!(mock.connect_count(), 1);
/// }
/// ```
pub struct MockTransport {
    connected: AtomicBool,
    services: RwLock<Vec<(Uuid, Vec<CharacteristicHandle>)>>,
    values: RwLock<HashMap<Uuid, Vec<u8>>>,
    subscriptions: Mutex<HashMap<Uuid, SharedCallback>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    settings_frame: RwLock<Vec<u8>>,
    factory_frame: RwLock<Vec<u8>>,
    answer_settings: AtomicBool,
    connect_count: AtomicU32,
    read_count: AtomicU32,
    remaining_connect_failures: AtomicU32,
    fail_connect: AtomicBool,
    out_of_range: AtomicBool,
    fail_disconnect: AtomicBool,
    connect_attempts: AtomicU32,
    last_address: Mutex<Option<DeviceAddress>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("connect_count", &self.connect_count.load(Ordering::Relaxed))
            .field("writes", &self.writes.lock().len())
            .finish()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::thermometer()
    }
}

impl MockTransport {
    /// A mock without any services.
    pub fn empty() -> Self {
        Self {
            connected: AtomicBool::new(false),
            services: RwLock::new(Vec::new()),
            values: RwLock::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            settings_frame: RwLock::new(DEFAULT_SETTINGS_FRAME.to_vec()),
            factory_frame: RwLock::new(DEFAULT_SETTINGS_FRAME.to_vec()),
            answer_settings: AtomicBool::new(true),
            connect_count: AtomicU32::new(0),
            read_count: AtomicU32::new(0),
            remaining_connect_failures: AtomicU32::new(0),
            fail_connect: AtomicBool::new(false),
            out_of_range: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            connect_attempts: AtomicU32::new(0),
            last_address: Mutex::new(None),
        }
    }

    /// A mock with the full GATT tree and plausible values:
    /// 21.5 °C, 21.47 °C, 55.25 %, 87 %.
    pub fn thermometer() -> Self {
        let mock = Self::empty();
        let data = |uuid, service| CharacteristicHandle {
            uuid,
            service,
            can_read: true,
            can_write: false,
            can_notify: true,
        };
        let ess = uuids::ENVIRONMENTAL_SENSING_SERVICE;
        mock.add_service(
            ess,
            vec![
                data(uuids::TEMPERATURE, ess),
                data(uuids::TEMPERATURE_PRECISE, ess),
                data(uuids::HUMIDITY, ess),
            ],
        );
        mock.add_service(
            uuids::BATTERY_SERVICE,
            vec![data(uuids::BATTERY_LEVEL, uuids::BATTERY_SERVICE)],
        );
        mock.add_service(
            uuids::COMMAND_SERVICE,
            vec![CharacteristicHandle {
                uuid: uuids::COMMAND,
                service: uuids::COMMAND_SERVICE,
                can_read: false,
                can_write: true,
                can_notify: true,
            }],
        );

        mock.set_value(uuids::TEMPERATURE, 215i16.to_le_bytes().to_vec());
        mock.set_value(uuids::TEMPERATURE_PRECISE, 2147i16.to_le_bytes().to_vec());
        mock.set_value(uuids::HUMIDITY, 5525u16.to_le_bytes().to_vec());
        mock.set_value(uuids::BATTERY_LEVEL, vec![87]);
        mock
    }

    // --- GATT tree scripting ---

    /// Add (or replace) a service with its characteristics.
    pub fn add_service(&self, uuid: Uuid, characteristics: Vec<CharacteristicHandle>) {
        let mut services = self.services.write();
        services.retain(|(u, _)| *u != uuid);
        services.push((uuid, characteristics));
    }

    /// Remove a service and everything in it.
    pub fn remove_service(&self, uuid: Uuid) {
        self.services.write().retain(|(u, _)| *u != uuid);
    }

    /// Remove a characteristic from whichever service holds it.
    pub fn remove_characteristic(&self, uuid: Uuid) {
        for (_, chars) in self.services.write().iter_mut() {
            chars.retain(|c| c.uuid != uuid);
        }
    }

    /// Change the notify capability of a characteristic.
    pub fn set_can_notify(&self, uuid: Uuid, can_notify: bool) {
        for (_, chars) in self.services.write().iter_mut() {
            for c in chars.iter_mut().filter(|c| c.uuid == uuid) {
                c.can_notify = can_notify;
            }
        }
    }

    /// Set the value returned by reads of `uuid`.
    pub fn set_value(&self, uuid: Uuid, value: Vec<u8>) {
        self.values.write().insert(uuid, value);
    }

    // --- Command channel scripting ---

    /// Frame sent in answer to a settings read.
    pub fn set_settings_frame(&self, frame: Vec<u8>) {
        *self.settings_frame.write() = frame;
    }

    /// Current settings frame, updated by settings writes.
    pub fn settings_frame(&self) -> Vec<u8> {
        self.settings_frame.read().clone()
    }

    /// Frame restored by a reset command.
    pub fn set_factory_frame(&self, frame: Vec<u8>) {
        *self.factory_frame.write() = frame;
    }

    /// Whether settings reads and writes are answered at all.
    pub fn set_answer_settings(&self, answer: bool) {
        self.answer_settings.store(answer, Ordering::Relaxed);
    }

    // --- Failure injection ---

    /// Fail the next `count` connects.
    pub fn set_connect_failures(&self, count: u32) {
        self.remaining_connect_failures
            .store(count, Ordering::Relaxed);
    }

    /// Fail every connect.
    pub fn set_should_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Pretend the device is not advertising: connects report it not found.
    pub fn set_out_of_range(&self, out_of_range: bool) {
        self.out_of_range.store(out_of_range, Ordering::Relaxed);
    }

    /// Make `disconnect` fail after dropping the link.
    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::Relaxed);
    }

    /// Drop the link as if the device went out of range.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::Relaxed);
        self.subscriptions.lock().clear();
    }

    // --- Inspection ---

    /// Number of successful connects.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Number of connect calls, failed ones included.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Number of successful characteristic reads.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::Relaxed)
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.writes.lock().clone()
    }

    /// Writes to the command characteristic.
    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .iter()
            .filter(|(uuid, _)| *uuid == uuids::COMMAND)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn is_subscribed(&self, uuid: Uuid) -> bool {
        self.subscriptions.lock().contains_key(&uuid)
    }

    /// Address passed to the last connect.
    pub fn last_address(&self) -> Option<DeviceAddress> {
        *self.last_address.lock()
    }

    /// Deliver a notification. Returns whether anyone was subscribed.
    pub fn notify(&self, uuid: Uuid, value: &[u8]) -> bool {
        let callback = self.subscriptions.lock().get(&uuid).cloned();
        match callback {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn find_characteristic(&self, uuid: Uuid) -> Option<CharacteristicHandle> {
        self.services
            .read()
            .iter()
            .flat_map(|(_, chars)| chars.iter())
            .find(|c| c.uuid == uuid)
            .copied()
    }

    fn handle_command(&self, data: &[u8]) {
        match data {
            [commands::SETTINGS] => {
                if self.answer_settings.load(Ordering::Relaxed) {
                    let frame = self.settings_frame();
                    self.notify(uuids::COMMAND, &frame);
                }
            }
            [commands::SETTINGS, commands::SETTINGS_LENGTH, packed @ ..] if packed.len() == 10 => {
                // The echo carries the hardware id between the LCD interval
                // and the averaging byte.
                let hw_version = self.settings_frame.read().get(11).copied().unwrap_or(0);
                let mut frame = vec![commands::SETTINGS, commands::SETTINGS_LENGTH];
                frame.extend_from_slice(&packed[..9]);
                frame.push(hw_version);
                frame.push(packed[9]);
                self.set_settings_frame(frame.clone());
                if self.answer_settings.load(Ordering::Relaxed) {
                    self.notify(uuids::COMMAND, &frame);
                }
            }
            [commands::RESET_SETTINGS] => {
                let factory = self.factory_frame.read().clone();
                self.set_settings_frame(factory);
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &DeviceAddress) -> Result<()> {
        // Yield like a real stack would
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);

        if self.out_of_range.load(Ordering::Relaxed) {
            return Err(Error::DeviceNotFound(address.to_string()));
        }
        if self.remaining_connect_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_connect_failures
                .fetch_sub(1, Ordering::Relaxed);
            return Err(Error::connection_failed(address.to_string(), 1));
        }
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::connection_failed(address.to_string(), 1));
        }

        *self.last_address.lock() = Some(*address);
        self.connected.store(true, Ordering::Relaxed);
        self.connect_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn disconnect(&self) -> Result<()> {
        self.drop_link();
        if self.fail_disconnect.load(Ordering::Relaxed) {
            return Err(Error::InvalidData("disconnect refused".to_string()));
        }
        Ok(())
    }

    async fn service(&self, uuid: Uuid) -> Result<Option<ServiceHandle>> {
        self.check_connected()?;
        Ok(self
            .services
            .read()
            .iter()
            .any(|(u, _)| *u == uuid)
            .then_some(ServiceHandle { uuid }))
    }

    async fn characteristic(
        &self,
        service: &ServiceHandle,
        uuid: Uuid,
    ) -> Result<Option<CharacteristicHandle>> {
        self.check_connected()?;
        Ok(self
            .services
            .read()
            .iter()
            .filter(|(u, _)| *u == service.uuid)
            .flat_map(|(_, chars)| chars.iter())
            .find(|c| c.uuid == uuid)
            .copied())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        callback: NotifyCallback,
    ) -> Result<()> {
        self.check_connected()?;
        match self.find_characteristic(characteristic.uuid) {
            Some(c) if c.can_notify => {
                self.subscriptions
                    .lock()
                    .insert(c.uuid, Arc::from(callback));
                Ok(())
            }
            Some(c) => Err(Error::NotifyUnsupported { uuid: c.uuid }),
            None => Err(Error::characteristic_not_found(
                characteristic.uuid,
                characteristic.service,
            )),
        }
    }

    async fn unsubscribe(&self, characteristic: &CharacteristicHandle) -> Result<()> {
        self.check_connected()?;
        self.subscriptions.lock().remove(&characteristic.uuid);
        Ok(())
    }

    async fn read(&self, characteristic: &CharacteristicHandle) -> Result<Vec<u8>> {
        self.check_connected()?;
        let value = self
            .values
            .read()
            .get(&characteristic.uuid)
            .cloned()
            .ok_or_else(|| {
                Error::InvalidData(format!("no value scripted for {}", characteristic.uuid))
            })?;
        self.read_count.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    async fn write(
        &self,
        characteristic: &CharacteristicHandle,
        data: &[u8],
        _with_response: bool,
    ) -> Result<()> {
        self.check_connected()?;
        self.writes
            .lock()
            .push((characteristic.uuid, data.to_vec()));
        if characteristic.uuid == uuids::COMMAND {
            self.handle_command(data);
        }
        Ok(())
    }
}
