//! [`Transport`] over btleplug.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use mithermo_types::DeviceAddress;

use crate::error::{Error, Result};
use crate::scan::{find_peripheral, get_adapter};
use crate::traits::{CharacteristicHandle, NotifyCallback, ServiceHandle, Transport};

/// Timeouts applied to the btleplug calls.
#[derive(Debug, Clone)]
pub struct BleConfig {
    /// How long to scan for a peripheral that has not been seen yet.
    pub scan_timeout: Duration,
    pub connection_timeout: Duration,
    pub discovery_timeout: Duration,
    /// Reads, writes and (un)subscribes.
    pub operation_timeout: Duration,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(10),
            discovery_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(5),
        }
    }
}

impl BleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// A link to one peripheral through a btleplug adapter.
///
/// Notification handlers run as tokio tasks over the peripheral's
/// notification stream and are aborted on unsubscribe and disconnect.
pub struct BtleTransport {
    adapter: Adapter,
    config: BleConfig,
    peripheral: Mutex<Option<Peripheral>>,
    notification_tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl std::fmt::Debug for BtleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtleTransport")
            .field("config", &self.config)
            .field("has_peripheral", &self.peripheral.lock().is_some())
            .field("notifying", &self.notification_tasks.lock().len())
            .finish_non_exhaustive()
    }
}

impl BtleTransport {
    /// Use the first Bluetooth adapter.
    pub async fn new() -> Result<Self> {
        Ok(Self::with_adapter(get_adapter().await?, BleConfig::default()))
    }

    pub fn with_adapter(adapter: Adapter, config: BleConfig) -> Self {
        Self {
            adapter,
            config,
            peripheral: Mutex::new(None),
            notification_tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn current(&self) -> Result<Peripheral> {
        self.peripheral.lock().clone().ok_or(Error::NotConnected)
    }

    fn find_characteristic(
        &self,
        peripheral: &Peripheral,
        handle: &CharacteristicHandle,
    ) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.uuid && c.service_uuid == handle.service)
            .ok_or_else(|| Error::characteristic_not_found(handle.uuid, handle.service))
    }

    fn abort_notifications(&self) {
        for (_, task) in self.notification_tasks.lock().drain() {
            task.abort();
        }
    }

    async fn with_timeout<F, R>(&self, operation: &str, fut: F) -> Result<R>
    where
        F: std::future::Future<Output = std::result::Result<R, btleplug::Error>>,
    {
        timeout(self.config.operation_timeout, fut)
            .await
            .map_err(|_| Error::timeout(operation, self.config.operation_timeout))?
            .map_err(Error::from)
    }
}

impl Drop for BtleTransport {
    fn drop(&mut self) {
        self.abort_notifications();
    }
}

fn handle_from(c: &Characteristic) -> CharacteristicHandle {
    CharacteristicHandle {
        uuid: c.uuid,
        service: c.service_uuid,
        can_read: c.properties.contains(CharPropFlags::READ),
        can_write: c
            .properties
            .intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE),
        can_notify: c
            .properties
            .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE),
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn connect(&self, address: &DeviceAddress) -> Result<()> {
        let peripheral = find_peripheral(
            &self.adapter,
            &address.to_string(),
            self.config.scan_timeout,
        )
        .await?;

        timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect", self.config.connection_timeout))??;

        if let Err(e) = timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover_services", self.config.discovery_timeout))
            .and_then(|r| r.map_err(Error::from))
        {
            warn!("Service discovery failed, dropping link: {}", e);
            let _ = peripheral.disconnect().await;
            return Err(e);
        }

        debug!(
            "Connected to {} with {} services",
            address,
            peripheral.services().len()
        );
        *self.peripheral.lock() = Some(peripheral);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        let peripheral = self.peripheral.lock().clone();
        match peripheral {
            Some(p) => p.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.abort_notifications();
        let peripheral = self.peripheral.lock().take();
        if let Some(p) = peripheral
            && p.is_connected().await.unwrap_or(false)
        {
            p.disconnect().await?;
        }
        Ok(())
    }

    async fn service(&self, uuid: Uuid) -> Result<Option<ServiceHandle>> {
        let peripheral = self.current()?;
        Ok(peripheral
            .services()
            .iter()
            .any(|s| s.uuid == uuid)
            .then_some(ServiceHandle { uuid }))
    }

    async fn characteristic(
        &self,
        service: &ServiceHandle,
        uuid: Uuid,
    ) -> Result<Option<CharacteristicHandle>> {
        let peripheral = self.current()?;
        Ok(peripheral
            .characteristics()
            .iter()
            .find(|c| c.uuid == uuid && c.service_uuid == service.uuid)
            .map(handle_from))
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        callback: NotifyCallback,
    ) -> Result<()> {
        let peripheral = self.current()?;
        let c = self.find_characteristic(&peripheral, characteristic)?;
        self.with_timeout("subscribe", peripheral.subscribe(&c))
            .await?;

        let mut stream = peripheral.notifications().await?;
        let uuid = c.uuid;
        let task = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == uuid {
                    callback(&notification.value);
                }
            }
        });

        if let Some(old) = self.notification_tasks.lock().insert(uuid, task) {
            old.abort();
        }
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: &CharacteristicHandle) -> Result<()> {
        if let Some(task) = self.notification_tasks.lock().remove(&characteristic.uuid) {
            task.abort();
        }
        let peripheral = self.current()?;
        let c = self.find_characteristic(&peripheral, characteristic)?;
        self.with_timeout("unsubscribe", peripheral.unsubscribe(&c))
            .await
    }

    async fn read(&self, characteristic: &CharacteristicHandle) -> Result<Vec<u8>> {
        let peripheral = self.current()?;
        let c = self.find_characteristic(&peripheral, characteristic)?;
        self.with_timeout("read", peripheral.read(&c)).await
    }

    async fn write(
        &self,
        characteristic: &CharacteristicHandle,
        data: &[u8],
        with_response: bool,
    ) -> Result<()> {
        let peripheral = self.current()?;
        let c = self.find_characteristic(&peripheral, characteristic)?;
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        timeout(
            self.config.operation_timeout,
            peripheral.write(&c, data, write_type),
        )
        .await
        .map_err(|_| Error::timeout("write", self.config.operation_timeout))?
        .map_err(|e| Error::WriteFailed {
            uuid: c.uuid,
            reason: e.to_string(),
        })
    }
}
