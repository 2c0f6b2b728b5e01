//! Trait abstraction over the BLE GATT client.
//!
//! [`DeviceSession`](crate::DeviceSession) never talks to btleplug directly.
//! It drives a [`Transport`], which lets the state machine run against
//! [`BtleTransport`](crate::ble::BtleTransport) on real hardware and against
//! [`MockTransport`](crate::mock::MockTransport) in tests.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use mithermo_types::DeviceAddress;

use crate::error::Result;

/// Callback invoked with the raw value of every notification.
///
/// Runs on a transport task, so it must not block.
pub type NotifyCallback = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// A resolved GATT service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    pub uuid: Uuid,
}

/// A resolved GATT characteristic and what it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    pub uuid: Uuid,
    /// UUID of the service the characteristic belongs to.
    pub service: Uuid,
    pub can_read: bool,
    pub can_write: bool,
    pub can_notify: bool,
}

/// GATT client operations needed by a thermometer session.
///
/// Implementations own a single link. Lookups return `Ok(None)` when the
/// remote simply does not expose the UUID, and `Err` for link failures.
///
/// # Example
///
/// ```ignore
/// use mithermo_core::{Transport, Result};
/// use mithermo_types::uuids;
///
/// async fn battery<T: Transport>(t: &T) -> Result<Option<u8>> {
///     let Some(service) = t.service(uuids::BATTERY_SERVICE).await? else {
///         return Ok(None);
///     };
///     let Some(level) = t.characteristic(&service, uuids::BATTERY_LEVEL).await? else {
///         return Ok(None);
///     };
///     Ok(t.read(&level).await?.first().copied())
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a link and discover the GATT tree.
    async fn connect(&self, address: &DeviceAddress) -> Result<()>;

    /// Whether the link is currently up.
    async fn is_connected(&self) -> bool;

    /// Drop the link. Succeeds when already disconnected.
    async fn disconnect(&self) -> Result<()>;

    /// Look up a primary service.
    async fn service(&self, uuid: Uuid) -> Result<Option<ServiceHandle>>;

    /// Look up a characteristic inside `service`.
    async fn characteristic(
        &self,
        service: &ServiceHandle,
        uuid: Uuid,
    ) -> Result<Option<CharacteristicHandle>>;

    /// Enable notifications and route every value to `callback`.
    ///
    /// Subscribing again replaces the previous callback.
    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        callback: NotifyCallback,
    ) -> Result<()>;

    /// Disable notifications and drop the callback.
    async fn unsubscribe(&self, characteristic: &CharacteristicHandle) -> Result<()>;

    /// Read the current value.
    async fn read(&self, characteristic: &CharacteristicHandle) -> Result<Vec<u8>>;

    /// Write a value.
    async fn write(
        &self,
        characteristic: &CharacteristicHandle,
        data: &[u8],
        with_response: bool,
    ) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn connect(&self, address: &DeviceAddress) -> Result<()> {
        (**self).connect(address).await
    }

    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }

    async fn service(&self, uuid: Uuid) -> Result<Option<ServiceHandle>> {
        (**self).service(uuid).await
    }

    async fn characteristic(
        &self,
        service: &ServiceHandle,
        uuid: Uuid,
    ) -> Result<Option<CharacteristicHandle>> {
        (**self).characteristic(service, uuid).await
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        callback: NotifyCallback,
    ) -> Result<()> {
        (**self).subscribe(characteristic, callback).await
    }

    async fn unsubscribe(&self, characteristic: &CharacteristicHandle) -> Result<()> {
        (**self).unsubscribe(characteristic).await
    }

    async fn read(&self, characteristic: &CharacteristicHandle) -> Result<Vec<u8>> {
        (**self).read(characteristic).await
    }

    async fn write(
        &self,
        characteristic: &CharacteristicHandle,
        data: &[u8],
        with_response: bool,
    ) -> Result<()> {
        (**self).write(characteristic, data, with_response).await
    }
}
