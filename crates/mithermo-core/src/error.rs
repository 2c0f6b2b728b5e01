//! Error types for mithermo-core.
//!
//! This module defines all error types that can occur when talking to a
//! thermometer over Bluetooth Low Energy or decoding what it sends.
//!
//! # Error Recovery Strategies
//!
//! Nothing in this crate is fatal. Every failure leaves the session in a
//! usable state, so the usual recovery is simply to try again later.
//!
//! | Error Type | Strategy | Rationale |
//! |------------|----------|-----------|
//! | [`Error::Timeout`] | Retry | Settings notification did not arrive in time |
//! | [`Error::Bluetooth`] | Retry, then reconnect | May be transient or connection lost |
//! | [`Error::NotConnected`] | Reconnect | Link was dropped |
//! | [`Error::ConnectionFailed`] | Retry later | Device out of range or busy |
//! | [`Error::ServiceNotFound`] | Do not retry | Firmware does not expose the service |
//! | [`Error::CharacteristicNotFound`] | Do not retry | Firmware does not expose the characteristic |
//! | [`Error::NotifyUnsupported`] | Do not retry | Characteristic cannot notify |
//! | [`Error::InvalidAdvertisement`] | Drop the packet | Payload does not match the selected format |
//! | [`Error::Parse`] | Drop the value | Short or malformed frame |
//! | [`Error::InvalidConfig`] | Do not retry | Fix the argument |
//!
//! ## Using RetryConfig
//!
//! ```ignore
//! use mithermo_core::{RetryConfig, with_retry};
//!
//! let config = RetryConfig::for_connect();
//! with_retry(&config, "connect", || async { transport.connect(&address).await }).await?;
//! ```

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when communicating with thermometers.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No adapter, or the device never showed up in a scan.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Operation attempted while not connected to device.
    #[error("Not connected to device")]
    NotConnected,

    /// All connection attempts failed.
    #[error("Failed to connect to {address} after {attempts} attempts")]
    ConnectionFailed {
        /// The address that could not be reached.
        address: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Required GATT service not found on device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The missing service.
        uuid: Uuid,
    },

    /// Required GATT characteristic not found on device.
    #[error("Characteristic not found: {uuid} (in service {service})")]
    CharacteristicNotFound {
        /// The missing characteristic.
        uuid: Uuid,
        /// The service that was searched.
        service: Uuid,
    },

    /// The characteristic does not support notifications.
    #[error("Characteristic {uuid} cannot notify")]
    NotifyUnsupported {
        /// The characteristic.
        uuid: Uuid,
    },

    /// Failed to interpret data received from the device.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Advertisement payload does not match the expected format.
    #[error("Invalid {format} advertisement: {reason}")]
    InvalidAdvertisement {
        /// Advertisement format that was being parsed.
        format: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Write operation failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: Uuid,
        /// The reason for the failure.
        reason: String,
    },

    /// Invalid configuration or argument.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Payload decoding error.
    #[error(transparent)]
    Parse(#[from] mithermo_types::ParseError),
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a connection failure error.
    pub fn connection_failed(address: impl Into<String>, attempts: u32) -> Self {
        Self::ConnectionFailed {
            address: address.into(),
            attempts,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: Uuid, service: Uuid) -> Self {
        Self::CharacteristicNotFound { uuid, service }
    }

    /// Create an advertisement format error.
    pub fn invalid_advertisement(format: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidAdvertisement {
            format,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the failure means a GATT feature is simply missing on this
    /// device, as opposed to a transient link problem.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Error::ServiceNotFound { .. }
                | Error::CharacteristicNotFound { .. }
                | Error::NotifyUnsupported { .. }
        )
    }
}

/// Result type alias using mithermo-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
