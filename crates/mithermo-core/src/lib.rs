//! BLE driver for Xiaomi thermometers running the ATC/PVVX custom firmware.
//!
//! This crate talks to LYWSD03MMC, MHO-C401, CGG1 and related thermometers
//! that have been flashed with the ATC1441 or PVVX firmware.
//!
//! # Features
//!
//! - **Three connection modes**: passive advertisements, GATT notifications,
//!   or a GATT read per getter call
//! - **Advertisement decoding**: ATC1441, PVVX and BTHome v2 formats
//! - **Device settings**: read, write and reset the firmware's 13-byte
//!   settings record through the vendor command channel
//! - **Clock**: set the device's real-time clock
//! - **Many devices, one scanner**: [`ScanDispatcher`] routes advertisements
//!   to the registered sessions
//! - **Testable**: every BLE call goes through the [`Transport`] trait;
//!   [`MockTransport`] scripts a device without hardware
//!
//! # Connection Modes
//!
//! | Mode | Link | Measurements come from |
//! |------|------|------------------------|
//! | [`ConnectionMode::Advertising`] | down | advertisements routed by a [`ScanDispatcher`] |
//! | [`ConnectionMode::Notification`] | up | GATT notifications |
//! | [`ConnectionMode::Connection`] | up | a GATT read on every getter call |
//!
//! # Platform Differences
//!
//! - **Linux/Windows**: peripherals are matched by their MAC address.
//! - **macOS**: CoreBluetooth hides MAC addresses and hands out a per-host
//!   UUID instead, so sessions addressed by MAC cannot be matched there.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mithermo_core::{
//!     BtleTransport, ConnectionMode, DeviceSession, ScanDispatcher, ScanOptions, scan,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(DeviceSession::new(
//!         "A4:C1:38:0A:1B:2C".parse()?,
//!         BtleTransport::new().await?,
//!         ConnectionMode::Advertising,
//!     ));
//!
//!     let dispatcher = ScanDispatcher::new();
//!     dispatcher.add(&session);
//!     dispatcher.init_all().await?;
//!
//!     let adapter = scan::get_adapter().await?;
//!     let events = scan::advertisements(&adapter, ScanOptions::new().duration_secs(30)).await?;
//!     dispatcher.run(events, CancellationToken::new()).await;
//!
//!     println!("{:.2} °C", session.temperature_precise().await);
//!     Ok(())
//! }
//! ```

pub mod advertisement;
pub mod ble;
pub mod commands;
pub mod dispatcher;
pub mod error;
pub mod gatt;
pub mod lock;
pub mod mock;
pub mod mode;
pub mod retry;
pub mod scan;
pub mod session;
pub mod traits;
pub mod util;

// Core exports
pub use ble::{BleConfig, BtleTransport};
pub use dispatcher::ScanDispatcher;
pub use error::{Error, Result};
pub use gatt::{CharacteristicKind, ServiceKind};
pub use lock::{TransportGuard, TransportLock};
pub use mock::MockTransport;
pub use mode::ConnectionMode;
pub use retry::{Backoff, RetryConfig, with_retry, with_retry_if};
pub use scan::{AdvertisementEvent, DiscoveredDevice, ScanOptions};
pub use session::{DeviceSession, SessionConfig};
pub use traits::{CharacteristicHandle, NotifyCallback, ServiceHandle, Transport};

/// Type alias for a session shared with a [`ScanDispatcher`].
pub type SharedSession<T> = std::sync::Arc<DeviceSession<T>>;

pub use advertisement::parse_advertisement;

// Re-export from mithermo-types
pub use mithermo_types::uuids;
pub use mithermo_types::{
    AdvertisingType, DeviceAddress, DeviceSettings, HwVersion, Measurements, ParseError,
    RfTxPower, Smiley,
};
