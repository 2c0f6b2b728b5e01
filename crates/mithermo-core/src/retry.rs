//! Retrying transient BLE failures.
//!
//! A [`RetryConfig`] says how many attempts an operation gets and how long
//! to pause between them. [`with_retry`] drives the attempts and gives up
//! early on errors that another attempt cannot fix (a missing service, a
//! malformed payload).
//!
//! ```
//! use mithermo_core::{Error, RetryConfig, with_retry};
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::for_connect();
//! let value = with_retry(&config, "read_sensor", || async { Ok::<_, Error>(42) }).await?;
//! # assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Pause between two attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Retry straight away.
    Immediate,
    /// Same pause before every retry.
    Constant(Duration),
    /// `initial`, doubled before each further retry, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    fn base_delay(self, retry: u32) -> Duration {
        match self {
            Backoff::Immediate => Duration::ZERO,
            Backoff::Constant(delay) => delay,
            Backoff::Exponential { initial, max } => initial
                .checked_mul(2u32.saturating_pow(retry))
                .map_or(max, |d| d.min(max)),
        }
    }
}

/// How often, and how patiently, to retry an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    attempts: u32,
    /// Pause inserted before each retry.
    pub backoff: Backoff,
    /// Stretch each pause by up to a quarter at random.
    pub jitter: bool,
}

impl Default for RetryConfig {
    /// Three attempts with a short exponential backoff.
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(2),
            },
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// `attempts` tries in total with the default backoff.
    pub fn new(attempts: u32) -> Self {
        Self::default().with_attempts(attempts)
    }

    /// A single attempt.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            backoff: Backoff::Immediate,
            jitter: false,
        }
    }

    /// Connection attempts: five in total, a constant second apart.
    ///
    /// Thermometers often refuse the first connection request while their
    /// radio sleeps between advertisements.
    pub fn for_connect() -> Self {
        Self {
            attempts: 5,
            backoff: Backoff::Constant(Duration::from_secs(1)),
            jitter: false,
        }
    }

    /// Settings round-trips: five in total, back to back.
    ///
    /// Each attempt already waits out its own settle delay and notification
    /// timeout.
    pub fn for_settings() -> Self {
        Self {
            attempts: 5,
            backoff: Backoff::Immediate,
            jitter: false,
        }
    }

    /// Total number of attempts, the first one included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Set the total number of attempts. At least one is always made.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Pause before retry number `retry` (0 is the first retry).
    fn delay_before(&self, retry: u32) -> Duration {
        let delay = self.backoff.base_delay(retry);
        if self.jitter && !delay.is_zero() {
            delay.mul_f64(1.0 + rand::rng().random::<f64>() * 0.25)
        } else {
            delay
        }
    }
}

/// Run `operation` until it succeeds, fails for good, or runs out of attempts.
///
/// Returns the last error once every attempt has failed.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_if(config, operation_name, is_retryable, operation).await
}

/// Like [`with_retry`], with the caller deciding which errors get another attempt.
pub async fn with_retry_if<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    retryable: fn(&Error) -> bool,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.attempts();
    let mut attempt = 1;
    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if attempt >= attempts || !retryable(&error) {
            return Err(error);
        }

        let delay = config.delay_before(attempt - 1);
        warn!(
            operation = operation_name,
            attempt,
            attempts,
            ?delay,
            "Attempt failed: {}",
            error
        );
        if !delay.is_zero() {
            sleep(delay).await;
        }
        attempt += 1;
    }
}

/// Whether another attempt could succeed where this one failed.
pub(crate) fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Timeout { .. }
        | Error::Bluetooth(_)
        | Error::ConnectionFailed { .. }
        | Error::NotConnected
        | Error::WriteFailed { .. }
        // a truncated notification
        | Error::Parse(_) => true,
        Error::ServiceNotFound { .. }
        | Error::CharacteristicNotFound { .. }
        | Error::NotifyUnsupported { .. }
        | Error::DeviceNotFound(_)
        | Error::InvalidData(_)
        | Error::InvalidAdvertisement { .. }
        | Error::InvalidConfig(_) => false,
    }
}

/// Connect-phase classification: a device that was not seen may simply be
/// asleep between advertisements.
pub(crate) fn is_retryable_connect(error: &Error) -> bool {
    matches!(error, Error::DeviceNotFound(_)) || is_retryable(error)
}
