//! Process-wide serialization of BLE link operations.
//!
//! Most BLE stacks misbehave when two connections are being set up, or two
//! settings round-trips are in flight, at the same time. Every session shares
//! a [`TransportLock`] and holds it for the whole of `connect`,
//! `read_settings`, `send_settings`, `set_clock` and `disconnect`.
//!
//! Sessions use [`TransportLock::global`] unless another lock is injected,
//! which tests do to keep independent scenarios from blocking each other.

use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared async mutex guarding the BLE transport.
#[derive(Debug, Clone, Default)]
pub struct TransportLock {
    inner: Arc<Mutex<()>>,
}

/// Guard returned by [`TransportLock::acquire`]; the lock is released on drop.
pub type TransportGuard = OwnedMutexGuard<()>;

static GLOBAL: OnceLock<TransportLock> = OnceLock::new();

impl TransportLock {
    /// Create an independent lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock shared by every session in the process.
    pub fn global() -> Self {
        GLOBAL.get_or_init(TransportLock::new).clone()
    }

    /// Wait for the lock.
    pub async fn acquire(&self) -> TransportGuard {
        Arc::clone(&self.inner).lock_owned().await
    }

    /// Whether some operation currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Whether two handles refer to the same lock.
    pub fn same_as(&self, other: &TransportLock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_shared() {
        assert!(TransportLock::global().same_as(&TransportLock::global()));
        assert!(!TransportLock::new().same_as(&TransportLock::global()));
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let lock = TransportLock::new();
        assert!(!lock.is_locked());

        let guard = lock.acquire().await;
        assert!(lock.is_locked());
        assert!(lock.clone().is_locked());

        drop(guard);
        assert!(!lock.is_locked());
    }

    #[tokio::test]
    async fn test_serializes_tasks() {
        let lock = TransportLock::new();
        let guard = lock.acquire().await;

        let other = lock.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.acquire().await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }
}
