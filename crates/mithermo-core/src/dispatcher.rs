//! Routing of passive advertisements to registered sessions.
//!
//! One scanner feeds many thermometers. [`ScanDispatcher`] keeps a set of
//! sessions by pointer identity and hands each advertisement to the first
//! session whose address matches. Sessions are held weakly so dropping a
//! session is enough to unregister it.

use std::sync::{Arc, Weak};

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::scan::AdvertisementEvent;
use crate::session::DeviceSession;
use crate::traits::Transport;
use crate::util::has_vendor_prefix;

/// Routes advertisements to [`DeviceSession`]s.
///
/// # Example
///
/// ```
/// use mithermo_core::{ConnectionMode, DeviceSession, MockTransport, ScanDispatcher};
/// use std::sync::Arc;
///
/// let session = Arc::new(DeviceSession::new(
///     "A4:C1:38:00:00:01".parse().unwrap(),
///     MockTransport::thermometer(),
///     ConnectionMode::Advertising,
/// ));
/// let dispatcher = ScanDispatcher::new();
/// assert!(dispatcher.add(&session));
/// assert!(!dispatcher.add(&session));
/// assert_eq!(dispatcher.len(), 1);
/// ```
pub struct ScanDispatcher<T: Transport> {
    sessions: Mutex<Vec<Weak<DeviceSession<T>>>>,
    vendor_filter: bool,
}

impl<T: Transport> std::fmt::Debug for ScanDispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanDispatcher")
            .field("sessions", &self.sessions.lock().len())
            .field("vendor_filter", &self.vendor_filter)
            .finish()
    }
}

impl<T: Transport> Default for ScanDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> ScanDispatcher<T> {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            vendor_filter: true,
        }
    }

    /// Drop advertisements whose address lacks the vendor prefix before
    /// looking at the sessions. Enabled by default.
    #[must_use]
    pub fn vendor_filter(mut self, enabled: bool) -> Self {
        self.vendor_filter = enabled;
        self
    }

    /// Register a session. Returns `false` if it was already registered.
    pub fn add(&self, session: &Arc<DeviceSession<T>>) -> bool {
        let mut sessions = self.sessions.lock();
        sessions.retain(|w| w.strong_count() > 0);
        let target = Arc::as_ptr(session);
        if sessions.iter().any(|w| std::ptr::eq(w.as_ptr(), target)) {
            return false;
        }
        sessions.push(Arc::downgrade(session));
        true
    }

    /// Unregister a session. Returns `false` if it was not registered.
    pub fn remove(&self, session: &Arc<DeviceSession<T>>) -> bool {
        let mut sessions = self.sessions.lock();
        let target = Arc::as_ptr(session);
        let mut removed = false;
        sessions.retain(|w| {
            if std::ptr::eq(w.as_ptr(), target) {
                removed = true;
                return false;
            }
            w.strong_count() > 0
        });
        removed
    }

    /// Number of live registered sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live sessions, in registration order.
    pub fn sessions(&self) -> Vec<Arc<DeviceSession<T>>> {
        self.sessions.lock().iter().filter_map(Weak::upgrade).collect()
    }

    /// Find the session registered for `address`.
    pub fn find(&self, address: &str) -> Option<Arc<DeviceSession<T>>> {
        if self.vendor_filter && !has_vendor_prefix(address) {
            return None;
        }
        let mut sessions = self.sessions.lock();
        sessions.retain(|w| w.strong_count() > 0);
        sessions
            .iter()
            .filter_map(Weak::upgrade)
            .find(|s| s.address().matches(address))
    }

    /// Hand an advertisement to the matching session.
    ///
    /// Returns whether a session took it. Decoding failures are logged and
    /// still count as delivered.
    pub async fn dispatch(&self, address: &str, payload: &[u8]) -> bool {
        let Some(session) = self.find(address) else {
            return false;
        };
        if let Err(e) = session.handle_advertisement(payload).await {
            debug!(%address, error = %e, "Advertisement not decoded");
        }
        true
    }

    /// Run `init()` on every session that has not read its settings yet.
    ///
    /// Every session is attempted; the first error is returned.
    pub async fn init_all(&self) -> Result<(), Error> {
        let mut first_error = None;
        for session in self.sessions() {
            if session.has_read_settings() {
                continue;
            }
            if let Err(e) = session.init().await {
                warn!(address = %session.address(), error = %e, "Session init failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Drain `events` until the stream ends or `cancel` fires.
    ///
    /// Returns the number of advertisements delivered to a session.
    pub async fn run<S>(&self, events: S, cancel: CancellationToken) -> usize
    where
        S: Stream<Item = AdvertisementEvent>,
    {
        let mut events = std::pin::pin!(events);
        let mut delivered = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(delivered, "Dispatcher cancelled");
                    break;
                }
                event = events.next() => {
                    let Some(event) = event else {
                        info!(delivered, "Advertisement stream ended");
                        break;
                    };
                    if self.dispatch(&event.address, &event.payload).await {
                        delivered += 1;
                    }
                }
            }
        }
        delivered
    }
}
