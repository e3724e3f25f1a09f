//! Sender tracker
//!
//! Remembers the origin of the most recent datagram (last writer wins) and
//! reports when it changes. The stream loop is the only writer; any number of
//! [`SenderHandle`]s may read the current value from other threads.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Notification for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderEvent {
    /// A datagram arrived from a different host than before
    Changed {
        previous: Option<IpAddr>,
        current: IpAddr,
    },
    /// The stream was lost (fault, silence or shutdown)
    Disconnected { previous: Option<IpAddr> },
}

impl SenderEvent {
    /// Address to display, `None` while disconnected
    pub fn current(&self) -> Option<IpAddr> {
        match self {
            SenderEvent::Changed { current, .. } => Some(*current),
            SenderEvent::Disconnected { .. } => None,
        }
    }
}

impl fmt::Display for SenderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current() {
            Some(addr) => write!(f, "{}", addr),
            None => f.write_str("disconnected"),
        }
    }
}

/// Writer side, owned by the stream loop
#[derive(Debug, Default)]
pub struct SenderTracker {
    current: Arc<RwLock<Option<IpAddr>>>,
}

impl SenderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view for other threads
    pub fn handle(&self) -> SenderHandle {
        SenderHandle {
            current: self.current.clone(),
        }
    }

    /// Record the origin of a datagram, returning an event if it changed
    pub fn observe(&self, origin: IpAddr) -> Option<SenderEvent> {
        let guard = self.current.upgradable_read();
        if *guard == Some(origin) {
            return None;
        }

        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        let previous = guard.replace(origin);
        tracing::debug!("Sender changed: {:?} -> {}", previous, origin);
        Some(SenderEvent::Changed {
            previous,
            current: origin,
        })
    }

    /// Forget the current sender
    pub fn disconnect(&self) -> SenderEvent {
        let previous = self.current.write().take();
        SenderEvent::Disconnected { previous }
    }

    pub fn current(&self) -> Option<IpAddr> {
        *self.current.read()
    }
}

/// Cloneable reader for UI contexts
#[derive(Debug, Clone)]
pub struct SenderHandle {
    current: Arc<RwLock<Option<IpAddr>>>,
}

impl SenderHandle {
    pub fn current(&self) -> Option<IpAddr> {
        *self.current.read()
    }

    pub fn is_connected(&self) -> bool {
        self.current.read().is_some()
    }
}

/// Non-blocking publisher for [`SenderEvent`]s.
///
/// A slow consumer never stalls the stream loop; events that do not fit
/// are dropped, and the latest value stays readable via [`SenderHandle`].
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: Option<Sender<SenderEvent>>,
}

impl EventPublisher {
    /// Publisher plus the receiving end for the presentation layer
    pub fn bounded(capacity: usize) -> (Self, Receiver<SenderEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    /// Publisher that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn publish(&self, event: SenderEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::warn!("Sender event queue full, dropping {}", event);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!("No sender event consumer");
            }
        }
    }
}
