//! Background-sync trigger abstraction.
//!
//! Hosts differ in how (and whether) they can wake the process when
//! connectivity returns. The [`SyncTrigger`] trait is that seam: a queue
//! registers its tag and subscribes for wakeups; the host fires events and
//! can wait on each handler's outcome before letting the process idle.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{ReplayError, SyncError};

/// A single background-sync wakeup delivered to a queue.
///
/// The receiver runs its replay handler and reports the outcome through
/// [`SyncEvent::complete`] — the wait-until half: whoever fired the event
/// can keep the process alive until the handler finishes, and reschedule if
/// it failed.
pub struct SyncEvent {
    tag: String,
    completion: oneshot::Sender<Result<(), ReplayError>>,
}

impl SyncEvent {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Report the handler outcome to the event's origin.
    pub fn complete(self, result: Result<(), ReplayError>) {
        // The origin may have stopped waiting; nobody left to notify then.
        let _ = self.completion.send(result);
    }
}

/// Host-provided "call me back when connectivity allows" facility.
///
/// `register` may reject — some hosts throttle or deny background wakeups —
/// and callers treat that as non-fatal. Implementations must deliver to a
/// subscription only events carrying that subscription's tag.
#[async_trait]
pub trait SyncTrigger: Send + Sync {
    /// Request a future sync event for `tag`.
    async fn register(&self, tag: &str) -> Result<(), SyncError>;

    /// Subscribe to sync events for `tag`. A later subscription for the
    /// same tag replaces the earlier one.
    fn subscribe(&self, tag: &str) -> mpsc::UnboundedReceiver<SyncEvent>;
}

/// In-process trigger for hosts that watch connectivity themselves (and for
/// tests): call [`ManualSyncTrigger::fire`] when the network looks usable.
#[derive(Default)]
pub struct ManualSyncTrigger {
    registered: Mutex<HashSet<String>>,
    subscribers: Mutex<HashMap<String, mpsc::UnboundedSender<SyncEvent>>>,
    reject_registrations: AtomicBool,
}

impl ManualSyncTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `register` calls fail, mimicking a host that denies
    /// background-sync registration.
    pub fn reject_registrations(&self, reject: bool) {
        self.reject_registrations.store(reject, Ordering::SeqCst);
    }

    /// Whether `tag` has a pending registration.
    pub fn is_registered(&self, tag: &str) -> bool {
        self.registered.lock().unwrap().contains(tag)
    }

    /// Deliver a sync event for `tag` and wait for the handler's outcome.
    ///
    /// A successful handler consumes the registration: one `register`, one
    /// wakeup. A failed handler leaves the tag registered so the next
    /// connectivity signal retries it. Fails if the tag was never
    /// registered or nothing is subscribed to it.
    pub async fn fire(&self, tag: &str) -> Result<(), SyncError> {
        if !self.registered.lock().unwrap().remove(tag) {
            return Err(SyncError::NotRegistered(tag.to_string()));
        }

        let sender = self
            .subscribers
            .lock()
            .unwrap()
            .get(tag)
            .cloned()
            .ok_or_else(|| SyncError::NoSubscriber(tag.to_string()))?;

        let (completion, outcome) = oneshot::channel();
        let event = SyncEvent {
            tag: tag.to_string(),
            completion,
        };
        if sender.send(event).is_err() {
            return Err(SyncError::NoSubscriber(tag.to_string()));
        }
        debug!(tag, "sync event delivered");

        let result = match outcome.await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(SyncError::HandlerGone),
        };
        if result.is_err() {
            self.registered.lock().unwrap().insert(tag.to_string());
        }
        result
    }
}

#[async_trait]
impl SyncTrigger for ManualSyncTrigger {
    async fn register(&self, tag: &str) -> Result<(), SyncError> {
        if self.reject_registrations.load(Ordering::SeqCst) {
            return Err(SyncError::RegistrationRejected(tag.to_string()));
        }
        self.registered.lock().unwrap().insert(tag.to_string());
        debug!(tag, "sync registration recorded");
        Ok(())
    }

    fn subscribe(&self, tag: &str) -> mpsc::UnboundedReceiver<SyncEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().insert(tag.to_string(), tx);
        rx
    }
}
