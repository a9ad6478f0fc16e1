use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::error::{QueueError, ReplayError};
use crate::fetch::{Fetcher, ReqwestFetcher};
use crate::registry;
use crate::request::{HttpRequest, RequestData};
use crate::store::{Metadata, NewEntry, QueueStore};
use crate::sync::{SyncEvent, SyncTrigger};

/// Prefix of every sync tag; the queue name completes it.
const TAG_PREFIX: &str = "workbox-background-sync";

/// Default entry retention: seven days, in minutes.
pub const DEFAULT_MAX_RETENTION_MINUTES: u64 = 7 * 24 * 60;

/// What a queue runs when a sync event (or cold start) wakes it.
///
/// The default handler drains the queue via
/// [`Queue::replay_requests`]; hosts needing different drain behavior
/// (partial drains, custom bookkeeping around failures) implement this and
/// call back into the queue's operations.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn on_sync(&self, queue: &Queue) -> Result<(), ReplayError>;
}

struct ReplayAll;

#[async_trait]
impl SyncHandler for ReplayAll {
    async fn on_sync(&self, queue: &Queue) -> Result<(), ReplayError> {
        queue.replay_requests().await
    }
}

/// One queue entry as callers see it: the live request plus bookkeeping.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub request: HttpRequest,
    /// Enqueue time, milliseconds since the Unix epoch. Stamped with the
    /// current time on push when absent.
    pub timestamp: Option<u64>,
    /// Opaque caller data stored alongside the request and returned
    /// verbatim.
    pub metadata: Option<Metadata>,
}

impl QueueEntry {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            timestamp: None,
            metadata: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Construction knobs for [`Queue`].
pub struct QueueOptions {
    /// Replay driver invoked on sync events and at cold start. `None` means
    /// drain everything via `replay_requests`.
    pub on_sync: Option<Arc<dyn SyncHandler>>,
    /// Entries older than this many minutes are silently discarded by the
    /// next read that touches them.
    pub max_retention_minutes: u64,
    /// Fetch primitive used by `replay_requests`. `None` means a default
    /// `reqwest` client.
    pub fetcher: Option<Arc<dyn Fetcher>>,
    /// The host's background-sync facility. `None` on hosts without one —
    /// the queue then replays once at construction instead.
    pub sync: Option<Arc<dyn SyncTrigger>>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            on_sync: None,
            max_retention_minutes: DEFAULT_MAX_RETENTION_MINUTES,
            fetcher: None,
            sync: None,
        }
    }
}

/// A named, durable FIFO of failed outbound requests.
///
/// Entries survive process restarts and are re-issued in enqueue order the
/// next time the host signals connectivity (or at process start on hosts
/// with no such signal). Names are unique per process; two processes must
/// not share one store.
pub struct Queue {
    name: String,
    tag: String,
    store: Arc<QueueStore>,
    fetcher: Arc<dyn Fetcher>,
    on_sync: Arc<dyn SyncHandler>,
    max_retention_minutes: u64,
    sync: Option<Arc<dyn SyncTrigger>>,
}

impl Queue {
    /// Create the queue and wire up its replay trigger.
    ///
    /// Must run inside a tokio runtime: the sync listener (or the
    /// cold-start replay, when `options.sync` is absent) is a spawned task.
    /// Fails with [`QueueError::DuplicateQueueName`] when a queue with this
    /// name already lives in the process.
    pub fn new(
        name: impl Into<String>,
        store: Arc<QueueStore>,
        options: QueueOptions,
    ) -> Result<Arc<Self>, QueueError> {
        let name = name.into();
        registry::register(&name)?;

        let tag = format!("{TAG_PREFIX}:{name}");
        let queue = Arc::new(Self {
            tag,
            store,
            fetcher: options
                .fetcher
                .unwrap_or_else(|| Arc::new(ReqwestFetcher::default())),
            on_sync: options.on_sync.unwrap_or_else(|| Arc::new(ReplayAll)),
            max_retention_minutes: options.max_retention_minutes,
            sync: options.sync,
            name,
        });

        match &queue.sync {
            Some(trigger) => {
                let events = trigger.subscribe(&queue.tag);
                Self::spawn_sync_listener(Arc::clone(&queue), events);
                debug!(queue = %queue.name, tag = %queue.tag, "listening for sync events");
            }
            None => {
                // No background-sync facility: process start is the only
                // replay opportunity, so take it now.
                let cold = Arc::clone(&queue);
                tokio::spawn(async move {
                    if let Err(err) = cold.on_sync.on_sync(&cold).await {
                        warn!(queue = %cold.name, error = %err, "cold-start replay failed");
                    }
                });
                debug!(queue = %queue.name, "no sync trigger, replaying at cold start");
            }
        }

        Ok(queue)
    }

    fn spawn_sync_listener(queue: Arc<Queue>, mut events: mpsc::UnboundedReceiver<SyncEvent>) {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                debug!(queue = %queue.name, tag = event.tag(), "sync event received");
                let result = queue.on_sync.on_sync(&queue).await;
                if let Err(err) = &result {
                    warn!(queue = %queue.name, error = %err, "sync handler failed");
                }
                event.complete(result);
            }
        });
    }

    /// The queue's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tag handed to the background-sync trigger for this queue.
    pub fn sync_tag(&self) -> &str {
        &self.tag
    }

    /// Serialize `entry` and append it to the queue tail, then ask the host
    /// for a background sync.
    #[instrument(skip_all, fields(queue = %self.name, url = %entry.request.url))]
    pub async fn push_request(&self, entry: QueueEntry) -> Result<(), QueueError> {
        self.add_request(entry, Position::Last).await
    }

    /// Like [`Queue::push_request`], but the entry goes to the queue head.
    #[instrument(skip_all, fields(queue = %self.name, url = %entry.request.url))]
    pub async fn unshift_request(&self, entry: QueueEntry) -> Result<(), QueueError> {
        self.add_request(entry, Position::First).await
    }

    /// Remove and return the oldest entry, deleting any that outlived the
    /// retention window along the way. `None` once the queue is empty.
    #[instrument(skip_all, fields(queue = %self.name))]
    pub async fn shift_request(&self) -> Result<Option<QueueEntry>, QueueError> {
        self.take_request(Position::First).await
    }

    /// Remove and return the newest entry, deleting any that outlived the
    /// retention window along the way. `None` once the queue is empty.
    #[instrument(skip_all, fields(queue = %self.name))]
    pub async fn pop_request(&self) -> Result<Option<QueueEntry>, QueueError> {
        self.take_request(Position::Last).await
    }

    /// Re-issue every stored request, oldest first.
    ///
    /// Expired entries are discarded without a fetch. The first fetch that
    /// fails puts its entry back at the queue head — original timestamp and
    /// metadata intact — and fails the whole call; everything behind it
    /// stays stored in order, waiting for the next sync. Stopping at the
    /// first failure keeps a dead endpoint from burning through the queue.
    ///
    /// Delivery semantics across a crash: an entry popped here whose fetch
    /// never completed is lost (at most once); an entry whose fetch
    /// succeeded just before the crash may be sent again on the next drain
    /// (at least once). Callers must tolerate both.
    #[instrument(skip_all, fields(queue = %self.name))]
    pub async fn replay_requests(&self) -> Result<(), ReplayError> {
        let mut replayed = 0usize;
        while let Some(record) = self.store.pop_first(&self.name)? {
            if self.is_expired(record.timestamp) {
                debug!(id = record.id, "discarding expired entry");
                continue;
            }
            let request = record.request_data.to_request()?;
            match self.fetcher.fetch(&request).await {
                Ok(()) => {
                    replayed += 1;
                    debug!(id = record.id, url = %request.url, "request replayed");
                }
                Err(source) => {
                    self.store.add_first(NewEntry {
                        queue_name: record.queue_name,
                        request_data: record.request_data,
                        timestamp: record.timestamp,
                        metadata: record.metadata,
                    })?;
                    return Err(ReplayError::ReplayFailed {
                        queue: self.name.clone(),
                        replayed,
                        source,
                    });
                }
            }
        }
        info!(replayed, "queue drained");
        Ok(())
    }

    /// Ask the host to schedule a sync for this queue's tag.
    ///
    /// Registration failure is expected on some hosts and never propagates:
    /// the entries are durable and will drain on the next sync event or
    /// process start. No-op without a trigger.
    pub async fn register_sync(&self) {
        if let Some(trigger) = &self.sync {
            if let Err(err) = trigger.register(&self.tag).await {
                warn!(queue = %self.name, tag = %self.tag, error = %err, "sync registration failed");
            }
        }
    }

    async fn add_request(&self, entry: QueueEntry, position: Position) -> Result<(), QueueError> {
        let request_data = RequestData::from_request(&entry.request)?;
        let record = NewEntry {
            queue_name: self.name.clone(),
            request_data,
            timestamp: entry.timestamp.unwrap_or_else(now_ms),
            metadata: entry.metadata,
        };
        let stored = match position {
            Position::First => self.store.add_first(record)?,
            Position::Last => self.store.add_last(record)?,
        };
        debug!(id = stored.id, "request stored for later replay");
        self.register_sync().await;
        Ok(())
    }

    async fn take_request(&self, position: Position) -> Result<Option<QueueEntry>, QueueError> {
        loop {
            let record = match position {
                Position::First => self.store.pop_first(&self.name)?,
                Position::Last => self.store.pop_last(&self.name)?,
            };
            let Some(record) = record else {
                return Ok(None);
            };
            if self.is_expired(record.timestamp) {
                debug!(id = record.id, "discarding expired entry");
                continue;
            }
            return Ok(Some(QueueEntry {
                request: record.request_data.to_request()?,
                timestamp: Some(record.timestamp),
                metadata: record.metadata,
            }));
        }
    }

    fn is_expired(&self, timestamp_ms: u64) -> bool {
        now_ms().saturating_sub(timestamp_ms) > self.max_retention_minutes * 60_000
    }
}

enum Position {
    First,
    Last,
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
