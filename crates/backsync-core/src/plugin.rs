use std::sync::Arc;

use crate::error::QueueError;
use crate::queue::{Queue, QueueEntry, QueueOptions};
use crate::request::HttpRequest;
use crate::store::QueueStore;

/// Failure-hook adapter for an outbound request path: hand it every request
/// whose fetch failed and it queues them for background replay.
///
/// The plugin owns its queue — nothing else should push to it.
pub struct BackgroundSyncPlugin {
    queue: Arc<Queue>,
}

impl BackgroundSyncPlugin {
    /// Create the adapter and its backing queue. Same constraints as
    /// [`Queue::new`]: the name must be unique in the process, and a tokio
    /// runtime must be running.
    pub fn new(
        name: impl Into<String>,
        store: Arc<QueueStore>,
        options: QueueOptions,
    ) -> Result<Self, QueueError> {
        Ok(Self {
            queue: Queue::new(name, store, options)?,
        })
    }

    /// Report a failed fetch; the request is stored and replayed on the
    /// next sync opportunity.
    pub async fn fetch_did_fail(&self, request: HttpRequest) -> Result<(), QueueError> {
        self.queue.push_request(QueueEntry::new(request)).await
    }

    /// Name of the queue backing this plugin.
    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ManualSyncTrigger, SyncTrigger};
    use url::Url;

    #[tokio::test]
    async fn failed_fetches_land_in_the_plugin_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(QueueStore::open(dir.path()).unwrap());
        let trigger = Arc::new(ManualSyncTrigger::new());
        let plugin = BackgroundSyncPlugin::new(
            "plugin-queue",
            Arc::clone(&store),
            QueueOptions {
                sync: Some(trigger as Arc<dyn SyncTrigger>),
                ..QueueOptions::default()
            },
        )
        .unwrap();
        assert_eq!(plugin.queue_name(), "plugin-queue");

        let request = HttpRequest::post(Url::parse("http://x.io/events").unwrap())
            .body(&b"lost-on-the-wire"[..]);
        plugin.fetch_did_fail(request).await.unwrap();

        let stored = store.get_all("plugin-queue").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].request_data.url, "http://x.io/events");
        assert_eq!(
            stored[0].request_data.body.as_deref(),
            Some(&b"lost-on-the-wire"[..])
        );
    }
}
