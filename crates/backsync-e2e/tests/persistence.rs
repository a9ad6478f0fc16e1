//! Entries written before a shutdown are still there — in order — when the
//! database is opened again.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use backsync_core::{
    HttpRequest, ManualSyncTrigger, NewEntry, Queue, QueueOptions, QueueStore, RequestData,
    SyncTrigger,
};
use url::Url;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

fn stored_request(path: &str) -> RequestData {
    let url = Url::parse(&format!("http://127.0.0.1:9{path}")).unwrap();
    RequestData::from_request(&HttpRequest::get(url)).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn entries_survive_store_reopen() {
    let dir = tempfile::tempdir().unwrap();

    // First life of the process: entries get stored, then everything shuts
    // down uncleanly (no drain).
    {
        let store = QueueStore::open(dir.path()).unwrap();
        for path in ["/a", "/b"] {
            store
                .add_last(NewEntry {
                    queue_name: "restart-survivors".into(),
                    request_data: stored_request(path),
                    timestamp: now_ms(),
                    metadata: None,
                })
                .unwrap();
        }
    }

    // Second life: a fresh queue over the same database sees the backlog.
    let store = Arc::new(QueueStore::open(dir.path()).unwrap());
    let trigger = Arc::new(ManualSyncTrigger::new());
    let queue = Queue::new(
        "restart-survivors",
        Arc::clone(&store),
        QueueOptions {
            sync: Some(trigger as Arc<dyn SyncTrigger>),
            ..QueueOptions::default()
        },
    )
    .unwrap();

    let backlog = store.get_all("restart-survivors").unwrap();
    assert_eq!(backlog.len(), 2);
    assert!(backlog[0].id < backlog[1].id);

    let first = queue.shift_request().await.unwrap().unwrap();
    assert_eq!(first.request.url.path(), "/a");
    let second = queue.shift_request().await.unwrap().unwrap();
    assert_eq!(second.request.url.path(), "/b");
    assert!(queue.shift_request().await.unwrap().is_none());
}
