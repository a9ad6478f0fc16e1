/// Low-level storage errors (RocksDB, serialization, corrupt records).
/// This is the error type for every [`crate::store::QueueStore`] operation —
/// storage can only fail with infrastructure errors; domain decisions
/// (retention expiry, replay outcomes) live at the queue layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("rocksdb error: {0}")]
    RocksDb(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt data: {0}")]
    CorruptData(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::RocksDb(err.into_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Validation errors at the request serialization boundary, where a live
/// request becomes a stored record or comes back out of one.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{0} requests cannot carry a body")]
    BodyNotAllowed(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Errors from queue construction and entry operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue name already in use: {0}")]
    DuplicateQueueName(String),

    #[error("queue name must be a non-empty string")]
    EmptyQueueName,

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors surfaced by [`crate::queue::Queue::replay_requests`], and through
/// the sync completion channel to whoever fired the sync event.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// A fetch failed mid-drain. The failed entry is back at the queue
    /// head; `replayed` entries before it were sent and removed.
    #[error("queue '{queue}' stopped replaying after {replayed} successful requests: {source}")]
    ReplayFailed {
        queue: String,
        replayed: usize,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Transport-level failure from the host fetch primitive. A response with
/// an error status is not a `FetchError` — the request reached a server.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

/// Errors from the background-sync trigger facility.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync registration rejected: {0}")]
    RegistrationRejected(String),

    #[error("sync tag was never registered: {0}")]
    NotRegistered(String),

    #[error("no queue is listening for sync tag: {0}")]
    NoSubscriber(String),

    #[error("sync handler dropped before reporting completion")]
    HandlerGone,

    #[error(transparent)]
    Handler(#[from] ReplayError),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type QueueResult<T> = std::result::Result<T, QueueError>;
