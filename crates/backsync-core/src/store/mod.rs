pub(crate) mod keys;
mod rocksdb;

use serde::{Deserialize, Serialize};

use crate::request::RequestData;

pub use self::rocksdb::{QueueStore, DEFAULT_DB_DIR};

/// Caller-supplied opaque data carried alongside a stored request and
/// returned verbatim on read.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One stored record: a serialized request plus its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Store-assigned id. Ascending id order is enqueue order across every
    /// queue sharing the store; head inserts count downward and may go
    /// negative.
    pub id: i64,
    /// Name of the owning queue (indexed).
    pub queue_name: String,
    pub request_data: RequestData,
    /// Enqueue time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// An entry that has not been stored yet — the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub queue_name: String,
    pub request_data: RequestData,
    pub timestamp: u64,
    pub metadata: Option<Metadata>,
}
