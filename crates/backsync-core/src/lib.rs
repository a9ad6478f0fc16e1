//! Durable background replay of failed outbound HTTP requests.
//!
//! When a fetch fails for lack of connectivity, serialize it into a named
//! [`Queue`] backed by a shared [`QueueStore`]; when the host signals
//! connectivity through a [`SyncTrigger`] (or at the next process start on
//! hosts without one), the queue re-issues every stored request in its
//! original enqueue order, stopping at the first failure so nothing is
//! dropped while the network is still flaky.

pub mod error;
pub mod fetch;
pub mod plugin;
pub mod queue;
pub mod registry;
pub mod request;
pub mod store;
pub mod sync;
pub mod telemetry;

pub use error::{
    FetchError, QueueError, QueueResult, ReplayError, RequestError, StorageError, StorageResult,
    SyncError,
};
pub use fetch::{Fetcher, ReqwestFetcher};
pub use plugin::BackgroundSyncPlugin;
pub use queue::{Queue, QueueEntry, QueueOptions, SyncHandler, DEFAULT_MAX_RETENTION_MINUTES};
pub use request::{
    CacheMode, CredentialsMode, HttpRequest, RedirectMode, RequestData, RequestMode,
};
pub use store::{Entry, Metadata, NewEntry, QueueStore, DEFAULT_DB_DIR};
pub use sync::{ManualSyncTrigger, SyncEvent, SyncTrigger};
