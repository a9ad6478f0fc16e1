use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use tracing::warn;

use crate::error::{StorageError, StorageResult};
use crate::store::keys;
use crate::store::{Entry, NewEntry};

/// Default directory name for the on-disk database.
pub const DEFAULT_DB_DIR: &str = "workbox-background-sync";

/// Current on-disk schema version. Databases carrying any other version are
/// wiped on open: the entry column families are dropped and recreated,
/// abandoning whatever they held.
const SCHEMA_VERSION: &[u8] = b"2";
const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

const CF_REQUESTS: &str = "requests";
const CF_QUEUE_INDEX: &str = "queue_index";
const CF_META: &str = "meta";

/// All column family names (excluding `default`, which RocksDB owns).
const COLUMN_FAMILIES: &[&str] = &[CF_REQUESTS, CF_QUEUE_INDEX, CF_META];

type DB = DBWithThreadMode<MultiThreaded>;

/// Durable FIFO storage shared by every queue in the process.
///
/// Layout:
/// - `requests` CF: order-encoded entry id → JSON entry record. A full scan
///   walks entries in global enqueue order.
/// - `queue_index` CF: `{queue_name}:{id}` → entry key. Prefix iteration
///   over one queue name yields that queue's FIFO content.
/// - `meta` CF: schema version.
///
/// The handle is cheap to share behind an `Arc` and is expected to live for
/// the whole process.
pub struct QueueStore {
    db: DB,
    /// Next tail id, seeded from the largest stored id at open so appended
    /// entries always sort after everything already present.
    next_id: AtomicI64,
    /// Pops and head inserts are read-then-write across two column
    /// families; the lock keeps concurrent callers from double-delivering
    /// an entry or reusing a head id.
    write_lock: Mutex<()>,
}

impl QueueStore {
    /// Open or create the database at `path`, migrating old schemas.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let store = Self {
            db,
            next_id: AtomicI64::new(1),
            write_lock: Mutex::new(()),
        };
        store.migrate()?;

        if let Some(max) = store.max_id()? {
            let next = max.checked_add(1).ok_or_else(|| {
                StorageError::CorruptData("id space exhausted above i64::MAX".into())
            })?;
            store.next_id.store(next, Ordering::SeqCst);
        }

        Ok(store)
    }

    /// Bring the database to the current schema version.
    ///
    /// Anything other than the current version — including unversioned
    /// databases that already carry entries — is wiped, not converted.
    fn migrate(&self) -> StorageResult<()> {
        let version = self.db.get_cf(&self.cf(CF_META)?, SCHEMA_VERSION_KEY)?;

        match version.as_deref() {
            Some(current) if current == SCHEMA_VERSION => return Ok(()),
            Some(old) => {
                warn!(
                    from = %String::from_utf8_lossy(old),
                    to = %String::from_utf8_lossy(SCHEMA_VERSION),
                    "schema changed, abandoning stored entries"
                );
                self.recreate_entry_cfs()?;
            }
            None => {
                // An unversioned database predates the meta CF; any entries
                // in it belong to schema 1.
                if !self.is_cf_empty(CF_REQUESTS)? {
                    warn!("unversioned database found, abandoning stored entries");
                    self.recreate_entry_cfs()?;
                }
            }
        }

        self.db
            .put_cf(&self.cf(CF_META)?, SCHEMA_VERSION_KEY, SCHEMA_VERSION)?;
        Ok(())
    }

    fn recreate_entry_cfs(&self) -> StorageResult<()> {
        for name in [CF_REQUESTS, CF_QUEUE_INDEX] {
            self.db.drop_cf(name)?;
            self.db.create_cf(name, &Options::default())?;
        }
        Ok(())
    }

    fn is_cf_empty(&self, name: &str) -> StorageResult<bool> {
        let cf = self.cf(name)?;
        match self.db.iterator_cf(&cf, IteratorMode::Start).next() {
            Some(item) => {
                item?;
                Ok(false)
            }
            None => Ok(true),
        }
    }

    fn cf(&self, name: &str) -> StorageResult<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::RocksDb(format!("column family not found: {name}")))
    }

    /// Append an entry. The assigned id is strictly greater than any id
    /// this store has ever handed out.
    pub fn add_last(&self, entry: NewEntry) -> StorageResult<Entry> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.insert(id, entry)
    }

    /// Insert an entry ahead of everything currently stored: it takes the
    /// current minimum id minus one. Negative ids are expected here; on an
    /// empty store the id comes from the tail counter instead.
    pub fn add_first(&self, entry: NewEntry) -> StorageResult<Entry> {
        let _guard = self.write_lock.lock().unwrap();
        let id = match self.min_id()? {
            Some(min) => min.checked_sub(1).ok_or_else(|| {
                StorageError::CorruptData("id space exhausted below i64::MIN".into())
            })?,
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        self.insert(id, entry)
    }

    /// The entry with the smallest id in `queue_name`, if any.
    pub fn get_first(&self, queue_name: &str) -> StorageResult<Option<Entry>> {
        match self.head_id(queue_name)? {
            Some(id) => Ok(Some(self.load(id)?)),
            None => Ok(None),
        }
    }

    /// The entry with the largest id in `queue_name`, if any.
    pub fn get_last(&self, queue_name: &str) -> StorageResult<Option<Entry>> {
        match self.tail_id(queue_name)? {
            Some(id) => Ok(Some(self.load(id)?)),
            None => Ok(None),
        }
    }

    /// Remove and return the head of `queue_name`. The read and both
    /// deletes commit in one batch, so a returned entry is no longer
    /// stored.
    pub fn pop_first(&self, queue_name: &str) -> StorageResult<Option<Entry>> {
        let _guard = self.write_lock.lock().unwrap();
        match self.head_id(queue_name)? {
            Some(id) => {
                let entry = self.load(id)?;
                self.remove(&entry)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Remove and return the tail of `queue_name`.
    pub fn pop_last(&self, queue_name: &str) -> StorageResult<Option<Entry>> {
        let _guard = self.write_lock.lock().unwrap();
        match self.tail_id(queue_name)? {
            Some(id) => {
                let entry = self.load(id)?;
                self.remove(&entry)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Every entry of `queue_name`, id-ascending (FIFO order).
    pub fn get_all(&self, queue_name: &str) -> StorageResult<Vec<Entry>> {
        let index = self.cf(CF_QUEUE_INDEX)?;
        let requests = self.cf(CF_REQUESTS)?;
        let prefix = keys::queue_prefix(queue_name);
        let iter = self
            .db
            .iterator_cf(&index, IteratorMode::From(&prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, entry_key) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let value = self.db.get_cf(&requests, &entry_key)?.ok_or_else(|| {
                StorageError::CorruptData(format!(
                    "index of queue '{queue_name}' points at a missing entry"
                ))
            })?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    /// Remove one entry by id. Missing ids are a no-op.
    pub fn delete_by_id(&self, id: i64) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap();
        if let Some(entry) = self.get_entry(id)? {
            self.remove(&entry)?;
        }
        Ok(())
    }

    fn insert(&self, id: i64, entry: NewEntry) -> StorageResult<Entry> {
        let entry = Entry {
            id,
            queue_name: entry.queue_name,
            request_data: entry.request_data,
            timestamp: entry.timestamp,
            metadata: entry.metadata,
        };
        let value = serde_json::to_vec(&entry)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&self.cf(CF_REQUESTS)?, keys::entry_key(id), &value);
        batch.put_cf(
            &self.cf(CF_QUEUE_INDEX)?,
            keys::index_key(&entry.queue_name, id),
            keys::entry_key(id),
        );
        self.db.write(batch)?;
        Ok(entry)
    }

    fn remove(&self, entry: &Entry) -> StorageResult<()> {
        let mut batch = WriteBatch::default();
        batch.delete_cf(&self.cf(CF_REQUESTS)?, keys::entry_key(entry.id));
        batch.delete_cf(
            &self.cf(CF_QUEUE_INDEX)?,
            keys::index_key(&entry.queue_name, entry.id),
        );
        self.db.write(batch)?;
        Ok(())
    }

    fn get_entry(&self, id: i64) -> StorageResult<Option<Entry>> {
        match self.db.get_cf(&self.cf(CF_REQUESTS)?, keys::entry_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn load(&self, id: i64) -> StorageResult<Entry> {
        self.get_entry(id)?.ok_or_else(|| {
            StorageError::CorruptData(format!("index points at missing entry id {id}"))
        })
    }

    /// Smallest id of `queue_name` via forward index iteration.
    fn head_id(&self, queue_name: &str) -> StorageResult<Option<i64>> {
        let cf = self.cf(CF_QUEUE_INDEX)?;
        let prefix = keys::queue_prefix(queue_name);
        let mut iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));
        self.id_from_index_item(iter.next(), &prefix)
    }

    /// Largest id of `queue_name` via reverse iteration from the queue's
    /// upper key bound.
    fn tail_id(&self, queue_name: &str) -> StorageResult<Option<i64>> {
        let cf = self.cf(CF_QUEUE_INDEX)?;
        let prefix = keys::queue_prefix(queue_name);
        let upper = keys::queue_prefix_upper(queue_name);
        let mut iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&upper, Direction::Reverse));
        self.id_from_index_item(iter.next(), &prefix)
    }

    fn id_from_index_item(
        &self,
        item: Option<Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>>,
        prefix: &[u8],
    ) -> StorageResult<Option<i64>> {
        match item {
            Some(item) => {
                let (key, _) = item?;
                if !key.starts_with(prefix) {
                    return Ok(None);
                }
                let (_, id) = keys::parse_index_key(&key).ok_or_else(|| {
                    StorageError::CorruptData("unparseable queue index key".into())
                })?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Smallest id across the whole store.
    fn min_id(&self) -> StorageResult<Option<i64>> {
        self.edge_id(IteratorMode::Start)
    }

    /// Largest id across the whole store.
    fn max_id(&self) -> StorageResult<Option<i64>> {
        self.edge_id(IteratorMode::End)
    }

    fn edge_id(&self, mode: IteratorMode) -> StorageResult<Option<i64>> {
        let cf = self.cf(CF_REQUESTS)?;
        match self.db.iterator_cf(&cf, mode).next() {
            Some(item) => {
                let (key, _) = item?;
                let id = keys::decode_id(&key).ok_or_else(|| {
                    StorageError::CorruptData("entry key is not an encoded id".into())
                })?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Every entry across every queue, id-ascending.
    #[cfg(test)]
    pub(crate) fn all_entries(&self) -> StorageResult<Vec<Entry>> {
        let cf = self.cf(CF_REQUESTS)?;
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }
}
