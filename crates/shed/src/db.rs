//! Database facade over the embedded ordered key-value engine.
//!
//! Wraps a redb database holding a single byte-ordered table. All indexes
//! and counters live in that one keyspace, namespaced by their prefix byte;
//! key `[0]` holds the schema record. The facade exposes point operations,
//! ascending iteration from a start key, prefix-bounded first/last lookups,
//! exhaustive counts, and accumulated atomic batches.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use redb::{Builder, Database, TableDefinition};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tracing::debug;

use crate::counter::Counter;
use crate::error::{
    CommitSnafu, Error, OpenSnafu, Result, StorageSnafu, TableSnafu, TransactionSnafu,
};
use crate::index::{Index, IndexCodec};
use crate::schema::Schema;

/// The single table holding every index, every counter, and the schema
/// record.
const STORE: TableDefinition<'static, &'static [u8], &'static [u8]> = TableDefinition::new("shed");

/// Options recognized when opening a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options {
    /// Soft byte budget for the store. Informational only; eviction is the
    /// caller's concern.
    pub capacity: Option<u64>,
    /// Page cache budget for the engine, in bytes.
    pub cache_size: Option<usize>,
}

struct Inner {
    db: Database,
    schema: Mutex<Schema>,
    capacity: Option<u64>,
}

/// Typed wrapper around an ordered key-value store.
///
/// A `Shed` owns the database directory for the lifetime of the process.
/// Indexes and counters are registered once by name and hold their prefix
/// byte from then on. Cloning is cheap and clones share the same store.
/// The database is closed when the last clone is dropped.
#[derive(Clone)]
pub struct Shed {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Shed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shed").finish_non_exhaustive()
    }
}

impl Shed {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>, options: Options) -> Result<Shed> {
        let path = path.as_ref();
        let mut builder = Builder::new();
        if let Some(bytes) = options.cache_size {
            builder.set_cache_size(bytes);
        }
        let db = if path.exists() {
            builder.open(path)
        } else {
            builder.create(path)
        }
        .context(OpenSnafu {
            path: path.display().to_string(),
        })?;
        Self::init(db, options)
    }

    /// Create a store backed by memory. Contents vanish on drop.
    pub fn open_in_memory(options: Options) -> Result<Shed> {
        let mut builder = Builder::new();
        if let Some(bytes) = options.cache_size {
            builder.set_cache_size(bytes);
        }
        let db = builder
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .context(OpenSnafu {
                path: ":memory:".to_string(),
            })?;
        Self::init(db, options)
    }

    /// Ensure the table exists and load the schema record.
    fn init(db: Database, options: Options) -> Result<Shed> {
        let txn = db.begin_write().context(TransactionSnafu)?;
        {
            let _ = txn.open_table(STORE).context(TableSnafu)?;
        }
        txn.commit().context(CommitSnafu)?;

        let schema = {
            let txn = db.begin_read().context(TransactionSnafu)?;
            let table = txn.open_table(STORE).context(TableSnafu)?;
            match table.get(Schema::KEY).context(StorageSnafu)? {
                Some(record) => Schema::decode(record.value())?,
                None => Schema::default(),
            }
        };
        debug!(
            indexes = schema.index_count(),
            counters = schema.counter_count(),
            "opened store"
        );

        Ok(Shed {
            inner: Arc::new(Inner {
                db,
                schema: Mutex::new(schema),
                capacity: options.capacity,
            }),
        })
    }

    /// The soft byte budget this store was opened with, if any.
    pub fn capacity(&self) -> Option<u64> {
        self.inner.capacity
    }

    /// Register an index under `name`, allocating a prefix byte on first
    /// use. Registering the same name again yields the same prefix.
    pub fn index(&self, name: &str, codec: impl IndexCodec) -> Result<Index> {
        let prefix = {
            let mut schema = self.inner.schema.lock();
            match schema.index_prefix(name) {
                Some(prefix) => prefix,
                None => {
                    let prefix = schema.allocate_index(name)?;
                    if let Err(err) = self.persist_schema(&schema) {
                        schema.remove_index(name);
                        return Err(err);
                    }
                    debug!(name, prefix, "registered index");
                    prefix
                }
            }
        };
        Ok(Index::new(self.clone(), name.to_string(), prefix, codec))
    }

    /// Register a counter under `name`, allocating a prefix byte on first
    /// use. Registering the same name again yields the same prefix.
    pub fn counter(&self, name: &str) -> Result<Counter> {
        let prefix = {
            let mut schema = self.inner.schema.lock();
            match schema.counter_prefix(name) {
                Some(prefix) => prefix,
                None => {
                    let prefix = schema.allocate_counter(name)?;
                    if let Err(err) = self.persist_schema(&schema) {
                        schema.remove_counter(name);
                        return Err(err);
                    }
                    debug!(name, prefix, "registered counter");
                    prefix
                }
            }
        };
        Ok(Counter::new(self.clone(), name.to_string(), prefix))
    }

    fn persist_schema(&self, schema: &Schema) -> Result<()> {
        let bytes = schema.encode()?;
        self.put(Schema::KEY, &bytes)
    }

    /// Fetch the value stored under `key` as a caller-owned copy.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let table = self.read_table()?;
        match table.get(key).context(StorageSnafu)? {
            Some(value) => Ok(value.value().to_vec()),
            None => Err(Error::NotFound),
        }
    }

    /// Check whether `key` is present without materializing its value.
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        let table = self.read_table()?;
        Ok(table.get(key).context(StorageSnafu)?.is_some())
    }

    /// Store `value` under `key` in a single atomic write.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_write(|table| {
            table.insert(key, value).context(StorageSnafu)?;
            Ok(())
        })
    }

    /// Remove `key` in a single atomic write. Absent keys are a no-op.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_write(|table| {
            table.remove(key).context(StorageSnafu)?;
            Ok(())
        })
    }

    /// Start an empty batch. Writes queued on it take effect only through
    /// [`Shed::write_batch`]; dropping the batch discards them.
    pub fn batch(&self) -> Batch {
        Batch::default()
    }

    /// Apply all operations accumulated in `batch` inside one engine
    /// transaction. Either every operation commits or none does.
    pub fn write_batch(&self, batch: Batch) -> Result<()> {
        self.with_write(|table| {
            for op in batch.ops {
                match op {
                    BatchOp::Put { key, value } => {
                        table.insert(&key[..], &value[..]).context(StorageSnafu)?;
                    }
                    BatchOp::Delete { key } => {
                        table.remove(&key[..]).context(StorageSnafu)?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Walk keys in ascending order starting at `start_key`.
    ///
    /// With `skip_start` set, an exactly-present `start_key` is not
    /// yielded. The callback's slices are engine-owned and valid only for
    /// the duration of the call; `Ok(true)` stops the walk cleanly and an
    /// error aborts it. Callers scanning a prefix enforce the divergence
    /// check themselves.
    pub fn iterate(
        &self,
        start_key: &[u8],
        skip_start: bool,
        mut f: impl FnMut(&[u8], &[u8]) -> Result<bool>,
    ) -> Result<()> {
        let table = self.read_table()?;
        let lower = if skip_start {
            Bound::Excluded(start_key)
        } else {
            Bound::Included(start_key)
        };
        let range = table
            .range::<&[u8]>((lower, Bound::Unbounded))
            .context(StorageSnafu)?;
        for entry in range {
            let (key, value) = entry.context(StorageSnafu)?;
            if f(key.value(), value.value())? {
                break;
            }
        }
        Ok(())
    }

    /// Smallest key starting with `prefix`, with its value. Both are
    /// caller-owned copies.
    pub fn first(&self, prefix: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let table = self.read_table()?;
        let mut range = table.range(prefix..).context(StorageSnafu)?;
        match range.next() {
            Some(entry) => {
                let (key, value) = entry.context(StorageSnafu)?;
                if !key.value().starts_with(prefix) {
                    return Err(Error::NotFound);
                }
                Ok((key.value().to_vec(), value.value().to_vec()))
            }
            None => Err(Error::NotFound),
        }
    }

    /// Largest key starting with `prefix`, with its value. Both are
    /// caller-owned copies.
    ///
    /// Seeks to the successor of `prefix` and steps one entry back; when
    /// no same-length successor exists the scan is bounded by the end of
    /// the keyspace.
    pub fn last(&self, prefix: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        let table = self.read_table()?;
        let entry = match inc_byte_slice(prefix) {
            Some(end) => table
                .range::<&[u8]>((Bound::Included(prefix), Bound::Excluded(&end[..])))
                .context(StorageSnafu)?
                .next_back(),
            None => table.range(prefix..).context(StorageSnafu)?.next_back(),
        };
        match entry {
            Some(entry) => {
                let (key, value) = entry.context(StorageSnafu)?;
                if !key.value().starts_with(prefix) {
                    return Err(Error::NotFound);
                }
                Ok((key.value().to_vec(), value.value().to_vec()))
            }
            None => Err(Error::NotFound),
        }
    }

    /// Number of entries whose key starts with `prefix`. Exhaustive scan.
    pub fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let table = self.read_table()?;
        let mut count = 0;
        for entry in table.range(prefix..).context(StorageSnafu)? {
            let (key, _) = entry.context(StorageSnafu)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Number of entries from `start_key` to the end of the keyspace.
    /// Exhaustive scan.
    pub fn count_from(&self, start_key: &[u8]) -> Result<usize> {
        let table = self.read_table()?;
        let mut count = 0;
        for entry in table.range(start_key..).context(StorageSnafu)? {
            entry.context(StorageSnafu)?;
            count += 1;
        }
        Ok(count)
    }

    /// Open the table on a fresh read snapshot.
    pub(crate) fn read_table(
        &self,
    ) -> Result<redb::ReadOnlyTable<&'static [u8], &'static [u8]>> {
        let txn = self.inner.db.begin_read().context(TransactionSnafu)?;
        txn.open_table(STORE).context(TableSnafu)
    }

    /// Run `f` against the table inside a single write transaction and
    /// commit.
    pub(crate) fn with_write<T>(
        &self,
        f: impl FnOnce(&mut redb::Table<'_, &'static [u8], &'static [u8]>) -> Result<T>,
    ) -> Result<T> {
        let txn = self.inner.db.begin_write().context(TransactionSnafu)?;
        let out = {
            let mut table = txn.open_table(STORE).context(TableSnafu)?;
            f(&mut table)?
        };
        txn.commit().context(CommitSnafu)?;
        Ok(out)
    }
}

enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// An atomic set of writes committed together.
///
/// Operations accumulate in memory and touch the engine only when the
/// batch is handed to [`Shed::write_batch`]. Within a batch, later
/// operations on the same key win.
#[derive(Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Start an empty batch.
    pub fn new() -> Batch {
        Batch::default()
    }

    /// Queue a put of `value` under `key`.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    /// Queue a delete of `key`.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Smallest byte slice of the same length strictly greater than `b`.
///
/// Increments the last non-`0xFF` byte and zeroes everything to its
/// right. `None` when every byte is `0xFF` (or `b` is empty): no
/// same-length successor exists.
pub(crate) fn inc_byte_slice(b: &[u8]) -> Option<Vec<u8>> {
    let mut next = b.to_vec();
    for i in (0..next.len()).rev() {
        if next[i] == 0xFF {
            next[i] = 0;
        } else {
            next[i] += 1;
            return Some(next);
        }
    }
    None
}
