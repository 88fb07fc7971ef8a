//! Partition registry: application name to column family mapping.
//!
//! Partitions are created lazily on first save or load for a namespace and
//! persist for the lifetime of the store. The registry is process-wide
//! shared state; reads are lock-free, while the create path runs under a
//! mutex and re-checks the map so a race between two requests for a new
//! namespace creates the column family exactly once.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rocksdb::Options;

use crate::error::Result;
use crate::storage::Db;

/// Opaque handle to one application's keyspace.
///
/// Handles are immutable once created and cheap to clone; the engine-level
/// column family handle is looked up per operation.
#[derive(Debug, Clone)]
pub struct Partition {
    name: Arc<str>,
}

impl Partition {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
        }
    }

    /// The namespace (column family) name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) struct PartitionRegistry {
    partitions: DashMap<String, Partition>,
    create_lock: Mutex<()>,
}

impl PartitionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            partitions: DashMap::new(),
            create_lock: Mutex::new(()),
        }
    }

    /// Register a column family that already exists on disk.
    ///
    /// Called once per existing family at open, so a process restart does
    /// not lose namespaces.
    pub(crate) fn insert_existing(&self, name: &str) {
        self.partitions
            .insert(name.to_owned(), Partition::new(name));
    }

    /// Number of known partitions.
    pub(crate) fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Return the partition for `name`, creating its column family on first
    /// use.
    pub(crate) fn resolve(&self, db: &Db, name: &str, cf_opts: Options) -> Result<Partition> {
        if let Some(partition) = self.partitions.get(name) {
            return Ok(partition.clone());
        }

        let _guard = self.create_lock.lock();

        // Another request may have created it while we waited for the lock.
        if let Some(partition) = self.partitions.get(name) {
            return Ok(partition.clone());
        }

        db.create_cf(name, &cf_opts)?;
        tracing::debug!(partition = name, "created column family");

        let partition = Partition::new(name);
        self.partitions.insert(name.to_owned(), partition.clone());
        Ok(partition)
    }
}
