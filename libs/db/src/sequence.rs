//! Durable per-partition sequence allocator.
//!
//! Each partition holds one counter under a reserved key, persisted in the
//! same column family as the records it disambiguates so that a process
//! restart continues the sequence instead of reusing values. The counter is
//! incremented and written back *before* the new value is returned, so two
//! concurrent allocations for one partition can never hand out the same
//! number.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::registry::Partition;
use crate::storage::Db;

/// Reserved key holding the counter. `:` sorts above any decimal digit, so
/// this key lies outside every timestamp-bounded scan range.
pub(crate) const SEQ_KEY: &[u8] = b"::seq::";

/// Hands out strictly increasing sequence numbers per partition.
pub(crate) struct SequenceAllocator {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SequenceAllocator {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Allocate the next sequence number for `partition`.
    ///
    /// Reads the current counter (absent means zero), increments it and
    /// persists the new value synchronously before returning it. Allocation
    /// is serialized per partition; distinct partitions do not contend.
    pub(crate) fn next(&self, db: &Db, partition: &Partition) -> Result<u64> {
        let lock = self
            .locks
            .entry(partition.name().to_owned())
            .or_default()
            .clone();
        let _guard = lock.lock();

        let cf = db
            .cf_handle(partition.name())
            .ok_or_else(|| Error::MissingColumnFamily(partition.name().to_owned()))?;

        let current = match db.get_cf(&cf, SEQ_KEY)? {
            None => 0,
            Some(raw) => u64::from_be_bytes(
                raw.as_slice().try_into().map_err(|_| Error::CorruptSequence)?,
            ),
        };

        let next = current + 1;
        db.put_cf(&cf, SEQ_KEY, next.to_be_bytes())?;

        Ok(next)
    }
}
