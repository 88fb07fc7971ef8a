//! Storage facade: open/close lifecycle, save, load and stats.
//!
//! Composes the partition registry, the sequence allocator, the key scheme
//! and the record codec on top of a RocksDB database with one column family
//! per application namespace.
//!
//! Save path: resolve partition → allocate sequence → build key → encode →
//! put. Load path: resolve partition → derive scan bounds → forward
//! iterator → decode/filter/paginate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode,
    MultiThreaded, Options,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::keys;
use crate::record::LogRecord;
use crate::registry::PartitionRegistry;
use crate::scan;
use crate::sequence::SequenceAllocator;

/// Multi-threaded-CF mode is required: partitions are created at runtime
/// from concurrent requests while other threads read.
pub(crate) type Db = DBWithThreadMode<MultiThreaded>;

/// The engine's mandatory default column family; holds no records.
const DEFAULT_CF: &str = "default";

/// Engine property returned verbatim by [`Storage::stats`].
const STATS_PROPERTY: &str = "rocksdb.stats";

// ============================================================================
// Configuration
// ============================================================================

/// Value compression applied to stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Compression {
    NoCompression,
    #[default]
    Snappy,
    Zlib,
    BZip2,
    LZ4,
    LZ4HC,
}

impl From<Compression> for DBCompressionType {
    fn from(compression: Compression) -> Self {
        match compression {
            Compression::NoCompression => DBCompressionType::None,
            Compression::Snappy => DBCompressionType::Snappy,
            Compression::Zlib => DBCompressionType::Zlib,
            Compression::BZip2 => DBCompressionType::Bz2,
            Compression::LZ4 => DBCompressionType::Lz4,
            Compression::LZ4HC => DBCompressionType::Lz4hc,
        }
    }
}

/// Options for opening a [`Storage`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Fixed page size used by [`Storage::load`].
    pub records_per_page: usize,
    /// Shared LRU block cache size in bytes.
    pub cache_size_bytes: usize,
    /// Value compression for all partitions.
    pub compression: Compression,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            records_per_page: 100,
            cache_size_bytes: 16 * 1024 * 1024,
            compression: Compression::default(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Handle to an open log store.
///
/// Safe to share across threads behind an `Arc`; the only internal locking
/// is on the partition-create path and the per-partition sequence counter.
pub struct Storage {
    db: Db,
    registry: PartitionRegistry,
    sequences: SequenceAllocator,
    cache: Cache,
    config: StorageConfig,
    path: PathBuf,
}

impl Storage {
    /// Open (or create) the store at `path` and rehydrate the partition
    /// registry from the column families already on disk.
    ///
    /// The store is unusable without this succeeding; callers treat a
    /// failure here as fatal for the process.
    #[tracing::instrument(skip(path, config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: StorageConfig) -> Result<Storage> {
        let path = path.as_ref();

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.set_compression_type(config.compression.into());

        // A fresh directory has no manifest to list; open just the
        // mandatory default family in that case.
        let cf_names = Db::list_cf(&Options::default(), path)
            .unwrap_or_else(|_| vec![DEFAULT_CF.to_owned()]);

        let cache = Cache::new_lru_cache(config.cache_size_bytes);
        let descriptors: Vec<ColumnFamilyDescriptor> = cf_names
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(name, cf_options(&cache, config.compression)))
            .collect();

        let db = Db::open_cf_descriptors(&db_opts, path, descriptors)?;

        let registry = PartitionRegistry::new();
        for name in &cf_names {
            if name != DEFAULT_CF {
                registry.insert_existing(name);
            }
        }

        tracing::info!(partitions = registry.len(), "opened log store");

        Ok(Storage {
            db,
            registry,
            sequences: SequenceAllocator::new(),
            cache,
            config,
            path: path.to_path_buf(),
        })
    }

    /// Release all column family handles and the engine handle.
    pub fn close(self) {
        tracing::info!(path = %self.path.display(), "closing log store");
    }

    /// Persist `record` under `application`.
    ///
    /// A missing `created_at` is resolved to the current time (at codec
    /// precision) and written back into `record`, and duplicate tags are
    /// collapsed in place, so the caller can echo the record exactly as
    /// stored.
    pub fn save(&self, application: &str, record: &mut LogRecord) -> Result<()> {
        let partition = self
            .registry
            .resolve(&self.db, application, self.cf_options())?;

        let created_at = match record.created_at {
            Some(ts) => ts,
            None => {
                let now = Utc::now();
                let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
                record.created_at = Some(now);
                now
            }
        };

        let mut seen = HashSet::new();
        record.tags.retain(|tag| seen.insert(tag.clone()));

        // The counter write is durable before the key is built, so a crash
        // between the two leaves a gap in the sequence, never a collision.
        let seq = self.sequences.next(&self.db, &partition)?;
        let key = keys::record_key(created_at, seq);

        let cf = self
            .db
            .cf_handle(partition.name())
            .ok_or_else(|| Error::MissingColumnFamily(partition.name().to_owned()))?;
        self.db.put_cf(&cf, key, record.encode(created_at))?;

        tracing::trace!(application, seq, "saved log record");
        Ok(())
    }

    /// Load records for `application` created in `[start, end]`, filtered
    /// by minimum level (0 means no minimum) and required tags, returning
    /// the requested page of matches.
    ///
    /// A namespace that has never been written to yields an empty vector,
    /// not an error.
    pub fn load(
        &self,
        application: &str,
        min_level: u8,
        tags: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: usize,
    ) -> Result<Vec<LogRecord>> {
        let partition = self
            .registry
            .resolve(&self.db, application, self.cf_options())?;

        scan::scan(
            &self.db,
            &partition,
            min_level,
            tags,
            start,
            end,
            page,
            self.config.records_per_page,
        )
    }

    /// Engine-level diagnostic text for the application's partition.
    pub fn stats(&self, application: &str) -> Result<String> {
        let partition = self
            .registry
            .resolve(&self.db, application, self.cf_options())?;

        let cf = self
            .db
            .cf_handle(partition.name())
            .ok_or_else(|| Error::MissingColumnFamily(partition.name().to_owned()))?;

        Ok(self
            .db
            .property_value_cf(&cf, STATS_PROPERTY)?
            .unwrap_or_default())
    }

    fn cf_options(&self) -> Options {
        cf_options(&self.cache, self.config.compression)
    }
}

/// Column family options shared by rehydrated and newly created partitions.
fn cf_options(cache: &Cache, compression: Compression) -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(compression.into());

    let mut block_opts = BlockBasedOptions::default();
    block_opts.set_block_cache(cache);
    opts.set_block_based_table_factory(&block_opts);

    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ts(text: &str) -> DateTime<Utc> {
        text.parse().unwrap()
    }

    #[test]
    fn open_creates_fresh_store() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("db"), StorageConfig::default()).unwrap();
        storage.close();
    }

    #[test]
    fn save_defaults_created_at() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("db"), StorageConfig::default()).unwrap();

        let mut record = LogRecord {
            message: "hello".to_string(),
            level: 3,
            tags: vec![],
            created_at: None,
        };
        storage.save("apptest", &mut record).unwrap();

        let created_at = record.created_at.expect("created_at resolved by save");
        let age = Utc::now().signed_duration_since(created_at);
        assert!(age.num_seconds().abs() < 5);
        // Stored at codec precision, so the echo has no sub-millisecond part.
        assert_eq!(created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn save_collapses_duplicate_tags() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().join("db"), StorageConfig::default()).unwrap();

        let mut record = LogRecord {
            message: "dup tags".to_string(),
            level: 2,
            tags: vec!["a".into(), "b".into(), "a".into()],
            created_at: Some(ts("2020-05-05T12:00:00.000Z")),
        };
        storage.save("apptest", &mut record).unwrap();
        assert_eq!(record.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn partitions_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");

        let storage = Storage::open(&path, StorageConfig::default()).unwrap();
        let mut record = LogRecord {
            message: "persisted".to_string(),
            level: 4,
            tags: vec![],
            created_at: Some(ts("2020-05-05T12:00:00.000Z")),
        };
        storage.save("app1", &mut record).unwrap();
        storage.close();

        let storage = Storage::open(&path, StorageConfig::default()).unwrap();
        let records = storage
            .load(
                "app1",
                0,
                &[],
                ts("2020-05-05T00:00:00.000Z"),
                ts("2020-05-06T00:00:00.000Z"),
                1,
            )
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "persisted");
    }
}
