//! Append-only log record store addressed by application namespace.
//!
//! Each application gets its own RocksDB column family. Record keys are
//! built from a fixed-width UTC timestamp and a per-application sequence
//! number, so a forward range scan returns records in creation order;
//! level and tag filters and offset pagination are applied during the scan.
//!
//! ```ignore
//! use logbook_db::{LogRecord, Storage, StorageConfig};
//!
//! let storage = Storage::open("/var/lib/logbook/db", StorageConfig::default())?;
//!
//! let mut record = LogRecord {
//!     message: "deploy finished".to_string(),
//!     level: 3,
//!     tags: vec!["deploy".to_string()],
//!     created_at: None, // resolved by save
//! };
//! storage.save("billing", &mut record)?;
//!
//! let records = storage.load("billing", 2, &[], start, end, 1)?;
//! ```

mod error;
mod keys;
mod record;
mod registry;
mod scan;
mod sequence;
mod storage;

pub use error::{Error, Result};
pub use record::LogRecord;
pub use registry::Partition;
pub use storage::{Compression, Storage, StorageConfig};
