//! Range-scan query executor.
//!
//! Executes a forward scan over one partition between derived key bounds,
//! decoding each value and applying the level and tag predicates during
//! iteration. Pagination is offset-based and counted over matches only.
//!
//! The scan visits every key between the bounds regardless of page number;
//! deep pages are linear in the number of keys in range, not in the page
//! size.

use chrono::{DateTime, Utc};
use rocksdb::{Direction, IteratorMode};

use crate::error::{Error, Result};
use crate::keys;
use crate::record::LogRecord;
use crate::registry::Partition;
use crate::storage::Db;

/// Scan `partition` for records created in `[start, end]`.
///
/// A record matches when its level is at least `min_level` (0 disables the
/// level predicate) and its tag set contains every tag in `tags`. The first
/// `(page - 1) * page_size` matches are skipped without being collected and
/// at most `page_size` matches are returned; iteration stops as soon as the
/// page is full.
///
/// A decode failure on any visited value aborts the scan: silently skipping
/// an unreadable record would change query results without signal.
#[allow(clippy::too_many_arguments)]
pub(crate) fn scan(
    db: &Db,
    partition: &Partition,
    min_level: u8,
    tags: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    page: usize,
    page_size: usize,
) -> Result<Vec<LogRecord>> {
    let (key_start, key_end) = keys::scan_bounds(start, end);

    let cf = db
        .cf_handle(partition.name())
        .ok_or_else(|| Error::MissingColumnFamily(partition.name().to_owned()))?;

    let mut offset = page.saturating_sub(1) * page_size;
    let mut records = Vec::new();

    // Iterator is scoped to this call; dropped on every exit path,
    // including the early break below and decode errors.
    let iter = db.iterator_cf(&cf, IteratorMode::From(&key_start, Direction::Forward));

    for item in iter {
        let (key, value) = item?;
        if key.as_ref() > key_end.as_slice() {
            break;
        }

        let record = LogRecord::decode(&value)?;

        if min_level > 0 && record.level < min_level {
            continue;
        }

        if !tags
            .iter()
            .all(|tag| record.tags.iter().any(|have| have == tag))
        {
            continue;
        }

        if offset > 0 {
            offset -= 1;
            continue;
        }

        records.push(record);
        if records.len() == page_size {
            break;
        }
    }

    Ok(records)
}
