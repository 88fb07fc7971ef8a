//! Record key scheme.
//!
//! A record key is the fixed-width UTC timestamp text followed by `_` and a
//! zero-padded 16-digit hexadecimal sequence number:
//!
//! ```text
//! 2015-01-02T03:04:05.123+00:00_000000000000002a
//! ```
//!
//! Every field of the timestamp renders at a fixed width, so lexicographic
//! byte order of keys equals chronological order of creation times; the
//! fixed-width suffix breaks ties between records sharing a millisecond in
//! allocation order. The suffix covers the full `u64` counter range.

use chrono::{DateTime, Utc};

use crate::record::DB_TIME_FORMAT;

/// Largest possible sequence suffix, used for the upper scan bound.
const MAX_SEQ_SUFFIX: &str = "ffffffffffffffff";

/// Build the engine key for a record created at `created_at` with the given
/// per-partition sequence number.
pub(crate) fn record_key(created_at: DateTime<Utc>, seq: u64) -> Vec<u8> {
    format!("{}_{:016x}", created_at.format(DB_TIME_FORMAT), seq).into_bytes()
}

/// Inclusive scan bounds for records created in `[start, end]`.
///
/// The start bound carries an empty suffix, making it a prefix of (and thus
/// ordered before) every real key at `start`; the end bound carries the
/// maximum suffix, ordering it after every real key at `end`.
pub(crate) fn scan_bounds(start: DateTime<Utc>, end: DateTime<Utc>) -> (Vec<u8>, Vec<u8>) {
    let key_start = format!("{}_", start.format(DB_TIME_FORMAT)).into_bytes();
    let key_end = format!("{}_{}", end.format(DB_TIME_FORMAT), MAX_SEQ_SUFFIX).into_bytes();
    (key_start, key_end)
}
