//! Log record type and its binary codec.
//!
//! Stored values use a compact newline-delimited layout, wire-compatible
//! with earlier revisions of this system:
//!
//! ```text
//! [level: 1 byte][tags joined with ','][\n][created_at text][\n][message...]
//! ```
//!
//! The timestamp section is fixed-width UTC text at millisecond precision
//! with an explicit zero offset (`2015-01-02T03:04:05.123+00:00`). The same
//! format string is used by the key scheme so that record keys sort
//! chronologically (see `keys`).
//!
//! Known limitation: a message or tag containing `,` or `\n` does not
//! round-trip. The layout is isolated behind `encode`/`decode` so a
//! length-prefixed format can replace it without touching callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timestamp text format shared by the record codec and the key scheme.
///
/// Every field is zero-padded to a fixed width and the offset is always
/// `+00:00`, so lexicographic byte order of the rendered text equals
/// chronological order.
pub(crate) const DB_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// A single log entry in an application's stream.
///
/// Records are immutable once saved. `created_at: None` means "not
/// supplied"; `Storage::save` fills it with the current time, and records
/// coming back out of the store always carry `Some`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub message: String,
    pub level: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LogRecord {
    /// Encode the record with the given (already resolved) creation time.
    ///
    /// The facade resolves `created_at` before encoding, so this is total.
    pub fn encode(&self, created_at: DateTime<Utc>) -> Vec<u8> {
        let tags = self.tags.join(",");
        let timestamp = created_at.format(DB_TIME_FORMAT).to_string();

        let mut buf = Vec::with_capacity(1 + tags.len() + 1 + timestamp.len() + 1 + self.message.len());
        buf.push(self.level);
        buf.extend_from_slice(tags.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(timestamp.as_bytes());
        buf.push(b'\n');
        buf.extend_from_slice(self.message.as_bytes());
        buf
    }

    /// Decode a stored value.
    ///
    /// Fails with [`Error::CorruptRecord`] when the level byte is absent,
    /// either newline-terminated section is missing, or the timestamp does
    /// not parse under [`DB_TIME_FORMAT`].
    pub fn decode(src: &[u8]) -> Result<LogRecord> {
        let (&level, rest) = src
            .split_first()
            .ok_or(Error::CorruptRecord("missing level byte"))?;

        let newline = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(Error::CorruptRecord("unterminated tag section"))?;
        let (tag_bytes, rest) = (&rest[..newline], &rest[newline + 1..]);

        let tags = if tag_bytes.is_empty() {
            Vec::new()
        } else {
            std::str::from_utf8(tag_bytes)
                .map_err(|_| Error::CorruptRecord("non-utf8 tag section"))?
                .split(',')
                .map(str::to_owned)
                .collect()
        };

        let newline = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(Error::CorruptRecord("unterminated timestamp section"))?;
        let (ts_bytes, message_bytes) = (&rest[..newline], &rest[newline + 1..]);

        let ts_text = std::str::from_utf8(ts_bytes)
            .map_err(|_| Error::CorruptRecord("non-utf8 timestamp section"))?;
        let created_at = DateTime::parse_from_str(ts_text, DB_TIME_FORMAT)
            .map_err(|_| Error::CorruptRecord("malformed timestamp"))?
            .with_timezone(&Utc);

        let message = std::str::from_utf8(message_bytes)
            .map_err(|_| Error::CorruptRecord("non-utf8 message"))?
            .to_owned();

        Ok(LogRecord {
            message,
            level,
            tags,
            created_at: Some(created_at),
        })
    }
}
