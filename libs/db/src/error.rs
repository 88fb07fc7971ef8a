//! Error types for the log store.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the storage layer.
///
/// Decode failures are never silently skipped: dropping a stored record
/// without signal would change query results, so corruption always reaches
/// the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stored record value does not match the expected binary layout.
    #[error("invalid log record format: {0}")]
    CorruptRecord(&'static str),

    /// The persisted sequence counter has an unexpected width.
    #[error("invalid sequence counter value")]
    CorruptSequence,

    /// A column family the registry knows about is missing from the engine.
    #[error("unknown column family: {0}")]
    MissingColumnFamily(String),

    /// An engine-level get/put/create/iterate failure.
    #[error(transparent)]
    Engine(#[from] rocksdb::Error),
}
