//! Journal sink abstraction and SQLite implementation.

/// SQLite-backed append-only op journal.
pub mod sqlite;

use thiserror::Error;

use crate::{
    core::store::{StoreError, StoreSnapshotV1},
    op::StoredOp,
    types::OpSeq,
};

/// Failures raised while journaling or replaying ops.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite driver error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Payload encode/decode error.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// Replay hit an op the store rejected.
    #[error("replay: {0}")]
    Replay(#[from] StoreError),
    /// Stored payload written by an incompatible format version.
    #[error("unsupported {what} format version {version}")]
    UnsupportedVersion {
        /// Payload kind, `op` or `snapshot`.
        what: &'static str,
        /// Version found in the row.
        version: u16,
    },
    /// Anything else, already formatted.
    #[error("{0}")]
    Message(String),
}

/// Convenience alias for sink results.
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination for journaled ops produced by the backend loop.
pub trait OpSink: Send {
    /// Appends ops in sequence order; returns the highest durable sequence.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    /// Forces buffered writes down to storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
    /// Records a full store snapshot covering every op up to `last_seq`.
    fn write_snapshot(&mut self, _snapshot: &StoreSnapshotV1, _last_seq: OpSeq) -> PersistResult<()> {
        Ok(())
    }
    /// Deletes journaled ops up to and including `seq`.
    fn compact_through(&mut self, _seq: OpSeq) -> PersistResult<usize> {
        Ok(0)
    }
}
