//! Backend change-feed payloads.

use crate::types::{DocId, OpSeq};

/// Events emitted from the single-writer backend loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// A document was created.
    Created {
        /// Target collection.
        collection: String,
        /// Server-assigned id.
        id: DocId,
    },
    /// A document was updated or had an array element appended.
    Updated {
        /// Target collection.
        collection: String,
        /// Updated id.
        id: DocId,
    },
    /// A document was removed.
    Deleted {
        /// Target collection.
        collection: String,
        /// Removed id.
        id: DocId,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
