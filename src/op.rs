//! Mutation operation model and persistence wrappers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    document::{Document, FieldPatch},
    types::{DocId, OpSeq, TimestampMs},
};

/// Version number for serialized [`StoredOpEnvelope`] payloads.
pub const OP_FORMAT_VERSION: u16 = 1;

/// Immutable operation appended to the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Create a document with its server-assigned id.
    Create {
        /// Target collection.
        collection: String,
        /// Created document.
        doc: Document,
    },
    /// Replace some fields of an existing document.
    Update {
        /// Target collection.
        collection: String,
        /// Document id to mutate.
        id: DocId,
        /// Forward patch.
        patch: FieldPatch,
    },
    /// Write fields to a caller-chosen id, creating the document if absent.
    Merge {
        /// Target collection.
        collection: String,
        /// Document id to create or mutate.
        id: DocId,
        /// Fields written.
        patch: FieldPatch,
    },
    /// Remove a document.
    Delete {
        /// Target collection.
        collection: String,
        /// Removed document id.
        id: DocId,
    },
    /// Append one element to an array field.
    ArrayUnion {
        /// Target collection.
        collection: String,
        /// Document id to mutate.
        id: DocId,
        /// Array field name.
        field: String,
        /// Appended element.
        element: Value,
    },
}

impl Op {
    /// Collection touched by this op.
    pub fn collection(&self) -> &str {
        match self {
            Op::Create { collection, .. }
            | Op::Update { collection, .. }
            | Op::Merge { collection, .. }
            | Op::Delete { collection, .. }
            | Op::ArrayUnion { collection, .. } => collection,
        }
    }

    /// Document touched by this op.
    pub fn doc_id(&self) -> &str {
        match self {
            Op::Create { doc, .. } => &doc.id,
            Op::Update { id, .. }
            | Op::Merge { id, .. }
            | Op::Delete { id, .. }
            | Op::ArrayUnion { id, .. } => id,
        }
    }
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Operation body.
    pub op: Op,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped operation.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Constructs an envelope using [`OP_FORMAT_VERSION`].
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
