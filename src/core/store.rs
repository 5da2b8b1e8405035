use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use ulid::Ulid;

use crate::{
    core::query::Query,
    document::{Document, FieldPatch, Fields, append_to_array},
    op::{Op, StoredOp},
    types::{DocId, OpSeq, now_ms},
};

/// Failures raised by [`DocumentStore`] mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No document with this id in the collection.
    #[error("document {collection}/{id} not found")]
    MissingDocument {
        /// Collection searched.
        collection: String,
        /// Missing id.
        id: DocId,
    },
    /// Replayed create collided with an existing id.
    #[error("document {collection}/{id} already exists")]
    AlreadyExists {
        /// Collection written.
        collection: String,
        /// Colliding id.
        id: DocId,
    },
    /// Array append targeted a field holding a non-array value.
    #[error("field {field} of {collection}/{id} is not an array")]
    FieldNotArray {
        /// Collection written.
        collection: String,
        /// Document id.
        id: DocId,
        /// Offending field.
        field: String,
    },
}

/// Serializable dump of every collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    /// Next sequence number to assign.
    pub next_op_seq: OpSeq,
    /// Collections with their documents in id order.
    pub collections: Vec<(String, Vec<Document>)>,
}

/// Authoritative document collections.
///
/// Every mutation yields the [`StoredOp`] describing it; ops accumulate in a
/// pending buffer until drained for journaling.
#[derive(Debug, Default)]
pub struct DocumentStore {
    collections: HashMap<String, HashMap<DocId, Document>>,
    pending_ops: Vec<StoredOp>,
    next_op_seq: OpSeq,
}

impl DocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store from an exported snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_op_seq: snapshot.next_op_seq.max(1),
            ..Self::default()
        };

        for (name, docs) in snapshot.collections {
            let coll = store.collections.entry(name.clone()).or_default();
            for doc in docs {
                if coll.contains_key(&doc.id) {
                    return Err(StoreError::AlreadyExists {
                        collection: name,
                        id: doc.id,
                    });
                }
                coll.insert(doc.id.clone(), doc);
            }
        }

        Ok(store)
    }

    /// Exports every collection in deterministic order.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        let mut collections: Vec<(String, Vec<Document>)> = self
            .collections
            .iter()
            .map(|(name, docs)| {
                let mut docs: Vec<Document> = docs.values().cloned().collect();
                docs.sort_by(|a, b| a.id.cmp(&b.id));
                (name.clone(), docs)
            })
            .collect();
        collections.sort_by(|a, b| a.0.cmp(&b.0));

        StoreSnapshotV1 {
            next_op_seq: self.next_op_seq,
            collections,
        }
    }

    /// Creates a document with a fresh server-assigned id.
    pub fn create(&mut self, collection: &str, fields: Fields) -> Result<(DocId, StoredOp), StoreError> {
        let id = Ulid::new().to_string();
        let seq = self.next_op_seq;
        let stored = self.apply_create_with_seq(collection, Document::new(id.clone(), fields), seq)?;
        self.pending_ops.push(stored.clone());
        Ok((id, stored))
    }

    /// Replaces the fields named in `patch`.
    pub fn update(&mut self, collection: &str, id: &str, patch: FieldPatch) -> Result<StoredOp, StoreError> {
        let seq = self.next_op_seq;
        let stored = self.apply_update_with_seq(collection, id, patch, seq)?;
        self.pending_ops.push(stored.clone());
        Ok(stored)
    }

    /// Writes `patch` to document `id`, creating it when absent.
    /// Returns whether the document already existed.
    pub fn merge(&mut self, collection: &str, id: &str, patch: FieldPatch) -> (bool, StoredOp) {
        let seq = self.next_op_seq;
        let (existed, stored) = self.apply_merge_with_seq(collection, id, patch, seq);
        self.pending_ops.push(stored.clone());
        (existed, stored)
    }

    /// Removes a document, returning it alongside the op.
    pub fn delete(&mut self, collection: &str, id: &str) -> Result<(Document, StoredOp), StoreError> {
        let seq = self.next_op_seq;
        let (doc, stored) = self.apply_delete_with_seq(collection, id, seq)?;
        self.pending_ops.push(stored.clone());
        Ok((doc, stored))
    }

    /// Appends `element` to the array under `field`.
    pub fn array_union(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        element: Value,
    ) -> Result<StoredOp, StoreError> {
        let seq = self.next_op_seq;
        let stored = self.apply_array_union_with_seq(collection, id, field, element, seq)?;
        self.pending_ops.push(stored.clone());
        Ok(stored)
    }

    /// Re-applies a journaled op, keeping its original sequence.
    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        let seq = stored.seq;
        match stored.op {
            Op::Create { collection, doc } => {
                self.apply_create_with_seq(&collection, doc, seq)?;
            }
            Op::Update { collection, id, patch } => {
                self.apply_update_with_seq(&collection, &id, patch, seq)?;
            }
            Op::Merge { collection, id, patch } => {
                self.apply_merge_with_seq(&collection, &id, patch, seq);
            }
            Op::Delete { collection, id } => {
                self.apply_delete_with_seq(&collection, &id, seq)?;
            }
            Op::ArrayUnion {
                collection,
                id,
                field,
                element,
            } => {
                self.apply_array_union_with_seq(&collection, &id, &field, element, seq)?;
            }
        }
        Ok(())
    }

    /// Borrows one document.
    pub fn get(&self, collection: &str, id: &str) -> Option<&Document> {
        self.collections.get(collection).and_then(|c| c.get(id))
    }

    /// Clones one document.
    pub fn get_cloned(&self, collection: &str, id: &str) -> Option<Document> {
        self.get(collection, id).cloned()
    }

    /// Evaluates `query` into an ordered, owned result set.
    pub fn query(&self, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .collections
            .get(&query.collection)
            .into_iter()
            .flat_map(|c| c.values())
            .filter(|d| query.matches(d))
            .cloned()
            .collect();
        query.sort(&mut docs);
        docs
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }

    /// True when `collection` holds no documents.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Takes ops produced since the last drain.
    pub fn drain_pending_ops(&mut self) -> Vec<StoredOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Ops produced but not drained yet.
    pub fn pending_op_count(&self) -> usize {
        self.pending_ops.len()
    }

    /// Highest sequence assigned so far.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn apply_create_with_seq(&mut self, collection: &str, doc: Document, seq: OpSeq) -> Result<StoredOp, StoreError> {
        let coll = self.collections.entry(collection.to_string()).or_default();
        if coll.contains_key(&doc.id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: doc.id,
            });
        }
        coll.insert(doc.id.clone(), doc.clone());

        self.bump_next_seq_from(seq);
        Ok(StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Create {
                collection: collection.to_string(),
                doc,
            },
        })
    }

    fn apply_update_with_seq(
        &mut self,
        collection: &str,
        id: &str,
        patch: FieldPatch,
        seq: OpSeq,
    ) -> Result<StoredOp, StoreError> {
        let doc = self.doc_mut(collection, id)?;
        patch.apply_to(doc);

        self.bump_next_seq_from(seq);
        Ok(StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Update {
                collection: collection.to_string(),
                id: id.to_string(),
                patch,
            },
        })
    }

    fn apply_merge_with_seq(&mut self, collection: &str, id: &str, patch: FieldPatch, seq: OpSeq) -> (bool, StoredOp) {
        let coll = self.collections.entry(collection.to_string()).or_default();
        let existed = coll.contains_key(id);
        let doc = coll
            .entry(id.to_string())
            .or_insert_with(|| Document::new(id, Fields::new()));
        patch.apply_to(doc);

        self.bump_next_seq_from(seq);
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Merge {
                collection: collection.to_string(),
                id: id.to_string(),
                patch,
            },
        };
        (existed, stored)
    }

    fn apply_delete_with_seq(
        &mut self,
        collection: &str,
        id: &str,
        seq: OpSeq,
    ) -> Result<(Document, StoredOp), StoreError> {
        let doc = self
            .collections
            .get_mut(collection)
            .and_then(|c| c.remove(id))
            .ok_or_else(|| missing(collection, id))?;

        self.bump_next_seq_from(seq);
        let stored = StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::Delete {
                collection: collection.to_string(),
                id: id.to_string(),
            },
        };
        Ok((doc, stored))
    }

    fn apply_array_union_with_seq(
        &mut self,
        collection: &str,
        id: &str,
        field: &str,
        element: Value,
        seq: OpSeq,
    ) -> Result<StoredOp, StoreError> {
        let doc = self.doc_mut(collection, id)?;
        if !append_to_array(doc, field, element.clone()) {
            return Err(StoreError::FieldNotArray {
                collection: collection.to_string(),
                id: id.to_string(),
                field: field.to_string(),
            });
        }

        self.bump_next_seq_from(seq);
        Ok(StoredOp {
            seq,
            ts_ms: now_ms(),
            op: Op::ArrayUnion {
                collection: collection.to_string(),
                id: id.to_string(),
                field: field.to_string(),
                element,
            },
        })
    }

    fn doc_mut(&mut self, collection: &str, id: &str) -> Result<&mut Document, StoreError> {
        self.collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| missing(collection, id))
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn missing(collection: &str, id: &str) -> StoreError {
    StoreError::MissingDocument {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}
