//! Client-local copy of the latest snapshot plus optimistic overlays.
//!
//! The mirror holds exactly the documents of the last [`Snapshot`] it was
//! given. Local changes applied before backend confirmation live in a
//! separate overlay list, each identified by a [`Ticket`]. Reads apply the
//! overlays, in issue order, on top of the snapshot.
//!
//! Once the backend acknowledges a mutation, its overlay is tagged with the
//! sequence the backend assigned ([`Mirror::confirm`]). [`Mirror::replace`]
//! drops exactly the overlays the new snapshot already covers, those
//! confirmed at or below its sequence. Overlays confirmed later, or not
//! acknowledged yet, survive an older snapshot. A failed mutation rolls
//! back its own overlay by ticket.

use serde_json::Value;

use crate::{
    document::{Document, FieldPatch, append_to_array},
    types::{DocId, OpSeq},
};

use super::backend::Snapshot;

/// Handle to one optimistic overlay.
pub type Ticket = u64;

#[derive(Debug, Clone)]
enum Overlay {
    Insert(Document),
    Patch { id: DocId, patch: FieldPatch },
    Append { id: DocId, field: String, element: Value },
    Remove(DocId),
}

#[derive(Debug, Clone)]
struct Pending {
    ticket: Ticket,
    confirmed_at: Option<OpSeq>,
    overlay: Overlay,
}

impl Pending {
    fn covered_by(&self, seq: OpSeq) -> bool {
        self.confirmed_at.is_some_and(|at| at <= seq)
    }
}

/// Snapshot mirror for one feature view.
#[derive(Debug, Default)]
pub struct Mirror {
    documents: Vec<Document>,
    seq: Option<OpSeq>,
    overlays: Vec<Pending>,
    next_ticket: Ticket,
    generation: u64,
}

impl Mirror {
    /// Empty mirror that has not seen a snapshot yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents wholesale with `snapshot` and drops the
    /// overlays it supersedes. Returns how many were discarded.
    pub fn replace(&mut self, snapshot: Snapshot) -> usize {
        let before = self.overlays.len();
        self.overlays.retain(|p| !p.covered_by(snapshot.seq));
        let discarded = before - self.overlays.len();
        self.documents = snapshot.documents;
        self.seq = Some(snapshot.seq);
        self.generation += 1;
        if discarded > 0 {
            tracing::debug!(discarded, seq = snapshot.seq, "optimistic overlays superseded");
        }
        discarded
    }

    /// Current view: last snapshot with overlays applied.
    pub fn get(&self) -> Vec<Document> {
        if self.overlays.is_empty() {
            return self.documents.clone();
        }
        let mut docs = self.documents.clone();
        for pending in &self.overlays {
            apply_overlay(&mut docs, &pending.overlay);
        }
        docs
    }

    /// Documents exactly as last delivered, without overlays.
    pub fn authoritative(&self) -> &[Document] {
        &self.documents
    }

    /// Looks up one document in the current view.
    pub fn find(&self, id: &str) -> Option<Document> {
        if self.overlays.is_empty() {
            return self.documents.iter().find(|d| d.id == id).cloned();
        }
        self.get().into_iter().find(|d| d.id == id)
    }

    /// True when `id` is present in the current view.
    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Number of documents in the current view.
    pub fn len(&self) -> usize {
        self.get().len()
    }

    /// True when the current view is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence of the last snapshot, `None` before the first one.
    pub fn seq(&self) -> Option<OpSeq> {
        self.seq
    }

    /// Number of snapshots applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of overlays not yet superseded by a snapshot.
    pub fn pending(&self) -> usize {
        self.overlays.len()
    }

    /// Shows `doc` before the backend confirms its creation.
    pub fn optimistic_insert(&mut self, doc: Document) -> Ticket {
        self.push(Overlay::Insert(doc))
    }

    /// Shows a field replacement before the backend confirms it.
    pub fn optimistic_patch(&mut self, id: impl Into<DocId>, patch: FieldPatch) -> Ticket {
        self.push(Overlay::Patch { id: id.into(), patch })
    }

    /// Shows an array append before the backend confirms it.
    pub fn optimistic_append(&mut self, id: impl Into<DocId>, field: impl Into<String>, element: Value) -> Ticket {
        self.push(Overlay::Append {
            id: id.into(),
            field: field.into(),
            element,
        })
    }

    /// Hides a document before the backend confirms its removal.
    pub fn optimistic_remove(&mut self, id: impl Into<DocId>) -> Ticket {
        self.push(Overlay::Remove(id.into()))
    }

    /// Records that the backend applied the overlay's mutation at `seq`.
    /// The overlay now lasts until a snapshot at or past `seq` arrives, and
    /// is dropped at once when the current snapshot already covers it.
    /// Returns false if the ticket is unknown.
    pub fn confirm(&mut self, ticket: Ticket, seq: OpSeq) -> bool {
        let Some(pending) = self.overlays.iter_mut().find(|p| p.ticket == ticket) else {
            return false;
        };
        pending.confirmed_at = Some(seq);
        if self.seq.is_some_and(|current| seq <= current) {
            self.overlays.retain(|p| p.ticket != ticket);
        }
        true
    }

    /// Withdraws one overlay. Returns false if it was already superseded.
    pub fn rollback(&mut self, ticket: Ticket) -> bool {
        let before = self.overlays.len();
        self.overlays.retain(|p| p.ticket != ticket);
        self.overlays.len() != before
    }

    fn push(&mut self, overlay: Overlay) -> Ticket {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.overlays.push(Pending {
            ticket,
            confirmed_at: None,
            overlay,
        });
        ticket
    }
}

fn apply_overlay(docs: &mut Vec<Document>, overlay: &Overlay) {
    match overlay {
        Overlay::Insert(doc) => match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc.clone(),
            None => docs.push(doc.clone()),
        },
        Overlay::Patch { id, patch } => {
            if let Some(doc) = docs.iter_mut().find(|d| &d.id == id) {
                patch.apply_to(doc);
            }
        }
        Overlay::Append { id, field, element } => {
            if let Some(doc) = docs.iter_mut().find(|d| &d.id == id) {
                append_to_array(doc, field, element.clone());
            }
        }
        Overlay::Remove(id) => docs.retain(|d| &d.id != id),
    }
}
