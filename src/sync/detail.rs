//! Detail-view selection state reconciled against the mirror.

use serde_json::Value;

use crate::{
    document::{Document, FieldPatch, append_to_array},
    types::DocId,
};

use super::mirror::Mirror;

/// `Closed → Open(id) → Closed`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetailState {
    /// Nothing selected.
    #[default]
    Closed,
    /// One document selected, with the copy currently rendered.
    Open {
        /// Selected document id.
        id: DocId,
        /// Copy captured at open time, refreshed by reconciliation and
        /// patched locally for immediate feedback.
        captured: Document,
    },
}

/// Result of re-resolving the selection after a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// No detail view was open.
    Idle,
    /// The selection was found and its copy refreshed.
    Refreshed,
    /// The selected document disappeared; the view closed itself.
    Closed(DocId),
}

/// Detail view over one document of a mirror.
#[derive(Debug, Default)]
pub struct DetailView {
    state: DetailState,
}

impl DetailView {
    /// Closed view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens on `id` if the mirror holds it. Returns false otherwise and
    /// leaves the state unchanged.
    pub fn open(&mut self, mirror: &Mirror, id: &str) -> bool {
        match mirror.find(id) {
            Some(doc) => {
                self.state = DetailState::Open {
                    id: doc.id.clone(),
                    captured: doc,
                };
                true
            }
            None => false,
        }
    }

    /// Explicit dismissal.
    pub fn close(&mut self) {
        self.state = DetailState::Closed;
    }

    /// Current state.
    pub fn state(&self) -> &DetailState {
        &self.state
    }

    /// True while a document is selected.
    pub fn is_open(&self) -> bool {
        matches!(self.state, DetailState::Open { .. })
    }

    /// Selected id, if any.
    pub fn selected_id(&self) -> Option<&str> {
        match &self.state {
            DetailState::Open { id, .. } => Some(id),
            DetailState::Closed => None,
        }
    }

    /// The rendered copy of the selection.
    pub fn current(&self) -> Option<&Document> {
        match &self.state {
            DetailState::Open { captured, .. } => Some(captured),
            DetailState::Closed => None,
        }
    }

    /// Applies a locally issued patch to the rendered copy.
    pub fn patch_local(&mut self, patch: &FieldPatch) {
        if let DetailState::Open { captured, .. } = &mut self.state {
            patch.apply_to(captured);
        }
    }

    /// Applies a locally issued array append to the rendered copy.
    pub fn append_local(&mut self, field: &str, element: Value) {
        if let DetailState::Open { captured, .. } = &mut self.state {
            append_to_array(captured, field, element);
        }
    }

    /// Re-resolves the selection against the mirror's current view.
    pub fn reconcile(&mut self, mirror: &Mirror) -> Reconciled {
        let DetailState::Open { id, .. } = &self.state else {
            return Reconciled::Idle;
        };
        match mirror.find(id) {
            Some(doc) => {
                self.state = DetailState::Open {
                    id: doc.id.clone(),
                    captured: doc,
                };
                Reconciled::Refreshed
            }
            None => {
                let id = id.clone();
                tracing::debug!(%id, "selected document gone; closing detail view");
                self.state = DetailState::Closed;
                Reconciled::Closed(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::*;
    use crate::sync::backend::Snapshot;

    fn post(id: &str, replies: usize) -> Document {
        let mut fields = Map::new();
        fields.insert("message".into(), json!("hello"));
        fields.insert("replies".into(), json!(vec![json!({ "message": "hi" }); replies]));
        Document::new(id, fields)
    }

    fn mirror_of(seq: u64, docs: Vec<Document>) -> Mirror {
        let mut mirror = Mirror::new();
        mirror.replace(Snapshot { seq, documents: docs });
        mirror
    }

    #[test]
    fn opening_an_absent_id_keeps_the_view_closed() {
        let mirror = mirror_of(1, vec![post("a", 0)]);
        let mut view = DetailView::new();
        assert!(!view.open(&mirror, "zzz"));
        assert_eq!(view.state(), &DetailState::Closed);
        assert_eq!(view.reconcile(&mirror), Reconciled::Idle);
    }

    #[test]
    fn local_append_shows_until_the_snapshot_confirms_it() {
        let mut mirror = mirror_of(1, vec![post("a", 1)]);
        let mut view = DetailView::new();
        assert!(view.open(&mirror, "a"));

        view.append_local("replies", json!({ "message": "Nice!" }));
        assert_eq!(view.current().map(|d| d.array_field("replies").len()), Some(2));

        mirror.replace(Snapshot { seq: 2, documents: vec![post("a", 2)] });
        assert_eq!(view.reconcile(&mirror), Reconciled::Refreshed);
        assert_eq!(view.current().map(|d| d.array_field("replies").len()), Some(2));
    }

    #[test]
    fn deleted_selection_closes_quietly() {
        let mut mirror = mirror_of(1, vec![post("a", 0), post("b", 0)]);
        let mut view = DetailView::new();
        assert!(view.open(&mirror, "b"));

        mirror.replace(Snapshot { seq: 2, documents: vec![post("a", 0)] });
        assert_eq!(view.reconcile(&mirror), Reconciled::Closed("b".to_string()));
        assert!(!view.is_open());
        assert_eq!(view.selected_id(), None);
        assert_eq!(view.reconcile(&mirror), Reconciled::Idle);
    }
}
