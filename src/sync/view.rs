//! One feature's live view of its collection.
//!
//! Activation opens the subscription and applies the initial snapshot.
//! Deactivation (explicit, or on drop) cancels the subscription, every
//! pending transient timer and the detail view, on every path.

use std::time::Duration;

use tokio::sync::watch;

use crate::{
    auth::Identity,
    client::AppClient,
    core::query::Query,
    document::{Document, Fields, FieldPatch},
    features::{Feature, Record},
    types::DocId,
};

use super::{
    backend::{BackendError, SnapshotDelivery},
    detail::{DetailView, Reconciled},
    error::SyncError,
    gateway::{DeleteOutcome, Draft, MutationGateway},
    mirror::Mirror,
    notice::Notifier,
    timers::TransientTimers,
    watcher::Subscription,
};

/// What woke a view up.
#[derive(Debug, Clone)]
pub enum ViewUpdate {
    /// A snapshot replaced the mirror.
    Replaced {
        /// Documents now visible.
        documents: usize,
        /// Optimistic overlays the snapshot superseded.
        discarded: usize,
        /// Effect on the detail view.
        detail: Reconciled,
    },
    /// The subscription reported a failure; the last good mirror is kept.
    ReadFailed(BackendError),
    /// A transient timer expired.
    TimerExpired(String),
    /// Nothing left to wait for: the subscription ended and no timer is
    /// pending.
    Detached,
}

enum Woken {
    Delivery(Option<SnapshotDelivery>),
    Timer(String),
}

/// Live, owned view over the collection of feature `F`.
pub struct FeatureView<F: Feature> {
    feature: F,
    query: Query,
    subscription: Subscription,
    mirror: Mirror,
    detail: DetailView,
    timers: TransientTimers,
    gateway: MutationGateway,
    notifier: Notifier,
    identity: watch::Receiver<Option<Identity>>,
    transient_after: Duration,
    read_failure_reported: bool,
}

impl<F: Feature> FeatureView<F> {
    /// Subscribes to the feature's query and waits for the initial snapshot.
    pub async fn activate(client: &AppClient, feature: F) -> Result<Self, SyncError> {
        let query = feature.query();
        let notifier = client.notifier().clone();
        let subscription = match Subscription::open(client.backend(), query.clone()).await {
            Ok(sub) => sub,
            Err(err) => {
                notifier.error(F::COLLECTION, format!("Failed to load {}: {err}", F::LABEL.to_lowercase()));
                return Err(err.into());
            }
        };
        let gateway = MutationGateway::new(
            client.backend(),
            client.blobs(),
            notifier.clone(),
            F::COLLECTION,
            F::LABEL,
        );

        let mut view = Self {
            feature,
            query,
            subscription,
            mirror: Mirror::new(),
            detail: DetailView::new(),
            timers: TransientTimers::new(),
            gateway,
            notifier,
            identity: client.identity_changes(),
            transient_after: Duration::from_millis(client.config().transient_message_ms),
            read_failure_reported: false,
        };
        if let Some(initial) = view.subscription.next().await {
            view.apply(initial);
        }
        tracing::debug!(collection = F::COLLECTION, documents = view.mirror.len(), "view activated");
        Ok(view)
    }

    /// Feature parameters this view was opened with.
    pub fn feature(&self) -> &F {
        &self.feature
    }

    /// Query behind the subscription.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// True until deactivated or detached by the backend.
    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    /// Waits for the next snapshot, read failure or timer expiry and
    /// applies it.
    pub async fn next_update(&mut self) -> ViewUpdate {
        let active = self.subscription.is_active();
        if !active && self.timers.is_empty() {
            return ViewUpdate::Detached;
        }
        let woken = tokio::select! {
            delivery = self.subscription.next(), if active => Woken::Delivery(delivery),
            key = self.timers.expired() => Woken::Timer(key),
        };
        match woken {
            Woken::Delivery(Some(delivery)) => self.apply(delivery),
            Woken::Delivery(None) => {
                tracing::debug!(collection = F::COLLECTION, "subscription closed by backend");
                ViewUpdate::Detached
            }
            Woken::Timer(key) => ViewUpdate::TimerExpired(key),
        }
    }

    /// Applies every delivery already queued, without waiting. Returns how
    /// many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(delivery) = self.subscription.try_next() {
            self.apply(delivery);
            applied += 1;
        }
        applied
    }

    /// Applies one delivery: a snapshot replaces the mirror and re-resolves
    /// the detail view; a failure is reported once and leaves the mirror as
    /// it was.
    pub fn apply(&mut self, delivery: SnapshotDelivery) -> ViewUpdate {
        match delivery {
            Ok(snapshot) => {
                self.read_failure_reported = false;
                let discarded = self.mirror.replace(snapshot);
                let detail = self.detail.reconcile(&self.mirror);
                ViewUpdate::Replaced {
                    documents: self.mirror.len(),
                    discarded,
                    detail,
                }
            }
            Err(err) => {
                tracing::warn!(collection = F::COLLECTION, %err, "snapshot delivery failed");
                if !self.read_failure_reported {
                    self.read_failure_reported = true;
                    self.notifier
                        .error(F::COLLECTION, format!("Failed to load {}: {err}", F::LABEL.to_lowercase()));
                }
                ViewUpdate::ReadFailed(err)
            }
        }
    }

    /// Current documents in query order, optimistic changes included.
    pub fn documents(&self) -> Vec<Document> {
        let mut docs = self.mirror.get();
        if self.mirror.pending() > 0 {
            self.query.sort(&mut docs);
        }
        docs
    }

    /// Current documents decoded as records.
    pub fn records(&self) -> Vec<F::Record> {
        self.documents().iter().map(F::Record::from_document).collect()
    }

    /// Looks up one record in the current view.
    pub fn record(&self, id: &str) -> Option<F::Record> {
        self.mirror.find(id).as_ref().map(F::Record::from_document)
    }

    /// The underlying mirror.
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Signed-in user, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// Write path for this collection.
    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    /// Notice channel shared with the client.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Detail view state.
    pub fn detail(&self) -> &DetailView {
        &self.detail
    }

    /// Opens the detail view on `id`.
    pub fn open_detail(&mut self, id: &str) -> Result<(), SyncError> {
        if self.detail.open(&self.mirror, id) {
            Ok(())
        } else {
            Err(SyncError::NotFound(id.to_string()))
        }
    }

    /// Dismisses the detail view.
    pub fn close_detail(&mut self) {
        self.detail.close();
    }

    /// The open detail view's rendered copy, decoded.
    pub fn selected(&self) -> Option<F::Record> {
        self.detail.current().map(F::Record::from_document)
    }

    /// Starts (or restarts) a transient timer using the configured delay.
    pub fn schedule_transient(&mut self, key: &str) {
        self.timers.schedule(key, self.transient_after);
    }

    /// Pending transient timers.
    pub fn timers(&self) -> &TransientTimers {
        &self.timers
    }

    /// Validates and creates a document from `draft`, then shows it until a
    /// snapshot that includes it arrives.
    pub async fn create(&mut self, draft: &impl Draft) -> Result<DocId, SyncError> {
        self.gateway.check(draft)?;
        self.insert_fields(draft.to_fields()).await
    }

    /// Creates a document from fields the caller already validated.
    pub async fn insert_fields(&mut self, fields: Fields) -> Result<DocId, SyncError> {
        let (id, seq) = self.gateway.create_unchecked(fields.clone()).await?;
        let doc = Document::new(id.clone(), fields);
        if self.query.matches(&doc) {
            let ticket = self.mirror.optimistic_insert(doc);
            self.mirror.confirm(ticket, seq);
        }
        Ok(id)
    }

    /// Validates and applies `draft` as a partial update of `id`.
    pub async fn update(&mut self, id: &str, draft: &impl Draft) -> Result<(), SyncError> {
        self.gateway.check(draft)?;
        self.patch(id, FieldPatch::from(draft.to_fields())).await
    }

    /// Applies `patch` to `id` optimistically, rolling back on failure.
    pub async fn patch(&mut self, id: &str, patch: FieldPatch) -> Result<(), SyncError> {
        self.require_visible(id)?;
        let ticket = self.mirror.optimistic_patch(id, patch.clone());
        if self.detail.selected_id() == Some(id) {
            self.detail.patch_local(&patch);
        }
        match self.gateway.update_fields(id, patch).await {
            Ok(seq) => {
                self.mirror.confirm(ticket, seq);
                Ok(())
            }
            Err(err) => {
                self.undo(ticket);
                Err(err)
            }
        }
    }

    /// Writes `patch` to `id`, creating the document under that id when it
    /// is not visible. Shown at once, rolled back on failure.
    pub async fn merge(&mut self, id: &str, patch: FieldPatch) -> Result<(), SyncError> {
        let ticket = match self.mirror.find(id) {
            Some(_) => self.mirror.optimistic_patch(id, patch.clone()),
            None => self.mirror.optimistic_insert(Document::new(id, patch.set.clone())),
        };
        match self.gateway.merge(id, patch).await {
            Ok(seq) => {
                self.mirror.confirm(ticket, seq);
                Ok(())
            }
            Err(err) => {
                self.undo(ticket);
                Err(err)
            }
        }
    }

    /// Removes `id`, hiding it immediately and restoring it on failure.
    pub async fn delete(&mut self, id: &str) -> Result<(), SyncError> {
        self.require_visible(id)?;
        let ticket = self.mirror.optimistic_remove(id);
        match self.gateway.delete(id).await {
            Ok(seq) => {
                self.mirror.confirm(ticket, seq);
                if self.detail.selected_id() == Some(id) {
                    self.detail.close();
                }
                Ok(())
            }
            Err(err) => {
                self.undo(ticket);
                Err(err)
            }
        }
    }

    /// Removes `id` together with the blob referenced by `url_field`.
    pub async fn delete_with_blob(&mut self, id: &str, url_field: &str) -> Result<DeleteOutcome, SyncError> {
        let doc = self
            .mirror
            .find(id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        let ticket = self.mirror.optimistic_remove(id);
        match self.gateway.delete_with_blob(&doc, url_field).await {
            Ok((outcome, seq)) => {
                self.mirror.confirm(ticket, seq);
                if self.detail.selected_id() == Some(id) {
                    self.detail.close();
                }
                Ok(outcome)
            }
            Err(err) => {
                self.undo(ticket);
                Err(err)
            }
        }
    }

    /// Appends `element` to array `field` of the open detail view's
    /// document. The rendered copy and the mirror show it at once, and keep
    /// showing it through snapshots older than the append.
    pub async fn append_to_selected(&mut self, field: &str, element: &impl Draft) -> Result<(), SyncError> {
        let Some(id) = self.detail.selected_id().map(str::to_string) else {
            self.notifier.warning(F::COLLECTION, "Nothing is selected.");
            return Err(SyncError::NoSelection);
        };
        let (value, seq) = self.gateway.append_to_array(&id, field, element).await?;
        let ticket = self.mirror.optimistic_append(id.as_str(), field, value.clone());
        self.mirror.confirm(ticket, seq);
        self.detail.append_local(field, value);
        Ok(())
    }

    /// Cancels the subscription, every transient timer and the detail view.
    /// Safe to call more than once.
    pub fn deactivate(&mut self) {
        if self.subscription.is_active() {
            tracing::debug!(collection = F::COLLECTION, "view deactivated");
        }
        self.subscription.cancel();
        self.timers.cancel_all();
        self.detail.close();
    }

    fn require_visible(&self, id: &str) -> Result<(), SyncError> {
        if self.mirror.contains(id) {
            Ok(())
        } else {
            Err(SyncError::NotFound(id.to_string()))
        }
    }

    fn undo(&mut self, ticket: super::mirror::Ticket) {
        self.mirror.rollback(ticket);
        if let Reconciled::Closed(id) = self.detail.reconcile(&self.mirror) {
            tracing::debug!(%id, "detail view closed after rollback");
        }
    }
}

impl<F: Feature> Drop for FeatureView<F> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl<F: Feature> std::fmt::Debug for FeatureView<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureView")
            .field("collection", &F::COLLECTION)
            .field("subscription", &self.subscription)
            .field("mirror", &self.mirror)
            .field("detail", &self.detail)
            .finish()
    }
}
