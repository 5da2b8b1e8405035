#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use duolog::{
    blob::MemoryBlobStore,
    client::AppClient,
    config::{BackendConfig, SyncConfig},
    core::{query::Query, store::DocumentStore},
    document::{FieldPatch, Fields},
    features::Feature,
    runtime::handle::{BackendHandle, spawn_backend},
    sync::{
        FeatureView, Notice, RemoteBackend, ViewUpdate,
        backend::{BackendError, SnapshotDelivery, WatchStream},
    },
    types::{DocId, OpSeq, WatchId},
};

/// Write requests seen by [`ScriptedBackend`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { collection: String, fields: Fields },
    Update { collection: String, id: DocId, patch: FieldPatch },
    Merge { collection: String, id: DocId, patch: FieldPatch },
    Delete { collection: String, id: DocId },
    Append { collection: String, id: DocId, field: String, element: Value },
}

/// In-process backend that records writes, can refuse them, and can push
/// read failures into open watchers.
pub struct ScriptedBackend {
    inner: BackendHandle,
    calls: Mutex<Vec<Call>>,
    fail_writes: AtomicBool,
    streams: Mutex<HashMap<WatchId, mpsc::UnboundedSender<SnapshotDelivery>>>,
    unwatched: Mutex<Vec<WatchId>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: spawn_backend(DocumentStore::new(), None, BackendConfig::default()),
            calls: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            streams: Mutex::new(HashMap::new()),
            unwatched: Mutex::new(Vec::new()),
        })
    }

    pub fn handle(&self) -> &BackendHandle {
        &self.inner
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn inject_read_failure(&self, reason: &str) {
        for tx in self.streams.lock().expect("streams").values() {
            let _ = tx.send(Err(BackendError::Transport(reason.to_string())));
        }
    }

    pub fn open_streams(&self) -> usize {
        self.streams.lock().expect("streams").len()
    }

    pub fn unwatched(&self) -> Vec<WatchId> {
        self.unwatched.lock().expect("unwatched").clone()
    }

    fn record(&self, call: Call) -> Result<(), BackendError> {
        self.calls.lock().expect("calls").push(call);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(BackendError::Transport("network unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteBackend for ScriptedBackend {
    async fn watch(&self, query: Query) -> Result<WatchStream, BackendError> {
        let mut upstream = self.inner.watch(query).await?;
        let id = upstream.id;
        let (tx, rx) = mpsc::unbounded_channel();
        let forward = tx.clone();
        tokio::spawn(async move {
            while let Some(delivery) = upstream.rx.recv().await {
                if forward.send(delivery).is_err() {
                    break;
                }
            }
        });
        self.streams.lock().expect("streams").insert(id, tx);
        Ok(WatchStream { id, rx })
    }

    fn unwatch(&self, id: WatchId) {
        self.unwatched.lock().expect("unwatched").push(id);
        self.streams.lock().expect("streams").remove(&id);
        self.inner.unwatch(id);
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<(DocId, OpSeq), BackendError> {
        self.record(Call::Create {
            collection: collection.to_string(),
            fields: fields.clone(),
        })?;
        self.inner.create(collection, fields).await
    }

    async fn update(&self, collection: &str, id: &str, patch: FieldPatch) -> Result<OpSeq, BackendError> {
        self.record(Call::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch: patch.clone(),
        })?;
        self.inner.update(collection, id, patch).await
    }

    async fn merge(&self, collection: &str, id: &str, patch: FieldPatch) -> Result<OpSeq, BackendError> {
        self.record(Call::Merge {
            collection: collection.to_string(),
            id: id.to_string(),
            patch: patch.clone(),
        })?;
        self.inner.merge(collection, id, patch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<OpSeq, BackendError> {
        self.record(Call::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;
        self.inner.delete(collection, id).await
    }

    async fn append_to_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        element: Value,
    ) -> Result<OpSeq, BackendError> {
        self.record(Call::Append {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            element: element.clone(),
        })?;
        self.inner.append_to_array(collection, id, field, element).await
    }
}

pub fn client_over(backend: &Arc<ScriptedBackend>) -> (AppClient, Arc<MemoryBlobStore>) {
    client_with(backend, SyncConfig::default())
}

pub fn client_with(backend: &Arc<ScriptedBackend>, config: SyncConfig) -> (AppClient, Arc<MemoryBlobStore>) {
    let blobs = Arc::new(MemoryBlobStore::new());
    let client = AppClient::with_services(backend.clone(), blobs.clone(), config);
    (client, blobs)
}

/// Applies updates until `done` holds, failing after one second.
pub async fn settle<F: Feature>(view: &mut FeatureView<F>, mut done: impl FnMut(&FeatureView<F>) -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !done(view) {
            if let ViewUpdate::Detached = view.next_update().await {
                panic!("view detached while settling");
            }
        }
    })
    .await
    .expect("view did not settle");
}

pub fn drain(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        out.push(notice);
    }
    out
}
