//! Application-wide backend client.
//!
//! One [`AppClient`] is built at startup and handed to every feature view.
//! It owns the backend connection, blob store, notice channel and the
//! signed-in identity; [`AppClient::shutdown`] ends the backend.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::{
    auth::{Identity, RouteDecision, guard},
    blob::{BlobStore, MemoryBlobStore},
    config::{ConfigError, SyncConfig},
    core::store::DocumentStore,
    features::Feature,
    persist::{OpSink, PersistError, sqlite::SqliteOpSink},
    runtime::handle::{BackendHandle, spawn_backend},
    sync::{BackendError, FeatureView, Notifier, RemoteBackend, SyncError},
};

/// Startup failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The journal could not be opened or replayed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Shared handle to the backend services. Cheap to clone.
#[derive(Clone)]
pub struct AppClient {
    backend: Arc<dyn RemoteBackend>,
    blobs: Arc<dyn BlobStore>,
    notifier: Notifier,
    config: Arc<SyncConfig>,
    identity: Arc<watch::Sender<Option<Identity>>>,
    local: Option<BackendHandle>,
}

impl AppClient {
    /// Starts the in-process backend, replaying the SQLite journal at
    /// `config.database_path` when one is configured. Must run inside a
    /// tokio runtime.
    pub fn start(config: SyncConfig) -> Result<Self, ClientError> {
        let (store, sink): (DocumentStore, Option<Box<dyn OpSink>>) = match &config.database_path {
            Some(path) => {
                let sink = SqliteOpSink::open(path)?;
                let store = sink.load_store()?;
                tracing::info!(path = %path.display(), ops = store.latest_op_seq(), "journal replayed");
                (store, Some(Box::new(sink) as Box<dyn OpSink>))
            }
            None => (DocumentStore::new(), None),
        };
        let handle = spawn_backend(store, sink, config.backend.clone());
        let mut client = Self::with_services(
            Arc::new(handle.clone()),
            Arc::new(MemoryBlobStore::new()),
            config,
        );
        client.local = Some(handle);
        Ok(client)
    }

    /// Loads a TOML config file and starts from it.
    pub fn start_from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ClientError> {
        Self::start(SyncConfig::load(path)?)
    }

    /// Client over caller-provided services.
    pub fn with_services(backend: Arc<dyn RemoteBackend>, blobs: Arc<dyn BlobStore>, config: SyncConfig) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            backend,
            blobs,
            notifier: Notifier::new(config.notice_capacity),
            config: Arc::new(config),
            identity: Arc::new(identity),
            local: None,
        }
    }

    /// Document database.
    pub fn backend(&self) -> Arc<dyn RemoteBackend> {
        Arc::clone(&self.backend)
    }

    /// Object storage.
    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.blobs)
    }

    /// In-process backend, when this client started one.
    pub fn local_backend(&self) -> Option<&BackendHandle> {
        self.local.as_ref()
    }

    /// Notice channel.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Records a successful sign-in.
    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(uid = %identity.uid, "signed in");
        self.identity.send_replace(Some(identity));
    }

    /// Clears the identity.
    pub fn sign_out(&self) {
        if self.identity.send_replace(None).is_some() {
            tracing::info!("signed out");
        }
    }

    /// Signed-in user, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    /// Follows sign-in and sign-out.
    pub fn identity_changes(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// Routing decision for `path` under the current identity.
    pub fn route(&self, path: &str) -> RouteDecision {
        guard(path, self.identity().as_ref())
    }

    /// Activates a view of `feature`.
    pub async fn open<F: Feature>(&self, feature: F) -> Result<FeatureView<F>, SyncError> {
        FeatureView::activate(self, feature).await
    }

    /// Drains the journal and stops the in-process backend. Clients over
    /// external services have nothing to stop.
    pub async fn shutdown(&self) -> Result<(), BackendError> {
        match &self.local {
            Some(handle) => handle.shutdown().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for AppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppClient")
            .field("config", &self.config)
            .field("identity", &self.identity())
            .field("local", &self.local.is_some())
            .finish()
    }
}
