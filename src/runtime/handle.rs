use async_trait::async_trait;
use hashbrown::HashMap;
use serde_json::Value;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};

use crate::{
    config::BackendConfig,
    core::{
        query::Query,
        store::{DocumentStore, StoreSnapshotV1},
    },
    document::{Document, FieldPatch, Fields},
    op::{Op, StoredOp},
    persist::{OpSink, PersistError, PersistResult},
    sync::backend::{BackendError, RemoteBackend, Snapshot, SnapshotDelivery, WatchStream},
    types::{DocId, OpSeq, WatchId},
};

use super::events::BackendEvent;

/// Cloneable handle to a running backend loop.
#[derive(Clone)]
pub struct BackendHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<BackendEvent>,
}

enum Command {
    Create {
        collection: String,
        fields: Fields,
        resp: oneshot::Sender<Result<(DocId, OpSeq), BackendError>>,
    },
    Update {
        collection: String,
        id: DocId,
        patch: FieldPatch,
        resp: oneshot::Sender<Result<OpSeq, BackendError>>,
    },
    Merge {
        collection: String,
        id: DocId,
        patch: FieldPatch,
        resp: oneshot::Sender<Result<OpSeq, BackendError>>,
    },
    Delete {
        collection: String,
        id: DocId,
        resp: oneshot::Sender<Result<OpSeq, BackendError>>,
    },
    ArrayUnion {
        collection: String,
        id: DocId,
        field: String,
        element: Value,
        resp: oneshot::Sender<Result<OpSeq, BackendError>>,
    },
    Get {
        collection: String,
        id: DocId,
        resp: oneshot::Sender<Option<Document>>,
    },
    Query {
        query: Query,
        resp: oneshot::Sender<Vec<Document>>,
    },
    Watch {
        query: Query,
        resp: oneshot::Sender<WatchStream>,
    },
    Unwatch {
        id: WatchId,
    },
    Stats {
        resp: oneshot::Sender<BackendStats>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, BackendError>>,
    },
    Checkpoint {
        resp: oneshot::Sender<Result<(), BackendError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), BackendError>>,
    },
}

/// Point-in-time counters from the backend loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendStats {
    /// Sequence of the last applied op.
    pub latest_seq: OpSeq,
    /// Registered watchers.
    pub watchers: usize,
    /// Applied ops still held by the store instead of handed to the journal.
    pub buffered_ops: usize,
}

enum PersistMsg {
    Ops(Vec<StoredOp>),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Checkpoint {
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct Watcher {
    query: Query,
    tx: mpsc::UnboundedSender<SnapshotDelivery>,
}

struct LoopState {
    store: DocumentStore,
    watchers: HashMap<WatchId, Watcher>,
    next_watch_id: WatchId,
    ops_since_snapshot: usize,
}

/// Spawns the backend loop and, when `sink` is given, its journal worker.
pub fn spawn_backend(
    store: DocumentStore,
    sink: Option<Box<dyn OpSink>>,
    config: BackendConfig,
) -> BackendHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<BackendEvent>(config.event_queue_bound.max(1));

    let (persist_tx_opt, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(1));
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone());
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut state = LoopState {
            store,
            watchers: HashMap::new(),
            next_watch_id: 1,
            ops_since_snapshot: 0,
        };

        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        let done = handle_command(
                            cmd,
                            &mut state,
                            &events_tx_loop,
                            persist_tx_opt.as_ref(),
                            &config,
                        ).await;

                        if done {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        match durable {
                            Some(Ok(op_seq)) => {
                                let _ = events_tx_loop.send(BackendEvent::DurableUpTo { op_seq });
                            }
                            Some(Err(err)) => tracing::error!(%err, "journal append failed"),
                            None => {}
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                let done = handle_command(
                    cmd,
                    &mut state,
                    &events_tx_loop,
                    persist_tx_opt.as_ref(),
                    &config,
                ).await;
                if done {
                    break;
                }
            }
        }

        tracing::debug!(watchers = state.watchers.len(), "backend loop stopped");
    });

    BackendHandle { cmd_tx, events_tx }
}

impl BackendHandle {
    /// Subscribes to the raw backend change feed.
    pub fn events(&self) -> broadcast::Receiver<BackendEvent> {
        self.events_tx.subscribe()
    }

    /// Fetches one document.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Get {
            collection: collection.to_string(),
            id: id.to_string(),
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)
    }

    /// Evaluates `query` once without registering a watcher.
    pub async fn query(&self, query: Query) -> Result<Vec<Document>, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Query { query, resp: tx }).await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)
    }

    /// Current loop counters.
    pub async fn stats(&self) -> Result<BackendStats, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats { resp: tx }).await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)
    }

    /// Waits until every op so far is durable; returns the durable sequence.
    pub async fn flush(&self) -> Result<OpSeq, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush { resp: tx }).await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)?
    }

    /// Writes a store snapshot to the journal.
    pub async fn checkpoint(&self) -> Result<(), BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Checkpoint { resp: tx }).await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)?
    }

    /// Drains the journal and stops the loop. Open watchers see their
    /// channel close.
    pub async fn shutdown(&self) -> Result<(), BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)?
    }

    async fn send(&self, cmd: Command) -> Result<(), BackendError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| BackendError::ChannelClosed)
    }
}

#[async_trait]
impl RemoteBackend for BackendHandle {
    async fn watch(&self, query: Query) -> Result<WatchStream, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Watch { query, resp: tx }).await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)
    }

    fn unwatch(&self, id: WatchId) {
        // A full queue leaves the watcher to be reaped on its next failed send.
        if let Err(err) = self.cmd_tx.try_send(Command::Unwatch { id }) {
            tracing::debug!(watch_id = id, %err, "unwatch not queued");
        }
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<(DocId, OpSeq), BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Create {
            collection: collection.to_string(),
            fields,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)?
    }

    async fn update(&self, collection: &str, id: &str, patch: FieldPatch) -> Result<OpSeq, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)?
    }

    async fn merge(&self, collection: &str, id: &str, patch: FieldPatch) -> Result<OpSeq, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Merge {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)?
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<OpSeq, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)?
    }

    async fn append_to_array(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        element: Value,
    ) -> Result<OpSeq, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ArrayUnion {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            element,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| BackendError::ChannelClosed)?
    }
}

async fn handle_command(
    cmd: Command,
    state: &mut LoopState,
    events_tx: &broadcast::Sender<BackendEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &BackendConfig,
) -> bool {
    match cmd {
        Command::Create { collection, fields, resp } => {
            let res = apply_create(state, events_tx, persist_tx, &collection, fields);
            finish("create", &collection, &res, state, persist_tx, config).await;
            let _ = resp.send(res);
        }
        Command::Update { collection, id, patch, resp } => {
            let res = apply_update(state, events_tx, persist_tx, &collection, id, patch);
            finish("update", &collection, &res, state, persist_tx, config).await;
            let _ = resp.send(res);
        }
        Command::Merge { collection, id, patch, resp } => {
            let res = apply_merge(state, events_tx, persist_tx, &collection, id, patch);
            finish("merge", &collection, &res, state, persist_tx, config).await;
            let _ = resp.send(res);
        }
        Command::Delete { collection, id, resp } => {
            let res = apply_delete(state, events_tx, persist_tx, &collection, id);
            finish("delete", &collection, &res, state, persist_tx, config).await;
            let _ = resp.send(res);
        }
        Command::ArrayUnion { collection, id, field, element, resp } => {
            let res = apply_array_union(state, events_tx, persist_tx, &collection, id, &field, element);
            finish("array_union", &collection, &res, state, persist_tx, config).await;
            let _ = resp.send(res);
        }
        Command::Get { collection, id, resp } => {
            let _ = resp.send(state.store.get_cloned(&collection, &id));
        }
        Command::Query { query, resp } => {
            let _ = resp.send(state.store.query(&query));
        }
        Command::Watch { query, resp } => {
            let id = state.next_watch_id;
            state.next_watch_id += 1;
            let (tx, rx) = mpsc::unbounded_channel();
            let initial = Snapshot {
                seq: state.store.latest_op_seq(),
                documents: state.store.query(&query),
            };
            let _ = tx.send(Ok(initial));
            tracing::debug!(watch_id = id, collection = %query.collection, "watcher attached");
            state.watchers.insert(id, Watcher { query, tx });
            if resp.send(WatchStream { id, rx }).is_err() {
                state.watchers.remove(&id);
            }
        }
        Command::Unwatch { id } => {
            if state.watchers.remove(&id).is_some() {
                tracing::debug!(watch_id = id, "watcher detached");
            }
        }
        Command::Stats { resp } => {
            let _ = resp.send(BackendStats {
                latest_seq: state.store.latest_op_seq(),
                watchers: state.watchers.len(),
                buffered_ops: state.store.pending_op_count(),
            });
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx
                    .send(PersistMsg::Flush { resp: flush_tx })
                    .await
                    .is_err()
                {
                    Err(BackendError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| BackendError::ChannelClosed)
                        .and_then(|r| r.map_err(BackendError::from))
                }
            } else {
                Ok(state.store.latest_op_seq())
            };
            let _ = resp.send(out);
        }
        Command::Checkpoint { resp } => {
            let out = if let Some(tx) = persist_tx {
                request_checkpoint(&state.store, tx, config.compact_after_snapshot).await
            } else {
                Ok(())
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (done_tx, done_rx) = oneshot::channel();
                let send_res = tx.send(PersistMsg::Shutdown { resp: done_tx }).await;
                if send_res.is_err() {
                    Err(BackendError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| BackendError::ChannelClosed)
                }
            } else {
                Ok(())
            };
            state.watchers.clear();
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

async fn finish<T>(
    kind: &str,
    collection: &str,
    res: &Result<T, BackendError>,
    state: &mut LoopState,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &BackendConfig,
) {
    match res {
        Ok(_) => {
            tracing::debug!(kind, collection, "mutation applied");
            state.ops_since_snapshot += 1;
            maybe_auto_checkpoint(state, persist_tx, config).await;
        }
        Err(err) => tracing::warn!(kind, collection, %err, "mutation rejected"),
    }
}

fn apply_create(
    state: &mut LoopState,
    events_tx: &broadcast::Sender<BackendEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    collection: &str,
    fields: Fields,
) -> Result<(DocId, OpSeq), BackendError> {
    let slot = reserve_journal_slot(persist_tx)?;
    let (id, _) = state.store.create(collection, fields)?;
    let after = state.store.get_cloned(collection, &id);
    notify_watchers(state, collection, None, after.as_ref());
    let _ = events_tx.send(BackendEvent::Created {
        collection: collection.to_string(),
        id: id.clone(),
    });
    Ok((id, commit(state, slot, events_tx)))
}

fn apply_update(
    state: &mut LoopState,
    events_tx: &broadcast::Sender<BackendEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    collection: &str,
    id: DocId,
    patch: FieldPatch,
) -> Result<OpSeq, BackendError> {
    let slot = reserve_journal_slot(persist_tx)?;
    let before = state.store.get_cloned(collection, &id);
    state.store.update(collection, &id, patch)?;
    let after = state.store.get_cloned(collection, &id);
    notify_watchers(state, collection, before.as_ref(), after.as_ref());
    let _ = events_tx.send(BackendEvent::Updated {
        collection: collection.to_string(),
        id,
    });
    Ok(commit(state, slot, events_tx))
}

fn apply_merge(
    state: &mut LoopState,
    events_tx: &broadcast::Sender<BackendEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    collection: &str,
    id: DocId,
    patch: FieldPatch,
) -> Result<OpSeq, BackendError> {
    let slot = reserve_journal_slot(persist_tx)?;
    let before = state.store.get_cloned(collection, &id);
    let (existed, _) = state.store.merge(collection, &id, patch);
    let after = state.store.get_cloned(collection, &id);
    notify_watchers(state, collection, before.as_ref(), after.as_ref());
    let collection = collection.to_string();
    let _ = events_tx.send(if existed {
        BackendEvent::Updated { collection, id }
    } else {
        BackendEvent::Created { collection, id }
    });
    Ok(commit(state, slot, events_tx))
}

fn apply_delete(
    state: &mut LoopState,
    events_tx: &broadcast::Sender<BackendEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    collection: &str,
    id: DocId,
) -> Result<OpSeq, BackendError> {
    let slot = reserve_journal_slot(persist_tx)?;
    let (before, _) = state.store.delete(collection, &id)?;
    notify_watchers(state, collection, Some(&before), None);
    let _ = events_tx.send(BackendEvent::Deleted {
        collection: collection.to_string(),
        id,
    });
    Ok(commit(state, slot, events_tx))
}

fn apply_array_union(
    state: &mut LoopState,
    events_tx: &broadcast::Sender<BackendEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    collection: &str,
    id: DocId,
    field: &str,
    element: Value,
) -> Result<OpSeq, BackendError> {
    let slot = reserve_journal_slot(persist_tx)?;
    let before = state.store.get_cloned(collection, &id);
    state.store.array_union(collection, &id, field, element)?;
    let after = state.store.get_cloned(collection, &id);
    notify_watchers(state, collection, before.as_ref(), after.as_ref());
    let _ = events_tx.send(BackendEvent::Updated {
        collection: collection.to_string(),
        id,
    });
    Ok(commit(state, slot, events_tx))
}

/// Claims room in the journal queue before the store is touched, so a full
/// queue rejects the mutation instead of leaving it applied but unjournaled.
fn reserve_journal_slot(
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> Result<Option<mpsc::Permit<'_, PersistMsg>>, BackendError> {
    persist_tx
        .map(|tx| {
            tx.try_reserve()
                .map_err(|err| BackendError::Persist(format!("persist queue error: {err}")))
        })
        .transpose()
}

/// Hands the ops the store buffered for the last mutation to the journal.
/// Returns the sequence the mutation was applied at.
fn commit(
    state: &mut LoopState,
    slot: Option<mpsc::Permit<'_, PersistMsg>>,
    events_tx: &broadcast::Sender<BackendEvent>,
) -> OpSeq {
    let seq = state.store.latest_op_seq();
    let ops = state.store.drain_pending_ops();
    match slot {
        Some(permit) => permit.send(PersistMsg::Ops(ops)),
        None => {
            let _ = events_tx.send(BackendEvent::DurableUpTo { op_seq: seq });
        }
    }
    seq
}

/// Re-sends the full result set to every watcher whose query saw the changed
/// document before or after the mutation. Watchers with a dropped receiver
/// are reaped here.
fn notify_watchers(
    state: &mut LoopState,
    collection: &str,
    before: Option<&Document>,
    after: Option<&Document>,
) {
    let seq = state.store.latest_op_seq();
    let store = &state.store;
    state.watchers.retain(|id, watcher| {
        if watcher.query.collection != collection {
            return true;
        }
        let touched = before.is_some_and(|d| watcher.query.matches(d))
            || after.is_some_and(|d| watcher.query.matches(d));
        if !touched {
            return true;
        }
        let snapshot = Snapshot {
            seq,
            documents: store.query(&watcher.query),
        };
        let alive = watcher.tx.send(Ok(snapshot)).is_ok();
        if !alive {
            tracing::debug!(watch_id = *id, "reaping watcher with dropped receiver");
        }
        alive
    });
}

fn spawn_persistence_worker(
    sink: Box<dyn OpSink>,
    rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: BackendConfig,
) {
    let worker = PersistWorker {
        sink: Some(sink),
        buf: Vec::new(),
        last_durable: 0,
        durable_tx,
        linger: Duration::from_millis(config.batch_max_latency_ms),
        config,
    };
    tokio::spawn(worker.run(rx));
}

/// Owns the sink. Batches journaled ops and runs every sink call on the
/// blocking pool, handing the sink back and forth instead of locking it.
struct PersistWorker {
    sink: Option<Box<dyn OpSink>>,
    buf: Vec<StoredOp>,
    last_durable: OpSeq,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    linger: Duration,
    config: BackendConfig,
}

impl PersistWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<PersistMsg>) {
        let mut deadline = Instant::now() + self.linger;
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = self.write_batch(true).await;
                        return;
                    };
                    match msg {
                        PersistMsg::Ops(ops) => {
                            let urgent = self.config.flush_on_create
                                && ops.iter().any(|stored| matches!(stored.op, Op::Create { .. }));
                            self.buf.extend(ops);
                            if !urgent && self.buf.len() < self.config.batch_max_ops {
                                continue;
                            }
                            let _ = self.write_batch(true).await;
                        }
                        PersistMsg::Flush { resp } => {
                            let result = self.write_batch(true).await;
                            let _ = resp.send(result.map(|()| self.last_durable));
                        }
                        PersistMsg::Checkpoint { snapshot, last_seq, compact, resp } => {
                            let _ = resp.send(self.checkpoint(snapshot, last_seq, compact).await);
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = self.write_batch(true).await;
                            let _ = resp.send(());
                            return;
                        }
                    }
                    deadline = Instant::now() + self.linger;
                }
                _ = tokio::time::sleep_until(deadline), if !self.buf.is_empty() => {
                    let _ = self.write_batch(false).await;
                    deadline = Instant::now() + self.linger;
                }
            }
        }
    }

    /// Appends whatever is buffered and publishes the new durable sequence.
    /// `sync` also asks the sink to flush, even with nothing buffered.
    async fn write_batch(&mut self, sync: bool) -> PersistResult<()> {
        let ops = std::mem::take(&mut self.buf);
        if ops.is_empty() {
            return if sync { self.on_sink(|sink| sink.flush()).await } else { Ok(()) };
        }

        let appended = self
            .on_sink(move |sink| {
                let seq = sink.append_ops(&ops)?;
                if sync {
                    sink.flush()?;
                }
                Ok(seq)
            })
            .await;

        match appended {
            Ok(seq) => {
                self.last_durable = self.last_durable.max(seq);
                let _ = self.durable_tx.send(Ok(self.last_durable));
                Ok(())
            }
            Err(err) => {
                let _ = self
                    .durable_tx
                    .send(Err(PersistError::Message(format!("append failed: {err}"))));
                Err(err)
            }
        }
    }

    async fn checkpoint(&mut self, snapshot: StoreSnapshotV1, last_seq: OpSeq, compact: bool) -> PersistResult<()> {
        self.write_batch(true).await?;
        self.on_sink(move |sink| {
            sink.write_snapshot(&snapshot, last_seq)?;
            if compact {
                let removed = sink.compact_through(last_seq)?;
                tracing::debug!(removed, last_seq, "journal compacted");
            }
            Ok(())
        })
        .await
    }

    async fn on_sink<T, F>(&mut self, f: F) -> PersistResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn OpSink) -> PersistResult<T> + Send + 'static,
    {
        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| PersistError::Message("journal sink lost to a panicked write".into()))?;
        let (sink, result) = tokio::task::spawn_blocking(move || {
            let result = f(&mut *sink);
            (sink, result)
        })
        .await
        .map_err(|e| PersistError::Message(format!("join error: {e}")))?;
        self.sink = Some(sink);
        result
    }
}

async fn request_checkpoint(
    store: &DocumentStore,
    tx: &mpsc::Sender<PersistMsg>,
    compact: bool,
) -> Result<(), BackendError> {
    let (cp_tx, cp_rx) = oneshot::channel();
    tx.send(PersistMsg::Checkpoint {
        snapshot: store.export_snapshot(),
        last_seq: store.latest_op_seq(),
        compact,
        resp: cp_tx,
    })
    .await
    .map_err(|_| BackendError::ChannelClosed)?;
    cp_rx
        .await
        .map_err(|_| BackendError::ChannelClosed)?
        .map_err(BackendError::from)
}

async fn maybe_auto_checkpoint(
    state: &mut LoopState,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &BackendConfig,
) {
    if config.snapshot_every_ops == 0 || state.ops_since_snapshot < config.snapshot_every_ops {
        return;
    }

    let Some(tx) = persist_tx else {
        return;
    };

    match request_checkpoint(&state.store, tx, config.compact_after_snapshot).await {
        Ok(()) => state.ops_since_snapshot = 0,
        Err(err) => tracing::warn!(%err, "automatic checkpoint failed"),
    }
}
