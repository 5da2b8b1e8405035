//! SQLite journal: one row per applied op, plus periodic store snapshots.
//!
//! Rows are keyed by sequence and indexed by `(collection, doc_id)` so one
//! document's history can be read back without decoding the whole log.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::{
    core::store::{DocumentStore, StoreSnapshotV1},
    op::{OP_FORMAT_VERSION, Op, StoredOp, StoredOpEnvelope},
    types::{OpSeq, now_ms},
};

use super::{OpSink, PersistError, PersistResult};

const SNAPSHOT_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    format_version: u16,
    snapshot: StoreSnapshotV1,
}

/// SQLite implementation of [`OpSink`].
pub struct SqliteOpSink {
    conn: Connection,
}

impl SqliteOpSink {
    /// Opens or creates a journal at `path` (WAL, `synchronous=NORMAL`).
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Opens a throwaway in-memory journal.
    pub fn open_in_memory() -> PersistResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Rebuilds the store: latest snapshot, then every op journaled after
    /// the sequence it covers.
    pub fn load_store(&self) -> PersistResult<DocumentStore> {
        let (mut store, covered) = match self.latest_snapshot()? {
            Some((snapshot, last_seq)) => (DocumentStore::from_snapshot(snapshot)?, last_seq),
            None => (DocumentStore::new(), 0),
        };

        let tail = self.load_events_after(covered)?;
        tracing::debug!(covered, tail = tail.len(), "replaying journal");
        for stored in tail {
            store.apply_replayed_op(stored)?;
        }
        Ok(store)
    }

    /// Ops with a sequence strictly greater than `seq`, in order.
    pub fn load_events_after(&self, seq: OpSeq) -> PersistResult<Vec<StoredOp>> {
        self.select_ops(
            "SELECT seq, ts_ms, payload FROM events WHERE seq > ?1 ORDER BY seq ASC",
            params![seq as i64],
        )
    }

    /// Every journaled op that touched `collection/doc_id`, in order.
    pub fn history(&self, collection: &str, doc_id: &str) -> PersistResult<Vec<StoredOp>> {
        self.select_ops(
            "SELECT seq, ts_ms, payload FROM events WHERE collection = ?1 AND doc_id = ?2 ORDER BY seq ASC",
            params![collection, doc_id],
        )
    }

    /// Number of journaled ops touching one document.
    pub fn op_count_for(&self, collection: &str, doc_id: &str) -> PersistResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE collection = ?1 AND doc_id = ?2",
            params![collection, doc_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Stores a snapshot that covers every op up to `last_seq`.
    pub fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, last_seq: OpSeq) -> PersistResult<()> {
        let payload = serde_json::to_vec(&SnapshotEnvelope {
            format_version: SNAPSHOT_FORMAT_VERSION,
            snapshot: snapshot.clone(),
        })?;
        self.conn.execute(
            "INSERT INTO snapshots(last_seq, ts_ms, payload) VALUES (?1, ?2, ?3)",
            params![last_seq as i64, now_ms() as i64, payload],
        )?;
        Ok(())
    }

    /// Drops journaled ops up to and including `seq`. Returns how many.
    pub fn compact_through(&mut self, seq: OpSeq) -> PersistResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM events WHERE seq <= ?1", params![seq as i64])?)
    }

    /// Highest journaled sequence, 0 when the log is empty.
    pub fn latest_seq(&self) -> PersistResult<OpSeq> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM events", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(seq.unwrap_or(0) as OpSeq)
    }

    fn latest_snapshot(&self) -> PersistResult<Option<(StoreSnapshotV1, OpSeq)>> {
        let row: Option<(i64, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT last_seq, payload FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((last_seq, payload)) = row else {
            return Ok(None);
        };
        let env: SnapshotEnvelope = serde_json::from_slice(&payload)?;
        if env.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion {
                what: "snapshot",
                version: env.format_version,
            });
        }
        Ok(Some((env.snapshot, last_seq as OpSeq)))
    }

    fn select_ops(&self, sql: &str, args: impl rusqlite::Params) -> PersistResult<Vec<StoredOp>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, Vec<u8>>(2)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (seq, ts_ms, payload) = row?;
            let mut stored = decode_op(&payload)?;
            stored.seq = seq as OpSeq;
            stored.ts_ms = ts_ms as u64;
            out.push(stored);
        }
        Ok(out)
    }
}

impl OpSink for SqliteOpSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let Some(last) = ops.last() else {
            return self.latest_seq();
        };

        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO events(seq, ts_ms, kind, collection, doc_id, payload) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for stored in ops {
                let payload = serde_json::to_vec(&StoredOpEnvelope::new(stored.clone()))?;
                insert.execute(params![
                    stored.seq as i64,
                    stored.ts_ms as i64,
                    op_kind(&stored.op),
                    stored.op.collection(),
                    stored.op.doc_id(),
                    payload,
                ])?;
            }
        }
        tx.commit()?;
        Ok(last.seq)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, last_seq: OpSeq) -> PersistResult<()> {
        SqliteOpSink::write_snapshot(self, snapshot, last_seq)
    }

    fn compact_through(&mut self, seq: OpSeq) -> PersistResult<usize> {
        SqliteOpSink::compact_through(self, seq)
    }
}

// Stored in the `kind` column for ad hoc inspection; replay reads the payload.
fn op_kind(op: &Op) -> i64 {
    match op {
        Op::Create { .. } => 1,
        Op::Update { .. } => 2,
        Op::Delete { .. } => 3,
        Op::ArrayUnion { .. } => 4,
        Op::Merge { .. } => 5,
    }
}

fn decode_op(payload: &[u8]) -> PersistResult<StoredOp> {
    let envelope: StoredOpEnvelope = serde_json::from_slice(payload)?;
    if envelope.format_version != OP_FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion {
            what: "op",
            version: envelope.format_version,
        });
    }
    Ok(envelope.stored)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::document::{FieldPatch, Fields};

    #[test]
    fn history_lists_one_documents_ops_in_order() {
        let mut store = DocumentStore::new();
        let mut fields = Fields::new();
        fields.insert("name".into(), json!("Milk"));
        let (milk, _) = store.create("shoppingList", fields.clone()).expect("create");
        store.create("shoppingList", fields).expect("create other");
        store
            .update("shoppingList", &milk, FieldPatch::new().with("link", "http://x"))
            .expect("update");

        let mut sink = SqliteOpSink::open_in_memory().expect("open");
        assert_eq!(sink.append_ops(&store.drain_pending_ops()).expect("append"), 3);

        let seqs: Vec<_> = sink
            .history("shoppingList", &milk)
            .expect("history")
            .into_iter()
            .map(|op| op.seq)
            .collect();
        assert_eq!(seqs, [1, 3]);
        assert_eq!(sink.latest_seq().expect("latest"), 3);
        assert_eq!(sink.append_ops(&[]).expect("empty append"), 3);
    }

    #[test]
    fn empty_journal_loads_an_empty_store() {
        let sink = SqliteOpSink::open_in_memory().expect("open");
        let store = sink.load_store().expect("load");
        assert_eq!(store.latest_op_seq(), 0);
        assert!(store.is_empty("posts"));
    }
}
