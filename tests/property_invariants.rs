use std::cmp::Ordering;

use proptest::prelude::*;
use serde_json::{Value, json};

use duolog::{
    core::{
        query::{Query, compare_values},
        store::DocumentStore,
    },
    document::{Document, FieldPatch, Fields},
    sync::{Snapshot, mirror::Mirror},
    types::SortDirection,
};

const COLLECTIONS: [&str; 3] = ["posts", "songs", "moods"];

#[derive(Debug, Clone)]
enum Action {
    Create { coll: u8, rank: i64 },
    Update { target: u8, rank: i64 },
    Merge { coll: u8, key: u8, rank: i64 },
    Append { target: u8, tag: u8 },
    Delete { target: u8 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..3, -50i64..50).prop_map(|(coll, rank)| Action::Create { coll, rank }),
        (any::<u8>(), -50i64..50).prop_map(|(target, rank)| Action::Update { target, rank }),
        (0u8..3, 0u8..6, -50i64..50).prop_map(|(coll, key, rank)| Action::Merge { coll, key, rank }),
        (any::<u8>(), any::<u8>()).prop_map(|(target, tag)| Action::Append { target, tag }),
        any::<u8>().prop_map(|target| Action::Delete { target }),
    ]
}

fn ranked(rank: i64) -> Fields {
    let mut fields = Fields::new();
    fields.insert("rank".into(), json!(rank));
    fields.insert("tags".into(), json!([]));
    fields
}

fn doc(id: &str, rank: Option<i64>) -> Document {
    let mut fields = Fields::new();
    if let Some(rank) = rank {
        fields.insert("rank".into(), json!(rank));
    }
    Document::new(id, fields)
}

/// Every `(collection, id)` currently stored, in a stable order.
fn all_docs(store: &DocumentStore) -> Vec<(String, String)> {
    store
        .export_snapshot()
        .collections
        .into_iter()
        .flat_map(|(name, docs)| docs.into_iter().map(move |d| (name.clone(), d.id)))
        .collect()
}

fn pick(store: &DocumentStore, target: u8) -> Option<(String, String)> {
    let docs = all_docs(store);
    if docs.is_empty() {
        None
    } else {
        Some(docs[usize::from(target) % docs.len()].clone())
    }
}

fn ids(docs: &[Document]) -> Vec<String> {
    docs.iter().map(|d| d.id.clone()).collect()
}

proptest! {
    #[test]
    fn replaying_drained_ops_rebuilds_the_same_store(actions in prop::collection::vec(action_strategy(), 1..150)) {
        let mut store = DocumentStore::new();

        for action in actions {
            match action {
                Action::Create { coll, rank } => {
                    store.create(COLLECTIONS[usize::from(coll)], ranked(rank)).expect("create");
                }
                Action::Update { target, rank } => {
                    if let Some((coll, id)) = pick(&store, target) {
                        store.update(&coll, &id, FieldPatch::new().with("rank", rank)).expect("update");
                    }
                }
                Action::Merge { coll, key, rank } => {
                    store.merge(COLLECTIONS[usize::from(coll)], &format!("k{key}"), FieldPatch::new().with("rank", rank));
                }
                Action::Append { target, tag } => {
                    if let Some((coll, id)) = pick(&store, target) {
                        // Merged documents may lack `tags`; appending creates it.
                        store.array_union(&coll, &id, "tags", json!(tag)).expect("append");
                    }
                }
                Action::Delete { target } => {
                    if let Some((coll, id)) = pick(&store, target) {
                        store.delete(&coll, &id).expect("delete");
                    }
                }
            }
        }

        let mut replayed = DocumentStore::new();
        for op in store.drain_pending_ops() {
            replayed.apply_replayed_op(op).expect("replay");
        }
        prop_assert_eq!(replayed.export_snapshot(), store.export_snapshot());

        let query = Query::collection("posts").order_by("rank", SortDirection::Desc);
        let results = store.query(&query);
        prop_assert_eq!(results.len(), store.len("posts"));
        for pair in results.windows(2) {
            prop_assert_ne!(
                compare_values(pair[0].field("rank"), pair[1].field("rank")),
                Ordering::Less
            );
        }
    }

    #[test]
    fn query_order_ignores_input_order(
        docs in prop::collection::btree_map("[a-z]{1,6}", prop::option::of(-5i64..5), 0..40)
            .prop_map(|m| m.into_iter().map(|(id, rank)| doc(&id, rank)).collect::<Vec<_>>())
            .prop_shuffle(),
        desc in any::<bool>(),
    ) {
        let direction = if desc { SortDirection::Desc } else { SortDirection::Asc };
        let query = Query::collection("songs").order_by("rank", direction);

        let mut reference = docs.clone();
        reference.sort_by(|a, b| a.id.cmp(&b.id));
        query.sort(&mut reference);

        let mut shuffled = docs;
        query.sort(&mut shuffled);
        prop_assert_eq!(ids(&shuffled), ids(&reference));

        for pair in shuffled.windows(2) {
            let ord = compare_values(pair[0].field("rank"), pair[1].field("rank"));
            let ord = if desc { ord.reverse() } else { ord };
            prop_assert_ne!(ord, Ordering::Greater);
            if ord == Ordering::Equal {
                prop_assert!(pair[0].id < pair[1].id, "ties fall back to id order");
            }
        }
    }

    #[test]
    fn replace_leaves_no_overlay_residue(
        before in prop::collection::vec(0u8..20, 0..10),
        after in prop::collection::vec(0u8..20, 0..10),
        inserts in prop::collection::vec(20u8..40, 0..5),
        removes in prop::collection::vec(0u8..20, 0..5),
    ) {
        let as_docs = |keys: &[u8]| {
            let mut seen = std::collections::BTreeSet::new();
            keys.iter()
                .filter(|k| seen.insert(**k))
                .map(|k| doc(&format!("d{k}"), Some(i64::from(*k))))
                .collect::<Vec<_>>()
        };

        let mut mirror = Mirror::new();
        mirror.replace(Snapshot { seq: 1, documents: as_docs(&before) });
        let mut tickets = Vec::new();
        for key in &inserts {
            tickets.push(mirror.optimistic_insert(doc(&format!("d{key}"), None)));
        }
        for key in &removes {
            tickets.push(mirror.optimistic_remove(format!("d{key}")));
            tickets.push(mirror.optimistic_patch(format!("d{key}"), FieldPatch::new().with("rank", Value::Null)));
        }
        for ticket in tickets {
            prop_assert!(mirror.confirm(ticket, 2));
        }

        let expected = as_docs(&after);
        let discarded = mirror.replace(Snapshot { seq: 2, documents: expected.clone() });
        prop_assert_eq!(discarded, inserts.len() + 2 * removes.len());
        prop_assert_eq!(mirror.pending(), 0);
        prop_assert_eq!(mirror.get(), expected);
    }
}
