use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{document::Document, types::SortDirection};

/// Equality filter on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    /// Field name.
    pub field: String,
    /// Required value.
    pub value: Value,
}

/// Client-requested ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Sort key field.
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
}

/// Collection query: name, optional equality filter, optional order.
///
/// Documents that compare equal on the order key (including documents
/// missing it, which sort as null) fall back to id order, so results are
/// stable across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Collection name.
    pub collection: String,
    /// Optional equality filter.
    pub filter: Option<FieldFilter>,
    /// Optional sort key.
    pub order_by: Option<OrderBy>,
}

impl Query {
    /// Unfiltered, id-ordered query over `collection`.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: None,
            order_by: None,
        }
    }

    /// Restricts results to documents whose `field` equals `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Orders results by `field`.
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Returns true when `doc` passes the filter.
    pub fn matches(&self, doc: &Document) -> bool {
        match &self.filter {
            Some(f) => doc.field(&f.field) == Some(&f.value),
            None => true,
        }
    }

    /// Sorts `docs` in place by the requested order, then by id.
    pub fn sort(&self, docs: &mut [Document]) {
        docs.sort_by(|a, b| self.compare(a, b));
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let by_key = match &self.order_by {
            Some(order) => {
                let ord = compare_values(a.field(&order.field), b.field(&order.field));
                match order.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
            None => Ordering::Equal,
        };
        by_key.then_with(|| a.id.cmp(&b.id))
    }
}

// null < bool < number < string < array < object; missing reads as null.
fn type_rank(v: Option<&Value>) -> u8 {
    match v {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over optional JSON values used for sorting.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                let ord = compare_values(Some(xi), Some(yi));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Some(Value::Object(x)), Some(Value::Object(y))) => x.len().cmp(&y.len()),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(id: &str, value: Value) -> Document {
        let Value::Object(fields) = value else {
            panic!("object expected");
        };
        Document::new(id, fields)
    }

    #[test]
    fn desc_order_breaks_ties_by_id_and_puts_missing_last() {
        let q = Query::collection("posts").order_by("timestamp", SortDirection::Desc);
        let mut docs = vec![
            doc("c", json!({"timestamp": 5})),
            doc("a", json!({})),
            doc("b", json!({"timestamp": 5})),
            doc("d", json!({"timestamp": 9})),
        ];
        q.sort(&mut docs);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["d", "b", "c", "a"]);
    }

    #[test]
    fn filter_is_exact_equality() {
        let q = Query::collection("posts").where_eq("category", "mistakes");
        assert!(q.matches(&doc("a", json!({"category": "mistakes"}))));
        assert!(!q.matches(&doc("b", json!({"category": "likes"}))));
        assert!(!q.matches(&doc("c", json!({}))));
    }
}
