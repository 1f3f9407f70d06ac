use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{Collection, DocumentStore, StoreError, StoreResult};
use crate::query::{Condition, FieldKind, Filter, Scalar, SortKey, lookup};

type Documents = BTreeMap<Uuid, Value>;

/// MemoryStore
///
/// In-process document store used for local runs without `DATABASE_URL` and
/// by the test suite. Mirrors the Postgres semantics: typed comparisons,
/// missing values sort first ascending and last descending, `id` breaks ties,
/// unique keys reject duplicates.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<Collection, Documents>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Collection, Documents>> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_unique(
    collection: Collection,
    docs: &Documents,
    id: Uuid,
    doc: &Value,
) -> StoreResult<()> {
    for key in collection.unique_keys() {
        let Some(candidate) = doc.get(key.field).filter(|v| !v.is_null()) else {
            continue;
        };
        let taken = docs
            .iter()
            .any(|(other_id, other)| *other_id != id && other.get(key.field) == Some(candidate));
        if taken {
            return Err(StoreError::Conflict {
                collection,
                field: key.field,
            });
        }
    }
    Ok(())
}

fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Orders a stored value against a filter operand; `None` when the stored
/// value is missing or of another kind.
fn compare(stored: &Value, operand: &Scalar) -> Option<Ordering> {
    match operand {
        Scalar::Text(t) => stored.as_str().map(|s| s.cmp(t.as_str())),
        Scalar::Number(n) => stored.as_f64().and_then(|s| s.partial_cmp(n)),
        Scalar::Bool(b) => stored.as_bool().map(|s| s.cmp(b)),
        Scalar::Date(d) => as_date(stored).map(|s| s.cmp(d)),
    }
}

fn holds(doc: &Value, condition: &Condition) -> bool {
    match condition {
        Condition::Compare { field, op, value } => lookup(doc, field)
            .and_then(|stored| compare(stored, value))
            .is_some_and(|ordering| op.accepts(ordering)),
        Condition::In { field, values } => lookup(doc, field).is_some_and(|stored| {
            values
                .iter()
                .any(|v| compare(stored, v) == Some(Ordering::Equal))
        }),
        Condition::Contains { field, needle } => lookup(doc, field)
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
    }
}

pub(crate) fn matches(doc: &Value, filter: &Filter) -> bool {
    filter.all.iter().all(|c| holds(doc, c))
        && (filter.any.is_empty() || filter.any.iter().any(|c| holds(doc, c)))
}

#[derive(Debug, PartialEq, PartialOrd)]
enum SortValue {
    Missing,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
}

fn sort_value(doc: &Value, key: &SortKey) -> SortValue {
    let Some(value) = lookup(doc, &key.field) else {
        return SortValue::Missing;
    };
    let typed = match key.kind {
        FieldKind::Text => value.as_str().map(|s| SortValue::Text(s.to_string())),
        FieldKind::Number => value.as_f64().map(SortValue::Number),
        FieldKind::Bool => value.as_bool().map(SortValue::Bool),
        FieldKind::Date => as_date(value).map(SortValue::Date),
    };
    typed.unwrap_or(SortValue::Missing)
}

fn order_by(a: &Value, b: &Value, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ordering = sort_value(a, key)
            .partial_cmp(&sort_value(b, key))
            .unwrap_or(Ordering::Equal);
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, id: Uuid, doc: Value) -> StoreResult<()> {
        let mut guard = self.lock();
        let docs = guard.entry(collection).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::Conflict {
                collection,
                field: "id",
            });
        }
        check_unique(collection, docs, id, &doc)?;
        docs.insert(id, doc);
        Ok(())
    }

    async fn replace(&self, collection: Collection, id: Uuid, doc: Value) -> StoreResult<bool> {
        let mut guard = self.lock();
        let docs = guard.entry(collection).or_default();
        if !docs.contains_key(&id) {
            return Ok(false);
        }
        check_unique(collection, docs, id, &doc)?;
        docs.insert(id, doc);
        Ok(true)
    }

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        Ok(self
            .lock()
            .get(&collection)
            .and_then(|docs| docs.get(&id))
            .cloned())
    }

    async fn increment(
        &self,
        collection: Collection,
        id: Uuid,
        field: &str,
        by: i64,
    ) -> StoreResult<Option<Value>> {
        let mut guard = self.lock();
        let Some(doc) = guard.get_mut(&collection).and_then(|docs| docs.get_mut(&id)) else {
            return Ok(None);
        };
        let Some(object) = doc.as_object_mut() else {
            return Err(StoreError::Unavailable(format!(
                "{collection} document {id} is not an object"
            )));
        };
        let current = object.get(field).and_then(Value::as_i64).unwrap_or(0);
        object.insert(field.to_string(), Value::from(current.saturating_add(by)));
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        Ok(self
            .lock()
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&id)))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        sort: &[SortKey],
        skip: u64,
        limit: Option<u64>,
    ) -> StoreResult<Vec<Value>> {
        let guard = self.lock();
        let Some(docs) = guard.get(&collection) else {
            return Ok(Vec::new());
        };

        // BTreeMap iteration is id-ordered and the sort is stable, so ties
        // stay in id order.
        let mut matched: Vec<&Value> = docs.values().filter(|d| matches(d, filter)).collect();
        matched.sort_by(|a, b| order_by(a, b, sort));

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(matched.into_iter().skip(skip).take(limit).cloned().collect())
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        let guard = self.lock();
        let count = guard
            .get(&collection)
            .map(|docs| docs.values().filter(|d| matches(d, filter)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_values_sort_first_ascending_and_last_descending() {
        let with = json!({"id": "a", "age": 20});
        let without = json!({"id": "b"});
        let asc = SortKey {
            field: "age".into(),
            kind: FieldKind::Number,
            descending: false,
        };
        let desc = SortKey {
            descending: true,
            ..asc.clone()
        };

        assert_eq!(order_by(&without, &with, &[asc]), Ordering::Less);
        assert_eq!(order_by(&without, &with, &[desc]), Ordering::Greater);
    }

    #[tokio::test]
    async fn increment_touches_only_the_counter() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .insert(Collection::Articles, id, json!({"id": id, "title": "Old", "views": 4}))
            .await
            .unwrap();
        store
            .replace(Collection::Articles, id, json!({"id": id, "title": "New", "views": 4}))
            .await
            .unwrap();

        let doc = store
            .increment(Collection::Articles, id, "views", 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["title"], "New");
        assert_eq!(doc["views"], 5);

        let missing = store
            .increment(Collection::Articles, Uuid::new_v4(), "views", 1)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn contains_is_case_insensitive() {
        let doc = json!({"title": "Derby Day Preview"});
        let filter = Filter::new().any_contains(&["title", "content"], "derby");
        assert!(matches(&doc, &filter));
    }
}
