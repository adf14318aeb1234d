use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{
    compare, lookup, DocumentStore, Filter, FindOptions, IndexSpec, SortOrder, StoreError,
};

#[derive(Default)]
struct Collections {
    documents: HashMap<String, Vec<Value>>,
    unique_indexes: Vec<(String, Vec<String>)>,
}

/// In-process document store. Every write runs under one lock, so conditional
/// updates are atomic with respect to each other.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Collections {
    fn unique_fields(&self, collection: &str) -> Vec<&Vec<String>> {
        self.unique_indexes
            .iter()
            .filter(|(c, _)| c == collection)
            .map(|(_, fields)| fields)
            .collect()
    }

    /// Checks `candidate` against every document except the one at `skip`.
    fn check_unique(
        &self,
        collection: &str,
        candidate: &Value,
        skip: Option<usize>,
    ) -> Result<(), StoreError> {
        let Some(existing) = self.documents.get(collection) else {
            return Ok(());
        };

        for fields in self.unique_fields(collection) {
            let key: Vec<Option<&Value>> = fields.iter().map(|f| lookup(candidate, f)).collect();
            if key.iter().any(|v| v.map_or(true, Value::is_null)) {
                continue;
            }

            let clash = existing.iter().enumerate().any(|(index, document)| {
                Some(index) != skip
                    && fields.iter().zip(&key).all(|(f, v)| lookup(document, f) == *v)
            });

            if clash {
                return Err(StoreError::UniqueViolation {
                    collection: collection.to_string(),
                    field: fields.join(","),
                });
            }
        }

        Ok(())
    }
}

fn sort_documents(documents: &mut [Value], sort: &[(String, SortOrder)]) {
    documents.sort_by(|a, b| {
        for (field, order) in sort {
            let ordering = match (lookup(a, field), lookup(b, field)) {
                (Some(x), Some(y)) => compare(Some(x), y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ordering = match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn apply_changes(document: &Value, changes: &Value) -> Result<Value, StoreError> {
    let mut updated = document.clone();
    match (updated.as_object_mut(), changes.as_object()) {
        (Some(target), Some(changes)) => {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
            Ok(updated)
        }
        _ => Err(StoreError::Backend("documents and changes must be JSON objects".to_string())),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Value>, StoreError> {
        let inner = self.inner.read().await;
        let mut found: Vec<Value> = inner
            .documents
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();

        if !options.sort.is_empty() {
            sort_documents(&mut found, &options.sort);
        }

        let skip = options.skip.unwrap_or(0);
        let limit = options.limit.unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .documents
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).count())
            .unwrap_or(0))
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<Value, StoreError> {
        if !document.is_object() {
            return Err(StoreError::Backend("documents must be JSON objects".to_string()));
        }

        let mut inner = self.inner.write().await;
        inner.check_unique(collection, &document, None)?;
        inner
            .documents
            .entry(collection.to_string())
            .or_default()
            .push(document.clone());

        debug!("Inserted document into {}", collection);
        Ok(document)
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let mut inner = self.inner.write().await;

        let mut pending = Vec::new();
        if let Some(docs) = inner.documents.get(collection) {
            for (index, document) in docs.iter().enumerate() {
                if filter.matches(document) {
                    pending.push((index, apply_changes(document, &changes)?));
                }
            }
        }

        for (index, candidate) in &pending {
            inner.check_unique(collection, candidate, Some(*index))?;
        }

        let mut updated = Vec::with_capacity(pending.len());
        if let Some(docs) = inner.documents.get_mut(collection) {
            for (index, candidate) in pending {
                docs[index] = candidate.clone();
                updated.push(candidate);
            }
        }

        debug!("Updated {} document(s) in {}", updated.len(), collection);
        Ok(updated)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(docs) = inner.documents.get_mut(collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|document| !filter.matches(document));
        Ok(before - docs.len())
    }

    async fn ensure_indexes(&self, indexes: &[IndexSpec]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for index in indexes.iter().filter(|index| index.unique) {
            let entry = (
                index.collection.to_string(),
                index.fields.iter().map(|f| f.to_string()).collect::<Vec<_>>(),
            );
            if !inner.unique_indexes.contains(&entry) {
                inner.unique_indexes.push(entry);
            }
        }

        debug!("Memory store tracking {} unique index(es)", inner.unique_indexes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::store::{collections, COLLECTION_INDEXES};

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.ensure_indexes(COLLECTION_INDEXES).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicate_email() {
        let store = store().await;
        store.insert(collections::USERS, json!({"id": "u1", "email": "a@x.com"})).await.unwrap();

        let err = store
            .insert(collections::USERS, json!({"id": "u2", "email": "a@x.com"}))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on(collections::USERS, "email"));

        // Email comparison is case-sensitive as stored.
        store.insert(collections::USERS, json!({"id": "u3", "email": "A@x.com"})).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_cannot_break_unique_index() {
        let store = store().await;
        store.insert(collections::USERS, json!({"id": "u1", "email": "a@x.com"})).await.unwrap();
        store.insert(collections::USERS, json!({"id": "u2", "email": "b@x.com"})).await.unwrap();

        let result = store
            .update(collections::USERS, &Filter::by_id("u2"), json!({"email": "a@x.com"}))
            .await;
        assert_matches!(result, Err(StoreError::UniqueViolation { .. }));

        // Rewriting a document's own value is not a clash.
        let updated = store
            .update(collections::USERS, &Filter::by_id("u1"), json!({"email": "a@x.com", "name": "A"}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_update_reports_zero_rows() {
        let store = store().await;
        store
            .insert(collections::AVAILABILITY_SLOTS, json!({"id": "s1", "status": "available"}))
            .await
            .unwrap();

        let claim = Filter::by_id("s1").eq("status", "available");
        let first = store
            .update(collections::AVAILABILITY_SLOTS, &claim, json!({"status": "booked"}))
            .await
            .unwrap();
        let second = store
            .update(collections::AVAILABILITY_SLOTS, &claim, json!({"status": "booked"}))
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0]["status"], "booked");
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let store = Arc::new(store().await);
        store
            .insert(collections::AVAILABILITY_SLOTS, json!({"id": "s1", "status": "available"}))
            .await
            .unwrap();

        let attempts = (0..16).map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update(
                        collections::AVAILABILITY_SLOTS,
                        &Filter::by_id("s1").eq("status", "available"),
                        json!({"status": "booked"}),
                    )
                    .await
                    .unwrap()
                    .len()
            })
        });

        let results = futures::future::join_all(attempts).await;
        let winners: usize = results.into_iter().map(|r| r.unwrap()).sum();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_find_sorts_and_paginates() {
        let store = store().await;
        for (id, date, start) in [
            ("a", "2025-03-11", "09:00"),
            ("b", "2025-03-10", "11:00"),
            ("c", "2025-03-10", "09:00"),
        ] {
            store
                .insert(
                    collections::AVAILABILITY_SLOTS,
                    json!({"id": id, "doctor_id": "d1", "date": date, "start_time": start}),
                )
                .await
                .unwrap();
        }

        let options = FindOptions::new().sort_asc("date").sort_asc("start_time");
        let all = store
            .find(collections::AVAILABILITY_SLOTS, &Filter::new().eq("doctor_id", "d1"), &options)
            .await
            .unwrap();
        let ids: Vec<&str> = all.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let page = store
            .find(collections::AVAILABILITY_SLOTS, &Filter::new(), &options.skip(1).limit(1))
            .await
            .unwrap();
        assert_eq!(page[0]["id"], "b");
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let store = store().await;
        store.insert(collections::APPOINTMENTS, json!({"id": "a1", "status": "pending"})).await.unwrap();
        store.insert(collections::APPOINTMENTS, json!({"id": "a2", "status": "cancelled"})).await.unwrap();

        assert_eq!(store.count(collections::APPOINTMENTS, &Filter::new()).await.unwrap(), 2);
        assert_eq!(store.delete(collections::APPOINTMENTS, &Filter::by_id("a1")).await.unwrap(), 1);
        assert_eq!(store.delete(collections::APPOINTMENTS, &Filter::by_id("a1")).await.unwrap(), 0);
        assert_eq!(
            store
                .find_one(collections::APPOINTMENTS, &Filter::new().eq("status", "cancelled"))
                .await
                .unwrap()
                .map(|d| d["id"].clone()),
            Some(json!("a2"))
        );
    }
}
