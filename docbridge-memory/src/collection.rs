//! Embedded collection adapter over the in-memory document store.
//!
//! Documents are held in a sequence-keyed map; the assigned sequence number is
//! written into each stored document under [`SEQ_FIELD`] and doubles as the
//! backend-internal revision marker required for optimistic `update`. Canonical
//! filters are interpreted directly by [`crate::matcher`]; no normalization
//! happens on this path.

use std::{cmp::Ordering, collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use mea::rwlock::RwLock;

use docbridge_core::{
    collection::{DatabaseType, DeleteTarget, DocumentCollection, PaginationOptions, SortOptions, SortOrder},
    error::{DocumentDbError, DocumentDbResult},
};

use crate::matcher::{self, Comparable};

/// Backend-internal sequence marker carried by every stored document.
pub const SEQ_FIELD: &str = "_seq";

/// Mutable state of one embedded collection: its documents keyed by sequence
/// number, the next sequence to assign, and any unique-field constraints.
#[derive(Debug, Default)]
pub(crate) struct CollectionState {
    pub(crate) documents: BTreeMap<i64, Document>,
    pub(crate) next_seq: i64,
    pub(crate) unique_fields: Vec<String>,
}

impl CollectionState {
    pub(crate) fn with_unique_fields(unique_fields: &[&str]) -> Self {
        Self {
            unique_fields: unique_fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Embedded implementation of [`DocumentCollection`].
///
/// Cloneable; clones share the same underlying collection state. Operations are
/// not internally parallel, so callers serialize structural mutations of the
/// same collection.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    state: Arc<RwLock<CollectionState>>,
}

impl MemoryCollection {
    pub(crate) fn new(name: String, state: Arc<RwLock<CollectionState>>) -> Self {
        Self { name, state }
    }

    fn sequence_of(document: &Document) -> Option<i64> {
        match document.get(SEQ_FIELD) {
            Some(Bson::Int64(seq)) => Some(*seq),
            Some(Bson::Int32(seq)) => Some(i64::from(*seq)),
            _ => None,
        }
    }

    fn check_unique(
        &self,
        state: &CollectionState,
        document: &Document,
        exclude_seq: Option<i64>,
    ) -> DocumentDbResult<()> {
        for field in &state.unique_fields {
            let Some(candidate) = document.get(field) else {
                continue;
            };
            let taken = state
                .documents
                .iter()
                .filter(|(seq, _)| Some(**seq) != exclude_seq)
                .any(|(_, existing)| existing.get(field) == Some(candidate));
            if taken {
                return Err(DocumentDbError::DuplicateKey(
                    field.clone(),
                    self.name.clone(),
                ));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Memory
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, mut document: Document) -> DocumentDbResult<Document> {
        let mut state = self.state.write().await;
        self.check_unique(&state, &document, None)?;

        let seq = state.next_seq;
        state.next_seq += 1;
        document.insert(SEQ_FIELD, Bson::Int64(seq));
        state.documents.insert(seq, document.clone());

        Ok(document)
    }

    async fn read(&self, id: &str) -> DocumentDbResult<Option<Document>> {
        self.find_one(Some(doc! { "id": id })).await
    }

    async fn update(&self, previous: &Document, mut document: Document) -> DocumentDbResult<Document> {
        let mut state = self.state.write().await;

        let seq = Self::sequence_of(previous)
            .ok_or_else(|| DocumentDbError::NotFoundForUpdate(self.name.clone()))?;
        if !state.documents.contains_key(&seq) {
            return Err(DocumentDbError::NotFoundForUpdate(self.name.clone()));
        }

        self.check_unique(&state, &document, Some(seq))?;

        document.insert(SEQ_FIELD, Bson::Int64(seq));
        state.documents.insert(seq, document.clone());

        Ok(document)
    }

    async fn delete(&self, target: DeleteTarget) -> DocumentDbResult<bool> {
        let filter = match target {
            DeleteTarget::Id(id) => doc! { "id": id },
            DeleteTarget::Filter(filter) => filter,
        };

        let mut state = self.state.write().await;

        let mut matched = Vec::new();
        for (seq, document) in &state.documents {
            if matcher::matches_filter(document, &filter)? {
                matched.push(*seq);
            }
        }

        if matched.is_empty() {
            return Ok(false);
        }

        for seq in matched {
            state.documents.remove(&seq);
        }

        Ok(true)
    }

    async fn list(&self) -> DocumentDbResult<Vec<Document>> {
        Ok(self.state.read().await.documents.values().cloned().collect())
    }

    async fn find(
        &self,
        filter: Option<Document>,
        pagination: Option<PaginationOptions>,
        sort: Option<SortOptions>,
    ) -> DocumentDbResult<Vec<Document>> {
        let filter = filter.unwrap_or_default();

        let mut matched = Vec::new();
        {
            let state = self.state.read().await;
            for document in state.documents.values() {
                if matcher::matches_filter(document, &filter)? {
                    matched.push(document.clone());
                }
            }
        }

        if let Some(sort) = &sort {
            matched.sort_by(|a, b| {
                let left = matcher::resolve_path(a, &sort.sort_by)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = matcher::resolve_path(b, &sort.sort_by)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.sort_order {
                    SortOrder::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                    SortOrder::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                }
            });
        }

        let pagination = pagination.unwrap_or_default();
        Ok(matched
            .into_iter()
            .skip(pagination.skip.unwrap_or(0) as usize)
            .take(pagination.limit.map_or(usize::MAX, |limit| limit as usize))
            .collect())
    }

    async fn find_one(&self, filter: Option<Document>) -> DocumentDbResult<Option<Document>> {
        let filter = filter.unwrap_or_default();
        let state = self.state.read().await;

        for document in state.documents.values() {
            if matcher::matches_filter(document, &filter)? {
                return Ok(Some(document.clone()));
            }
        }

        Ok(None)
    }

    async fn count(&self, filter: Option<Document>) -> DocumentDbResult<u64> {
        let filter = filter.unwrap_or_default();
        let state = self.state.read().await;

        let mut count = 0;
        for document in state.documents.values() {
            if matcher::matches_filter(document, &filter)? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn exists(&self, filter: Option<Document>) -> DocumentDbResult<bool> {
        Ok(self.find_one(filter).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> MemoryCollection {
        MemoryCollection::new(
            "docs".to_string(),
            Arc::new(RwLock::new(CollectionState::default())),
        )
    }

    fn unique_collection() -> MemoryCollection {
        MemoryCollection::new(
            "docs".to_string(),
            Arc::new(RwLock::new(CollectionState::with_unique_fields(&["email"]))),
        )
    }

    #[tokio::test]
    async fn create_assigns_a_sequence_marker() {
        let collection = collection();
        let stored = collection
            .create(doc! { "id": "a", "n": 1 })
            .await
            .unwrap();
        assert!(stored.get(SEQ_FIELD).is_some());

        let read = collection.read("a").await.unwrap().unwrap();
        assert_eq!(read, stored);
    }

    #[tokio::test]
    async fn read_misses_return_none() {
        let collection = collection();
        assert!(collection.read("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_replaces_through_a_snapshot() {
        let collection = collection();
        let snapshot = collection
            .create(doc! { "id": "a", "n": 1 })
            .await
            .unwrap();

        let updated = collection
            .update(&snapshot, doc! { "id": "a", "n": 2 })
            .await
            .unwrap();
        assert_eq!(updated.get("n"), Some(&Bson::Int32(2)));
        assert_eq!(updated.get(SEQ_FIELD), snapshot.get(SEQ_FIELD));

        let read = collection.read("a").await.unwrap().unwrap();
        assert_eq!(read.get("n"), Some(&Bson::Int32(2)));
    }

    #[tokio::test]
    async fn update_with_stale_snapshot_fails_and_leaves_store_unchanged() {
        let collection = collection();
        let snapshot = collection
            .create(doc! { "id": "a", "n": 1 })
            .await
            .unwrap();
        collection.delete(DeleteTarget::Id("a".to_string())).await.unwrap();

        let result = collection.update(&snapshot, doc! { "id": "a", "n": 2 }).await;
        assert!(matches!(result, Err(DocumentDbError::NotFoundForUpdate(_))));
        assert_eq!(collection.count(None).await.unwrap(), 0);

        // A snapshot without markers is equally stale
        let result = collection
            .update(&doc! { "id": "a" }, doc! { "id": "a", "n": 3 })
            .await;
        assert!(matches!(result, Err(DocumentDbError::NotFoundForUpdate(_))));
    }

    #[tokio::test]
    async fn create_enforces_unique_fields() {
        let collection = unique_collection();
        collection
            .create(doc! { "id": "a", "email": "a@example.com" })
            .await
            .unwrap();

        let result = collection
            .create(doc! { "id": "b", "email": "a@example.com" })
            .await;
        assert!(matches!(result, Err(DocumentDbError::DuplicateKey(_, _))));
        assert_eq!(collection.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_may_keep_its_own_unique_value() {
        let collection = unique_collection();
        let snapshot = collection
            .create(doc! { "id": "a", "email": "a@example.com" })
            .await
            .unwrap();

        collection
            .update(&snapshot, doc! { "id": "a", "email": "a@example.com", "n": 1 })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_accepts_id_shorthand_and_filters() {
        let collection = collection();
        collection.create(doc! { "id": "a", "n": 1 }).await.unwrap();
        collection.create(doc! { "id": "b", "n": 2 }).await.unwrap();
        collection.create(doc! { "id": "c", "n": 3 }).await.unwrap();

        assert!(collection.delete("a".into()).await.unwrap());
        assert!(!collection.delete("a".into()).await.unwrap());

        let removed = collection
            .delete(doc! { "n": { "$gte": 2.0 } }.into())
            .await
            .unwrap();
        assert!(removed);
        assert_eq!(collection.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn find_applies_filter_sort_and_pagination() {
        let collection = collection();
        for (id, n) in [("a", 3), ("b", 1), ("c", 2), ("d", 10)] {
            collection.create(doc! { "id": id, "n": n }).await.unwrap();
        }

        let results = collection
            .find(
                Some(doc! { "n": { "$lt": 10 } }),
                Some(PaginationOptions { skip: Some(1), limit: Some(1) }),
                Some(SortOptions::new("n", SortOrder::Asc)),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("id"), Some(&Bson::String("c".to_string())));
    }

    #[tokio::test]
    async fn find_count_exists_are_mutually_consistent() {
        let collection = collection();
        for (id, n) in [("a", 1), ("b", 2), ("c", 3)] {
            collection.create(doc! { "id": id, "n": n }).await.unwrap();
        }

        let filter = doc! { "n": { "$gte": 2 } };
        let found = collection.find(Some(filter.clone()), None, None).await.unwrap();
        let count = collection.count(Some(filter.clone())).await.unwrap();
        let exists = collection.exists(Some(filter)).await.unwrap();

        assert_eq!(found.len() as u64, count);
        assert_eq!(exists, count > 0);

        let none = doc! { "n": { "$gt": 100 } };
        assert_eq!(collection.count(Some(none.clone())).await.unwrap(), 0);
        assert!(!collection.exists(Some(none)).await.unwrap());
    }

    #[tokio::test]
    async fn list_returns_every_document() {
        let collection = collection();
        collection.create(doc! { "id": "a" }).await.unwrap();
        collection.create(doc! { "id": "b" }).await.unwrap();
        assert_eq!(collection.list().await.unwrap().len(), 2);
    }
}
