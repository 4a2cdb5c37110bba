//! Embedded key-value map layered on [`MemoryCollection`].
//!
//! Entries live in the backing collection as `{ "key": ..., "value": ... }`
//! documents. Point lookups go through a lazily-built cache keyed by entry key;
//! the cache is populated from the collection on first use and kept in step by
//! `set`/`delete`.

use std::collections::HashMap;

use async_trait::async_trait;
use bson::{Bson, doc};
use mea::rwlock::RwLock;

use docbridge_core::{
    collection::{DatabaseType, DocumentCollection},
    error::DocumentDbResult,
    map::{KeyValueMap, MapEntry},
};

use crate::collection::MemoryCollection;

/// Embedded implementation of [`KeyValueMap`].
pub struct MemoryMap {
    collection: MemoryCollection,
    cache: RwLock<Option<HashMap<String, Bson>>>,
}

impl MemoryMap {
    pub(crate) fn new(collection: MemoryCollection) -> Self {
        Self {
            collection,
            cache: RwLock::new(None),
        }
    }

    async fn ensure_cache(&self) -> DocumentDbResult<()> {
        if self.cache.read().await.is_some() {
            return Ok(());
        }

        let mut cache = HashMap::new();
        for document in self.collection.list().await? {
            if let (Some(Bson::String(key)), Some(value)) =
                (document.get("key"), document.get("value"))
            {
                cache.insert(key.clone(), value.clone());
            }
        }

        *self.cache.write().await = Some(cache);
        Ok(())
    }
}

#[async_trait]
impl KeyValueMap for MemoryMap {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Memory
    }

    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn set(&self, key: &str, value: Bson) -> DocumentDbResult<()> {
        self.ensure_cache().await?;

        let entry = doc! { "key": key, "value": value.clone() };
        match self.collection.find_one(Some(doc! { "key": key })).await? {
            Some(previous) => {
                self.collection.update(&previous, entry).await?;
            }
            None => {
                self.collection.create(entry).await?;
            }
        }

        if let Some(cache) = self.cache.write().await.as_mut() {
            cache.insert(key.to_string(), value);
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> DocumentDbResult<Option<Bson>> {
        self.ensure_cache().await?;
        Ok(self
            .cache
            .read()
            .await
            .as_ref()
            .and_then(|cache| cache.get(key).cloned()))
    }

    async fn delete(&self, key: &str) -> DocumentDbResult<bool> {
        self.ensure_cache().await?;

        let known = self
            .cache
            .read()
            .await
            .as_ref()
            .is_some_and(|cache| cache.contains_key(key));
        if !known {
            return Ok(false);
        }

        let removed = self.collection.delete(doc! { "key": key }.into()).await?;
        if let Some(cache) = self.cache.write().await.as_mut() {
            cache.remove(key);
        }

        Ok(removed)
    }

    async fn find(&self, pattern: &str) -> DocumentDbResult<Vec<MapEntry>> {
        let rows = self
            .collection
            .find(Some(doc! { "key": { "$regex": pattern } }), None, None)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|document| {
                match (document.get("key"), document.get("value")) {
                    (Some(Bson::String(key)), Some(value)) => Some(MapEntry {
                        key: key.clone(),
                        value: value.clone(),
                    }),
                    _ => None,
                }
            })
            .collect())
    }

    async fn list(&self) -> DocumentDbResult<Vec<MapEntry>> {
        Ok(self
            .collection
            .list()
            .await?
            .into_iter()
            .filter_map(|document| {
                match (document.get("key"), document.get("value")) {
                    (Some(Bson::String(key)), Some(value)) => Some(MapEntry {
                        key: key.clone(),
                        value: value.clone(),
                    }),
                    _ => None,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::collection::CollectionState;

    fn map() -> MemoryMap {
        MemoryMap::new(MemoryCollection::new(
            "settings".to_string(),
            Arc::new(RwLock::new(CollectionState::default())),
        ))
    }

    #[tokio::test]
    async fn set_then_get_returns_the_value() {
        let map = map();
        map.set("theme", Bson::String("dark".to_string())).await.unwrap();
        assert_eq!(
            map.get("theme").await.unwrap(),
            Some(Bson::String("dark".to_string()))
        );
        assert!(map.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_replaces_an_existing_entry() {
        let map = map();
        map.set("n", Bson::Int32(1)).await.unwrap();
        map.set("n", Bson::Int32(2)).await.unwrap();

        assert_eq!(map.get("n").await.unwrap(), Some(Bson::Int32(2)));
        assert_eq!(map.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_an_entry_existed() {
        let map = map();
        map.set("a", Bson::Int32(1)).await.unwrap();

        assert!(map.delete("a").await.unwrap());
        assert!(!map.delete("a").await.unwrap());
        assert!(map.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_filters_keys_by_regex() {
        let map = map();
        map.set("user.alice", Bson::Int32(1)).await.unwrap();
        map.set("user.bob", Bson::Int32(2)).await.unwrap();
        map.set("group.admins", Bson::Int32(3)).await.unwrap();

        let mut entries = map.find("^user\\.").await.unwrap();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "user.alice");
        assert_eq!(entries[1].key, "user.bob");
    }

    #[tokio::test]
    async fn cache_is_rebuilt_from_the_backing_collection() {
        let state = Arc::new(RwLock::new(CollectionState::default()));
        let collection = MemoryCollection::new("settings".to_string(), state.clone());
        collection
            .create(doc! { "key": "seeded", "value": 42 })
            .await
            .unwrap();

        let map = MemoryMap::new(MemoryCollection::new("settings".to_string(), state));
        assert_eq!(map.get("seeded").await.unwrap(), Some(Bson::Int32(42)));
    }
}
