//! Server key-value map layered on a MongoDB collection.
//!
//! No client-side cache; the unique index on `key` (created by the provider)
//! makes upsert-by-key safe under concurrent writers.

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::Collection as MongoCollection;

use docbridge_core::{
    collection::DatabaseType,
    error::{DocumentDbError, DocumentDbResult},
    map::{KeyValueMap, MapEntry},
};

/// Server implementation of [`KeyValueMap`].
#[derive(Debug, Clone)]
pub struct MongoDbMap {
    name: String,
    collection: MongoCollection<Document>,
}

impl MongoDbMap {
    pub(crate) fn new(name: String, collection: MongoCollection<Document>) -> Self {
        Self { name, collection }
    }

    fn entry_from(document: &Document) -> Option<MapEntry> {
        match (document.get("key"), document.get("value")) {
            (Some(Bson::String(key)), Some(value)) => Some(MapEntry {
                key: key.clone(),
                value: value.clone(),
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl KeyValueMap for MongoDbMap {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MongoDb
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn set(&self, key: &str, value: Bson) -> DocumentDbResult<()> {
        self.collection
            .find_one_and_replace(doc! { "key": key }, doc! { "key": key, "value": value })
            .upsert(true)
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> DocumentDbResult<Option<Bson>> {
        let document = self
            .collection
            .find_one(doc! { "key": key })
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?;

        Ok(document.and_then(|document| document.get("value").cloned()))
    }

    async fn delete(&self, key: &str) -> DocumentDbResult<bool> {
        let removed = self
            .collection
            .find_one_and_delete(doc! { "key": key })
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?;

        Ok(removed.is_some())
    }

    async fn find(&self, pattern: &str) -> DocumentDbResult<Vec<MapEntry>> {
        let rows: Vec<Document> = self
            .collection
            .find(doc! { "key": { "$regex": pattern } })
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?;

        Ok(rows.iter().filter_map(Self::entry_from).collect())
    }

    async fn list(&self) -> DocumentDbResult<Vec<MapEntry>> {
        let rows: Vec<Document> = self
            .collection
            .find(doc! {})
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?;

        Ok(rows.iter().filter_map(Self::entry_from).collect())
    }
}
