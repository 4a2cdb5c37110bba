//! Embedded connection and per-database providers.
//!
//! A [`MemoryConnection`] hands out one [`MemoryProvider`] per logical database
//! name. The folder/extension pair only shapes the path reported for each
//! database; no files are written. Providers deregister themselves from the
//! connection on close.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use async_trait::async_trait;
use mea::{mutex::Mutex, rwlock::RwLock};

use docbridge_core::{
    collection::DocumentCollection,
    connection::{CollectionProvider, DatabaseConnection},
    error::{DocumentDbError, DocumentDbResult},
    map::KeyValueMap,
};

use crate::{
    collection::{CollectionState, MemoryCollection},
    map::MemoryMap,
};

type ProviderRegistry = Mutex<HashMap<String, Arc<MemoryProvider>>>;

/// Embedded implementation of [`DatabaseConnection`].
///
/// Cloneable; clones share the same set of open providers.
#[derive(Clone)]
pub struct MemoryConnection {
    folder: String,
    extension: String,
    providers: Arc<ProviderRegistry>,
}

impl MemoryConnection {
    /// Opens a connection rooted at `folder`, using the default `db` file
    /// extension for database paths.
    pub fn new(folder: &str) -> Self {
        Self::with_extension(folder, "db")
    }

    /// Opens a connection rooted at `folder` with a custom file extension.
    pub fn with_extension(folder: &str, extension: &str) -> Self {
        Self {
            folder: folder.to_string(),
            extension: extension.to_string(),
            providers: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn get_database(&self, name: &str) -> DocumentDbResult<Arc<dyn CollectionProvider>> {
        // Held across creation so concurrent first-time requests converge.
        let mut providers = self.providers.lock().await;

        if let Some(provider) = providers.get(name) {
            return Ok(provider.clone());
        }

        let path = format!("{}/{}.{}", self.folder, name, self.extension);
        tracing::debug!(database = name, path = %path, "opening embedded database");

        let provider = Arc::new(MemoryProvider::new(
            name.to_string(),
            path,
            Arc::downgrade(&self.providers),
        ));
        providers.insert(name.to_string(), provider.clone());

        Ok(provider)
    }

    async fn close(&self) -> DocumentDbResult<()> {
        let open: Vec<Arc<MemoryProvider>> =
            self.providers.lock().await.drain().map(|(_, p)| p).collect();

        let mut first_error = None;
        for provider in open {
            if let Err(error) = provider.close().await {
                tracing::warn!(database = provider.name.as_str(), %error, "failed to close database");
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Embedded implementation of [`CollectionProvider`] for one logical database.
pub struct MemoryProvider {
    name: String,
    path: String,
    collections: RwLock<HashMap<String, Arc<RwLock<CollectionState>>>>,
    registry: Weak<ProviderRegistry>,
}

impl MemoryProvider {
    fn new(name: String, path: String, registry: Weak<ProviderRegistry>) -> Self {
        Self {
            name,
            path,
            collections: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// The path this database reports, derived from the connection's folder and
    /// extension.
    pub fn path(&self) -> &str {
        &self.path
    }

    async fn state_for(
        &self,
        name: &str,
        unique_fields: &[&str],
    ) -> Arc<RwLock<CollectionState>> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(RwLock::new(CollectionState::with_unique_fields(
                    unique_fields,
                )))
            })
            .clone()
    }
}

#[async_trait]
impl CollectionProvider for MemoryProvider {
    async fn get_collection_with_indexes(
        &self,
        name: &str,
        unique_fields: &[&str],
    ) -> DocumentDbResult<Arc<dyn DocumentCollection>> {
        let state = self.state_for(name, unique_fields).await;
        Ok(Arc::new(MemoryCollection::new(name.to_string(), state)))
    }

    async fn get_map(&self, name: &str) -> DocumentDbResult<Arc<dyn KeyValueMap>> {
        let state = self.state_for(name, &["key"]).await;
        Ok(Arc::new(MemoryMap::new(MemoryCollection::new(
            name.to_string(),
            state,
        ))))
    }

    async fn close(&self) -> DocumentDbResult<()> {
        tracing::debug!(database = self.name.as_str(), "closing embedded database");

        if let Some(registry) = self.registry.upgrade() {
            registry.lock().await.remove(&self.name);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[tokio::test]
    async fn get_database_reuses_the_same_provider() {
        let connection = MemoryConnection::new("data");

        let first = connection.get_database("app").await.unwrap();
        let collection = first.get_collection("items").await.unwrap();
        collection.create(doc! { "id": "a" }).await.unwrap();

        let second = connection.get_database("app").await.unwrap();
        let same = second.get_collection("items").await.unwrap();
        assert_eq!(same.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn databases_are_isolated_from_each_other() {
        let connection = MemoryConnection::new("data");

        let left = connection.get_database("left").await.unwrap();
        left.get_collection("items")
            .await
            .unwrap()
            .create(doc! { "id": "a" })
            .await
            .unwrap();

        let right = connection.get_database("right").await.unwrap();
        let items = right.get_collection("items").await.unwrap();
        assert_eq!(items.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unique_fields_only_apply_on_first_creation() {
        let connection = MemoryConnection::new("data");
        let database = connection.get_database("app").await.unwrap();

        let first = database
            .get_collection_with_indexes("users", &["email"])
            .await
            .unwrap();
        first
            .create(doc! { "id": "a", "email": "a@example.com" })
            .await
            .unwrap();

        // A later request without index fields still enforces the original constraint.
        let second = database.get_collection("users").await.unwrap();
        let result = second
            .create(doc! { "id": "b", "email": "a@example.com" })
            .await;
        assert!(matches!(result, Err(DocumentDbError::DuplicateKey(_, _))));
    }

    #[tokio::test]
    async fn close_deregisters_the_provider() {
        let connection = MemoryConnection::new("data");

        let database = connection.get_database("app").await.unwrap();
        database
            .get_collection("items")
            .await
            .unwrap()
            .create(doc! { "id": "a" })
            .await
            .unwrap();
        database.close().await.unwrap();

        // A fresh provider starts empty.
        let reopened = connection.get_database("app").await.unwrap();
        let items = reopened.get_collection("items").await.unwrap();
        assert_eq!(items.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn connection_close_closes_every_database() {
        let connection = MemoryConnection::new("data");
        connection.get_database("a").await.unwrap();
        connection.get_database("b").await.unwrap();

        connection.close().await.unwrap();
        assert!(connection.providers.lock().await.is_empty());
    }

    #[tokio::test]
    async fn database_path_uses_folder_and_extension() {
        let connection = MemoryConnection::with_extension("/tmp/data", "ldb");
        let _ = connection.get_database("app").await.unwrap();

        let providers = connection.providers.lock().await;
        assert_eq!(providers.get("app").unwrap().path(), "/tmp/data/app.ldb");
    }
}
