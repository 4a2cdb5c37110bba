//! Server connection and per-database providers.
//!
//! One [`MongoDbConnection`] wraps one driver [`Client`] and hands out a cached
//! [`MongoDbProvider`] per logical database name. Connection pooling is the
//! driver's concern; provider `close` is a no-op and only the connection-level
//! `close` shuts the client down.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Document, doc};
use mea::mutex::Mutex;
use mongodb::{
    Client, Database, IndexModel,
    options::{ClientOptions, IndexOptions},
};

use docbridge_core::{
    collection::DocumentCollection,
    connection::{CollectionProvider, DatabaseConnection},
    error::{DocumentDbError, DocumentDbResult},
    map::KeyValueMap,
};

use crate::{collection::MongoDbCollection, map::MongoDbMap};

/// Server implementation of [`DatabaseConnection`].
///
/// Cloneable; clones share the same client and provider cache.
#[derive(Clone)]
pub struct MongoDbConnection {
    client: Client,
    providers: Arc<Mutex<HashMap<String, Arc<MongoDbProvider>>>>,
}

impl MongoDbConnection {
    /// Connects using a MongoDB connection string.
    pub async fn connect(connection_string: &str) -> DocumentDbResult<Self> {
        let options = ClientOptions::parse(connection_string)
            .await
            .map_err(|e| DocumentDbError::Initialization(e.to_string()))?;
        Self::with_options(options)
    }

    /// Connects using caller-assembled client options.
    pub fn with_options(options: ClientOptions) -> DocumentDbResult<Self> {
        let client = Client::with_options(options)
            .map_err(|e| DocumentDbError::Initialization(e.to_string()))?;

        Ok(Self {
            client,
            providers: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

#[async_trait]
impl DatabaseConnection for MongoDbConnection {
    async fn get_database(&self, name: &str) -> DocumentDbResult<Arc<dyn CollectionProvider>> {
        let mut providers = self.providers.lock().await;

        if let Some(provider) = providers.get(name) {
            return Ok(provider.clone());
        }

        tracing::debug!(database = name, "opening server database");
        let provider = Arc::new(MongoDbProvider::new(self.client.database(name)));
        providers.insert(name.to_string(), provider.clone());

        Ok(provider)
    }

    async fn close(&self) -> DocumentDbResult<()> {
        self.providers.lock().await.clear();

        tracing::debug!("shutting down server connection");
        self.client.clone().shutdown().await;

        Ok(())
    }
}

/// Server implementation of [`CollectionProvider`] for one logical database.
pub struct MongoDbProvider {
    database: Database,
}

impl MongoDbProvider {
    fn new(database: Database) -> Self {
        Self { database }
    }

    async fn ensure_unique_index(
        &self,
        collection: &mongodb::Collection<Document>,
        field: &str,
    ) -> DocumentDbResult<()> {
        collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await
            .map_err(|e| DocumentDbError::Initialization(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl CollectionProvider for MongoDbProvider {
    async fn get_collection_with_indexes(
        &self,
        name: &str,
        unique_fields: &[&str],
    ) -> DocumentDbResult<Arc<dyn DocumentCollection>> {
        let collection = self.database.collection::<Document>(name);
        for field in unique_fields {
            self.ensure_unique_index(&collection, field).await?;
        }

        Ok(Arc::new(MongoDbCollection::new(name.to_string(), collection)))
    }

    async fn get_map(&self, name: &str) -> DocumentDbResult<Arc<dyn KeyValueMap>> {
        let collection = self.database.collection::<Document>(name);
        self.ensure_unique_index(&collection, "key").await?;

        Ok(Arc::new(MongoDbMap::new(name.to_string(), collection)))
    }

    async fn close(&self) -> DocumentDbResult<()> {
        Ok(())
    }
}
