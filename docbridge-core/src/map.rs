//! The cross-backend key-value map contract.
//!
//! A [`KeyValueMap`] is layered on the same collection primitive as
//! [`crate::collection::DocumentCollection`]: each entry is stored as a document
//! `{ "key": ..., "value": ... }`. The embedded adapter fronts the collection with a
//! lazily-built in-memory lookup cache; the server adapter instead enforces a unique
//! index on the key field. Both return identical results for `get`/`find`/`list`
//! given identical stored state.

use async_trait::async_trait;
use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::{collection::DatabaseType, error::DocumentDbResult};

/// One stored key-value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapEntry {
    /// The entry key, unique within the map.
    pub key: String,
    /// The stored value.
    pub value: Bson,
}

/// A keyed-value store behind one of the two backend adapters.
#[async_trait]
pub trait KeyValueMap: Send + Sync {
    /// The backend family this adapter belongs to.
    fn database_type(&self) -> DatabaseType;

    /// The name of the underlying collection.
    fn name(&self) -> &str;

    /// Stores `value` under `key`, replacing any existing entry.
    async fn set(&self, key: &str, value: Bson) -> DocumentDbResult<()>;

    /// Returns the value stored under `key`, if any.
    async fn get(&self, key: &str) -> DocumentDbResult<Option<Bson>>;

    /// Removes the entry under `key`; returns whether an entry was removed.
    async fn delete(&self, key: &str) -> DocumentDbResult<bool>;

    /// Returns every entry whose key matches the regex `pattern`.
    async fn find(&self, pattern: &str) -> DocumentDbResult<Vec<MapEntry>>;

    /// Returns every entry in the map.
    async fn list(&self) -> DocumentDbResult<Vec<MapEntry>>;
}
