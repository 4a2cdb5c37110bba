//! Named logical-database handles and their lifecycle.
//!
//! A [`DatabaseConnection`] owns one handle per logical database name, created
//! lazily on first access and cached thereafter. Concurrent first-time requests for
//! the same name must converge on a single handle (implementations serialize the
//! creation path internally). Shutdown is cooperative: [`DatabaseConnection::close`]
//! closes every open handle best-effort and does not cancel in-flight operations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{collection::DocumentCollection, error::DocumentDbResult, map::KeyValueMap};

/// Hands out collection and map adapters for one logical database.
#[async_trait]
pub trait CollectionProvider: Send + Sync {
    /// Returns the named collection, creating it on first access.
    async fn get_collection(&self, name: &str) -> DocumentDbResult<Arc<dyn DocumentCollection>> {
        self.get_collection_with_indexes(name, &[]).await
    }

    /// Returns the named collection, ensuring a unique index over each of the given
    /// fields. Indexes are only applied when the collection is first created.
    async fn get_collection_with_indexes(
        &self,
        name: &str,
        unique_fields: &[&str],
    ) -> DocumentDbResult<Arc<dyn DocumentCollection>>;

    /// Returns the named key-value map, creating its backing collection on first
    /// access. The key field is unique within the map.
    async fn get_map(&self, name: &str) -> DocumentDbResult<Arc<dyn KeyValueMap>>;

    /// Flushes and releases this handle, deregistering it from its connection.
    async fn close(&self) -> DocumentDbResult<()>;
}

/// Owns named logical-database handles and coordinates shutdown across them.
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Returns the handle for `name`, opening/creating the underlying resource on
    /// first access. Concurrent calls for the same not-yet-open name yield the same
    /// handle.
    async fn get_database(&self, name: &str) -> DocumentDbResult<Arc<dyn CollectionProvider>>;

    /// Closes every open handle. Best-effort: one handle's failure does not prevent
    /// attempting to close the others; the first error is reported after all close
    /// attempts have been made.
    async fn close(&self) -> DocumentDbResult<()>;
}
