//! Main docbridge crate providing a unified interface for document database access.
//!
//! This crate is the primary entry point for users of the docbridge framework.
//! It re-exports the core access traits, the query-string translator, and the
//! embedded backend, with the MongoDB backend available behind a feature flag.
//!
//! # Features
//!
//! - **Portable access traits** - One collection/map/connection surface over
//!   interchangeable backends
//! - **Query-string DSL** - A configurable translator from flat, string-encoded
//!   query parameters to canonical filters
//! - **Backend equivalence** - Identical query results from the embedded and
//!   server backends over the same stored documents
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::MemoryConnection};
//! use bson::doc;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = MemoryConnection::new("data");
//!     let database = connection.get_database("app").await?;
//!     let users = database.get_collection("users").await?;
//!
//!     users.create(doc! { "id": "u1", "name": "Alice", "age": 30 }).await?;
//!     users.create(doc! { "id": "u2", "name": "Bob", "age": 25 }).await?;
//!
//!     // Translate decoded query-string parameters into a canonical filter.
//!     let translator = QueryTranslator::default();
//!     let raw = json!({ "age": ">=28", "name": "^Al" });
//!     let filter = translator.parse(raw.as_object().unwrap());
//!
//!     let matched = users.find(Some(filter), None, None).await?;
//!     assert_eq!(matched.len(), 1);
//!
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Embedded in-process storage for development and testing
//! - [`mongodb`] - Networked MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docbridge_core::{collection, connection, error, map, normalize, translator};

// Re-export BSON types for convenience
pub use bson;

/// Embedded backend implementations.
pub mod memory {
    pub use docbridge_memory::{MemoryCollection, MemoryConnection, MemoryMap, MemoryProvider};
}

/// MongoDB backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbridge_mongodb::{
        MongoDbCollection, MongoDbConnection, MongoDbMap, MongoDbProvider, PatchOperation,
        diff_documents, to_update_document,
    };
}
