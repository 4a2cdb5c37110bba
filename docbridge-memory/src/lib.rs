//! Embedded in-memory backend for docbridge.
//!
//! This crate implements the `docbridge-core` access traits over an in-process
//! document store guarded by async-aware read-write locks. It is the backend of
//! choice for tests, tooling, and single-process deployments; collections scan
//! on every query and hold all documents in memory.
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge_core::connection::DatabaseConnection;
//! use docbridge_memory::MemoryConnection;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = MemoryConnection::new("data");
//!     let database = connection.get_database("app").await?;
//!
//!     let users = database.get_collection("users").await?;
//!     users.create(doc! { "id": "u1", "name": "Alice" }).await?;
//!
//!     let found = users.find_one(Some(doc! { "name": "Alice" })).await?;
//!     assert!(found.is_some());
//!
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_memory;

pub mod collection;
pub mod connection;
pub mod map;
pub(crate) mod matcher;

pub use collection::MemoryCollection;
pub use connection::{MemoryConnection, MemoryProvider};
pub use map::MemoryMap;
