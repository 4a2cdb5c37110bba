//! MongoDB server backend for docbridge.
//!
//! This crate implements the `docbridge-core` access traits over the official
//! async MongoDB driver. Filters are normalized to native server operators
//! before dispatch, unique indexes back the map key field, and `patch` applies
//! structural diffs as `$set`/`$unset` updates.
//!
//! To use this backend through the facade crate, enable its `mongodb` feature:
//!
//! ```toml
//! [dependencies]
//! docbridge = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use docbridge_core::connection::DatabaseConnection;
//! use docbridge_mongodb::MongoDbConnection;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = MongoDbConnection::connect("mongodb://localhost:27017").await?;
//!     let database = connection.get_database("app").await?;
//!     let users = database.get_collection("users").await?;
//!
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_mongodb;

pub mod collection;
pub mod connection;
pub mod map;
pub mod patch;

pub use collection::MongoDbCollection;
pub use connection::{MongoDbConnection, MongoDbProvider};
pub use map::MongoDbMap;
pub use patch::{PatchOperation, diff_documents, to_update_document};
