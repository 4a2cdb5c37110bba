//! A portable document database access layer with a string-encoded query DSL.
//!
//! This crate is the core of the docbridge project and provides:
//!
//! - **Query-string translation** ([`translator`]) - Parsing of operator-prefixed string
//!   filters (as decoded from a URL query string) into a canonical structured filter
//! - **Filter normalization** ([`normalize`]) - Rewriting of backend-agnostic containment
//!   operators into backend-native equivalents
//! - **Collections interface** ([`collection`]) - The CRUD/query contract that every
//!   backend adapter must satisfy identically
//! - **Key-value maps** ([`map`]) - A simple keyed-value abstraction layered on collections
//! - **Connections** ([`connection`]) - Named logical-database handles and shutdown
//! - **Error handling** ([`error`]) - Comprehensive error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docbridge_core::translator::QueryTranslator;
//! use serde_json::json;
//!
//! let translator = QueryTranslator::default();
//! let raw = json!({ "age": ">=21", "name": "^al" });
//! let filter = translator.parse(raw.as_object().unwrap());
//! // => { "age": { "$gte": 21.0 }, "name": { "$regex": "^al", "$options": "i" } }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod collection;
pub mod connection;
pub mod error;
pub mod map;
pub mod normalize;
pub mod translator;
