//! Convenient re-exports of commonly used types from docbridge.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```
//!
//! This provides access to:
//! - The collection, map, and connection access traits
//! - Query translation and filter normalization
//! - Pagination, sort, and delete-target option types
//! - Error types

pub use docbridge_core::{
    collection::{
        DatabaseType, DeleteTarget, DocumentCollection, PaginationOptions, SortOptions, SortOrder,
    },
    connection::{CollectionProvider, DatabaseConnection},
    error::{DocumentDbError, DocumentDbResult},
    map::{KeyValueMap, MapEntry},
    normalize::normalize_filter,
    translator::{QueryTranslator, TranslatorConfig},
};
