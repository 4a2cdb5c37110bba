//! The cross-backend collection contract.
//!
//! This module defines the uniform CRUD/query surface that every backend adapter must
//! satisfy identically: given the same stored documents, `find`/`count`/`exists` over
//! the same canonical filter return the same result sets regardless of backend.
//!
//! # Snapshots and optimistic updates
//!
//! Documents returned by `create`/`read` carry backend-internal identity or revision
//! markers alongside the application-level `id` field. `update` and `patch` require
//! such a snapshot: when the markers no longer match the stored document the call
//! fails with [`DocumentDbError::NotFoundForUpdate`](crate::error::DocumentDbError)
//! instead of silently diverging.

use async_trait::async_trait;
use bson::Document;
use serde::{Deserialize, Serialize};

use crate::error::{DocumentDbError, DocumentDbResult};

/// Identifies which backend family a collection or map adapter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    /// The embedded, in-process document store.
    Memory,
    /// The networked MongoDB server backend.
    MongoDb,
}

/// Skip/limit options applied after filtering, `skip` before `limit`.
///
/// Absence of either field means "no skip" / "no limit" respectively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    /// Number of matching documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order (A to Z, 0 to 9).
    Asc,
    /// Descending order (Z to A, 9 to 0).
    Desc,
}

/// Sort specification applied after filtering, before pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    /// The (dotted) field path to sort by.
    pub sort_by: String,
    /// The sort direction.
    pub sort_order: SortOrder,
}

impl SortOptions {
    /// Creates a sort specification over the given field path.
    pub fn new(sort_by: impl Into<String>, sort_order: SortOrder) -> Self {
        Self {
            sort_by: sort_by.into(),
            sort_order,
        }
    }
}

/// The argument to [`DocumentCollection::delete`]: either a raw identity string
/// (shorthand for `{ "id": value }`) or a full canonical filter.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    /// Delete the document whose `id` field equals the value.
    Id(String),
    /// Delete every document matching the canonical filter.
    Filter(Document),
}

impl From<&str> for DeleteTarget {
    fn from(id: &str) -> Self {
        DeleteTarget::Id(id.to_string())
    }
}

impl From<String> for DeleteTarget {
    fn from(id: String) -> Self {
        DeleteTarget::Id(id)
    }
}

impl From<Document> for DeleteTarget {
    fn from(filter: Document) -> Self {
        DeleteTarget::Filter(filter)
    }
}

/// A collection of documents behind one of the two backend adapters.
///
/// Operations are asynchronous but not internally parallel on the embedded backend;
/// callers must serialize structural mutations of the same collection. Filters are
/// canonical filters as produced by [`crate::translator::QueryTranslator`]; adapters
/// for backends without native containment operators normalize them (see
/// [`crate::normalize`]) before dispatch, and must do so identically for `find`,
/// `find_one`, `count`, `exists` and `delete`.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// The backend family this adapter belongs to.
    fn database_type(&self) -> DatabaseType;

    /// The name of this collection.
    fn name(&self) -> &str;

    /// Stores a new document and returns it as stored, including backend-internal
    /// identity/revision markers usable as a snapshot for later `update`/`patch`.
    ///
    /// # Errors
    ///
    /// [`DocumentDbError::DuplicateKey`] when a unique-index constraint is violated;
    /// [`DocumentDbError::InsertionFailed`] when the backend does not acknowledge
    /// the write.
    async fn create(&self, document: Document) -> DocumentDbResult<Document>;

    /// Looks up a document by its application-level `id` field.
    async fn read(&self, id: &str) -> DocumentDbResult<Option<Document>>;

    /// Replaces the document matching `previous` (a snapshot from a prior
    /// `read`/`create`) with `document`, returning the stored result.
    ///
    /// # Errors
    ///
    /// [`DocumentDbError::NotFoundForUpdate`] when the snapshot's internal markers
    /// no longer match a stored document; the store is left unchanged.
    async fn update(&self, previous: &Document, document: Document) -> DocumentDbResult<Document>;

    /// Applies the structural difference between `previous` and `document` as
    /// field-level set/unset operations. Server-only; the default implementation
    /// fails with [`DocumentDbError::Unsupported`].
    ///
    /// # Errors
    ///
    /// [`DocumentDbError::Unsupported`] when the snapshot has no `id` field or the
    /// diff contains operations (move/copy) not expressible as field operators;
    /// nothing is applied partially in that case.
    async fn patch(&self, previous: &Document, document: Document) -> DocumentDbResult<Document> {
        let _ = (previous, document);
        Err(DocumentDbError::Unsupported(
            "patch is not supported by this backend".to_string(),
        ))
    }

    /// Deletes every document matching the target; returns whether anything was
    /// deleted.
    async fn delete(&self, target: DeleteTarget) -> DocumentDbResult<bool>;

    /// Returns every document in the collection.
    async fn list(&self) -> DocumentDbResult<Vec<Document>>;

    /// Returns the documents matching `filter` (all documents when `None`), sorted
    /// and paginated after filtering.
    async fn find(
        &self,
        filter: Option<Document>,
        pagination: Option<PaginationOptions>,
        sort: Option<SortOptions>,
    ) -> DocumentDbResult<Vec<Document>>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, filter: Option<Document>) -> DocumentDbResult<Option<Document>>;

    /// Counts the documents matching `filter`.
    async fn count(&self, filter: Option<Document>) -> DocumentDbResult<u64>;

    /// Whether any document matches `filter`. Consistent with `count` and `find`:
    /// `exists(f)` holds exactly when `count(f) > 0`.
    async fn exists(&self, filter: Option<Document>) -> DocumentDbResult<bool>;
}
