//! Server collection adapter over the MongoDB driver.
//!
//! Canonical filters are run through [`normalize_filter`] before every dispatch
//! so the containment operators reach the server in native form. Snapshots for
//! optimistic `update` are the documents as previously read, replayed as an
//! exact-match filter to `replace_one`.

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Collection as MongoCollection,
    error::{ErrorKind, WriteFailure},
    options::FindOptions,
};

use docbridge_core::{
    collection::{DatabaseType, DeleteTarget, DocumentCollection, PaginationOptions, SortOptions, SortOrder},
    error::{DocumentDbError, DocumentDbResult},
    normalize::normalize_filter,
};

use crate::patch::{diff_documents, to_update_document};

/// Server implementation of [`DocumentCollection`].
#[derive(Debug, Clone)]
pub struct MongoDbCollection {
    name: String,
    collection: MongoCollection<Document>,
}

impl MongoDbCollection {
    pub(crate) fn new(name: String, collection: MongoCollection<Document>) -> Self {
        Self { name, collection }
    }

    fn map_write_error(&self, error: mongodb::error::Error) -> DocumentDbError {
        if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = &*error.kind {
            if write_error.code == 11000 {
                return DocumentDbError::DuplicateKey(
                    duplicate_field(&write_error.message),
                    self.name.clone(),
                );
            }
        }

        DocumentDbError::Backend(error.to_string())
    }
}

/// Best-effort extraction of the violated field from a duplicate-key message
/// such as `E11000 duplicate key error ... index: email_1 dup key: ...`.
fn duplicate_field(message: &str) -> String {
    message
        .split("index: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .map(|index| index.trim_end_matches("_1").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[async_trait]
impl DocumentCollection for MongoDbCollection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MongoDb
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, document: Document) -> DocumentDbResult<Document> {
        let inserted = self
            .collection
            .insert_one(document)
            .await
            .map_err(|e| self.map_write_error(e))?;

        self.collection
            .find_one(doc! { "_id": inserted.inserted_id })
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?
            .ok_or_else(|| DocumentDbError::InsertionFailed(self.name.clone()))
    }

    async fn read(&self, id: &str) -> DocumentDbResult<Option<Document>> {
        self.collection
            .find_one(doc! { "id": id })
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))
    }

    async fn update(&self, previous: &Document, document: Document) -> DocumentDbResult<Document> {
        let result = self
            .collection
            .replace_one(previous.clone(), document.clone())
            .await
            .map_err(|e| self.map_write_error(e))?;

        if result.modified_count < 1 {
            return Err(DocumentDbError::NotFoundForUpdate(self.name.clone()));
        }

        Ok(document)
    }

    async fn patch(&self, previous: &Document, document: Document) -> DocumentDbResult<Document> {
        let Some(Bson::String(id)) = previous.get("id").cloned() else {
            return Err(DocumentDbError::Unsupported(
                "patch requires a snapshot with an id field".to_string(),
            ));
        };

        let update = to_update_document(&diff_documents(previous, &document))?;

        if !update.is_empty() {
            self.collection
                .update_one(doc! { "id": &id }, update)
                .await
                .map_err(|e| self.map_write_error(e))?;
        }

        self.collection
            .find_one(doc! { "id": id })
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?
            .ok_or_else(|| DocumentDbError::NotFoundForUpdate(self.name.clone()))
    }

    async fn delete(&self, target: DeleteTarget) -> DocumentDbResult<bool> {
        let filter = match target {
            DeleteTarget::Id(id) => doc! { "id": id },
            DeleteTarget::Filter(filter) => normalize_filter(filter)?,
        };

        let result = self
            .collection
            .delete_many(filter)
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?;

        Ok(result.deleted_count > 0)
    }

    async fn list(&self) -> DocumentDbResult<Vec<Document>> {
        self.find(None, None, None).await
    }

    async fn find(
        &self,
        filter: Option<Document>,
        pagination: Option<PaginationOptions>,
        sort: Option<SortOptions>,
    ) -> DocumentDbResult<Vec<Document>> {
        let filter = normalize_filter(filter.unwrap_or_default())?;

        let mut options = FindOptions::default();
        if let Some(pagination) = pagination {
            options.skip = pagination.skip;
            options.limit = pagination.limit.map(|limit| limit as i64);
        }
        if let Some(sort) = sort {
            options.sort = Some(doc! {
                sort.sort_by: match sort.sort_order {
                    SortOrder::Asc => 1,
                    SortOrder::Desc => -1,
                }
            });
        }

        self.collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))
    }

    async fn find_one(&self, filter: Option<Document>) -> DocumentDbResult<Option<Document>> {
        let filter = normalize_filter(filter.unwrap_or_default())?;

        self.collection
            .find_one(filter)
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))
    }

    async fn count(&self, filter: Option<Document>) -> DocumentDbResult<u64> {
        let filter = normalize_filter(filter.unwrap_or_default())?;

        self.collection
            .count_documents(filter)
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))
    }

    async fn exists(&self, filter: Option<Document>) -> DocumentDbResult<bool> {
        let filter = normalize_filter(filter.unwrap_or_default())?;

        let count = self
            .collection
            .count_documents(filter)
            .limit(1)
            .await
            .map_err(|e| DocumentDbError::Backend(e.to_string()))?;

        Ok(count > 0)
    }
}
