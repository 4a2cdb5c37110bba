//! Structural document diffs and their translation to update operators.
//!
//! [`diff_documents`] computes the field-level difference between two documents
//! as a flat list of [`PatchOperation`]s over dotted paths. Nested documents are
//! recursed into; arrays and every other value kind are replaced atomically.
//! [`to_update_document`] turns such a list into a MongoDB update document,
//! `Add`/`Replace` becoming `$set` entries and `Remove` becoming `$unset`.
//! `Move` and `Copy` complete the operation model but have no field-operator
//! equivalent and are rejected before anything is built.

use bson::{Bson, Document, doc};

use docbridge_core::error::{DocumentDbError, DocumentDbResult};

/// One structural edit at a dotted field path.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOperation {
    /// A field that exists in the new document but not the old one.
    Add { path: String, value: Bson },
    /// A field present in both documents with differing values.
    Replace { path: String, value: Bson },
    /// A field that exists in the old document but not the new one.
    Remove { path: String },
    /// A field relocated from one path to another.
    Move { from: String, path: String },
    /// A field duplicated from one path to another.
    Copy { from: String, path: String },
}

/// Computes the operations that transform `previous` into `next`.
///
/// The driver-owned `_id` field is left out of the diff. Operations are emitted
/// in document order, additions and replacements before removals at each level.
pub fn diff_documents(previous: &Document, next: &Document) -> Vec<PatchOperation> {
    let mut operations = Vec::new();
    diff_level(previous, next, "", &mut operations);
    operations
}

fn diff_level(previous: &Document, next: &Document, prefix: &str, out: &mut Vec<PatchOperation>) {
    for (key, value) in next {
        if prefix.is_empty() && key == "_id" {
            continue;
        }
        let path = join_path(prefix, key);

        match (previous.get(key), value) {
            (None, _) => out.push(PatchOperation::Add {
                path,
                value: value.clone(),
            }),
            (Some(Bson::Document(old)), Bson::Document(new)) => {
                diff_level(old, new, &path, out);
            }
            (Some(old), _) if old != value => out.push(PatchOperation::Replace {
                path,
                value: value.clone(),
            }),
            (Some(_), _) => {}
        }
    }

    for key in previous.keys() {
        if prefix.is_empty() && key == "_id" {
            continue;
        }
        if !next.contains_key(key) {
            out.push(PatchOperation::Remove {
                path: join_path(prefix, key),
            });
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Translates a list of operations into a `$set`/`$unset` update document.
///
/// # Errors
///
/// [`DocumentDbError::Unsupported`] on the first `Move` or `Copy` encountered;
/// nothing partial is returned in that case.
pub fn to_update_document(operations: &[PatchOperation]) -> DocumentDbResult<Document> {
    let mut set = Document::new();
    let mut unset = Document::new();

    for operation in operations {
        match operation {
            PatchOperation::Add { path, value } | PatchOperation::Replace { path, value } => {
                set.insert(path, value.clone());
            }
            PatchOperation::Remove { path } => {
                unset.insert(path, Bson::String(String::new()));
            }
            PatchOperation::Move { from, path } => {
                return Err(DocumentDbError::Unsupported(format!(
                    "move patch operation ({from} -> {path}) cannot be expressed as an update"
                )));
            }
            PatchOperation::Copy { from, path } => {
                return Err(DocumentDbError::Unsupported(format!(
                    "copy patch operation ({from} -> {path}) cannot be expressed as an update"
                )));
            }
        }
    }

    let mut update = Document::new();
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }

    Ok(update)
}
