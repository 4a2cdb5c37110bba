//! Canonical-filter evaluation for the embedded document store.
//!
//! This module is the embedded backend's native match engine: it interprets every
//! canonical operator directly, including the `$contains*` family that server
//! backends only understand after normalization. Semantics follow the server
//! backend where the two could diverge (implicit equality matches array elements,
//! `$ne`/`$nin` match documents where the field is absent) so that both adapters
//! return the same result sets for the same filter.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document};
use regex::RegexBuilder;

use docbridge_core::error::{DocumentDbError, DocumentDbResult};

/// Borrowed view of a BSON value used for filter equality and ordering.
///
/// Every numeric width collapses into one `Number` variant so that a stored
/// `Int32` compares equal to the `Double` a translated filter carries.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All integer and floating-point widths, as f64
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            // Remaining BSON kinds have no filter-comparison meaning here
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted field path against a document.
pub(crate) fn resolve_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut current = document;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let value = current.get(segment)?;
        if segments.peek().is_none() {
            return Some(value);
        }
        current = value.as_document()?;
    }

    None
}

/// Evaluates a canonical filter against a single document.
///
/// An empty filter matches every document. Top-level keys are dotted field paths
/// (implicit AND) or the `$and`/`$or` logical operators over sequences of nested
/// filters.
pub(crate) fn matches_filter(document: &Document, filter: &Document) -> DocumentDbResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => logical(document, condition, true)?,
            "$or" => logical(document, condition, false)?,
            path => matches_field(document, path, condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn logical(document: &Document, condition: &Bson, all: bool) -> DocumentDbResult<bool> {
    let Bson::Array(filters) = condition else {
        return Err(DocumentDbError::InvalidFilter(
            "$and/$or requires a sequence of filters".to_string(),
        ));
    };

    for entry in filters {
        let Bson::Document(filter) = entry else {
            return Err(DocumentDbError::InvalidFilter(
                "$and/$or entries must be filters".to_string(),
            ));
        };
        let matched = matches_filter(document, filter)?;
        if all && !matched {
            return Ok(false);
        }
        if !all && matched {
            return Ok(true);
        }
    }

    Ok(all)
}

fn matches_field(document: &Document, path: &str, condition: &Bson) -> DocumentDbResult<bool> {
    let value = resolve_path(document, path);

    match condition {
        Bson::Document(predicate) if is_operator_predicate(predicate) => {
            matches_predicate(value, predicate)
        }
        literal => Ok(value.is_some_and(|v| equals_or_contains(v, literal))),
    }
}

fn is_operator_predicate(predicate: &Document) -> bool {
    predicate.keys().any(|key| key.starts_with('$'))
}

fn matches_predicate(value: Option<&Bson>, predicate: &Document) -> DocumentDbResult<bool> {
    for (op, operand) in predicate {
        let matched = match op.as_str() {
            "$exists" => value.is_some() == operand.as_bool().unwrap_or(true),
            "$eq" | "$contains" => value.is_some_and(|v| equals_or_contains(v, operand)),
            "$ne" => !value.is_some_and(|v| equals_or_contains(v, operand)),
            "$gt" | "$gte" | "$lt" | "$lte" => {
                value.is_some_and(|v| compare(v, operand, op.as_str()))
            }
            "$regex" => {
                let options = match predicate.get("$options") {
                    Some(Bson::String(options)) => options.as_str(),
                    _ => "",
                };
                regex_matches(value, operand, options)?
            }
            // Handled together with $regex
            "$options" => true,
            "$in" | "$containsAny" => value.is_some_and(|v| any_of(v, operand)),
            "$nin" | "$containsNone" => !value.is_some_and(|v| any_of(v, operand)),
            other => {
                return Err(DocumentDbError::InvalidFilter(format!(
                    "unsupported operator {other}"
                )));
            }
        };
        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Implicit-equality semantics: a field equals the target, or is an array
/// containing an element equal to the target.
fn equals_or_contains(value: &Bson, target: &Bson) -> bool {
    if Comparable::from(value) == Comparable::from(target) {
        return true;
    }

    match value {
        Bson::Array(items) => items
            .iter()
            .any(|item| Comparable::from(item) == Comparable::from(target)),
        _ => false,
    }
}

fn compare(value: &Bson, operand: &Bson, op: &str) -> bool {
    match Comparable::from(value).partial_cmp(&Comparable::from(operand)) {
        Some(ordering) => match op {
            "$gt" => ordering == Ordering::Greater,
            "$gte" => ordering != Ordering::Less,
            "$lt" => ordering == Ordering::Less,
            "$lte" => ordering != Ordering::Greater,
            _ => false,
        },
        None => false,
    }
}

/// Membership: a scalar field is one of the targets, or an array field overlaps them.
fn any_of(value: &Bson, operand: &Bson) -> bool {
    let targets: Vec<&Bson> = match operand {
        Bson::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    match value {
        Bson::Array(items) => items.iter().any(|item| {
            targets
                .iter()
                .any(|target| Comparable::from(item) == Comparable::from(*target))
        }),
        single => targets
            .iter()
            .any(|target| Comparable::from(single) == Comparable::from(*target)),
    }
}

fn regex_matches(value: Option<&Bson>, operand: &Bson, options: &str) -> DocumentDbResult<bool> {
    let Bson::String(pattern) = operand else {
        return Err(DocumentDbError::InvalidFilter(
            "$regex requires a string pattern".to_string(),
        ));
    };

    let regex = RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .build()
        .map_err(|e| DocumentDbError::InvalidFilter(format!("invalid $regex pattern: {e}")))?;

    match value {
        Some(Bson::String(haystack)) => Ok(regex.is_match(haystack)),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn sample() -> Document {
        doc! {
            "id": "doc-1",
            "name": "Alice",
            "age": 30,
            "active": true,
            "tags": ["alpha", "beta"],
            "address": { "city": "Oslo", "zip": 1234 },
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(matches_filter(&sample(), &doc! {}).unwrap());
    }

    #[test]
    fn matches_literal_equality() {
        assert!(matches_filter(&sample(), &doc! { "name": "Alice" }).unwrap());
        assert!(!matches_filter(&sample(), &doc! { "name": "Bob" }).unwrap());
        // Integer widths are normalized for comparison
        assert!(matches_filter(&sample(), &doc! { "age": 30.0 }).unwrap());
    }

    #[test]
    fn literal_equality_matches_array_elements() {
        assert!(matches_filter(&sample(), &doc! { "tags": "alpha" }).unwrap());
        assert!(!matches_filter(&sample(), &doc! { "tags": "gamma" }).unwrap());
    }

    #[test]
    fn resolves_dotted_paths() {
        assert!(matches_filter(&sample(), &doc! { "address.city": "Oslo" }).unwrap());
        assert!(!matches_filter(&sample(), &doc! { "address.city": "Bergen" }).unwrap());
        assert!(matches_filter(&sample(), &doc! { "address.zip": { "$gte": 1000 } }).unwrap());
    }

    #[test]
    fn evaluates_comparisons() {
        assert!(matches_filter(&sample(), &doc! { "age": { "$gt": 20 } }).unwrap());
        assert!(matches_filter(&sample(), &doc! { "age": { "$gte": 30 } }).unwrap());
        assert!(!matches_filter(&sample(), &doc! { "age": { "$lt": 30 } }).unwrap());
        assert!(matches_filter(&sample(), &doc! { "age": { "$lte": 30 } }).unwrap());
        // Range merged on one field
        assert!(matches_filter(&sample(), &doc! { "age": { "$gt": 20, "$lt": 40 } }).unwrap());
        // Incomparable types never match
        assert!(!matches_filter(&sample(), &doc! { "name": { "$gt": 5 } }).unwrap());
    }

    #[test]
    fn evaluates_ne_including_missing_fields() {
        assert!(matches_filter(&sample(), &doc! { "age": { "$ne": 31 } }).unwrap());
        assert!(!matches_filter(&sample(), &doc! { "age": { "$ne": 30 } }).unwrap());
        // A missing field is "not equal" to anything
        assert!(matches_filter(&sample(), &doc! { "missing": { "$ne": 1 } }).unwrap());
    }

    #[test]
    fn evaluates_exists() {
        assert!(matches_filter(&sample(), &doc! { "name": { "$exists": true } }).unwrap());
        assert!(matches_filter(&sample(), &doc! { "missing": { "$exists": false } }).unwrap());
        assert!(!matches_filter(&sample(), &doc! { "missing": { "$exists": true } }).unwrap());
    }

    #[test]
    fn evaluates_regex_with_options() {
        let filter = doc! { "name": { "$regex": "^al", "$options": "i" } };
        assert!(matches_filter(&sample(), &filter).unwrap());

        let case_sensitive = doc! { "name": { "$regex": "^al" } };
        assert!(!matches_filter(&sample(), &case_sensitive).unwrap());

        // Non-string fields never match a regex
        let numeric = doc! { "age": { "$regex": "3" } };
        assert!(!matches_filter(&sample(), &numeric).unwrap());
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let filter = doc! { "name": { "$regex": "(" } };
        assert!(matches!(
            matches_filter(&sample(), &filter),
            Err(DocumentDbError::InvalidFilter(_))
        ));
    }

    #[test]
    fn evaluates_membership_operators() {
        assert!(matches_filter(&sample(), &doc! { "name": { "$in": ["Alice", "Bob"] } }).unwrap());
        assert!(!matches_filter(&sample(), &doc! { "name": { "$nin": ["Alice"] } }).unwrap());
        // Array fields overlap with the target list
        assert!(matches_filter(&sample(), &doc! { "tags": { "$in": ["beta", "x"] } }).unwrap());
        assert!(matches_filter(&sample(), &doc! { "tags": { "$nin": ["x", "y"] } }).unwrap());
        // Missing fields satisfy $nin
        assert!(matches_filter(&sample(), &doc! { "missing": { "$nin": [1] } }).unwrap());
    }

    #[test]
    fn evaluates_contains_family_natively() {
        assert!(matches_filter(&sample(), &doc! { "tags": { "$contains": "alpha" } }).unwrap());
        assert!(!matches_filter(&sample(), &doc! { "tags": { "$contains": "x" } }).unwrap());
        assert!(
            matches_filter(&sample(), &doc! { "tags": { "$containsAny": ["x", "beta"] } }).unwrap()
        );
        assert!(
            matches_filter(&sample(), &doc! { "tags": { "$containsNone": ["x", "y"] } }).unwrap()
        );
        assert!(
            !matches_filter(&sample(), &doc! { "tags": { "$containsNone": ["beta"] } }).unwrap()
        );
    }

    #[test]
    fn evaluates_logical_operators() {
        let filter = doc! {
            "$or": [
                { "name": "Bob" },
                { "age": { "$gte": 30 } },
            ]
        };
        assert!(matches_filter(&sample(), &filter).unwrap());

        let filter = doc! {
            "$and": [
                { "name": "Alice" },
                { "age": { "$lt": 30 } },
            ]
        };
        assert!(!matches_filter(&sample(), &filter).unwrap());
    }

    #[test]
    fn unknown_operators_are_errors() {
        let filter = doc! { "name": { "$near": 1 } };
        assert!(matches!(
            matches_filter(&sample(), &filter),
            Err(DocumentDbError::InvalidFilter(_))
        ));
    }
}
