//! Canonical-filter normalization for backends without native containment operators.
//!
//! The query-string DSL produces the backend-agnostic `$contains`, `$containsAny` and
//! `$containsNone` operators. Server-class backends do not understand them, but offer
//! native equivalents: implicit equality matches array elements, and `$in`/`$nin`
//! express membership. [`normalize_filter`] rewrites a canonical filter accordingly:
//!
//! - `$containsAny` is renamed to `$in`, `$containsNone` to `$nin`, siblings preserved;
//! - a `$contains` whose value is not itself a mapping collapses its enclosing
//!   predicate to the literal value, or fails with
//!   [`DocumentDbError::InvalidFilter`] when sibling keys make the collapse ambiguous.
//!
//! Normalization is idempotent: a filter containing no `$contains*` keys is returned
//! unchanged.

use bson::{Bson, Document};

use crate::error::{DocumentDbError, DocumentDbResult};

/// Rewrites the containment operators of a canonical filter into backend-native form.
///
/// # Errors
///
/// Returns [`DocumentDbError::InvalidFilter`] when a `$contains` predicate carries
/// sibling keys, or when the top level of the filter would collapse to a non-mapping.
pub fn normalize_filter(filter: Document) -> DocumentDbResult<Document> {
    match normalize_value(Bson::Document(filter))? {
        Bson::Document(normalized) => Ok(normalized),
        _ => Err(DocumentDbError::InvalidFilter(
            "$contains cannot appear at the top level of a filter".to_string(),
        )),
    }
}

fn normalize_value(value: Bson) -> DocumentDbResult<Bson> {
    match value {
        Bson::Document(inner) => {
            if let Some(contained) = inner.get("$contains") {
                if !matches!(contained, Bson::Document(_)) {
                    if inner.len() > 1 {
                        return Err(DocumentDbError::InvalidFilter(
                            "$contains cannot be combined with other operators on the same field"
                                .to_string(),
                        ));
                    }
                    // The predicate collapses to plain equality on the literal
                    return Ok(contained.clone());
                }
            }

            let mut normalized = Document::new();
            for (key, value) in inner {
                let key = match key.as_str() {
                    "$containsAny" => "$in".to_string(),
                    "$containsNone" => "$nin".to_string(),
                    _ => key,
                };
                normalized.insert(key, normalize_value(value)?);
            }
            Ok(Bson::Document(normalized))
        }
        Bson::Array(items) => Ok(Bson::Array(
            items
                .into_iter()
                .map(normalize_value)
                .collect::<DocumentDbResult<Vec<_>>>()?,
        )),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn collapses_contains_to_the_literal() {
        let filter = doc! { "key": { "$contains": "v" } };
        assert_eq!(normalize_filter(filter).unwrap(), doc! { "key": "v" });
    }

    #[test]
    fn rejects_contains_with_siblings() {
        let filter = doc! { "key": { "$contains": "v", "$eq": "v" } };
        assert!(matches!(
            normalize_filter(filter),
            Err(DocumentDbError::InvalidFilter(_))
        ));
    }

    #[test]
    fn renames_contains_any_to_in() {
        let filter = doc! { "key": { "$containsAny": ["a", "b"] } };
        assert_eq!(
            normalize_filter(filter).unwrap(),
            doc! { "key": { "$in": ["a", "b"] } }
        );
    }

    #[test]
    fn renames_contains_none_to_nin_preserving_siblings() {
        let filter = doc! { "key": { "$containsNone": ["a"], "$exists": true } };
        assert_eq!(
            normalize_filter(filter).unwrap(),
            doc! { "key": { "$nin": ["a"], "$exists": true } }
        );
    }

    #[test]
    fn recurses_through_logical_payloads() {
        let filter = doc! {
            "$or": [
                { "a": { "$containsAny": [1, 2] } },
                { "b": { "$contains": "x" } },
            ]
        };
        assert_eq!(
            normalize_filter(filter).unwrap(),
            doc! {
                "$or": [
                    { "a": { "$in": [1, 2] } },
                    { "b": "x" },
                ]
            }
        );
    }

    #[test]
    fn contains_with_mapping_value_is_a_field_name() {
        // A field literally named "$contains" holding an object is left to recursion
        let filter = doc! { "key": { "$contains": { "$containsAny": ["a"] } } };
        assert_eq!(
            normalize_filter(filter).unwrap(),
            doc! { "key": { "$contains": { "$in": ["a"] } } }
        );
    }

    #[test]
    fn is_idempotent() {
        let filter = doc! {
            "a": { "$containsAny": ["x"] },
            "b": { "$gte": 1, "$lte": 3 },
            "c": { "$contains": "v" },
        };
        let once = normalize_filter(filter).unwrap();
        let twice = normalize_filter(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn leaves_plain_filters_unchanged() {
        let filter = doc! { "a": 1, "b": { "$gt": 2 } };
        assert_eq!(normalize_filter(filter.clone()).unwrap(), filter);
    }
}
