//! Translation of query-string style filters into canonical structured filters.
//!
//! This module parses a mapping of raw string (or array-of-string) values, as decoded
//! from a URL query string, into a canonical filter [`Document`]. Values may carry a
//! leading operator character that selects a comparison predicate:
//!
//! | Input          | Canonical filter                                  |
//! |----------------|---------------------------------------------------|
//! | `name=alice`   | `{ "name": "alice" }`                             |
//! | `age=>=21`     | `{ "age": { "$gte": 21.0 } }`                     |
//! | `name=^al`     | `{ "name": { "$regex": "^al", "$options": "i" } }`|
//! | `tag[]=a&tag[]=!b` | `{ "tag": { "$containsAny": ["a"], "$containsNone": ["b"] } }` |
//!
//! Translation is pure: the same raw input under the same [`TranslatorConfig`] always
//! yields the same canonical filter. The produced filter is backend-agnostic; see
//! [`crate::normalize`] for the rewrite applied before dispatch to backends that do
//! not understand the `$contains*` operators natively.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use bson::{Bson, Document, doc};
use regex::Regex;
use serde_json::{Map, Value};

/// Reserved key that is always dropped before any processing.
///
/// Assigning through this key is a prototype-polluting write in dynamic host
/// languages; the denylist check is kept here as a defense of the wire contract,
/// independent of host-language susceptibility.
const RESERVED_KEY: &str = "__proto__";

static DEFAULT_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_@][a-zA-Z@0-9_-]*(\.[a-zA-Z_@][a-zA-Z@0-9_-]*)*$")
        .expect("default key grammar is valid")
});

static DEFAULT_ARR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-zA-Z@æøå0-9_.-]+(\[\])?$").expect("default array-key grammar is valid")
});

static NUMERIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+(\.\d+)?$").expect("numeric grammar is valid"));

/// A per-key handler that takes full control over how its raw value is translated.
///
/// The handler receives the mutable result filter and the raw value, and may write
/// arbitrary sub-filters (e.g. synthesizing an `$or` across multiple fields).
pub type CustomHandler = Arc<dyn Fn(&mut Document, &Value) + Send + Sync>;

/// Immutable configuration for a [`QueryTranslator`], constructed once.
///
/// Replaces the process-wide mutable defaults of comparable dynamic-language
/// implementations: all grammars and toggles are per-instance values.
#[derive(Clone)]
pub struct TranslatorConfig {
    /// Recognized operator prefixes. The `$containsAny`/`$containsNone` entries
    /// enable array-value handling as a whole.
    pub ops: Vec<String>,
    /// Key renames applied after filtering and validation, before emission.
    pub alias: HashMap<String, String>,
    /// Keys that are always skipped. Blacklisting wins over whitelisting.
    pub blacklist: HashSet<String>,
    /// When non-empty, only these keys are translated.
    pub whitelist: HashSet<String>,
    /// Per-key custom handlers; a registered handler takes full control of its key.
    pub custom: HashMap<String, CustomHandler>,
    /// Coerce `"true"`/`"false"` (any case) to booleans.
    pub to_boolean: bool,
    /// Coerce fully-numeric strings to floating-point numbers.
    pub to_number: bool,
    /// Grammar for scalar-valued keys.
    pub key_regex: Regex,
    /// Optional grammar stripped out of `$regex` operand values.
    pub val_regex: Option<Regex>,
    /// Grammar for array-valued keys (looser; allows the `[]` marker).
    pub arr_regex: Regex,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            ops: ["!", "^", "$", "~", ">", "<", "$containsAny", "$containsNone"]
                .iter()
                .map(|op| op.to_string())
                .collect(),
            alias: HashMap::new(),
            blacklist: HashSet::new(),
            whitelist: HashSet::new(),
            custom: HashMap::new(),
            to_boolean: true,
            to_number: true,
            key_regex: DEFAULT_KEY_REGEX.clone(),
            val_regex: None,
            arr_regex: DEFAULT_ARR_REGEX.clone(),
        }
    }
}

/// A single parsed operator expression, before it is merged into a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOperator {
    /// The canonical predicate field (`$ne`, `$gte`, `$regex`, `$containsAny`, ...).
    pub field: &'static str,
    /// The coerced operand value.
    pub value: Bson,
    /// Regex options, present only for `$regex` predicates.
    pub options: Option<&'static str>,
}

impl ParsedOperator {
    /// Converts this parsed expression into a standalone predicate document.
    pub fn into_predicate(self) -> Document {
        let mut predicate = Document::new();
        predicate.insert(self.field, self.value);
        if let Some(options) = self.options {
            predicate.insert("$options", options);
        }
        predicate
    }
}

/// Parses raw string/array-of-string mappings into canonical filters.
///
/// See the [module documentation](self) for the operator table. The translator holds
/// an immutable [`TranslatorConfig`]; construct one per distinct configuration.
#[derive(Clone, Default)]
pub struct QueryTranslator {
    config: TranslatorConfig,
}

impl QueryTranslator {
    /// Creates a translator with the given configuration.
    pub fn new(config: TranslatorConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration this translator was constructed with.
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Parses a raw mapping into a canonical filter.
    ///
    /// Keys failing their grammar, keys excluded by the whitelist/blacklist, and
    /// values that are neither strings nor arrays of strings are silently skipped;
    /// the reserved prototype-pollution key is never written into the result.
    pub fn parse(&self, raw: &Map<String, Value>) -> Document {
        let mut result = Document::new();

        for (raw_key, value) in raw {
            if raw_key == RESERVED_KEY {
                continue;
            }

            // Normalize array keys
            let key = if value.is_array() {
                raw_key.strip_suffix("[]").unwrap_or(raw_key)
            } else {
                raw_key.as_str()
            };

            // Ignore keys missing from a configured whitelist
            if !self.config.whitelist.is_empty() && !self.config.whitelist.contains(key) {
                continue;
            }

            // Remove blacklisted keys; the blacklist always wins
            if self.config.blacklist.contains(key) {
                continue;
            }

            // Validate the pre-alias key against the matching grammar
            match value {
                Value::String(_) if !self.config.key_regex.is_match(key) => continue,
                Value::Array(_) if !self.config.arr_regex.is_match(key) => continue,
                _ => {}
            }

            // Apply aliases
            let key = self
                .config
                .alias
                .get(key)
                .cloned()
                .unwrap_or_else(|| key.to_string());

            // A custom handler takes full control of its key
            if let Some(handler) = self.config.custom.get(&key) {
                handler(&mut result, value);
                continue;
            }

            match value {
                Value::Array(items) => {
                    if self.has_op("$containsAny") && !items.is_empty() {
                        result.insert(key, self.parse_array(items));
                    }
                }
                Value::String(s) => {
                    if s.is_empty() {
                        result.insert(key, doc! { "$exists": true });
                    } else if self.is_op_prefix(s) {
                        result.insert(key, self.parse_string(s, false).into_predicate());
                    } else {
                        result.insert(key, self.parse_string_val(s));
                    }
                }
                // Other value shapes are not representable in the DSL
                _ => {}
            }
        }

        result
    }

    /// Interprets a single operator-prefixed string.
    ///
    /// `array` selects the aggregation variant: `!`-prefixed and bare values become
    /// `$containsNone`/`$containsAny` accumulator entries instead of `$ne`/`$eq`.
    pub fn parse_string(&self, value: &str, array: bool) -> ParsedOperator {
        let mut chars = value.chars();
        let op = chars.next();
        // A second-position `=` is consumed for every operator; it only changes
        // the emitted predicate for the comparison operators
        let inclusive = chars.next() == Some('=');
        let offset = op.map_or(0, char::len_utf8) + usize::from(inclusive);
        let remainder = &value[offset..];

        match op {
            Some('!') if array => ParsedOperator {
                field: "$containsNone",
                value: self.parse_string_val(remainder),
                options: None,
            },
            Some('!') if remainder.is_empty() => ParsedOperator {
                field: "$exists",
                value: Bson::Boolean(false),
                options: None,
            },
            Some('!') => ParsedOperator {
                field: "$ne",
                value: self.parse_string_val(remainder),
                options: None,
            },
            Some('>') => ParsedOperator {
                field: if inclusive { "$gte" } else { "$gt" },
                value: self.parse_string_val(remainder),
                options: None,
            },
            Some('<') => ParsedOperator {
                field: if inclusive { "$lte" } else { "$lt" },
                value: self.parse_string_val(remainder),
                options: None,
            },
            Some(anchor @ ('^' | '$' | '~')) => {
                let stripped = match &self.config.val_regex {
                    Some(val_regex) => val_regex.replace_all(remainder, ""),
                    None => remainder.into(),
                };
                let base = literal_to_string(&self.parse_string_val(&stripped));
                let pattern = match anchor {
                    '^' => format!("^{base}"),
                    '$' => format!("{base}$"),
                    _ => base,
                };
                ParsedOperator {
                    field: "$regex",
                    value: Bson::String(pattern),
                    options: Some("i"),
                }
            }
            _ if array => ParsedOperator {
                // No recognized operator: the whole input is the value
                field: "$containsAny",
                value: self.parse_string_val(value),
                options: None,
            },
            _ if value.is_empty() => ParsedOperator {
                field: "$exists",
                value: Bson::Boolean(true),
                options: None,
            },
            _ => ParsedOperator {
                field: "$eq",
                value: self.parse_string_val(value),
                options: None,
            },
        }
    }

    /// Coerces a raw string value into a boolean, number, or string.
    ///
    /// Booleans match `"true"`/`"false"` case-insensitively. Numbers must parse in
    /// their entirety (after trimming, allowing a leading sign and a decimal point);
    /// partially numeric strings such as `"123abc"` stay strings.
    pub fn parse_string_val(&self, value: &str) -> Bson {
        if self.config.to_boolean {
            if value.eq_ignore_ascii_case("true") {
                return Bson::Boolean(true);
            }
            if value.eq_ignore_ascii_case("false") {
                return Bson::Boolean(false);
            }
        }

        if self.config.to_number {
            let trimmed = value.trim();
            if NUMERIC_REGEX.is_match(trimmed) {
                if let Ok(number) = trimmed.parse::<f64>() {
                    if number.is_finite() {
                        return Bson::Double(number);
                    }
                }
            }
        }

        Bson::String(value.to_string())
    }

    /// Builds one aggregated predicate document for an array-valued field.
    fn parse_array(&self, items: &[Value]) -> Document {
        let mut predicate = Document::new();

        for item in items {
            let Some(element) = item.as_str() else {
                continue;
            };

            if self.is_op_prefix(element) {
                let parsed = self.parse_string(element, true);
                match parsed.field {
                    "$containsAny" | "$containsNone" => {
                        push_accumulator(&mut predicate, parsed.field, parsed.value);
                    }
                    "$regex" => {
                        // Last regex wins; any earlier pattern is overwritten
                        predicate.insert("$regex", parsed.value);
                        predicate.insert("$options", parsed.options.unwrap_or("i"));
                    }
                    field => {
                        predicate.insert(field, parsed.value);
                    }
                }
            } else {
                push_accumulator(&mut predicate, "$containsAny", self.parse_string_val(element));
            }
        }

        predicate
    }

    fn has_op(&self, op: &str) -> bool {
        self.config.ops.iter().any(|candidate| candidate == op)
    }

    fn is_op_prefix(&self, value: &str) -> bool {
        match value.chars().next() {
            Some(first) => {
                let prefix = &value[..first.len_utf8()];
                self.config.ops.iter().any(|op| op == prefix)
            }
            None => false,
        }
    }
}

/// Appends a value to a growing sequence under `field`, creating it on first use.
fn push_accumulator(predicate: &mut Document, field: &str, value: Bson) {
    match predicate.get_mut(field) {
        Some(Bson::Array(values)) => values.push(value),
        _ => {
            predicate.insert(field, Bson::Array(vec![value]));
        }
    }
}

/// Renders a coerced literal the way it would appear inside a regex pattern.
fn literal_to_string(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Boolean(b) => b.to_string(),
        Bson::Double(d) if d.fract() == 0.0 && d.is_finite() && d.abs() < 9.0e15 => {
            format!("{}", *d as i64)
        }
        Bson::Double(d) => d.to_string(),
        other => other.to_string(),
    }
}
