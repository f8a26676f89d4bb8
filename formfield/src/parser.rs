//! Value normalization and path helpers.
//!
//! Every place that establishes a value (construction, `set_initial`,
//! `set_default`, `update`) goes through [`parse_input`], which picks the first
//! non-null candidate with [`resolve_value`] and falls back to
//! [`default_value`].

use std::sync::LazyLock;

use regex::Regex;

use crate::value::Value;

/// Canonical (raw to canonical) or output (canonical to external) transform.
pub type Transform = std::sync::Arc<dyn Fn(Value) -> Value + Send + Sync>;

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d+(,\d+)*(\.\d+([eE]\d+)?)?$").expect("numeric grammar is a valid regex")
});

/// The identity transform.
pub fn identity() -> Transform {
    std::sync::Arc::new(|value| value)
}

/// Inputs for [`parse_input`].
#[derive(Debug, Default)]
pub struct ParseInput<'a> {
    /// Field type (`"text"`, `"checkbox"`, `"number"`, ...).
    pub kind: &'a str,
    /// Allow `null` as the type default.
    pub nullable: bool,
    /// The schema declares this position as an array.
    pub is_empty_array: bool,
    /// Explicit per-path value. Wins over everything else.
    pub separated: Option<Value>,
    /// Value taken from a bulk definition or data object.
    pub unified: Option<Value>,
    /// Used when neither of the above is set.
    pub fallback: Option<Value>,
    /// The configured empty value for plain fields.
    pub fallback_value: Value,
}

/// Return the first candidate that is present and not `null`.
pub fn resolve_value<I>(candidates: I) -> Option<Value>
where
    I: IntoIterator<Item = Option<Value>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.is_null())
}

/// Normalize a value from its candidate sources.
pub fn parse_input(input: &Transform, args: ParseInput<'_>) -> Value {
    let ParseInput {
        kind,
        nullable,
        is_empty_array,
        separated,
        unified,
        fallback,
        fallback_value,
    } = args;

    let resolved = resolve_value([separated, unified, fallback]).unwrap_or_else(|| {
        type_default(kind, nullable, is_empty_array, &Value::Null, fallback_value)
    });
    input(resolved)
}

/// Type-appropriate empty value for a field, given its current value.
pub fn default_value(kind: &str, current: &Value, fallback_value: &Value) -> Value {
    type_default(kind, false, false, current, fallback_value.clone())
}

fn type_default(
    kind: &str,
    nullable: bool,
    is_empty_array: bool,
    current: &Value,
    fallback_value: Value,
) -> Value {
    match kind {
        "date" | "datetime-local" => return Value::Null,
        "checkbox" => return Value::Bool(false),
        "number" => return Value::Number(0.0),
        _ => {}
    }
    if nullable {
        return Value::Null;
    }
    if is_empty_array {
        return Value::List(Vec::new());
    }
    match current {
        Value::Date(_) => Value::Null,
        Value::Bool(_) => Value::Bool(false),
        Value::Number(_) => Value::Number(0.0),
        Value::List(_) => Value::List(Vec::new()),
        _ => fallback_value,
    }
}

/// Coerce numeric text (`-1,234.5e3`) into a number. Grouping commas are
/// dropped.
pub fn parse_number(value: &Value) -> Option<f64> {
    let text = value.as_str()?;
    if !NUMERIC.is_match(text) {
        return None;
    }
    text.replace(',', "").parse::<f64>().ok()
}

// =============================================================================
// Paths
// =============================================================================

/// Normalize a dot or bracket path (`members[0].name`) to dot form
/// (`members.0.name`).
pub fn parse_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            '[' => out.push('.'),
            ']' => {}
            c => out.push(c),
        }
    }
    out.split('.')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Structural form of a path: numeric segments become `[]`
/// (`members.0.hobbies.1` becomes `members[].hobbies[]`).
pub fn path_to_struct(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        if is_index(segment) {
            out.push_str("[]");
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(segment);
        }
    }
    out
}

/// Whether the schema declares `path` as an array position.
pub fn is_array(structure: &[String], path: &str) -> bool {
    let array = format!("{}[]", path_to_struct(path));
    let nested = format!("{array}.");
    structure
        .iter()
        .any(|entry| *entry == array || entry.starts_with(&nested) || entry.starts_with(&format!("{array}[]")))
}

/// Keys declared directly below `path` by the schema.
///
/// Array positions declare no keys of their own; their children come from data.
pub fn struct_children(structure: &[String], path: &str) -> Vec<String> {
    let base = path_to_struct(path);
    let prefix = if base.is_empty() {
        String::new()
    } else {
        format!("{base}.")
    };

    let mut keys: Vec<String> = Vec::new();
    for entry in structure {
        let Some(rest) = entry.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let key = rest
            .split(['.', '['])
            .next()
            .unwrap_or_default()
            .to_string();
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Join a parent path and a key.
pub fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// Whether a key is a numeric array index.
pub fn is_index(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}
