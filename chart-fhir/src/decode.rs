//! Defaulting accessors over loosely-typed FHIR JSON.
//!
//! Paths are walked one segment at a time: object segments are keys, array
//! segments are decimal indexes. Any missing key, out-of-range index or
//! unexpected shape yields `None`, which callers turn into a documented
//! default.

use serde_json::Value;

/// Walk `path` from `value`.
pub fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// String at `path`, if present and a string.
pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    at(value, path).and_then(Value::as_str)
}

/// String at `path`, or `default`.
pub fn str_or(value: &Value, path: &[&str], default: &str) -> String {
    str_at(value, path).unwrap_or(default).to_string()
}

/// String at `path`, or empty.
pub fn text(value: &Value, path: &[&str]) -> String {
    str_or(value, path, "")
}

/// Non-blank string at `path`.
pub fn non_empty<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    str_at(value, path).filter(|s| !s.trim().is_empty())
}

/// Array at `path`, or an empty slice.
pub fn array<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    at(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Scalar as report text: numbers in their JSON form, strings verbatim.
pub fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Label of a CodeableConcept: `text`, else the first coding's display.
pub fn concept_label(concept: Option<&Value>) -> String {
    let Some(concept) = concept else {
        return String::new();
    };
    non_empty(concept, &["text"])
        .or_else(|| str_at(concept, &["coding", "0", "display"]))
        .unwrap_or("")
        .to_string()
}
