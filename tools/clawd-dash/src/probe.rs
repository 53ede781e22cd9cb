//! Ordered fallback lookup over loosely shaped JSON.
//!
//! Extraction order is data: a decoder lists candidate paths and [`probe`] returns the
//! first one that both exists and survives the extractor.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    Key(&'a str),
    Index(usize),
}

pub type JsonPath<'a> = &'a [Step<'a>];

pub fn lookup<'v>(value: &'v Value, path: &[Step<'_>]) -> Option<&'v Value> {
    path.iter().try_fold(value, |cursor, step| match (step, cursor) {
        (Step::Key(key), Value::Object(map)) => map.get(*key),
        (Step::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
    })
}

pub fn probe<'v, T>(
    value: &'v Value,
    paths: &[JsonPath<'_>],
    extract: impl Fn(&'v Value) -> Option<T>,
) -> Option<T> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(extract)
}

/// First of `keys` that is set to something other than null, without looking at its shape.
pub fn first_present<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|candidate| !candidate.is_null())
}

pub fn object(value: &Value) -> Option<&Value> {
    value.is_object().then_some(value)
}

pub fn non_empty_object(value: &Value) -> Option<&Value> {
    value
        .as_object()
        .filter(|map| !map.is_empty())
        .map(|_| value)
}

pub fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|text| !text.trim().is_empty())
}

pub fn is_digit_string(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())
}

/// Integer-like number or digit string. Non-negative floats are truncated.
pub fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|raw| raw.is_finite() && *raw >= 0.0)
                .map(|raw| raw.trunc() as u64)
        }),
        Value::String(text) if is_digit_string(text) => text.parse().ok(),
        _ => None,
    }
}

/// Any JSON number, or a digit string.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|raw| raw.is_finite()),
        Value::String(text) if is_digit_string(text) => text.parse().ok(),
        _ => None,
    }
}

pub fn first_count(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().filter_map(|key| value.get(*key)).find_map(count)
}

#[cfg(test)]
mod tests {
    use super::{count, first_present, lookup, non_empty_str, number, object, probe, Step};
    use serde_json::json;

    #[test]
    fn lookup_walks_keys_and_indexes_and_rejects_mismatched_shapes() {
        let value = json!({"sessions": {"recent": [{"model": "m"}]}});
        let path = [
            Step::Key("sessions"),
            Step::Key("recent"),
            Step::Index(0),
            Step::Key("model"),
        ];
        assert_eq!(lookup(&value, &path), Some(&json!("m")));
        assert_eq!(lookup(&value, &[Step::Key("sessions"), Step::Index(0)]), None);
    }

    #[test]
    fn probe_returns_first_path_that_survives_extraction() {
        let value = json!({"model": "  ", "current_model": "opus", "session_model": "haiku"});
        let model = probe(
            &value,
            &[
                &[Step::Key("model")],
                &[Step::Key("current_model")],
                &[Step::Key("session_model")],
            ],
            non_empty_str,
        );
        assert_eq!(model, Some("opus"));

        let bogus = json!({"session": "nope"});
        let session = probe(&bogus, &[&[Step::Key("session")]], object);
        assert!(session.is_none());
    }

    #[test]
    fn first_present_skips_nulls() {
        let value = json!({"a": null, "b": 0, "c": 1});
        assert_eq!(first_present(&value, &["a", "b", "c"]), Some(&json!(0)));
        assert_eq!(first_present(&value, &["x"]), None);
    }

    #[test]
    fn numeric_extractors_accept_digit_strings() {
        assert_eq!(count(&json!("120")), Some(120));
        assert_eq!(count(&json!(12.9)), Some(12));
        assert_eq!(count(&json!(-3)), None);
        assert_eq!(count(&json!("12a")), None);
        assert_eq!(number(&json!(42.5)), Some(42.5));
        assert_eq!(number(&json!(true)), None);
    }
}
