use crate::probe::is_digit_string;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Epoch-like values above this are milliseconds.
pub const MILLIS_EPOCH_THRESHOLD: f64 = 1e12;
/// Between this and the millisecond threshold a value is already seconds.
pub const SECONDS_EPOCH_THRESHOLD: f64 = 1e9;
/// Between this and the seconds threshold a value is a millisecond duration.
pub const MILLIS_DURATION_THRESHOLD: f64 = 1e6;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// Unit heuristic for a number of unknown unit, returning seconds.
pub fn normalize_seconds(raw: f64) -> f64 {
    if raw > MILLIS_EPOCH_THRESHOLD {
        raw / 1000.0
    } else if raw > SECONDS_EPOCH_THRESHOLD {
        raw
    } else if raw > MILLIS_DURATION_THRESHOLD {
        raw / 1000.0
    } else {
        raw
    }
}

/// Seconds from a value of unknown unit. A timestamp string means "seconds since then".
pub fn coerce_seconds(value: &Value, now: DateTime<Utc>) -> Option<f64> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .filter(|raw| raw.is_finite())
            .map(normalize_seconds),
        Value::String(text) if is_digit_string(text) => text.parse().ok().map(normalize_seconds),
        Value::String(text) => parse_iso8601(text).map(|then| seconds_since(then, now)),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => number.as_f64().and_then(from_epoch),
        Value::String(text) if is_digit_string(text) => text.parse().ok().and_then(from_epoch),
        Value::String(text) => parse_iso8601(text),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Seconds, or milliseconds when above 1e12.
pub fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() {
        return None;
    }
    let seconds = if raw > MILLIS_EPOCH_THRESHOLD {
        raw / 1000.0
    } else {
        raw
    };
    let millis = (seconds * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis as i64)
}

/// RFC 3339 plus the offset-less and date-only forms, which are read as UTC.
pub fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

pub fn seconds_since(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - then).num_milliseconds();
    (millis as f64 / 1000.0).max(0.0)
}

fn duration_token() -> Option<&'static Regex> {
    static TOKEN: OnceLock<Option<Regex>> = OnceLock::new();
    TOKEN
        .get_or_init(|| {
            Regex::new(
                r"(?i)(\d+)\s*(days?|d|hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)",
            )
            .ok()
        })
        .as_ref()
}

/// Sums `<integer><unit>` tokens such as `2h 5m` or `3 days`. `None` when nothing matches.
pub fn parse_duration_text(text: &str) -> Option<f64> {
    let token = duration_token()?;
    let mut total = 0.0;
    let mut found = false;
    for capture in token.captures_iter(text) {
        let (Some(amount), Some(unit)) = (capture.get(1), capture.get(2)) else {
            continue;
        };
        let Ok(amount) = amount.as_str().parse::<f64>() else {
            continue;
        };
        let unit_seconds = match unit.as_str().as_bytes().first().map(u8::to_ascii_lowercase) {
            Some(b'd') => 86_400.0,
            Some(b'h') => 3_600.0,
            Some(b'm') => 60.0,
            _ => 1.0,
        };
        total += amount * unit_seconds;
        found = true;
    }
    found.then_some(total)
}

/// `HH:MM:SS`, or `Dd HH:MM:SS` from one day up. Negative input clamps to zero.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    }
}

/// Largest non-zero unit followed by the next smaller one, e.g. `2h 5m`, `5m 0s`, `45s`.
pub fn format_countdown(target: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(target) = target else {
        return "unknown".to_string();
    };
    let delta = (target - now).num_seconds();
    if delta <= 0 {
        return "due".to_string();
    }

    let units = [
        (delta / 86_400, "d"),
        ((delta % 86_400) / 3_600, "h"),
        ((delta % 3_600) / 60, "m"),
        (delta % 60, "s"),
    ];
    let leading = units
        .iter()
        .position(|(amount, _)| *amount > 0)
        .unwrap_or(units.len() - 1);
    match units.get(leading + 1) {
        Some((next, next_unit)) => {
            let (amount, unit) = units[leading];
            format!("{amount}{unit} {next}{next_unit}")
        }
        None => format!("{}s", units[leading].0),
    }
}
