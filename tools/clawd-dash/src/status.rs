//! Normalizes `<agent> status --json` payloads into a [`SessionSnapshot`].
//!
//! The upstream CLI has no stable schema. Every field is found through an ordered list of
//! candidate locations, and the first usable one wins. Nothing here touches the clock or
//! the process table: `now` is an input, so decoding is a pure function.

use crate::probe::{
    first_count, lookup, non_empty_object, non_empty_str, number, object, probe, JsonPath, Step,
};
use crate::timefmt::{coerce_seconds, parse_duration_text, parse_timestamp, seconds_since};
use crate::types::{
    CommandOutcome, DecodeError, FlatTokenUsage, SessionSnapshot, SessionTokenUsage, TokenUsage,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

use Step::{Index, Key};

pub const UNKNOWN_MODEL: &str = "unknown";

const SESSION_PATHS: &[JsonPath<'static>] = &[
    &[Key("session")],
    &[Key("sessions"), Key("recent"), Index(0)],
    &[Key("sessions"), Key("byAgent"), Index(0), Key("recent"), Index(0)],
    &[Key("sessions"), Index(0)],
];

const STATUS_MODEL_PATHS: &[JsonPath<'static>] = &[
    &[Key("model")],
    &[Key("current_model")],
    &[Key("session_model")],
    &[Key("sessions"), Key("defaults"), Key("model")],
];

const FLAT_USAGE_PATHS: &[JsonPath<'static>] = &[&[Key("token_usage")], &[Key("tokens")]];

const UPTIME_KEYS: [&str; 6] = [
    "uptimeMs",
    "uptimeMS",
    "uptimeMillis",
    "uptimeSeconds",
    "uptimeSec",
    "uptime",
];

const SUBSYSTEM_SECTIONS: [&str; 5] = ["gateway", "gatewayService", "nodeService", "process", "system"];
const STARTED_AT_KEYS: [&str; 2] = ["startedAtMs", "startedAt"];
const RUNTIME_TEXT_KEYS: [&str; 2] = ["runtimeShort", "runtimeLong"];
const SESSION_AGE_KEYS: [&str; 2] = ["ageMs", "age"];
const LAST_ACTIVE_PATH: JsonPath<'static> = &[
    Key("agents"),
    Key("agents"),
    Index(0),
    Key("lastActiveAgeMs"),
];

pub fn decode_status(
    outcome: &CommandOutcome,
    now: DateTime<Utc>,
) -> Result<SessionSnapshot, DecodeError> {
    let text = match outcome {
        CommandOutcome::Success(text) => text,
        CommandOutcome::Failure(reason) => return Err(DecodeError::Command(*reason)),
    };
    let status: Value = serde_json::from_str(text).map_err(|_| DecodeError::MalformedPayload)?;
    if !status.is_object() {
        return Err(DecodeError::MalformedPayload);
    }
    Ok(snapshot_from_status(&status, now))
}

pub fn snapshot_from_status(status: &Value, now: DateTime<Utc>) -> SessionSnapshot {
    let session = extract_session(status);
    SessionSnapshot {
        model: extract_model(status, session)
            .unwrap_or(UNKNOWN_MODEL)
            .to_string(),
        token_usage: extract_token_usage(status, session),
        uptime_seconds: extract_uptime_seconds(status, session, now),
    }
}

pub fn extract_session(status: &Value) -> Option<&Value> {
    probe(status, SESSION_PATHS, object)
}

pub fn extract_model<'v>(status: &'v Value, session: Option<&'v Value>) -> Option<&'v str> {
    session
        .and_then(|session| session.get("model"))
        .and_then(non_empty_str)
        .or_else(|| probe(status, STATUS_MODEL_PATHS, non_empty_str))
}

/// A flat usage object wins over per-session counters whenever it yields anything.
pub fn extract_token_usage(status: &Value, session: Option<&Value>) -> TokenUsage {
    if let Some(flat) = probe(status, FLAT_USAGE_PATHS, non_empty_object).map(flat_usage) {
        if !flat.is_empty() {
            return TokenUsage::Flat(flat);
        }
    }
    match session.map(session_usage) {
        Some(usage) if !usage.is_empty() => TokenUsage::PerSession(usage),
        _ => TokenUsage::Unavailable,
    }
}

fn flat_usage(usage: &Value) -> FlatTokenUsage {
    FlatTokenUsage {
        prompt: first_count(usage, &["prompt", "input"]),
        completion: first_count(usage, &["completion", "output"]),
        total: first_count(usage, &["total"]),
    }
}

fn session_usage(session: &Value) -> SessionTokenUsage {
    SessionTokenUsage {
        input: first_count(session, &["inputTokens", "promptTokens"]),
        output: first_count(session, &["outputTokens", "completionTokens"]),
        total: first_count(session, &["totalTokens", "tokens"]),
        percent_used: session.get("percentUsed").and_then(number),
        context_tokens: first_count(session, &["contextTokens"]),
        remaining: first_count(session, &["remainingTokens"]),
    }
}

pub fn extract_uptime_seconds(
    status: &Value,
    session: Option<&Value>,
    now: DateTime<Utc>,
) -> Option<f64> {
    first_coerced(status, &UPTIME_KEYS, now)
        .or_else(|| {
            SUBSYSTEM_SECTIONS
                .iter()
                .filter_map(|name| status.get(*name).and_then(object))
                .find_map(|section| section_uptime(section, now))
        })
        .or_else(|| session.and_then(|session| first_coerced(session, &SESSION_AGE_KEYS, now)))
        .or_else(|| {
            session
                .and_then(|session| session.get("updatedAt"))
                .and_then(parse_timestamp)
                .map(|updated| seconds_since(updated, now))
        })
        .or_else(|| lookup(status, LAST_ACTIVE_PATH).and_then(|value| coerce_seconds(value, now)))
        .map(|seconds| seconds.max(0.0))
}

fn section_uptime(section: &Value, now: DateTime<Utc>) -> Option<f64> {
    first_coerced(section, &UPTIME_KEYS, now)
        .or_else(|| {
            STARTED_AT_KEYS
                .iter()
                .filter_map(|key| section.get(*key))
                .find_map(parse_timestamp)
                .map(|started| seconds_since(started, now))
        })
        .or_else(|| {
            RUNTIME_TEXT_KEYS
                .iter()
                .filter_map(|key| section.get(*key).and_then(Value::as_str))
                .find_map(parse_duration_text)
        })
}

fn first_coerced(value: &Value, keys: &[&str], now: DateTime<Utc>) -> Option<f64> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(|candidate| coerce_seconds(candidate, now))
}
