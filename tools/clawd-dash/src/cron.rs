use crate::probe::{first_present, non_empty_str};
use crate::timefmt::parse_timestamp;
use crate::types::{sort_jobs, CommandOutcome, DecodeError, ScheduledJob};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub const DEFAULT_JOB_NAME: &str = "job";
pub const UNKNOWN_SCHEDULE: &str = "-";

const SCHEDULE_KEYS: [&str; 2] = ["schedule", "cron"];
const STATE_NEXT_KEYS: [&str; 5] = [
    "nextRunAtMs",
    "next_run_at_ms",
    "nextRunAt",
    "next_run_at",
    "next",
];
const AT_SCHEDULE_KEYS: [&str; 3] = ["atMs", "at", "at_ms"];
const SCHEDULE_NEXT_KEYS: [&str; 3] = ["nextRunAtMs", "nextRunAt", "next"];
const JOB_NEXT_KEYS: [&str; 4] = ["nextRunAtMs", "nextRunAt", "next_run", "next"];

/// Jobs ordered by next run, soonest first.
pub fn decode_cron(outcome: &CommandOutcome) -> Result<Vec<ScheduledJob>, DecodeError> {
    let text = match outcome {
        CommandOutcome::Success(text) => text,
        CommandOutcome::Failure(reason) => return Err(DecodeError::Command(*reason)),
    };
    let payload: Value = serde_json::from_str(text).map_err(|_| DecodeError::MalformedPayload)?;
    let entries = job_entries(&payload)?;

    let mut jobs = entries
        .iter()
        .filter(|entry| entry.is_object())
        .map(scheduled_job)
        .collect::<Vec<_>>();
    sort_jobs(&mut jobs);
    Ok(jobs)
}

fn job_entries(payload: &Value) -> Result<&[Value], DecodeError> {
    match payload {
        Value::Object(map) => match map.get("jobs") {
            Some(Value::Array(jobs)) => Ok(jobs),
            _ => Err(DecodeError::UnexpectedPayloadShape),
        },
        Value::Array(jobs) => Ok(jobs),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Err(DecodeError::UnexpectedPayloadShape)
        }
    }
}

pub fn scheduled_job(job: &Value) -> ScheduledJob {
    let schedule = first_present(job, &SCHEDULE_KEYS);
    ScheduledJob {
        name: job_name(job),
        schedule_text: schedule_text(schedule),
        next_run_at: next_run_at(job, schedule),
    }
}

fn job_name(job: &Value) -> String {
    ["name", "id"]
        .iter()
        .filter_map(|key| job.get(*key))
        .find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_JOB_NAME.to_string())
}

fn schedule_kind(schedule: &Value) -> Option<&str> {
    schedule.get("kind").and_then(Value::as_str)
}

fn schedule_text(schedule: Option<&Value>) -> String {
    let text = match schedule {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.as_str()),
        Some(schedule @ Value::Object(_)) => match schedule_kind(schedule) {
            Some("cron") => ["expr", "cron"]
                .iter()
                .filter_map(|key| schedule.get(*key))
                .find_map(non_empty_str),
            Some("at") => Some("at"),
            _ => None,
        },
        _ => None,
    };
    text.unwrap_or(UNKNOWN_SCHEDULE).to_string()
}

/// The first key present in any scope decides; a value that does not parse leaves the job
/// without a next run rather than falling through to later scopes.
fn next_run_at(job: &Value, schedule: Option<&Value>) -> Option<DateTime<Utc>> {
    let from_state = job
        .get("state")
        .filter(|state| state.is_object())
        .and_then(|state| first_present(state, &STATE_NEXT_KEYS));
    let from_schedule = || {
        schedule.filter(|schedule| schedule.is_object()).and_then(|schedule| {
            let keys: &[&str] = if schedule_kind(schedule) == Some("at") {
                &AT_SCHEDULE_KEYS
            } else {
                &SCHEDULE_NEXT_KEYS
            };
            first_present(schedule, keys)
        })
    };
    let from_job = || first_present(job, &JOB_NEXT_KEYS);

    from_state
        .or_else(from_schedule)
        .or_else(from_job)
        .and_then(parse_timestamp)
}

#[cfg(test)]
mod tests {
    use super::{decode_cron, scheduled_job};
    use crate::types::{CommandFailure, CommandOutcome, DecodeError};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn decode(payload: serde_json::Value) -> Result<Vec<crate::types::ScheduledJob>, DecodeError> {
        decode_cron(&CommandOutcome::Success(payload.to_string()))
    }

    #[test]
    fn command_failures_and_shapes_are_reported() {
        assert_eq!(
            decode_cron(&CommandOutcome::Failure(CommandFailure::NonZeroExit)),
            Err(DecodeError::Command(CommandFailure::NonZeroExit))
        );
        assert_eq!(
            decode_cron(&CommandOutcome::Success("nope".to_string())),
            Err(DecodeError::MalformedPayload)
        );
        assert_eq!(decode(json!({"jobs": {}})), Err(DecodeError::UnexpectedPayloadShape));
        assert_eq!(decode(json!({"items": []})), Err(DecodeError::UnexpectedPayloadShape));
        assert_eq!(decode(json!("jobs")), Err(DecodeError::UnexpectedPayloadShape));
    }

    #[test]
    fn bare_array_and_jobs_object_are_both_accepted() {
        let job = json!({"name": "sync", "schedule": "*/5 * * * *"});
        assert_eq!(decode(json!([job.clone()])).expect("array").len(), 1);
        assert_eq!(decode(json!({"jobs": [job, 42]})).expect("object").len(), 1);
        assert!(decode(json!({"jobs": []})).expect("empty").is_empty());
    }

    #[test]
    fn name_falls_back_to_id_then_placeholder() {
        assert_eq!(scheduled_job(&json!({"name": "a", "id": "b"})).name, "a");
        assert_eq!(scheduled_job(&json!({"name": "", "id": "b"})).name, "b");
        assert_eq!(scheduled_job(&json!({"id": 17})).name, "17");
        assert_eq!(scheduled_job(&json!({})).name, "job");
    }

    #[test]
    fn schedule_text_depends_on_kind() {
        let cron = json!({"schedule": {"kind": "cron", "expr": "0 7 * * *"}});
        assert_eq!(scheduled_job(&cron).schedule_text, "0 7 * * *");
        let cron_alias = json!({"cron": {"kind": "cron", "cron": "30 2 * * *"}});
        assert_eq!(scheduled_job(&cron_alias).schedule_text, "30 2 * * *");
        let at = json!({"schedule": {"kind": "at", "atMs": 1}});
        assert_eq!(scheduled_job(&at).schedule_text, "at");
        let every = json!({"schedule": {"kind": "every", "everyMs": 60000}});
        assert_eq!(scheduled_job(&every).schedule_text, "-");
        assert_eq!(scheduled_job(&json!({"schedule": 5})).schedule_text, "-");
    }

    #[test]
    fn next_run_scopes_are_tried_in_order() {
        let expected = Utc.timestamp_opt(1_767_225_600, 0).single();

        let state = json!({
            "state": {"nextRunAtMs": 1_767_225_600_000_i64},
            "schedule": {"kind": "cron", "nextRunAt": 5},
            "next": 9
        });
        assert_eq!(scheduled_job(&state).next_run_at, expected);

        let at = json!({"schedule": {"kind": "at", "at": "2026-01-01T00:00:00Z", "next": 5}});
        assert_eq!(scheduled_job(&at).next_run_at, expected);

        let top = json!({"state": {"lastRunAtMs": 1}, "next_run": "1767225600"});
        assert_eq!(scheduled_job(&top).next_run_at, expected);
    }

    #[test]
    fn unparseable_first_present_value_means_no_next_run() {
        let job = json!({"state": {"nextRunAt": "whenever"}, "nextRunAtMs": 1_767_225_600_000_i64});
        assert_eq!(scheduled_job(&job).next_run_at, None);
    }

    #[test]
    fn jobs_without_next_run_sort_last() {
        let jobs = decode(json!({"jobs": [
            {"name": "never"},
            {"name": "later", "next": "2026-01-30T07:00:00Z"},
            {"name": "sooner", "next": "2026-01-29T14:15:00Z"}
        ]}))
        .expect("decodes");
        let names = jobs.iter().map(|job| job.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["sooner", "later", "never"]);
    }
}
