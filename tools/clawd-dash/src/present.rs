//! Display strings consumed verbatim by the panels and by golden tests.

use crate::timefmt::{format_countdown, format_duration};
use crate::types::{DecodeError, ScheduledJob, SessionSnapshot, SessionTokenUsage, TokenUsage};
use chrono::{DateTime, Utc};

pub const UNAVAILABLE_TOKENS: &str = "unavailable";
pub const UNKNOWN_TIME: &str = "unknown";
pub const NO_JOBS: &str = "No upcoming jobs found.";
pub const CRON_ROW_LIMIT: usize = 5;

const SESSION_PART_SEPARATOR: &str = " · ";

pub fn format_tokens(usage: &TokenUsage) -> String {
    match usage {
        TokenUsage::Flat(flat) => {
            let parts = [
                ("prompt", flat.prompt),
                ("completion", flat.completion),
                ("total", flat.total),
            ]
            .into_iter()
            .filter_map(|(label, value)| value.map(|value| format!("{label} {value}")))
            .collect::<Vec<_>>();
            if parts.is_empty() {
                UNAVAILABLE_TOKENS.to_string()
            } else {
                parts.join(", ")
            }
        }
        TokenUsage::PerSession(session) => {
            let parts = session_parts(session);
            if parts.is_empty() {
                UNAVAILABLE_TOKENS.to_string()
            } else {
                parts.join(SESSION_PART_SEPARATOR)
            }
        }
        TokenUsage::Unavailable => UNAVAILABLE_TOKENS.to_string(),
    }
}

fn session_parts(usage: &SessionTokenUsage) -> Vec<String> {
    let mut parts = [("in", usage.input), ("out", usage.output), ("total", usage.total)]
        .into_iter()
        .filter_map(|(label, value)| value.map(|value| format!("{label} {value}")))
        .collect::<Vec<_>>();

    // A percentage suppresses the used/context pair even when both are known.
    match (usage.percent_used, usage.context_tokens.filter(|tokens| *tokens > 0)) {
        (Some(percent), Some(context)) => parts.push(format!("{percent}% of {context}")),
        (Some(percent), None) => parts.push(format!("{percent}% used")),
        (None, _) => {
            if let Some((used, context)) = usage.used_of_context() {
                parts.push(format!("{used} / {context}"));
            }
        }
    }
    parts
}

pub fn format_uptime(seconds: Option<f64>) -> String {
    seconds.map_or_else(|| UNKNOWN_TIME.to_string(), format_duration)
}

pub fn unavailable_message(label: &str, error: DecodeError) -> Vec<String> {
    vec![
        format!("{label} unavailable"),
        format!("data unavailable, reason: {}", error.reason()),
    ]
}

/// `fallback_uptime` is the time since the dashboard itself started, used when the payload
/// carries no uptime of its own.
pub fn session_panel_lines(
    result: &Result<SessionSnapshot, DecodeError>,
    fallback_uptime: f64,
) -> Vec<String> {
    match result {
        Ok(snapshot) => vec![
            format!("Model: {}", snapshot.model),
            format!("Tokens: {}", format_tokens(&snapshot.token_usage)),
            format!(
                "Uptime: {}",
                format_uptime(Some(snapshot.uptime_seconds.unwrap_or(fallback_uptime)))
            ),
        ],
        Err(error) => unavailable_message("Status", *error),
    }
}

pub fn cron_row(job: &ScheduledJob, now: DateTime<Utc>) -> String {
    format!(
        "{} · {} · {}",
        job.name,
        job.schedule_text,
        format_countdown(job.next_run_at, now)
    )
}

pub fn cron_panel_lines(
    result: &Result<Vec<ScheduledJob>, DecodeError>,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<String> {
    let jobs = match result {
        Ok(jobs) => jobs,
        Err(error) => return unavailable_message("Cron jobs", *error),
    };
    let next = jobs.first().and_then(|job| job.next_run_at);
    let mut lines = vec![format!("Next in: {}", format_countdown(next, now)), String::new()];
    if jobs.is_empty() {
        lines.push(NO_JOBS.to_string());
    } else {
        lines.extend(jobs.iter().take(limit).map(|job| cron_row(job, now)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::{
        cron_panel_lines, format_tokens, format_uptime, session_panel_lines, CRON_ROW_LIMIT,
    };
    use crate::types::{
        CommandFailure, DecodeError, FlatTokenUsage, ScheduledJob, SessionSnapshot,
        SessionTokenUsage, TokenUsage,
    };
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600, 0).single().expect("valid timestamp")
    }

    fn job(name: &str, minutes: Option<i64>) -> ScheduledJob {
        ScheduledJob {
            name: name.to_string(),
            schedule_text: "*/15 * * * *".to_string(),
            next_run_at: minutes.map(|minutes| now() + Duration::minutes(minutes)),
        }
    }

    #[test]
    fn flat_tokens_render_present_parts_with_commas() {
        let usage = TokenUsage::Flat(FlatTokenUsage {
            prompt: Some(10),
            completion: None,
            total: Some(15),
        });
        assert_eq!(format_tokens(&usage), "prompt 10, total 15");
        assert_eq!(format_tokens(&TokenUsage::Unavailable), "unavailable");
    }

    #[test]
    fn session_tokens_prefer_percent_over_used_pair() {
        let with_context = TokenUsage::PerSession(SessionTokenUsage {
            input: Some(1200),
            output: Some(300),
            percent_used: Some(12.5),
            context_tokens: Some(200_000),
            remaining: Some(100),
            ..SessionTokenUsage::default()
        });
        assert_eq!(format_tokens(&with_context), "in 1200 · out 300 · 12.5% of 200000");

        let bare_percent = TokenUsage::PerSession(SessionTokenUsage {
            percent_used: Some(40.0),
            ..SessionTokenUsage::default()
        });
        assert_eq!(format_tokens(&bare_percent), "40% used");

        let used_pair = TokenUsage::PerSession(SessionTokenUsage {
            total: Some(9),
            context_tokens: Some(1000),
            remaining: Some(250),
            ..SessionTokenUsage::default()
        });
        assert_eq!(format_tokens(&used_pair), "total 9 · 750 / 1000");
    }

    #[test]
    fn session_lines_use_fallback_uptime_only_when_absent() {
        let snapshot = SessionSnapshot {
            model: "opus".to_string(),
            token_usage: TokenUsage::Unavailable,
            uptime_seconds: None,
        };
        assert_eq!(
            session_panel_lines(&Ok(snapshot.clone()), 61.0),
            vec!["Model: opus", "Tokens: unavailable", "Uptime: 00:01:01"]
        );

        let reported = SessionSnapshot {
            uptime_seconds: Some(90_000.0),
            ..snapshot
        };
        assert_eq!(session_panel_lines(&Ok(reported), 61.0)[2], "Uptime: 1d 01:00:00");
        assert_eq!(format_uptime(None), "unknown");
    }

    #[test]
    fn failures_name_their_reason() {
        let timeout = session_panel_lines(&Err(DecodeError::Command(CommandFailure::Timeout)), 0.0);
        let exit = session_panel_lines(&Err(DecodeError::Command(CommandFailure::NonZeroExit)), 0.0);
        assert_eq!(timeout, vec!["Status unavailable", "data unavailable, reason: Timeout"]);
        assert_eq!(exit[1], "data unavailable, reason: NonZeroExit");
        assert_ne!(timeout, exit);
    }

    #[test]
    fn cron_lines_show_next_countdown_and_limit_rows() {
        let jobs = (0..7).map(|i| job(&format!("job{i}"), Some(5 + i))).collect::<Vec<_>>();
        let lines = cron_panel_lines(&Ok(jobs), now(), CRON_ROW_LIMIT);
        assert_eq!(lines[0], "Next in: 5m 0s");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "job0 · */15 * * * * · 5m 0s");
        assert_eq!(lines.len(), 2 + CRON_ROW_LIMIT);
    }

    #[test]
    fn empty_cron_list_says_so() {
        assert_eq!(
            cron_panel_lines(&Ok(Vec::new()), now(), CRON_ROW_LIMIT),
            vec!["Next in: unknown", "", "No upcoming jobs found."]
        );
        let unshaped = cron_panel_lines(&Err(DecodeError::UnexpectedPayloadShape), now(), 5);
        assert_eq!(unshaped[1], "data unavailable, reason: UnexpectedPayloadShape");
        assert_eq!(
            cron_panel_lines(&Ok(vec![job("later", None)]), now(), 5)[2],
            "later · */15 * * * * · unknown"
        );
    }
}
