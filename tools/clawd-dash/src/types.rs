use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFailure {
    NotFound,
    Timeout,
    NonZeroExit,
    Unreadable,
    EmptyOutput,
}

impl CommandFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Timeout => "Timeout",
            Self::NonZeroExit => "NonZeroExit",
            Self::Unreadable => "Unreadable",
            Self::EmptyOutput => "EmptyOutput",
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one external command invocation. Created per call, consumed by a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success(String),
    Failure(CommandFailure),
}

impl CommandOutcome {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Success(_) => "Success",
            Self::Failure(reason) => reason.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    Command(CommandFailure),
    MalformedPayload,
    UnexpectedPayloadShape,
}

impl DecodeError {
    pub fn reason(self) -> &'static str {
        match self {
            Self::Command(failure) => failure.as_str(),
            Self::MalformedPayload => "MalformedPayload",
            Self::UnexpectedPayloadShape => "UnexpectedPayloadShape",
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub model: String,
    pub token_usage: TokenUsage,
    /// Never negative when present.
    pub uptime_seconds: Option<f64>,
}

/// Exactly one representation is chosen per payload; the two are never merged.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenUsage {
    Flat(FlatTokenUsage),
    PerSession(SessionTokenUsage),
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatTokenUsage {
    pub prompt: Option<u64>,
    pub completion: Option<u64>,
    pub total: Option<u64>,
}

impl FlatTokenUsage {
    pub fn is_empty(&self) -> bool {
        self.prompt.is_none() && self.completion.is_none() && self.total.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTokenUsage {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub total: Option<u64>,
    pub percent_used: Option<f64>,
    pub context_tokens: Option<u64>,
    pub remaining: Option<u64>,
}

impl SessionTokenUsage {
    /// `contextTokens - remainingTokens`, only when both are known and the result is not negative.
    pub fn used_of_context(&self) -> Option<(u64, u64)> {
        let context = self.context_tokens.filter(|value| *value > 0)?;
        let remaining = self.remaining?;
        context.checked_sub(remaining).map(|used| (used, context))
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_none()
            && self.output.is_none()
            && self.total.is_none()
            && self.percent_used.is_none()
            && self.used_of_context().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledJob {
    pub name: String,
    pub schedule_text: String,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Ascending by next run; jobs without one go last. Stable for equal keys.
pub fn sort_jobs(jobs: &mut [ScheduledJob]) {
    jobs.sort_by_key(|job| (job.next_run_at.is_none(), job.next_run_at));
}
