use crate::errors::DashError;
use crate::runtime::{ProcessRequest, ProcessRunner};
use crate::types::{CommandFailure, CommandOutcome};
use std::time::Duration;

pub const STATUS_ARGS: [&str; 2] = ["status", "--json"];
pub const CRON_ARGS: [&str; 3] = ["cron", "list", "--json"];

pub fn status_argv(binary: &str) -> Vec<String> {
    argv(binary, &STATUS_ARGS)
}

pub fn cron_argv(binary: &str) -> Vec<String> {
    argv(binary, &CRON_ARGS)
}

fn argv(binary: &str, args: &[&str]) -> Vec<String> {
    std::iter::once(binary)
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}

/// Never fails: every launch, wait, and output problem is folded into the outcome.
pub fn run_command(
    runner: &dyn ProcessRunner,
    argv: &[String],
    timeout: Duration,
) -> CommandOutcome {
    let Some((program, args)) = argv.split_first() else {
        return CommandOutcome::Failure(CommandFailure::NotFound);
    };
    let request = ProcessRequest {
        program: program.clone(),
        args: args.to_vec(),
        timeout: Some(timeout),
    };

    match runner.run(request) {
        Ok(output) if output.exit_code != 0 => CommandOutcome::Failure(CommandFailure::NonZeroExit),
        Ok(output) => {
            let trimmed = output.stdout.trim();
            if trimmed.is_empty() {
                CommandOutcome::Failure(CommandFailure::EmptyOutput)
            } else {
                CommandOutcome::Success(trimmed.to_string())
            }
        }
        Err(error) => CommandOutcome::Failure(classify_error(&error)),
    }
}

fn classify_error(error: &DashError) -> CommandFailure {
    match error {
        DashError::ProgramNotFound(_) => CommandFailure::NotFound,
        DashError::Timeout(_) => CommandFailure::Timeout,
        _ => CommandFailure::Unreadable,
    }
}
