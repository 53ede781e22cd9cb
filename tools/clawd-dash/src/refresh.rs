//! Off-thread fetches for the panels and the email check.
//!
//! The UI thread never waits on a child process. Each fetch runs on its own std thread and
//! reports back over an unbounded channel that the UI drains between frames.

use crate::collectors::{health_snapshot, recent_notes, HealthSnapshot, NotesListing};
use crate::command::{cron_argv, run_command, status_argv};
use crate::config::AppConfig;
use crate::cron::decode_cron;
use crate::logging::JsonlLogger;
use crate::panels::PanelId;
use crate::runtime::{Clock, ProcessRequest, ProcessRunner};
use crate::status::decode_status;
use crate::types::{CommandOutcome, DecodeError, ScheduledJob, SessionSnapshot};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshMessage {
    Session {
        generation: u64,
        result: Result<SessionSnapshot, DecodeError>,
    },
    Cron {
        generation: u64,
        result: Result<Vec<ScheduledJob>, DecodeError>,
    },
    Memory {
        generation: u64,
        listing: NotesListing,
    },
    Health {
        generation: u64,
        snapshot: HealthSnapshot,
    },
}

impl RefreshMessage {
    pub fn panel(&self) -> PanelId {
        match self {
            Self::Session { .. } => PanelId::Session,
            Self::Cron { .. } => PanelId::Cron,
            Self::Memory { .. } => PanelId::Memory,
            Self::Health { .. } => PanelId::Health,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLogEvent {
    Line(String),
    Exited(i32),
    FailedToStart(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Refresh(RefreshMessage),
    CommandLog { run_id: u64, event: CommandLogEvent },
}

pub type HealthProbe = fn() -> HealthSnapshot;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub agent_binary: String,
    pub status_timeout: Duration,
    pub cron_timeout: Duration,
    pub memory_dir: PathBuf,
    pub memory_limit: usize,
    pub email_check_command: String,
}

impl FetchSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            agent_binary: cfg.agent.binary.clone(),
            status_timeout: cfg.agent.status_timeout(),
            cron_timeout: cfg.agent.cron_timeout(),
            memory_dir: cfg.memory.dir.clone(),
            memory_limit: cfg.memory.max_entries,
            email_check_command: cfg.actions.email_check_command.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    runner: Arc<dyn ProcessRunner>,
    clock: Arc<dyn Clock>,
    logger: Option<JsonlLogger>,
    settings: FetchSettings,
    health_probe: HealthProbe,
    tx: UnboundedSender<WorkerMessage>,
}

impl Dispatcher {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        clock: Arc<dyn Clock>,
        settings: FetchSettings,
    ) -> (Self, UnboundedReceiver<WorkerMessage>) {
        let (tx, rx) = unbounded_channel();
        let dispatcher = Self {
            runner,
            clock,
            logger: None,
            settings,
            health_probe: health_snapshot,
            tx,
        };
        (dispatcher, rx)
    }

    pub fn with_logger(mut self, logger: JsonlLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_health_probe(mut self, probe: HealthProbe) -> Self {
        self.health_probe = probe;
        self
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub fn dispatch(&self, panel: PanelId, generation: u64) -> thread::JoinHandle<()> {
        self.log_info("refresh.start", json!({"panel": panel.key(), "generation": generation}));
        let worker = self.clone();
        thread::spawn(move || {
            let message = worker.fetch(panel, generation);
            let _ = worker.tx.send(WorkerMessage::Refresh(message));
        })
    }

    /// Runs one panel fetch on the calling thread.
    pub fn fetch(&self, panel: PanelId, generation: u64) -> RefreshMessage {
        match panel {
            PanelId::Session => {
                let outcome = self.run_logged(
                    &status_argv(&self.settings.agent_binary),
                    self.settings.status_timeout,
                );
                let result = decode_status(&outcome, self.clock.now());
                self.log_decode_error(panel, &result);
                RefreshMessage::Session { generation, result }
            }
            PanelId::Cron => {
                let outcome = self.run_logged(
                    &cron_argv(&self.settings.agent_binary),
                    self.settings.cron_timeout,
                );
                let result = decode_cron(&outcome);
                self.log_decode_error(panel, &result);
                RefreshMessage::Cron { generation, result }
            }
            PanelId::Memory => RefreshMessage::Memory {
                generation,
                listing: recent_notes(&self.settings.memory_dir, self.settings.memory_limit),
            },
            PanelId::Health => RefreshMessage::Health {
                generation,
                snapshot: (self.health_probe)(),
            },
        }
    }

    /// Streams the email checker's merged output into the channel, tagged with `run_id`.
    pub fn spawn_email_check(&self, run_id: u64) -> thread::JoinHandle<()> {
        let worker = self.clone();
        thread::spawn(move || worker.run_email_check(run_id))
    }

    fn run_email_check(&self, run_id: u64) {
        let request = ProcessRequest {
            program: self.settings.email_check_command.clone(),
            args: Vec::new(),
            timeout: None,
        };
        let send = |event| {
            let _ = self.tx.send(WorkerMessage::CommandLog { run_id, event });
        };
        let result = self.runner.stream(request, &mut |line| {
            send(CommandLogEvent::Line(line.to_string()));
        });
        match result {
            Ok(code) => {
                self.log_info("email_check.exit", json!({"run_id": run_id, "exit_code": code}));
                send(CommandLogEvent::Exited(code));
            }
            Err(error) => {
                self.log_warn(
                    "email_check.exit",
                    json!({"run_id": run_id, "error": error.to_string()}),
                );
                send(CommandLogEvent::FailedToStart(error.to_string()));
            }
        }
    }

    fn run_logged(&self, argv: &[String], timeout: Duration) -> CommandOutcome {
        let started = Instant::now();
        let outcome = run_command(self.runner.as_ref(), argv, timeout);
        self.log_info(
            "command.outcome",
            json!({
                "argv": argv.join(" "),
                "outcome": outcome.tag(),
                "elapsed_ms": started.elapsed().as_millis() as u64,
            }),
        );
        outcome
    }

    fn log_decode_error<T>(&self, panel: PanelId, result: &Result<T, DecodeError>) {
        if let Err(error) = result {
            self.log_warn(
                "decode.error",
                json!({"panel": panel.key(), "reason": error.reason()}),
            );
        }
    }

    // Logging never fails a refresh.
    fn log_info(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(logger) = &self.logger {
            let _ = logger.info(event_type, payload);
        }
    }

    fn log_warn(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(logger) = &self.logger {
            let _ = logger.warn(event_type, payload);
        }
    }
}
