use crate::collectors::{health_panel_lines, memory_panel_lines};
use crate::hotkeys::HotkeyAction;
use crate::panels::{PanelBody, PanelId, PanelSet};
use crate::present::{cron_panel_lines, session_panel_lines, CRON_ROW_LIMIT};
use crate::refresh::{CommandLogEvent, RefreshMessage, WorkerMessage};
use crate::timefmt::seconds_since;
use chrono::{DateTime, Utc};

pub const STANDING_BY: &str = "Standing by.";
pub const REFRESHED: &str = "Dashboard refreshed.";
pub const CHECKING_INBOX: &str = "Checking inbox...";
pub const EMAIL_CHECK_COMPLETE: &str = "Email check complete.";
pub const EMAIL_CHECK_FAILED: &str = "Email check finished with errors.";
pub const EMAIL_CHECK_NOT_STARTED: &str = "Email check failed to start.";
pub const CANVAS_PLACEHOLDER: &str = "Canvas assignments coming soon.";
pub const EMAIL_CHECK_TITLE: &str = "Check Emails";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLog {
    pub run_id: u64,
    pub title: String,
    pub lines: Vec<String>,
    pub exit_code: Option<i32>,
    /// Lines scrolled back from the tail; zero follows new output.
    pub scroll: usize,
}

impl CommandLog {
    pub fn visible_lines(&self, height: usize) -> &[String] {
        let end = self.lines.len().saturating_sub(self.scroll);
        let start = end.saturating_sub(height);
        &self.lines[start..end]
    }
}

/// Work the caller must start on behalf of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Refresh(Vec<(PanelId, u64)>),
    EmailCheck { run_id: u64 },
}

#[derive(Debug, Clone)]
pub struct App {
    pub panels: PanelSet,
    pub action_status: String,
    pub modal: Option<CommandLog>,
    pub running: bool,
    started_at: DateTime<Utc>,
    email_check_command: String,
    email_run: Option<u64>,
    next_run_id: u64,
}

impl App {
    pub fn new(started_at: DateTime<Utc>, email_check_command: impl Into<String>) -> Self {
        Self {
            panels: PanelSet::new(),
            action_status: STANDING_BY.to_string(),
            modal: None,
            running: true,
            started_at,
            email_check_command: email_check_command.into(),
            email_run: None,
            next_run_id: 0,
        }
    }

    pub fn begin_refresh_all(&mut self) -> Vec<(PanelId, u64)> {
        PanelId::ALL
            .into_iter()
            .map(|id| (id, self.panels.get_mut(id).begin_refresh()))
            .collect()
    }

    pub fn handle_action(&mut self, action: HotkeyAction) -> Option<Effect> {
        match action {
            HotkeyAction::Quit => {
                self.running = false;
                None
            }
            HotkeyAction::Refresh => {
                self.action_status = REFRESHED.to_string();
                Some(Effect::Refresh(self.begin_refresh_all()))
            }
            HotkeyAction::CheckEmails => Some(self.open_email_check()),
            HotkeyAction::Canvas => {
                self.action_status = CANVAS_PLACEHOLDER.to_string();
                None
            }
            HotkeyAction::CloseModal => {
                self.modal = None;
                None
            }
            HotkeyAction::ScrollUp => {
                if let Some(log) = &mut self.modal {
                    log.scroll = (log.scroll + 1).min(log.lines.len().saturating_sub(1));
                }
                None
            }
            HotkeyAction::ScrollDown => {
                if let Some(log) = &mut self.modal {
                    log.scroll = log.scroll.saturating_sub(1);
                }
                None
            }
        }
    }

    fn open_email_check(&mut self) -> Effect {
        self.next_run_id += 1;
        let run_id = self.next_run_id;
        self.email_run = Some(run_id);
        self.action_status = CHECKING_INBOX.to_string();
        self.modal = Some(CommandLog {
            run_id,
            title: EMAIL_CHECK_TITLE.to_string(),
            lines: vec![format!("$ {}", self.email_check_command)],
            exit_code: None,
            scroll: 0,
        });
        Effect::EmailCheck { run_id }
    }

    pub fn apply(&mut self, message: WorkerMessage, now: DateTime<Utc>) {
        match message {
            WorkerMessage::Refresh(refresh) => self.apply_refresh(refresh, now),
            WorkerMessage::CommandLog { run_id, event } => self.apply_command_log(run_id, event),
        }
    }

    fn apply_refresh(&mut self, message: RefreshMessage, now: DateTime<Utc>) {
        let panel = message.panel();
        let (generation, body): (u64, PanelBody) = match message {
            RefreshMessage::Session { generation, result } => {
                let lines = session_panel_lines(&result, seconds_since(self.started_at, now));
                (generation, if result.is_ok() { Ok(lines) } else { Err(lines) })
            }
            RefreshMessage::Cron { generation, result } => {
                let lines = cron_panel_lines(&result, now, CRON_ROW_LIMIT);
                (generation, if result.is_ok() { Ok(lines) } else { Err(lines) })
            }
            RefreshMessage::Memory { generation, listing } => {
                (generation, Ok(memory_panel_lines(&listing)))
            }
            RefreshMessage::Health { generation, snapshot } => {
                (generation, Ok(health_panel_lines(&snapshot)))
            }
        };
        self.panels.get_mut(panel).complete(generation, body);
    }

    fn apply_command_log(&mut self, run_id: u64, event: CommandLogEvent) {
        if self.email_run != Some(run_id) {
            return;
        }
        let log = self.modal.as_mut().filter(|log| log.run_id == run_id);
        match event {
            CommandLogEvent::Line(line) => {
                if let Some(log) = log {
                    log.lines.push(line);
                }
            }
            CommandLogEvent::Exited(code) => {
                if let Some(log) = log {
                    log.lines.push(format!("Exit code: {code}"));
                    log.exit_code = Some(code);
                }
                self.action_status = if code == 0 {
                    EMAIL_CHECK_COMPLETE
                } else {
                    EMAIL_CHECK_FAILED
                }
                .to_string();
                self.email_run = None;
            }
            CommandLogEvent::FailedToStart(reason) => {
                if let Some(log) = log {
                    log.lines.push(format!("Error: {reason}"));
                }
                self.action_status = EMAIL_CHECK_NOT_STARTED.to_string();
                self.email_run = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{App, Effect, CANVAS_PLACEHOLDER, STANDING_BY};
    use crate::hotkeys::HotkeyAction;
    use crate::panels::{PanelId, PanelState};
    use crate::refresh::{CommandLogEvent, RefreshMessage, WorkerMessage};
    use crate::types::{CommandFailure, DecodeError};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600, 0).single().expect("ts")
    }

    fn app() -> App {
        App::new(start(), "/opt/check-emails")
    }

    fn log_event(run_id: u64, event: CommandLogEvent) -> WorkerMessage {
        WorkerMessage::CommandLog { run_id, event }
    }

    #[test]
    fn refresh_key_issues_new_generations_for_every_panel() {
        let mut app = app();
        assert_eq!(app.action_status, STANDING_BY);
        let Some(Effect::Refresh(batch)) = app.handle_action(HotkeyAction::Refresh) else {
            panic!("refresh effect");
        };
        assert_eq!(batch.len(), 4);
        assert!(batch.iter().all(|(_, generation)| *generation == 1));
        assert_eq!(app.action_status, "Dashboard refreshed.");
    }

    #[test]
    fn failed_session_refresh_shows_reason_until_success() {
        let mut app = app();
        let batch = app.begin_refresh_all();
        let generation = batch[0].1;
        app.apply(
            WorkerMessage::Refresh(RefreshMessage::Session {
                generation,
                result: Err(DecodeError::Command(CommandFailure::Timeout)),
            }),
            start(),
        );
        assert_eq!(app.panels.session.state, PanelState::Failed);
        assert_eq!(app.panels.session.lines[1], "data unavailable, reason: Timeout");
    }

    #[test]
    fn repeated_refresh_presses_do_not_starve_the_panel() {
        let mut app = app();
        let first = app.begin_refresh_all()[1].1;
        app.handle_action(HotkeyAction::Refresh);
        app.apply(
            WorkerMessage::Refresh(RefreshMessage::Cron {
                generation: first,
                result: Ok(Vec::new()),
            }),
            start(),
        );
        assert_eq!(app.panels.cron.state, PanelState::Ready);
        assert_eq!(app.panels.cron.lines[2], "No upcoming jobs found.");
        assert!(app.panels.cron.in_flight());
    }

    #[test]
    fn session_without_uptime_falls_back_to_dashboard_age() {
        let mut app = app();
        let generation = app.panels.get_mut(PanelId::Session).begin_refresh();
        app.apply(
            WorkerMessage::Refresh(RefreshMessage::Session {
                generation,
                result: Ok(crate::types::SessionSnapshot {
                    model: "opus".to_string(),
                    token_usage: crate::types::TokenUsage::Unavailable,
                    uptime_seconds: None,
                }),
            }),
            start() + Duration::seconds(75),
        );
        assert_eq!(app.panels.session.lines[2], "Uptime: 00:01:15");
    }

    #[test]
    fn email_check_streams_into_modal_and_reports_exit() {
        let mut app = app();
        let Some(Effect::EmailCheck { run_id }) = app.handle_action(HotkeyAction::CheckEmails)
        else {
            panic!("email effect");
        };
        assert_eq!(app.action_status, "Checking inbox...");
        app.apply(log_event(run_id, CommandLogEvent::Line("fetching".to_string())), start());
        app.apply(log_event(run_id, CommandLogEvent::Exited(2)), start());

        let log = app.modal.as_ref().expect("modal open");
        assert_eq!(log.lines, vec!["$ /opt/check-emails", "fetching", "Exit code: 2"]);
        assert_eq!(log.exit_code, Some(2));
        assert_eq!(app.action_status, "Email check finished with errors.");
    }

    #[test]
    fn events_from_a_superseded_run_are_ignored() {
        let mut app = app();
        let Some(Effect::EmailCheck { run_id: first }) =
            app.handle_action(HotkeyAction::CheckEmails)
        else {
            panic!("email effect");
        };
        app.handle_action(HotkeyAction::CloseModal);
        app.handle_action(HotkeyAction::CheckEmails);
        app.apply(log_event(first, CommandLogEvent::Exited(0)), start());
        assert_eq!(app.action_status, "Checking inbox...");
        assert_eq!(app.modal.as_ref().map(|log| log.lines.len()), Some(1));
    }

    #[test]
    fn closed_modal_still_reports_final_status() {
        let mut app = app();
        let Some(Effect::EmailCheck { run_id }) = app.handle_action(HotkeyAction::CheckEmails)
        else {
            panic!("email effect");
        };
        app.handle_action(HotkeyAction::CloseModal);
        app.apply(
            log_event(run_id, CommandLogEvent::FailedToStart("not found".to_string())),
            start(),
        );
        assert!(app.modal.is_none());
        assert_eq!(app.action_status, "Email check failed to start.");
    }

    #[test]
    fn scrolling_moves_back_from_the_tail() {
        let mut app = app();
        app.handle_action(HotkeyAction::CheckEmails);
        if let Some(log) = &mut app.modal {
            log.lines.extend((0..10).map(|n| format!("line {n}")));
        }
        app.handle_action(HotkeyAction::ScrollUp);
        app.handle_action(HotkeyAction::ScrollUp);
        let log = app.modal.as_ref().expect("modal");
        assert_eq!(log.visible_lines(3), ["line 5", "line 6", "line 7"]);

        app.handle_action(HotkeyAction::ScrollDown);
        app.handle_action(HotkeyAction::ScrollDown);
        app.handle_action(HotkeyAction::ScrollDown);
        assert_eq!(app.modal.as_ref().map(|log| log.scroll), Some(0));
    }

    #[test]
    fn canvas_and_quit_only_touch_status_and_running() {
        let mut app = app();
        assert_eq!(app.handle_action(HotkeyAction::Canvas), None);
        assert_eq!(app.action_status, CANVAS_PLACEHOLDER);
        app.handle_action(HotkeyAction::Quit);
        assert!(!app.running);
    }
}
