use crate::app::{App, Effect};
use crate::errors::DashError;
use crate::hotkeys::{action_for_key, HotkeyAction};
use crate::refresh::{Dispatcher, WorkerMessage};
use crate::runtime::Clock;
use crate::tui::draw;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

fn terminal_error(e: io::Error) -> DashError {
    DashError::Terminal(e.to_string())
}

/// Raw mode plus alternate screen for as long as the value lives.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn start() -> Result<Self, DashError> {
        enable_raw_mode().map_err(terminal_error)?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(terminal_error(e));
        }
        match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(terminal) => Ok(Self { terminal }),
            Err(e) => {
                let _ = disable_raw_mode();
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                Err(terminal_error(e))
            }
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

pub fn key_action(code: KeyCode, modifiers: KeyModifiers, modal_open: bool) -> Option<HotkeyAction> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(HotkeyAction::Quit),
        KeyCode::Esc if modal_open => Some(HotkeyAction::CloseModal),
        KeyCode::Down if modal_open => Some(HotkeyAction::ScrollDown),
        KeyCode::Up if modal_open => Some(HotkeyAction::ScrollUp),
        KeyCode::Char(key) => action_for_key(key, modal_open),
        _ => None,
    }
}

pub fn perform(dispatcher: &Dispatcher, effect: Effect) {
    match effect {
        Effect::Refresh(batch) => {
            for (panel, generation) in batch {
                dispatcher.dispatch(panel, generation);
            }
        }
        Effect::EmailCheck { run_id } => {
            dispatcher.spawn_email_check(run_id);
        }
    }
}

pub fn drain(app: &mut App, rx: &mut UnboundedReceiver<WorkerMessage>, clock: &dyn Clock) {
    while let Ok(message) = rx.try_recv() {
        app.apply(message, clock.now());
    }
}

pub struct LiveSettings {
    pub refresh_interval: Duration,
    pub tick: Duration,
}

pub fn run_live(
    app: &mut App,
    dispatcher: &Dispatcher,
    rx: &mut UnboundedReceiver<WorkerMessage>,
    clock: &dyn Clock,
    settings: &LiveSettings,
) -> Result<(), DashError> {
    let mut session = TerminalSession::start()?;
    perform(dispatcher, Effect::Refresh(app.begin_refresh_all()));
    let mut last_refresh = Instant::now();

    while app.running {
        drain(app, rx, clock);
        session
            .terminal
            .draw(|frame| draw(frame, app))
            .map_err(terminal_error)?;

        if event::poll(settings.tick).map_err(terminal_error)? {
            if let Event::Key(key) = event::read().map_err(terminal_error)? {
                if key.kind == KeyEventKind::Press {
                    let action = key_action(key.code, key.modifiers, app.modal.is_some());
                    if let Some(effect) = action.and_then(|action| app.handle_action(action)) {
                        if matches!(effect, Effect::Refresh(_)) {
                            last_refresh = Instant::now();
                        }
                        perform(dispatcher, effect);
                    }
                }
            }
        }

        if last_refresh.elapsed() >= settings.refresh_interval {
            perform(dispatcher, Effect::Refresh(app.begin_refresh_all()));
            last_refresh = Instant::now();
        }
    }
    Ok(())
}
