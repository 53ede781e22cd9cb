pub mod app;
pub mod collectors;
pub mod command;
pub mod config;
pub mod cron;
pub mod errors;
pub mod hotkeys;
pub mod live;
pub mod logging;
pub mod panels;
pub mod present;
pub mod probe;
pub mod refresh;
pub mod runtime;
pub mod status;
pub mod timefmt;
pub mod tui;
pub mod types;

use app::App;
use clap::{error::ErrorKind, CommandFactory, Parser};
use config::{load_config, AppConfig, CliOverrides};
use errors::DashError;
use live::{drain, run_live, LiveSettings};
use logging::{structured_fallback_line, JsonlLogger};
use refresh::{Dispatcher, FetchSettings};
use runtime::ProductionRuntime;
use serde_json::json;
use std::time::Duration;
use tui::render_dashboard;

#[derive(Debug, Clone, Parser)]
#[command(name = "clawd-dash")]
#[command(about = "Terminal dashboard for a long-running agent process")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    /// Agent CLI queried for `status --json` and `cron list --json`.
    #[arg(long)]
    pub agent_bin: Option<String>,
    #[arg(long)]
    pub refresh_seconds: Option<u64>,
    /// Render a single frame to stdout and exit.
    #[arg(long, default_value_t = false)]
    pub once: bool,
    #[arg(long, default_value_t = 100)]
    pub width: u16,
    #[arg(long, default_value_t = 30)]
    pub height: u16,
}

pub fn run() -> Result<i32, DashError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| DashError::Io(e.to_string()))?;
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &std::path::Path,
    runtime: &ProductionRuntime,
) -> Result<i32, DashError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(DashError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        agent_bin: cli.agent_bin.clone(),
        refresh_seconds: cli.refresh_seconds,
    };
    let cfg = load_config(&overrides, cwd, runtime.file_system.as_ref())?;

    let logger = JsonlLogger::from_config(&cfg.logging);
    let (dispatcher, mut rx) = Dispatcher::new(
        runtime.process_runner.clone(),
        runtime.clock.clone(),
        FetchSettings::from_config(&cfg),
    );
    let dispatcher = dispatcher.with_logger(logger.clone());
    let mut app = App::new(runtime.clock.now(), cfg.actions.email_check_command.clone());

    let interactive = !cli.once && runtime.terminal.stdout_is_tty();
    let _ = logger.info(
        "app.start",
        json!({
            "agent": cfg.agent.binary,
            "interactive": interactive,
            "refresh_seconds": cfg.refresh.interval_seconds,
        }),
    );

    let result = if interactive {
        run_live(
            &mut app,
            &dispatcher,
            &mut rx,
            runtime.clock.as_ref(),
            &live_settings(&cfg),
        )
    } else {
        refresh_blocking(&mut app, &dispatcher, &mut rx, runtime);
        if cli.once {
            write_frame(&app, cli.width, cli.height, runtime)
        } else {
            write_fallback_lines(&app, runtime)
        }
    };

    let _ = logger.info("app.stop", json!({"ok": result.is_ok()}));
    result.map(|()| 0)
}

fn live_settings(cfg: &AppConfig) -> LiveSettings {
    LiveSettings {
        refresh_interval: Duration::from_secs(cfg.refresh.interval_seconds),
        tick: Duration::from_millis(cfg.refresh.tick_millis),
    }
}

/// One refresh of every panel, waiting for all workers before returning.
fn refresh_blocking(
    app: &mut App,
    dispatcher: &Dispatcher,
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<refresh::WorkerMessage>,
    runtime: &ProductionRuntime,
) {
    let workers = app
        .begin_refresh_all()
        .into_iter()
        .map(|(panel, generation)| dispatcher.dispatch(panel, generation))
        .collect::<Vec<_>>();
    for worker in workers {
        let _ = worker.join();
    }
    drain(app, rx, runtime.clock.as_ref());
}

fn write_frame(
    app: &App,
    width: u16,
    height: u16,
    runtime: &ProductionRuntime,
) -> Result<(), DashError> {
    let frame = render_dashboard(app, width, height)?;
    for line in frame.lines() {
        runtime.terminal.write_line(line.trim_end())?;
    }
    Ok(())
}

fn write_fallback_lines(app: &App, runtime: &ProductionRuntime) -> Result<(), DashError> {
    for slot in app.panels.iter() {
        runtime.terminal.write_line(&structured_fallback_line(
            slot.id.key(),
            slot.state.as_str(),
            &slot.lines.join("\n"),
        ))?;
    }
    runtime.terminal.write_line(&structured_fallback_line(
        "actions",
        "ready",
        &app.action_status,
    ))
}

pub fn render_help() -> String {
    let mut cmd = Cli::command();
    cmd.render_long_help().to_string()
}
