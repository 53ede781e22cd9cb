use crate::app::{App, CommandLog};
use crate::errors::DashError;
use crate::hotkeys::{command_log_controls_legend, dashboard_controls_legend};
use crate::panels::{PanelId, PanelSlot, PanelState};
use ratatui::backend::TestBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

const ACTIONS_HEIGHT: u16 = 5;
const QUICK_ACTIONS: &str = "[e] Check Emails   [c] Canvas Assignments   [r] Refresh Dashboard";

fn accent(slot: &PanelSlot) -> Color {
    match slot.state {
        PanelState::Failed => Color::Red,
        PanelState::Loading => Color::DarkGray,
        PanelState::Ready => match slot.id {
            PanelId::Session => Color::Green,
            PanelId::Cron => Color::Magenta,
            PanelId::Memory => Color::Yellow,
            PanelId::Health => Color::LightGreen,
        },
    }
}

fn panel_widget(slot: &PanelSlot) -> Paragraph<'_> {
    let color = accent(slot);
    let lines = slot
        .lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            if index == 0 && slot.state == PanelState::Failed {
                Line::from(Span::styled(
                    line.as_str(),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(line.as_str())
            }
        })
        .collect::<Vec<_>>();
    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(slot.id.title()),
        )
}

pub fn draw(frame: &mut Frame<'_>, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(4),
            Constraint::Min(4),
            Constraint::Length(ACTIONS_HEIGHT),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let grid = [
        [&app.panels.session, &app.panels.cron],
        [&app.panels.memory, &app.panels.health],
    ];
    for (row, pair) in grid.into_iter().enumerate() {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[row]);
        for (column, slot) in pair.into_iter().enumerate() {
            frame.render_widget(panel_widget(slot), columns[column]);
        }
    }

    let actions = Paragraph::new(vec![
        Line::from(QUICK_ACTIONS),
        Line::from(""),
        Line::from(Span::styled(
            app.action_status.as_str(),
            Style::default().fg(Color::Gray),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightBlue))
            .title("Quick Actions"),
    );
    frame.render_widget(actions, rows[2]);
    frame.render_widget(Paragraph::new(dashboard_controls_legend()), rows[3]);

    if let Some(log) = &app.modal {
        draw_command_log(frame, log);
    }
}

fn draw_command_log(frame: &mut Frame<'_>, log: &CommandLog) {
    let area = centered(frame.area(), 90, 90);
    frame.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::LightBlue))
        .title(log.title.as_str());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(inner);
    let body = log
        .visible_lines(usize::from(sections[0].height))
        .iter()
        .map(|line| Line::from(line.as_str()))
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(body), sections[0]);
    frame.render_widget(Paragraph::new(command_log_controls_legend()), sections[1]);
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let scale = |length: u16, percent: u16| {
        u16::try_from(u32::from(length) * u32::from(percent) / 100).unwrap_or(length)
    };
    let width = scale(area.width, percent_x);
    let height = scale(area.height, percent_y);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Renders one frame off-screen and returns it as newline-separated rows.
pub fn render_dashboard(app: &App, width: u16, height: u16) -> Result<String, DashError> {
    if width == 0 || height == 0 {
        return Ok(String::new());
    }
    let backend = TestBackend::new(width, height);
    let mut terminal = Terminal::new(backend).map_err(|e| DashError::Terminal(e.to_string()))?;
    terminal
        .draw(|frame| draw(frame, app))
        .map_err(|e| DashError::Terminal(e.to_string()))?;

    let mut out = String::new();
    let buffer = terminal.backend().buffer();
    for y in 0..height {
        for x in 0..width {
            out.push_str(buffer[(x, y)].symbol());
        }
        out.push('\n');
    }
    Ok(out)
}
