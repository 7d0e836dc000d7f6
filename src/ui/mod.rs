pub mod conversation;
pub mod highlight;
pub mod markdown;
pub mod welcome;

use crate::app::App;
use crate::ui::conversation::get_help_text;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

const MAX_COMPOSER_ROWS: u16 = 6;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.size();

    let composer_rows = app
        .manager
        .composer()
        .content()
        .split('\n')
        .count()
        .clamp(1, MAX_COMPOSER_ROWS as usize) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(composer_rows + 2),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(app, frame, chunks[0]);

    if show_welcome(app) {
        frame.render_widget(&app.welcome, chunks[1]);
    } else {
        app.manager.render_history(chunks[1], frame.buffer_mut());
    }

    app.manager.render_composer(chunks[2], frame.buffer_mut());
    render_footer(app, frame, chunks[3]);

    if app.show_help {
        render_help(frame, area);
    }
}

/// The welcome panel replaces the transcript only while nothing is pending
fn show_welcome(app: &App) -> bool {
    app.show_welcome && app.manager.session().conversation().is_empty() && !app.manager.is_busy()
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let count = app.manager.session().conversation().len();
    let title = Line::from(vec![
        Span::styled(
            " ✨ NovaGem ",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} ", app.manager.model()),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("· {count} messages "),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    let (status, status_style) = if app.manager.is_busy() {
        (" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" READY ", Style::default().bg(Color::Green).fg(Color::Black))
    };

    let mut spans = vec![Span::styled(status, status_style), Span::raw(" ")];
    for (key, label) in [
        ("Enter", "send"),
        ("Shift+Enter", "newline"),
        ("PgUp/PgDn", "scroll"),
        ("Ctrl+L", "clear"),
        ("/help", "help"),
        ("Ctrl+C", "quit"),
    ] {
        spans.push(Span::styled(format!(" {key} "), key_style));
        spans.push(Span::styled(format!(" {label} "), label_style));
    }

    if app.manager.scroll_back() > 0 {
        spans.push(Span::styled(
            format!(" ↑{} ", app.manager.scroll_back()),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let text = get_help_text();
    let lines: Vec<Line> = text.lines().map(Line::from).collect();

    let popup = centered_rect(area, 56, lines.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Help (Esc to close) ");
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

/// Rect of at most `width` x `height` centered in `area`
fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

/// Hint shown on the welcome panel when no key is available
pub fn missing_key_hint(env_var: &str) -> String {
    format!("No API key found. Set {env_var} or add api_key to the config file.")
}
