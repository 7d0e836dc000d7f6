use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

pub const TAGLINE: &str =
    "Your next-generation AI companion powered by Gemini. Experience intelligence reimagined.";

const TRY_ASKING: [&str; 3] = [
    "Complex technical concepts",
    "Code explanations & debugging",
    "Creative writing & brainstorming",
];

const CAPABILITIES: [&str; 3] = [
    "Advanced reasoning",
    "Detailed explanations",
    "Real-time problem solving",
];

/// Landing panel shown while the conversation is empty
#[derive(Debug, Clone, Default)]
pub struct WelcomePanel {
    /// Shown in place of the usual hint when no API key is configured
    missing_key_hint: Option<String>,
}

impl WelcomePanel {
    pub fn new(missing_key_hint: Option<String>) -> Self {
        Self { missing_key_hint }
    }

    fn intro(&self) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(Span::styled("✨ 🤖", Style::default().fg(Color::Cyan))),
            Line::default(),
            Line::from(Span::styled(
                "NovaGem",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
            Line::from(Span::styled(TAGLINE, Style::default().fg(Color::Gray))),
            Line::default(),
        ];

        match &self.missing_key_hint {
            Some(hint) => lines.push(Line::from(Span::styled(
                format!("⚠ {hint}"),
                Style::default().fg(Color::Yellow),
            ))),
            None => lines.push(Line::from(Span::styled(
                "Type a message below and press Enter. /help lists commands.",
                Style::default().fg(Color::DarkGray),
            ))),
        }

        lines
    }
}

fn card(title: &'static str, items: &[&'static str]) -> Paragraph<'static> {
    let lines: Vec<Line<'static>> = items
        .iter()
        .map(|item| {
            Line::from(vec![
                Span::styled(" • ", Style::default().fg(Color::Cyan)),
                Span::styled(*item, Style::default().fg(Color::White)),
            ])
        })
        .collect();

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                format!(" {title} "),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )),
    )
}

impl Widget for &WelcomePanel {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let intro = self.intro();
        let intro_height = intro.len() as u16 + 2;
        // Cards side by side on wide terminals, stacked otherwise
        let side_by_side = area.width >= 64;
        let cards_height = if side_by_side { 5 } else { 10 };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(intro_height),
                Constraint::Length(cards_height),
                Constraint::Min(0),
            ])
            .split(area);

        Paragraph::new(intro)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(rows[1], buf);

        let width = area.width.min(72);
        let cards_area = Rect {
            x: area.x + (area.width - width) / 2,
            width,
            ..rows[2]
        };
        let cards = Layout::default()
            .direction(if side_by_side {
                Direction::Horizontal
            } else {
                Direction::Vertical
            })
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(cards_area);

        card("Try asking about", &TRY_ASKING).render(cards[0], buf);
        card("Capabilities", &CAPABILITIES).render(cards[1], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(panel: &WelcomePanel, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        panel.render(area, &mut buf);
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buf.get(x, y).symbol())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn shows_name_and_both_cards() {
        let screen = screen(&WelcomePanel::default(), 100, 30);
        assert!(screen.contains("NovaGem"));
        assert!(screen.contains("Try asking about"));
        assert!(screen.contains("Capabilities"));
        assert!(screen.contains("Code explanations & debugging"));
        assert!(screen.contains("Real-time problem solving"));
    }

    #[test]
    fn missing_key_hint_replaces_the_usage_hint() {
        let panel = WelcomePanel::new(Some("Set GEMINI_API_KEY to start chatting".to_string()));
        let screen = screen(&panel, 100, 30);
        assert!(screen.contains("Set GEMINI_API_KEY to start chatting"));
        assert!(!screen.contains("/help lists commands"));
    }

    #[test]
    fn narrow_terminal_stacks_cards() {
        let screen = screen(&WelcomePanel::default(), 50, 30);
        let rows: Vec<&str> = screen.lines().collect();
        let try_row = rows.iter().position(|row| row.contains("Try asking about"));
        let caps_row = rows.iter().position(|row| row.contains("Capabilities"));
        assert!(try_row < caps_row);
    }
}
