use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};

/// "NovaGem is thinking..." line shown while a request is in flight.
///
/// Animation is driven by the event loop's tick counter rather than the wall
/// clock, so a given frame always renders the same way.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingIndicator {
    frame: usize,
}

impl PendingIndicator {
    pub fn new(frame: usize) -> Self {
        Self { frame }
    }

    fn dots(&self) -> &'static str {
        match self.frame % 4 {
            0 => ".  ",
            1 => ".. ",
            2 => "...",
            _ => "   ",
        }
    }

    pub fn line(&self) -> Line<'static> {
        Line::from(vec![
            Span::styled("🤖 ", Style::default().fg(Color::Green)),
            Span::styled("NovaGem is thinking", Style::default().fg(Color::Green)),
            Span::styled(self.dots(), Style::default().fg(Color::Yellow)),
        ])
    }
}

impl Widget for PendingIndicator {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        buf.set_line(area.x, area.y, &self.line(), area.width);
    }
}
