//! Conversation history display component

use crate::conversation::{Message, Role};
use crate::ui::conversation::pending::PendingIndicator;
use crate::ui::markdown::{render_markdown, wrap_line};
use ratatui::{
    buffer::Buffer,
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget,
    },
};
use std::collections::HashSet;

/// Read-only view over the conversation store, bottom-anchored.
///
/// `scroll_back` counts rows above the newest line; zero means the latest
/// message is visible.
pub struct HistoryView<'a> {
    messages: &'a [Message],
    failed: Option<&'a HashSet<usize>>,
    pending: Option<PendingIndicator>,
    scroll_back: usize,
}

impl<'a> HistoryView<'a> {
    pub fn new(messages: &'a [Message]) -> Self {
        Self {
            messages,
            failed: None,
            pending: None,
            scroll_back: 0,
        }
    }

    /// Positions of replies that report a failed completion
    pub fn failed(mut self, failed: &'a HashSet<usize>) -> Self {
        self.failed = Some(failed);
        self
    }

    pub fn pending(mut self, pending: Option<PendingIndicator>) -> Self {
        self.pending = pending;
        self
    }

    pub fn scroll_back(mut self, scroll_back: usize) -> Self {
        self.scroll_back = scroll_back;
        self
    }

    fn block() -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" 💬 Conversation ")
    }

    /// Largest useful scroll offset for the given area
    pub fn max_scroll_back(&self, area: Rect) -> usize {
        let inner = Self::block().inner(area);
        self.lines(inner.width)
            .len()
            .saturating_sub(inner.height as usize)
    }

    /// Every row of the transcript, already wrapped to `width`
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let content_width = width.saturating_sub(2) as usize;
        let mut lines = Vec::new();

        for (index, message) in self.messages.iter().enumerate() {
            let failed = self.failed.is_some_and(|failed| failed.contains(&index));
            lines.push(header(message.role()));
            for line in render_markdown(message.content(), content_style(message.role(), failed)) {
                for wrapped in wrap_line(&line, content_width) {
                    let mut spans = vec![Span::raw("  ")];
                    spans.extend(wrapped.spans);
                    lines.push(Line::from(spans));
                }
            }
            lines.push(Line::default());
        }

        if let Some(pending) = self.pending {
            lines.push(pending.line());
        }

        lines
    }
}

fn header(role: Role) -> Line<'static> {
    let (icon, color) = match role {
        Role::User => ("👤", Color::Blue),
        Role::Assistant => ("🤖", Color::Green),
    };
    Line::from(Span::styled(
        format!("{icon} {}", role.display_name()),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn content_style(role: Role, failed: bool) -> Style {
    match role {
        Role::User => Style::default().fg(Color::White),
        Role::Assistant if failed => Style::default().fg(Color::Red),
        Role::Assistant => Style::default().fg(Color::Gray),
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Self::block();
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 || inner.width == 0 {
            return;
        }

        let lines = self.lines(inner.width);
        let height = inner.height as usize;
        let max_back = lines.len().saturating_sub(height);
        let back = self.scroll_back.min(max_back);
        let end = lines.len() - back;
        let start = end.saturating_sub(height);

        for (row, line) in lines[start..end].iter().enumerate() {
            buf.set_line(inner.x, inner.y + row as u16, line, inner.width);
        }

        if max_back > 0 {
            let mut state = ScrollbarState::new(max_back).position(max_back - back);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .render(
                    area.inner(&Margin {
                        vertical: 1,
                        horizontal: 0,
                    }),
                    buf,
                    &mut state,
                );
        }
    }
}
