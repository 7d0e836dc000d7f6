use crate::ui::conversation::commands::{
    CommandEntry, ParsedCommand, command_entries, parse_slash_command,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ConversationResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer. `cursor` counts chars.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor: usize,
}

impl TextAreaState {
    fn byte_index(&self, char_idx: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    fn insert_str(&mut self, text: &str) {
        let at = self.byte_index(self.cursor);
        self.content.insert_str(at, text);
        self.cursor += text.chars().count();
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.content.remove(at);
        true
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.cursor >= self.char_count() {
            return false;
        }
        let at = self.byte_index(self.cursor);
        self.content.remove(at);
        true
    }

    fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.content)
    }
}

/// Input line plus slash-command palette
#[derive(Debug, Clone)]
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    enabled: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            enabled: true,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// A disabled composer still accepts typing but refuses to submit
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[cfg(test)]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether Enter would currently send something
    pub fn can_submit(&self) -> bool {
        self.enabled && !self.state.content.trim().is_empty()
    }

    pub fn content(&self) -> &str {
        &self.state.content
    }

    #[cfg(test)]
    pub fn palette_open(&self) -> bool {
        self.show_command_palette
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationResult {
        if key.kind != KeyEventKind::Press {
            return ConversationResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.state.insert_char('\n');
                } else if self.show_command_palette && self.apply_selected_command() {
                    return ConversationResult::None;
                } else if let Some(command) = parse_slash_command(&self.state.content) {
                    // commands work while a request is in flight
                    self.state.take();
                    self.close_command_palette();
                    return ConversationResult::Command(command);
                } else if self.can_submit() {
                    let content = self.state.take();
                    self.close_command_palette();
                    return ConversationResult::Submitted(content);
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command();
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return ConversationResult::None;
                }
                self.state.insert_char(c);
                self.sync_command_palette();
            }
            KeyCode::Backspace => {
                if self.state.backspace() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Delete => {
                if self.state.delete() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Left => {
                self.state.cursor = self.state.cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                self.state.cursor = (self.state.cursor + 1).min(self.state.char_count());
            }
            KeyCode::Home => {
                self.state.cursor = 0;
            }
            KeyCode::End => {
                self.state.cursor = self.state.char_count();
            }
            _ => {}
        }

        ConversationResult::None
    }

    /// Insert pasted text at the cursor
    pub fn paste(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        self.state.insert_str(&text);
        self.sync_command_palette();
    }

    /// Open, refresh or close the palette to match the current input
    fn sync_command_palette(&mut self) {
        let content = &self.state.content;
        let wants_palette = content.starts_with('/') && !content.contains(char::is_whitespace);
        if wants_palette {
            let was_open = self.show_command_palette;
            self.show_command_palette = true;
            self.refresh_command_palette();
            if !was_open && !self.filtered_commands.is_empty() {
                self.selected_command = Some(0);
            }
        } else {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        self.selected_command = if self.filtered_commands.is_empty() {
            None
        } else {
            let index = self.selected_command.unwrap_or(0);
            Some(index.min(self.filtered_commands.len() - 1))
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let len = self.filtered_commands.len() as isize;
        let current = self.selected_command.unwrap_or(0) as isize;
        self.selected_command = Some((current + delta).rem_euclid(len) as usize);
    }

    /// Replace the input with the highlighted command. False if nothing is highlighted.
    fn apply_selected_command(&mut self) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            return false;
        };

        let completed = format!("/{}", entry.keyword);
        if self.state.content == completed {
            // already complete, let Enter run it
            self.close_command_palette();
            return false;
        }
        self.state.content = completed;
        self.state.cursor = self.state.char_count();
        self.close_command_palette();
        true
    }

    /// Height needed by the palette popup, zero when closed
    pub fn palette_height(&self) -> u16 {
        if self.show_command_palette && !self.filtered_commands.is_empty() {
            (self.filtered_commands.len().min(5) + 2) as u16
        } else {
            0
        }
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border_style = if self.can_submit() {
            Style::default().fg(Color::Green)
        } else if self.enabled {
            Style::default().fg(Color::Gray)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let title = if self.enabled {
            " Message (Enter to send) "
        } else {
            " Waiting for reply... "
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style);
        let inner_area = block.inner(area);
        block.render(area, buf);

        if inner_area.width == 0 || inner_area.height == 0 {
            return;
        }

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            // Cursor marker, then keep the cursor's row in view
            let mut content = self.state.content.clone();
            content.insert(self.state.byte_index(self.state.cursor), '▌');

            let rows: Vec<&str> = content.split('\n').collect();
            let cursor_row = self.state.content[..self.state.byte_index(self.state.cursor)]
                .matches('\n')
                .count();
            let height = inner_area.height as usize;
            let first = (cursor_row + 1).saturating_sub(height);

            let text_style = if self.enabled {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::Gray)
            };
            for (i, row) in rows.iter().skip(first).take(height).enumerate() {
                // horizontal scroll so the cursor stays visible on long rows
                let width = inner_area.width as usize;
                let chars: Vec<char> = row.chars().collect();
                let marker = chars.iter().position(|c| *c == '▌').unwrap_or(0);
                let offset = (marker + 1).saturating_sub(width);
                let visible: String = chars.iter().skip(offset).take(width).collect();
                let line = Line::from(Span::styled(visible, text_style));
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        // Render command palette above the composer
        let palette_height = self.palette_height();
        if palette_height > 0 {
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            Clear.render(palette_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title(" Commands ")
                .border_style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, entry) in self.filtered_commands.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if self.selected_command == Some(index) {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled("  ", Style::default()),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);
                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}
