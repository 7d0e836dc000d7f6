use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthChar;

use super::highlight::CodeHighlighter;

const RULE_WIDTH: usize = 24;

fn fence_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn inline_code_style() -> Style {
    Style::default().fg(Color::Yellow).bg(Color::Black)
}

/// Render message content into styled lines.
///
/// Handles fenced code blocks (``` or ~~~, with an optional language tag),
/// headings, bullet and numbered lists, block quotes, horizontal rules and
/// inline `code`, **bold** and *italic*. Markers that never close are kept as
/// literal text. The output is not wrapped; see [`wrap_line`].
pub fn render_markdown(content: &str, base: Style) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut open: Option<OpenFence> = None;

    for raw in content.lines() {
        let trimmed = raw.trim_start();

        if let Some(block) = open.as_mut() {
            if block.closed_by(trimmed) {
                open = None;
                lines.push(Line::from(Span::styled("╰─", fence_style())));
            } else {
                let mut spans = vec![Span::styled("│ ", fence_style())];
                spans.extend(block.highlighter.highlight(raw));
                lines.push(Line::from(spans));
            }
            continue;
        }

        if let Some((marker, len, language)) = fence(trimmed) {
            let label = if language.is_empty() {
                "╭─".to_string()
            } else {
                format!("╭─ {language}")
            };
            lines.push(Line::from(Span::styled(label, fence_style())));
            open = Some(OpenFence {
                marker,
                len,
                highlighter: CodeHighlighter::new(language),
            });
            continue;
        }

        lines.push(render_block_line(raw, base));
    }

    // Unterminated fence
    if open.is_some() {
        lines.push(Line::from(Span::styled("╰─", fence_style())));
    }

    lines
}

struct OpenFence {
    marker: char,
    len: usize,
    highlighter: CodeHighlighter,
}

impl OpenFence {
    /// A bare run of the opening marker, at least as long as the opener
    fn closed_by(&self, line: &str) -> bool {
        matches!(
            fence(line),
            Some((marker, len, rest)) if marker == self.marker && len >= self.len && rest.is_empty()
        )
    }
}

/// Split a fence line into its marker, the marker's length and the info text
fn fence(line: &str) -> Option<(char, usize, &str)> {
    let marker = line.chars().next().filter(|c| matches!(c, '`' | '~'))?;
    let len = line.chars().take_while(|c| *c == marker).count();
    (len >= 3).then(|| (marker, len, line[len..].trim()))
}

fn render_block_line(raw: &str, base: Style) -> Line<'static> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return Line::default();
    }
    let indent = &raw[..raw.len() - trimmed.len()];

    if let Some((level, text)) = heading(trimmed) {
        let mut style = base.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        if level > 2 {
            style = style.remove_modifier(Modifier::BOLD).add_modifier(Modifier::UNDERLINED);
        }
        return Line::from(parse_inline(text, style));
    }

    if is_rule(trimmed) {
        return Line::from(Span::styled("─".repeat(RULE_WIDTH), fence_style()));
    }

    if let Some(text) = trimmed.strip_prefix('>') {
        let mut spans = vec![Span::styled("▎ ", Style::default().fg(Color::DarkGray))];
        spans.extend(parse_inline(
            text.trim_start(),
            base.add_modifier(Modifier::ITALIC),
        ));
        return Line::from(spans);
    }

    if let Some(text) = bullet(trimmed) {
        let mut spans = vec![Span::styled(
            format!("{indent}• "),
            Style::default().fg(Color::Cyan),
        )];
        spans.extend(parse_inline(text, base));
        return Line::from(spans);
    }

    if let Some((number, text)) = numbered(trimmed) {
        let mut spans = vec![Span::styled(
            format!("{indent}{number}. "),
            Style::default().fg(Color::Cyan),
        )];
        spans.extend(parse_inline(text, base));
        return Line::from(spans);
    }

    let mut spans = Vec::new();
    if !indent.is_empty() {
        spans.push(Span::styled(indent.to_string(), base));
    }
    spans.extend(parse_inline(trimmed, base));
    Line::from(spans)
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    line[level..].strip_prefix(' ').map(|text| (level, text.trim()))
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|marker| compact.chars().all(|c| c == *marker))
}

fn bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
}

fn numbered(line: &str) -> Option<(&str, &str)> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let text = line[digits..].strip_prefix(". ")?;
    Some((&line[..digits], text))
}

/// Inline styling for a single line: `code`, **bold** and *italic*
pub fn parse_inline(text: &str, base: Style) -> Vec<Span<'static>> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '`' {
            if let Some(end) = find_from(&chars, i + 1, "`") {
                if end > i + 1 {
                    push_plain(&mut plain, &mut spans, base);
                    spans.push(Span::styled(collect(&chars[i + 1..end]), inline_code_style()));
                    i = end + 1;
                    continue;
                }
            }
        }

        if c == '*' && chars.get(i + 1) == Some(&'*') {
            if let Some(end) = find_from(&chars, i + 2, "**") {
                if end > i + 2 {
                    push_plain(&mut plain, &mut spans, base);
                    spans.push(Span::styled(
                        collect(&chars[i + 2..end]),
                        base.add_modifier(Modifier::BOLD),
                    ));
                    i = end + 2;
                    continue;
                }
            }
        }

        let opens_italic = (i == 0 || chars[i - 1] != '*')
            && chars
                .get(i + 1)
                .is_some_and(|next| !next.is_whitespace() && *next != '*');
        if c == '*' && opens_italic {
            if let Some(end) = find_italic_close(&chars, i + 1) {
                push_plain(&mut plain, &mut spans, base);
                spans.push(Span::styled(
                    collect(&chars[i + 1..end]),
                    base.add_modifier(Modifier::ITALIC),
                ));
                i = end + 1;
                continue;
            }
        }

        plain.push(c);
        i += 1;
    }

    push_plain(&mut plain, &mut spans, base);
    spans
}

fn push_plain(plain: &mut String, spans: &mut Vec<Span<'static>>, style: Style) {
    if !plain.is_empty() {
        spans.push(Span::styled(std::mem::take(plain), style));
    }
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

fn find_from(chars: &[char], start: usize, marker: &str) -> Option<usize> {
    let marker: Vec<char> = marker.chars().collect();
    if start > chars.len() || chars.len() - start < marker.len() {
        return None;
    }
    (start..=chars.len() - marker.len()).find(|&idx| chars[idx..idx + marker.len()] == marker[..])
}

fn find_italic_close(chars: &[char], start: usize) -> Option<usize> {
    (start + 1..chars.len()).find(|&idx| chars[idx] == '*' && !chars[idx - 1].is_whitespace())
}

struct Segment {
    parts: Vec<(String, Style)>,
    space: bool,
}

impl Segment {
    fn width(&self) -> usize {
        self.parts
            .iter()
            .flat_map(|(text, _)| text.chars())
            .map(char_width)
            .sum()
    }
}

fn char_width(c: char) -> usize {
    c.width().unwrap_or(0)
}

fn segments(line: &Line<'_>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for span in &line.spans {
        for c in span.content.chars() {
            let space = c.is_whitespace();
            let same_kind = segments.last().is_some_and(|last| last.space == space);
            if !same_kind {
                segments.push(Segment {
                    parts: Vec::new(),
                    space,
                });
            }
            if let Some(segment) = segments.last_mut() {
                match segment.parts.last_mut() {
                    Some((text, style)) if *style == span.style => text.push(c),
                    _ => segment.parts.push((c.to_string(), span.style)),
                }
            }
        }
    }
    segments
}

struct LineBuilder {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    used: usize,
    line_style: Style,
}

impl LineBuilder {
    fn push(&mut self, text: &str, style: Style, width: usize) {
        match self.spans.last_mut() {
            Some(last) if last.style == style => {
                let mut merged = last.content.to_string();
                merged.push_str(text);
                *last = Span::styled(merged, style);
            }
            _ => self.spans.push(Span::styled(text.to_string(), style)),
        }
        self.used += width;
    }

    fn break_line(&mut self) {
        while let Some(last) = self.spans.last_mut() {
            let trimmed = last.content.trim_end().to_string();
            if trimmed.is_empty() {
                self.spans.pop();
                continue;
            }
            if trimmed.len() != last.content.len() {
                *last = Span::styled(trimmed, last.style);
            }
            break;
        }
        let mut line = Line::from(std::mem::take(&mut self.spans));
        line.style = self.line_style;
        self.lines.push(line);
        self.used = 0;
    }
}

/// Word-wrap a styled line to `width` columns, keeping span styles.
///
/// Words longer than the width are split at character boundaries. Trailing
/// whitespace on a wrapped row is dropped.
pub fn wrap_line(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line.clone()];
    }

    let mut builder = LineBuilder {
        lines: Vec::new(),
        spans: Vec::new(),
        used: 0,
        line_style: line.style,
    };

    for segment in segments(line) {
        let segment_width = segment.width();

        if segment.space {
            if builder.used + segment_width <= width {
                for (text, style) in &segment.parts {
                    let w = text.chars().map(char_width).sum();
                    builder.push(text, *style, w);
                }
            } else if builder.used > 0 {
                builder.break_line();
            }
            continue;
        }

        if builder.used + segment_width > width && builder.used > 0 {
            builder.break_line();
        }

        if segment_width <= width {
            for (text, style) in &segment.parts {
                let w = text.chars().map(char_width).sum();
                builder.push(text, *style, w);
            }
            continue;
        }

        for (text, style) in &segment.parts {
            for c in text.chars() {
                let w = char_width(c);
                if builder.used + w > width && builder.used > 0 {
                    builder.break_line();
                }
                let mut buf = [0u8; 4];
                builder.push(c.encode_utf8(&mut buf), *style, w);
            }
        }
    }

    if !builder.spans.is_empty() {
        builder.break_line();
    }

    builder.lines
}
