//! Highlighting for fenced code blocks.
//!
//! Languages with a bundled syntect grammar are highlighted with it, keeping
//! parser state from one line to the next within a block. Anything else goes
//! through a shallow keyword scanner that only knows keywords, strings,
//! numbers and line comments.

use once_cell::sync::Lazy;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use tracing::warn;

const THEME: &str = "base16-eighties.dark";

struct Assets {
    syntax_set: SyntaxSet,
    theme: Option<Theme>,
}

static ASSETS: Lazy<Assets> = Lazy::new(|| {
    let mut themes = ThemeSet::load_defaults().themes;
    let theme = themes.remove(THEME).or_else(|| themes.into_values().next());
    Assets {
        syntax_set: SyntaxSet::load_defaults_newlines(),
        theme,
    }
});

fn syntect_color_to_ratatui(color: syntect::highlighting::Color) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

fn syntect_style(style: syntect::highlighting::Style) -> Style {
    let mut converted = Style::default().fg(syntect_color_to_ratatui(style.foreground));
    if style.font_style.contains(FontStyle::BOLD) {
        converted = converted.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        converted = converted.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        converted = converted.add_modifier(Modifier::UNDERLINED);
    }
    converted
}

/// Highlighter for one fenced block, fed line by line in order
pub struct CodeHighlighter {
    grammar: Option<HighlightLines<'static>>,
    keywords: Option<&'static Syntax>,
}

impl CodeHighlighter {
    pub fn new(language: &str) -> Self {
        let assets: &'static Assets = &ASSETS;
        let token = language.trim();
        let grammar = match &assets.theme {
            Some(theme) if !token.is_empty() => assets
                .syntax_set
                .find_syntax_by_token(token)
                .or_else(|| assets.syntax_set.find_syntax_by_extension(token))
                .map(|syntax| HighlightLines::new(syntax, theme)),
            _ => None,
        };

        Self {
            grammar,
            keywords: syntax_for(token),
        }
    }

    /// Highlight the next line of the block
    pub fn highlight(&mut self, line: &str) -> Vec<Span<'static>> {
        // the newline grammars expect every line to keep its terminator
        let source = format!("{line}\n");
        let highlighted = self
            .grammar
            .as_mut()
            .map(|grammar| grammar.highlight_line(&source, &ASSETS.syntax_set));

        match highlighted {
            Some(Ok(ranges)) => {
                return ranges
                    .into_iter()
                    .filter_map(|(style, text)| {
                        let text = text.trim_end_matches('\n');
                        (!text.is_empty())
                            .then(|| Span::styled(text.to_string(), syntect_style(style)))
                    })
                    .collect();
            }
            Some(Err(err)) => {
                warn!(error = %err, "syntax highlighting failed, using keyword fallback");
                self.grammar = None;
            }
            None => {}
        }

        match self.keywords {
            Some(syntax) => highlight_keywords(line, syntax),
            None => vec![Span::styled(line.to_string(), code_style())],
        }
    }
}

struct Syntax {
    keywords: &'static [&'static str],
    line_comment: Option<&'static str>,
    quotes: &'static [char],
}

const RUST: Syntax = Syntax {
    keywords: &[
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
        "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
        "true", "type", "unsafe", "use", "where", "while",
    ],
    line_comment: Some("//"),
    quotes: &['"'],
};

const PYTHON: Syntax = Syntax {
    keywords: &[
        "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
        "elif", "else", "except", "False", "finally", "for", "from", "global", "if", "import",
        "in", "is", "lambda", "None", "nonlocal", "not", "or", "pass", "raise", "return", "True",
        "try", "while", "with", "yield",
    ],
    line_comment: Some("#"),
    quotes: &['"', '\''],
};

const JAVASCRIPT: Syntax = Syntax {
    keywords: &[
        "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
        "delete", "do", "else", "export", "extends", "false", "finally", "for", "function", "if",
        "import", "in", "instanceof", "interface", "let", "new", "null", "return", "static",
        "super", "switch", "this", "throw", "true", "try", "type", "typeof", "undefined", "var",
        "void", "while", "yield",
    ],
    line_comment: Some("//"),
    quotes: &['"', '\'', '`'],
};

const C_FAMILY: Syntax = Syntax {
    keywords: &[
        "auto", "bool", "break", "case", "catch", "char", "class", "const", "continue", "default",
        "delete", "do", "double", "else", "enum", "extends", "false", "final", "float", "for",
        "func", "go", "if", "implements", "import", "int", "interface", "long", "namespace", "new",
        "nil", "null", "package", "private", "protected", "public", "return", "short", "static",
        "struct", "switch", "template", "this", "throw", "true", "try", "typedef", "unsigned",
        "var", "void", "while",
    ],
    line_comment: Some("//"),
    quotes: &['"', '\''],
};

const SHELL: Syntax = Syntax {
    keywords: &[
        "case", "do", "done", "echo", "elif", "else", "esac", "exit", "export", "fi", "for",
        "function", "if", "in", "local", "return", "then", "until", "while",
    ],
    line_comment: Some("#"),
    quotes: &['"', '\''],
};

const DATA: Syntax = Syntax {
    keywords: &["true", "false", "null"],
    line_comment: Some("#"),
    quotes: &['"', '\''],
};

fn syntax_for(language: &str) -> Option<&'static Syntax> {
    match language.to_ascii_lowercase().as_str() {
        "rust" | "rs" => Some(&RUST),
        "python" | "py" => Some(&PYTHON),
        "javascript" | "js" | "jsx" | "typescript" | "ts" | "tsx" => Some(&JAVASCRIPT),
        "c" | "h" | "cpp" | "c++" | "cc" | "java" | "kotlin" | "go" | "golang" | "csharp"
        | "cs" | "swift" => Some(&C_FAMILY),
        "bash" | "sh" | "shell" | "zsh" | "console" => Some(&SHELL),
        "json" | "toml" | "yaml" | "yml" => Some(&DATA),
        _ => None,
    }
}

fn code_style() -> Style {
    Style::default().fg(Color::White)
}

fn keyword_style() -> Style {
    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
}

fn string_style() -> Style {
    Style::default().fg(Color::Green)
}

fn number_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn comment_style() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC)
}

/// Keyword scan of one line, with no state carried between lines
fn highlight_keywords(line: &str, syntax: &Syntax) -> Vec<Span<'static>> {
    let chars: Vec<char> = line.chars().collect();
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut i = 0;

    let flush = |plain: &mut String, spans: &mut Vec<Span<'static>>| {
        if !plain.is_empty() {
            spans.push(Span::styled(std::mem::take(plain), code_style()));
        }
    };

    while i < chars.len() {
        let c = chars[i];

        if let Some(marker) = syntax.line_comment {
            if starts_with_at(&chars, i, marker) {
                flush(&mut plain, &mut spans);
                spans.push(Span::styled(chars[i..].iter().collect::<String>(), comment_style()));
                return spans;
            }
        }

        if syntax.quotes.contains(&c) {
            flush(&mut plain, &mut spans);
            let start = i;
            i += 1;
            while i < chars.len() {
                if chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                i += 1;
                if chars[i - 1] == c {
                    break;
                }
            }
            let end = i.min(chars.len());
            spans.push(Span::styled(chars[start..end].iter().collect::<String>(), string_style()));
            i = end;
            continue;
        }

        if c.is_alphanumeric() || c == '_' {
            let start = i;
            let numeric = c.is_ascii_digit();
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || (numeric && chars[i] == '.'))
            {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if numeric {
                flush(&mut plain, &mut spans);
                spans.push(Span::styled(word, number_style()));
            } else if syntax.keywords.contains(&word.as_str()) {
                flush(&mut plain, &mut spans);
                spans.push(Span::styled(word, keyword_style()));
            } else {
                plain.push_str(&word);
            }
            continue;
        }

        plain.push(c);
        i += 1;
    }

    flush(&mut plain, &mut spans);
    spans
}

fn starts_with_at(chars: &[char], at: usize, marker: &str) -> bool {
    let mut idx = at;
    for m in marker.chars() {
        if chars.get(idx) != Some(&m) {
            return false;
        }
        idx += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn styled(spans: &[Span<'static>]) -> Vec<(String, Style)> {
        spans
            .iter()
            .map(|span| (span.content.to_string(), span.style))
            .collect()
    }

    fn text(spans: &[Span<'static>]) -> String {
        spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn rust_goes_through_the_grammar() {
        let mut highlighter = CodeHighlighter::new("rust");
        assert!(highlighter.grammar.is_some());

        let spans = highlighter.highlight("let x = 42;");
        assert_eq!(text(&spans), "let x = 42;");
        assert!(spans.len() > 1, "got {} span(s)", spans.len());
        assert!(spans.iter().all(|span| matches!(span.style.fg, Some(Color::Rgb(..)))));
    }

    #[test]
    fn grammar_covers_languages_without_keyword_tables() {
        for (language, line) in [("python", "def hello():"), ("sql", "SELECT * FROM t;"), ("rb", "puts 'hi'")] {
            let mut highlighter = CodeHighlighter::new(language);
            let spans = highlighter.highlight(line);
            assert_eq!(text(&spans), line, "language {language}");
            assert!(spans.len() > 1, "language {language}: got {} span(s)", spans.len());
        }
    }

    #[test]
    fn no_newline_leaks_into_spans() {
        let mut highlighter = CodeHighlighter::new("rust");
        for line in ["fn main() {", "", "}"] {
            let spans = highlighter.highlight(line);
            assert_eq!(text(&spans), line);
        }
    }

    #[test]
    fn unknown_language_is_plain() {
        let mut highlighter = CodeHighlighter::new("xyzzylang99");
        assert!(highlighter.grammar.is_none());
        let spans = highlighter.highlight("hello world");
        assert_eq!(styled(&spans), vec![("hello world".to_string(), code_style())]);
    }

    #[test]
    fn missing_language_is_plain() {
        let mut highlighter = CodeHighlighter::new("");
        assert_eq!(styled(&highlighter.highlight("x = 1")), vec![("x = 1".to_string(), code_style())]);
    }

    #[test]
    fn keyword_fallback_marks_keywords_strings_and_comments() {
        let spans = highlight_keywords(r#"let name = "gem"; // greet"#, &RUST);
        assert_eq!(
            styled(&spans),
            vec![
                ("let".to_string(), keyword_style()),
                (" name = ".to_string(), code_style()),
                ("\"gem\"".to_string(), string_style()),
                ("; ".to_string(), code_style()),
                ("// greet".to_string(), comment_style()),
            ]
        );
    }

    #[test]
    fn keyword_fallback_highlights_numbers() {
        let spans = highlight_keywords("x = 3.14", &PYTHON);
        assert_eq!(
            spans.last().map(|s| (s.content.to_string(), s.style)),
            Some(("3.14".to_string(), number_style()))
        );
    }

    #[test]
    fn escaped_quote_stays_inside_string() {
        let spans = highlight_keywords(r#"print("a \" b") # done"#, &PYTHON);
        let strings: Vec<String> = spans
            .iter()
            .filter(|s| s.style == string_style())
            .map(|s| s.content.to_string())
            .collect();
        assert_eq!(strings, vec![r#""a \" b""#.to_string()]);
    }

    #[test]
    fn unterminated_string_runs_to_end_of_line() {
        let spans = highlight_keywords("echo \"oops \\", &SHELL);
        assert_eq!(spans.last().map(|s| s.content.to_string()), Some("\"oops \\".to_string()));
    }

    #[test]
    fn identifiers_containing_keywords_are_not_split() {
        let spans = highlight_keywords("letter", &RUST);
        assert_eq!(styled(&spans), vec![("letter".to_string(), code_style())]);
    }
}
