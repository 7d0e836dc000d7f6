use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Empty the conversation
    Clear,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Clear => "clear the conversation",
            SlashCommand::Help => "show available commands and keys",
            SlashCommand::Bye => "exit NovaGem",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?.to_lowercase();
    let tail: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "c" | "cls" | "reset" => Some(SlashCommand::Clear),
        "h" | "?" => Some(SlashCommand::Help),
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        _ => None,
    })?;

    let argument = if tail.is_empty() {
        None
    } else {
        Some(tail.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Help text for all available commands and keys
pub fn get_help_text() -> String {
    let mut help = String::from("Commands:\n");
    for entry in command_entries() {
        help.push_str(&format!("  /{:<8} {}\n", entry.keyword, entry.description));
    }
    help.push_str("\nAliases: /c for /clear, /h for /help, /q /quit /exit for /bye\n");
    help.push_str("\nKeys:\n");
    help.push_str("  Enter          send message\n");
    help.push_str("  Shift+Enter    new line\n");
    help.push_str("  Ctrl+L         clear the conversation\n");
    help.push_str("  PgUp / PgDn    scroll the conversation\n");
    help.push_str("  Esc            close this help\n");
    help.push_str("  Ctrl+C         quit");
    help
}
