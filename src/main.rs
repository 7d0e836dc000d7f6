use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

mod app;
mod config;
mod conversation;
mod error;
mod events;
mod llm;
mod session;
mod tui;
mod ui;

use config::Config;
use llm::CompletionClient;
use session::ChatSession;

#[derive(Parser)]
#[command(name = "novagem")]
#[command(version)]
#[command(about = "Chat with Google's Gemini models from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Model to use instead of the configured one
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Config file to read instead of ~/.novagem/config.toml
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,
    /// Send one prompt and print the reply
    Ask {
        /// Prompt text; read from stdin when omitted
        prompt: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(model) = cli.model {
        config.model = model;
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            config.ensure_home()?;
            setup_file_tracing(&config, cli.verbose)?;
            info!(version = env!("CARGO_PKG_VERSION"), "novagem starting");
            app::run(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ask { prompt } => {
            setup_stderr_tracing(cli.verbose);
            ask(config, prompt).await
        }
    }
}

async fn ask(config: Config, words: Vec<String>) -> Result<ExitCode> {
    let prompt = if words.is_empty() && !std::io::stdin().is_terminal() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read prompt from stdin")?;
        input
    } else {
        words.join(" ")
    };

    let client = CompletionClient::new(config)?;
    answer(&client, &prompt).await
}

/// Print the reply to stdout, or the error report to stderr with a failing
/// exit code
async fn answer(client: &CompletionClient, prompt: &str) -> Result<ExitCode> {
    let mut session = ChatSession::new();
    let outcome = session
        .submit(client, prompt)
        .await
        .map_err(|rejected| anyhow!("Nothing to ask: {rejected}"))?;

    match outcome {
        Ok(text) => {
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{}", err.to_message_content());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// `NOVAGEM_LOG` first, then `RUST_LOG`, then `quiet` (or debug with `--verbose`)
fn env_filter(verbose: bool, quiet: &str) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    EnvFilter::try_from_env("NOVAGEM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| {
            if verbose {
                EnvFilter::new("novagem=debug")
            } else {
                EnvFilter::new(quiet)
            }
        })
}

/// The TUI owns the terminal, so logs go to `~/.novagem/novagem.log`
fn setup_file_tracing(config: &Config, verbose: bool) -> Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_path = config.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter(verbose, "novagem=info"))
        .with(file_layer)
        .init();

    info!(path = %log_path.display(), "tracing initialized");
    Ok(())
}

fn setup_stderr_tracing(verbose: bool) {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter(verbose, "novagem=warn"))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tests::{MockTransport, keyed_config};

    #[test]
    fn cli_defaults_to_chat() {
        let cli = Cli::parse_from(["novagem"]);
        assert!(cli.command.is_none());
        assert!(cli.model.is_none());
    }

    #[test]
    fn ask_collects_words_and_global_flags() {
        let cli = Cli::parse_from(["novagem", "ask", "--model", "gemini-pro", "what", "is", "rust"]);
        assert_eq!(cli.model.as_deref(), Some("gemini-pro"));
        match cli.command {
            Some(Commands::Ask { prompt }) => assert_eq!(prompt, vec!["what", "is", "rust"]),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    fn exit_code(code: ExitCode) -> String {
        format!("{code:?}")
    }

    #[tokio::test]
    async fn reply_text_starting_with_error_still_succeeds() {
        let transport = MockTransport::ok("Error: is a prefix many loggers use.");
        let client = CompletionClient::with_transport(keyed_config(), transport);

        let code = answer(&client, "what prefix").await.unwrap();

        assert_eq!(exit_code(code), exit_code(ExitCode::SUCCESS));
    }

    #[tokio::test]
    async fn failed_completion_exits_with_failure() {
        let transport = MockTransport::status(503, r#"{"error":{"message":"overloaded"}}"#);
        let client = CompletionClient::with_transport(keyed_config(), transport);

        let code = answer(&client, "hello").await.unwrap();

        assert_eq!(exit_code(code), exit_code(ExitCode::FAILURE));
    }

    #[tokio::test]
    async fn blank_prompt_is_refused() {
        let transport = MockTransport::ok("unused");
        let client = CompletionClient::with_transport(keyed_config(), transport.clone());

        assert!(answer(&client, "  \n").await.is_err());
        assert_eq!(transport.calls(), 0);
    }
}
