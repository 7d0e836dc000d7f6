use crate::error::CompletionError;
use crate::events::AppEvent;
use crate::llm::CompletionClient;
use crate::session::ChatSession;
use crate::ui::conversation::composer::ConversationResult;
use crate::ui::conversation::{
    ConversationComposer, HistoryView, ParsedCommand, PendingIndicator, SlashCommand,
};
use crossterm::event::KeyEvent;
use ratatui::{buffer::Buffer, layout::Rect, widgets::Widget};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const PLACEHOLDER: &str = "Ask me anything...";

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    Exit,
    ShowHelp,
}

/// Owns the chat session and drives it from keyboard input.
///
/// Completion requests run on their own task and report back through the
/// app event channel as [`AppEvent::CompletionFinished`].
pub struct ConversationManager {
    session: ChatSession,
    client: CompletionClient,
    composer: ConversationComposer,
    events: mpsc::UnboundedSender<AppEvent>,
    scroll_back: usize,
    max_scroll_back: usize,
    seen_revision: u64,
    frame: usize,
}

impl ConversationManager {
    pub fn new(client: CompletionClient, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            session: ChatSession::new(),
            client,
            composer: ConversationComposer::new(PLACEHOLDER),
            events,
            scroll_back: 0,
            max_scroll_back: 0,
            seen_revision: 0,
            frame: 0,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn composer(&self) -> &ConversationComposer {
        &self.composer
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn is_busy(&self) -> bool {
        self.session.is_busy()
    }

    pub fn scroll_back(&self) -> usize {
        self.scroll_back
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        match self.composer.handle_key(key) {
            ConversationResult::Submitted(input) => {
                self.submit(&input);
                ConversationAction::None
            }
            ConversationResult::Command(command) => self.handle_slash_command(command),
            ConversationResult::None => ConversationAction::None,
        }
    }

    pub fn paste(&mut self, text: &str) {
        self.composer.paste(text);
    }

    /// Start a completion for `input`. Returns false when the session refused it.
    pub fn submit(&mut self, input: &str) -> bool {
        let submission = match self.session.begin(input) {
            Ok(submission) => submission,
            Err(rejected) => {
                debug!(?rejected, "submission not started");
                return false;
            }
        };
        self.sync_composer();

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = client.try_complete(&submission.prompt).await;
            let finished = AppEvent::CompletionFinished {
                epoch: submission.epoch,
                outcome,
            };
            if events.send(finished).is_err() {
                debug!("event loop gone, dropping completion");
            }
        });

        true
    }

    /// Apply a finished completion to the session
    pub fn on_completion(&mut self, epoch: u64, outcome: &Result<String, CompletionError>) {
        self.session.finish(epoch, outcome);
        self.sync_composer();
    }

    /// Empty the conversation. The composer keeps whatever is being typed.
    pub fn clear(&mut self) {
        info!(messages = self.session.conversation().len(), "clearing conversation");
        self.session.clear();
        self.scroll_back = 0;
    }

    pub fn tick(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll_back = (self.scroll_back + rows).min(self.max_scroll_back);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(rows);
    }

    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        if let Some(argument) = &command.argument {
            warn!(command = command.command.command(), %argument, "ignoring command argument");
        }
        match command.command {
            SlashCommand::Clear => {
                self.clear();
                ConversationAction::None
            }
            SlashCommand::Help => ConversationAction::ShowHelp,
            SlashCommand::Bye => ConversationAction::Exit,
        }
    }

    fn sync_composer(&mut self) {
        self.composer.set_enabled(!self.session.is_busy());
    }

    fn history_view(&self) -> HistoryView<'_> {
        let pending = self
            .session
            .is_busy()
            .then(|| PendingIndicator::new(self.frame));
        HistoryView::new(self.session.conversation().snapshot())
            .failed(self.session.failed_replies())
            .pending(pending)
            .scroll_back(self.scroll_back)
    }

    /// Render the transcript, jumping to the newest message whenever the
    /// conversation changed since the last frame.
    pub fn render_history(&mut self, area: Rect, buf: &mut Buffer) {
        let revision = self.session.conversation().revision();
        if revision != self.seen_revision {
            self.seen_revision = revision;
            self.scroll_back = 0;
        }

        self.max_scroll_back = self.history_view().max_scroll_back(area);
        self.scroll_back = self.scroll_back.min(self.max_scroll_back);
        self.history_view().render(area, buf);
    }

    pub fn render_composer(&self, area: Rect, buf: &mut Buffer) {
        self.composer.render(area, buf);
    }
}
