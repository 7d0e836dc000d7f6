use crate::config::Config;
use crate::events::AppEvent;
use crate::llm::CompletionClient;
use crate::tui::{self, EventHandler, Tui};
use crate::ui;
use crate::ui::conversation::{ConversationAction, ConversationManager};
use crate::ui::welcome::WelcomePanel;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

const PAGE_ROWS: usize = 10;
const WHEEL_ROWS: usize = 3;

/// Top-level state for the chat screen
pub struct App {
    pub manager: ConversationManager,
    pub welcome: WelcomePanel,
    pub show_welcome: bool,
    pub show_help: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        config: &Config,
        client: CompletionClient,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let hint = (!config.has_api_key()).then(|| ui::missing_key_hint(&config.api_key_env));
        Self {
            manager: ConversationManager::new(client, events),
            welcome: WelcomePanel::new(hint),
            show_welcome: config.ui.show_welcome,
            show_help: false,
            should_quit: false,
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Key(key) => self.handle_key(key),
            AppEvent::Mouse(mouse) => self.handle_mouse(mouse),
            AppEvent::Paste(text) => self.manager.paste(&text),
            AppEvent::Resize(width, height) => debug!(width, height, "terminal resized"),
            AppEvent::Tick => self.manager.tick(),
            AppEvent::CompletionFinished { epoch, outcome } => {
                self.manager.on_completion(epoch, &outcome)
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('l') if ctrl => self.manager.clear(),
            _ if self.show_help => {
                // any other key just dismisses the popup
                self.show_help = false;
            }
            KeyCode::PageUp => self.manager.scroll_up(PAGE_ROWS),
            KeyCode::PageDown => self.manager.scroll_down(PAGE_ROWS),
            _ => match self.manager.handle_key(key) {
                ConversationAction::None => {}
                ConversationAction::ShowHelp => self.show_help = true,
                ConversationAction::Exit => self.should_quit = true,
            },
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => self.manager.scroll_up(WHEEL_ROWS),
            MouseEventKind::ScrollDown => self.manager.scroll_down(WHEEL_ROWS),
            _ => {}
        }
    }

    async fn event_loop(&mut self, terminal: &mut Tui, events: &mut EventHandler) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| ui::render(self, frame))?;
            match events.next().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
        Ok(())
    }
}

/// Run the interactive chat until the user quits
pub async fn run(config: Config) -> Result<()> {
    let client = CompletionClient::new(config.clone())?;
    let mut events = EventHandler::new(Duration::from_millis(config.ui.tick_rate_ms));
    let mut app = App::new(&config, client, events.sender());

    info!(model = %config.model, has_key = config.has_api_key(), "starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = app.event_loop(&mut terminal, &mut events).await;
    tui::restore()?;

    info!(
        messages = app.manager.session().conversation().len(),
        "chat closed"
    );
    result
}
