use crate::error::CompletionError;

/// Everything the main loop reacts to
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Key press (releases are filtered out by the reader)
    Key(crossterm::event::KeyEvent),

    /// Mouse event
    Mouse(crossterm::event::MouseEvent),

    /// Bracketed paste
    Paste(String),

    /// Terminal resize
    Resize(u16, u16),

    /// Animation tick
    Tick,

    /// A completion request finished (successfully or not)
    CompletionFinished {
        epoch: u64,
        outcome: Result<String, CompletionError>,
    },
}
