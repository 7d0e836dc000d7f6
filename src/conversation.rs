//! In-memory conversation store

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "NovaGem",
        }
    }
}

/// One turn in the conversation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered, append-only list of messages for the lifetime of the process.
///
/// The only way to remove anything is [`Conversation::clear`]. Every mutation
/// bumps [`Conversation::revision`], which renderers poll to decide when to
/// snap back to the newest message.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    revision: u64,
}

impl Conversation {
    /// Add a message to the end of the conversation
    pub fn append(&mut self, message: Message) {
        debug!(role = ?message.role(), len = message.content().len(), "appending message");
        self.messages.push(message);
        self.revision += 1;
    }

    /// Drop every message
    pub fn clear(&mut self) {
        debug!(dropped = self.messages.len(), "clearing conversation");
        self.messages.clear();
        self.revision += 1;
    }

    /// Current messages in insertion order
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
