use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::history::HistoryStore;
use super::reveal::{RevealEngine, RevealStream};

pub const GREETING: &str =
    "Hello! I am your AI Assistant. How can I help you with your professional questions today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

/// Sequence number assigned when a message enters the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
}

/// On-disk form of a message. Ids are session-local and not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(rename = "message")]
    pub text: String,
}

impl From<&Message> for StoredMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            text: message.text.clone(),
        }
    }
}

/// The ordered conversation plus the rule for which message is still typing.
///
/// Only a Bot message appended during this session can reveal, and only the
/// newest one. Everything loaded from history, seeded, or superseded reads
/// as its full text.
pub struct ConversationState {
    messages: Vec<Message>,
    next_id: u64,
    history: Arc<dyn HistoryStore>,
    reveal: RevealEngine,
    reveal_interval: Duration,
    /// Message the reveal engine is currently bound to.
    revealing: Option<MessageId>,
    pending_stream: Option<RevealStream>,
}

impl ConversationState {
    /// Load persisted history, or seed the greeting when there is none.
    pub fn hydrate(history: Arc<dyn HistoryStore>, reveal_interval: Duration) -> Self {
        let stored = history.load();
        let mut state = Self {
            messages: Vec::with_capacity(stored.len().max(1)),
            next_id: 0,
            history,
            reveal: RevealEngine::new(),
            reveal_interval,
            revealing: None,
            pending_stream: None,
        };

        if stored.is_empty() {
            state.seed();
        } else {
            debug!("Restored {} messages", stored.len());
            for message in stored {
                state.push(message.role, message.text);
            }
        }
        state
    }

    fn seed(&mut self) {
        self.push(Role::Bot, GREETING.to_string());
        self.persist();
    }

    fn push(&mut self, role: Role, text: String) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message { id, role, text });
        id
    }

    fn persist(&self) {
        self.history.save(&self.messages);
    }

    /// Append a message and mirror the new list to history.
    ///
    /// A Bot message becomes the reveal target, replacing any reveal still
    /// running. Requires a tokio runtime for non-empty Bot text.
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> MessageId {
        let text = text.into();
        let id = self.push(role, text);

        if role == Role::Bot {
            let text = &self.messages[self.messages.len() - 1].text;
            let stream = self.reveal.start(text, self.reveal_interval);
            self.revealing = Some(id);
            self.pending_stream = Some(stream);
        }

        self.persist();
        id
    }

    pub fn append_user(&mut self, text: impl Into<String>) -> MessageId {
        self.append(Role::User, text)
    }

    pub fn append_bot(&mut self, text: impl Into<String>) -> MessageId {
        self.append(Role::Bot, text)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        // Ids are assigned in push order, so the list is sorted by id.
        self.messages
            .binary_search_by_key(&id, |message| message.id)
            .ok()
            .map(|index| &self.messages[index])
    }

    pub fn latest_bot_id(&self) -> Option<MessageId> {
        self.messages
            .iter()
            .filter(|message| message.role == Role::Bot)
            .map(|message| message.id)
            .max()
    }

    pub fn is_revealing(&self, id: MessageId) -> bool {
        self.revealing == Some(id)
            && self.latest_bot_id() == Some(id)
            && self.reveal.is_active()
    }

    /// What the message shows right now: the typed prefix while revealing,
    /// the full text otherwise.
    pub fn current_text(&self, id: MessageId) -> Option<String> {
        let message = self.get(id)?;
        if self.is_revealing(id) {
            if let Some(reveal) = self.reveal.current() {
                return Some(reveal.prefix());
            }
        }
        Some(message.text.clone())
    }

    /// Hand the live prefix stream of the newest reveal to a renderer.
    pub fn take_reveal_stream(&mut self) -> Option<RevealStream> {
        self.pending_stream.take()
    }

    /// Drop the whole conversation back to the greeting.
    pub fn reset(&mut self) {
        self.stop_reveal();
        self.messages.clear();
        self.seed();
    }

    /// Cancel any running reveal; the message then reads as fully shown.
    pub fn shutdown(&mut self) {
        self.stop_reveal();
    }

    fn stop_reveal(&mut self) {
        self.reveal.cancel();
        self.revealing = None;
        self.pending_stream = None;
    }
}

impl Drop for ConversationState {
    fn drop(&mut self) {
        self.stop_reveal();
    }
}
