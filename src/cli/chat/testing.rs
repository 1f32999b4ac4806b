//! In-memory stand-ins for the history file and the answer endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::conversation_state::{Message, Role, StoredMessage};
use super::history::{decode_history, encode_history, HistoryStore};
use crate::ask_client::{AskError, QuestionAnswerer};

// ============================================================================
// Memory history store
// ============================================================================

#[derive(Default)]
struct Slot {
    raw: Option<String>,
    saves: usize,
}

/// A single storage key held in memory. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryHistoryStore {
    slot: Arc<Mutex<Slot>>,
}

impl MemoryHistoryStore {
    pub fn with_raw(raw: &str) -> Self {
        let store = Self::default();
        store.slot.lock().unwrap().raw = Some(raw.to_string());
        store
    }

    pub fn with_messages(messages: &[(Role, &str)]) -> Self {
        let stored: Vec<StoredMessage> = messages
            .iter()
            .map(|(role, text)| StoredMessage {
                role: *role,
                text: text.to_string(),
            })
            .collect();
        Self::with_raw(&serde_json::to_string(&stored).unwrap())
    }

    /// Decoded contents of the slot, empty when nothing valid is stored.
    pub fn stored(&self) -> Vec<StoredMessage> {
        self.load()
    }

    pub fn saves(&self) -> usize {
        self.slot.lock().unwrap().saves
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load(&self) -> Vec<StoredMessage> {
        let slot = self.slot.lock().unwrap();
        slot.raw
            .as_deref()
            .and_then(|raw| decode_history(raw).ok())
            .unwrap_or_default()
    }

    fn save(&self, messages: &[Message]) {
        let mut slot = self.slot.lock().unwrap();
        slot.raw = Some(encode_history(messages).unwrap());
        slot.saves += 1;
    }
}

// ============================================================================
// Mock answerer
// ============================================================================

/// Answerer that replays queued results and records every question.
#[derive(Default)]
pub struct MockAnswerer {
    responses: Mutex<VecDeque<Result<String, AskError>>>,
    questions: Mutex<Vec<String>>,
    gate: Option<Gate>,
}

/// Holds each call open until the test releases it.
pub struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl MockAnswerer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose calls block until `release` is notified.
    pub fn gated() -> (Self, Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mock = Self {
            gate: Some(Gate {
                started: Arc::clone(&started),
                release: Arc::clone(&release),
            }),
            ..Self::default()
        };
        (mock, started, release)
    }

    pub fn queue_answer(&self, answer: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(answer.to_string()));
    }

    pub fn queue_error(&self, error: AskError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionAnswerer for MockAnswerer {
    async fn ask(&self, question: &str) -> Result<String, AskError> {
        self.questions.lock().unwrap().push(question.to_string());

        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AskError::MissingAnswer))
    }
}
