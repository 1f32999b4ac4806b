use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info};

use super::conversation_state::{ConversationState, MessageId};
use crate::ask_client::QuestionAnswerer;

pub const FALLBACK_ANSWER: &str = "Sorry, something went wrong. Please try again.";

/// What became of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// Another request is still outstanding; nothing happened.
    Busy,
    /// The endpoint answered; the id is the new Bot message.
    Answered(MessageId),
    /// The call failed and the fallback Bot message was appended.
    Failed(MessageId),
}

impl SubmitOutcome {
    pub fn bot_message(self) -> Option<MessageId> {
        match self {
            Self::Answered(id) | Self::Failed(id) => Some(id),
            Self::Ignored | Self::Busy => None,
        }
    }
}

/// Clears the in-flight flag however the request ends, including when the
/// submitting future is dropped mid-call.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Serializes user submissions against the answer endpoint.
///
/// Each accepted submission appends exactly one User message and then
/// exactly one Bot message, and at most one submission is in flight.
pub struct RequestCoordinator {
    conversation: Arc<Mutex<ConversationState>>,
    answerer: Arc<dyn QuestionAnswerer>,
    in_flight: AtomicBool,
}

impl RequestCoordinator {
    pub fn new(
        conversation: Arc<Mutex<ConversationState>>,
        answerer: Arc<dyn QuestionAnswerer>,
    ) -> Self {
        Self {
            conversation,
            answerer,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn conversation(&self) -> MutexGuard<'_, ConversationState> {
        self.conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit the contents of `input`.
    ///
    /// Blank input and submissions made while busy leave `input` untouched.
    /// An accepted submission empties `input` and never returns an error:
    /// failures become the fallback reply.
    pub async fn submit(&self, input: &mut String) -> SubmitOutcome {
        if input.trim().is_empty() {
            return SubmitOutcome::Ignored;
        }

        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            debug!("Ignoring submission while a request is outstanding");
            return SubmitOutcome::Busy;
        };

        let question = std::mem::take(input);
        self.conversation().append_user(question.as_str());

        info!("Asking: {:?}", question);
        let result = self.answerer.ask(&question).await;

        // Dropped before `_in_flight`, so the reply lands before the flag clears.
        let mut conversation = self.conversation();
        match result {
            Ok(answer) => SubmitOutcome::Answered(conversation.append_bot(answer)),
            Err(e) => {
                error!("Error fetching response: {}", e);
                SubmitOutcome::Failed(conversation.append_bot(FALLBACK_ANSWER))
            }
        }
    }
}
