pub mod conversation_state;
pub mod coordinator;
pub mod history;
pub mod prompt;
pub mod render;
pub mod reveal;
#[cfg(test)]
pub mod testing;

use std::io::Write;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::task::Poll;
use std::time::Duration;

use color_print::cstr;
use conversation_state::{ConversationState, MessageId};
use coordinator::{RequestCoordinator, SubmitOutcome};
use eyre::Result;
use futures::StreamExt;
use history::{FileHistoryStore, HistoryStore};
use render::ReplyPrinter;
use tracing::{debug, info};

use crate::ask_client::{AskClient, QuestionAnswerer};
use crate::config::ChatConfig;

const WELCOME_TEXT: &str = cstr!(
    "
<bold>AI Assistant</> <dim>Your professional co-pilot</>

Ask me anything. Your conversation is kept between sessions.

<cyan>/help</>         Show the help dialogue
<cyan>/quit</>         Quit the application
"
);

const HELP_TEXT: &str = cstr!(
    "
<bold>AI Assistant</>

<cyan>/clear</>        Start over from the greeting
<cyan>/help</>         Show this help dialogue
<cyan>/quit</>         Quit the application
"
);

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    coordinator: Arc<RequestCoordinator>,
}

impl ChatContext {
    /// Wire the HTTP client and the history file from `config`.
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        config: &ChatConfig,
    ) -> Result<Self> {
        let answerer = AskClient::new(config)?;
        info!("Using endpoint {}", answerer.endpoint());

        let history = FileHistoryStore::new(&config.history_path);
        debug!("Chat history at {}", history.path().display());

        Ok(Self::with_ports(
            output,
            input,
            interactive,
            Arc::new(answerer),
            Arc::new(history),
            config.reveal_interval,
        ))
    }

    pub fn with_ports(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        answerer: Arc<dyn QuestionAnswerer>,
        history: Arc<dyn HistoryStore>,
        reveal_interval: Duration,
    ) -> Self {
        let conversation = ConversationState::hydrate(history, reveal_interval);
        let coordinator = RequestCoordinator::new(Arc::new(Mutex::new(conversation)), answerer);

        Self {
            output,
            input,
            interactive,
            coordinator: Arc::new(coordinator),
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        if self.interactive {
            self.print_welcome()?;
        }

        let result = self.session().await;
        self.coordinator.conversation().shutdown();
        result?;

        Ok(ExitCode::SUCCESS)
    }

    async fn session(&mut self) -> Result<()> {
        // Handle non-interactive mode (single question)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(());
        }

        if self.interactive {
            self.run_interactive().await?;
        }
        Ok(())
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        let conversation = self.coordinator.conversation();
        render::print_history(&mut self.output, conversation.messages())?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            match rl.readline(prompt::PROMPT) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(e) => {
                    debug!("Prompt closed: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        match input.trim() {
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                let mut conversation = self.coordinator.conversation();
                conversation.reset();
                writeln!(self.output, "Conversation cleared.")?;
                render::print_history(&mut self.output, conversation.messages())?;
            }
            _ => self.ask(input).await?,
        }

        Ok(())
    }

    async fn ask(&mut self, question: &str) -> Result<()> {
        let mut pending = question.to_string();
        let coordinator = Arc::clone(&self.coordinator);

        let submit = coordinator.submit(&mut pending);
        tokio::pin!(submit);
        let outcome = match futures::poll!(&mut submit) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => {
                // Indicator only while the request flag is held.
                let busy = coordinator.is_busy();
                if busy {
                    render::show_busy(&mut self.output)?;
                }
                let outcome = submit.await;
                if busy {
                    render::clear_busy(&mut self.output)?;
                }
                outcome
            }
        };

        match outcome.bot_message() {
            Some(id) => self.play_reply(id).await?,
            None if outcome == SubmitOutcome::Busy => {
                debug!("Dropped input while a request is outstanding")
            }
            None => {}
        }
        Ok(())
    }

    /// Type out the reply for as long as the conversation says it is revealing.
    async fn play_reply(&mut self, id: MessageId) -> Result<()> {
        let stream = self.coordinator.conversation().take_reveal_stream();

        let mut printer = ReplyPrinter::begin(&mut self.output)?;
        if let Some(mut stream) = stream {
            while stream.next().await.is_some() {
                let (shown, revealing) = {
                    let conversation = self.coordinator.conversation();
                    (
                        conversation.current_text(id).unwrap_or_default(),
                        conversation.is_revealing(id),
                    )
                };
                printer.update(&mut self.output, &shown)?;
                if !revealing {
                    break;
                }
            }
        }

        let settled = self.coordinator.conversation().current_text(id).unwrap_or_default();
        printer.finish(&mut self.output, &settled)?;
        Ok(())
    }
}
