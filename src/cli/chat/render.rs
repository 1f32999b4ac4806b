use std::io::{self, Write};

use crossterm::cursor::{MoveLeft, MoveToColumn};
use crossterm::queue;
use crossterm::style::{Print, StyledContent, Stylize};
use crossterm::terminal::{Clear, ClearType};

use super::conversation_state::{Message, Role};

/// Shown after the partial text while a reply is still typing.
const TYPING_CURSOR: &str = "▌";

fn label(role: Role) -> StyledContent<&'static str> {
    match role {
        Role::Bot => "bot ".cyan().bold(),
        Role::User => "you ".green().bold(),
    }
}

pub fn print_history<W: Write>(out: &mut W, messages: &[Message]) -> io::Result<()> {
    for message in messages {
        queue!(out, Print(label(message.role)), Print(&message.text), Print("\n"))?;
    }
    out.flush()
}

pub fn show_busy<W: Write>(out: &mut W) -> io::Result<()> {
    queue!(out, Print("thinking…".dim()))?;
    out.flush()
}

pub fn clear_busy<W: Write>(out: &mut W) -> io::Result<()> {
    queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    out.flush()
}

/// Draws a Bot reply as its reveal advances.
pub struct ReplyPrinter {
    printed: usize,
}

impl ReplyPrinter {
    pub fn begin<W: Write>(out: &mut W) -> io::Result<Self> {
        queue!(out, Print(label(Role::Bot)), Print(TYPING_CURSOR), MoveLeft(1))?;
        out.flush()?;
        Ok(Self { printed: 0 })
    }

    /// Print whatever `prefix` adds beyond what is already on screen.
    pub fn update<W: Write>(&mut self, out: &mut W, prefix: &str) -> io::Result<()> {
        let delta: String = prefix.chars().skip(self.printed).collect();
        if delta.is_empty() {
            return Ok(());
        }
        self.printed += delta.chars().count();
        queue!(out, Print(delta), Print(TYPING_CURSOR), MoveLeft(1))?;
        out.flush()
    }

    /// Settle the reply: print any remainder and drop the cursor.
    pub fn finish<W: Write>(self, out: &mut W, full_text: &str) -> io::Result<()> {
        let rest: String = full_text.chars().skip(self.printed).collect();
        queue!(out, Print(rest), Clear(ClearType::UntilNewLine), Print("\n"))?;
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::chat::conversation_state::MessageId;

    fn rendered(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_history_prints_every_message_in_order() {
        let messages = vec![
            Message {
                id: MessageId(0),
                role: Role::Bot,
                text: "Hello!".to_string(),
            },
            Message {
                id: MessageId(1),
                role: Role::User,
                text: "What is X?".to_string(),
            },
        ];

        let mut buf = Vec::new();
        print_history(&mut buf, &messages).unwrap();
        let out = rendered(buf);

        let hello = out.find("Hello!").unwrap();
        let question = out.find("What is X?").unwrap();
        assert!(hello < question);
        assert!(out.contains("bot"));
        assert!(out.contains("you"));
    }

    #[test]
    fn test_reply_printer_writes_each_character_once() {
        let mut buf = Vec::new();
        let mut printer = ReplyPrinter::begin(&mut buf).unwrap();
        for prefix in ["X", "X ", "X i", "X is"] {
            printer.update(&mut buf, prefix).unwrap();
        }
        printer.update(&mut buf, "X is").unwrap();
        printer.finish(&mut buf, "X is Y").unwrap();

        let out = rendered(buf);
        assert_eq!(out.matches('Y').count(), 1);
        assert_eq!(out.matches('X').count(), 1);
        assert!(out.ends_with('\n'));
    }
}
