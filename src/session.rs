use crate::framer::{DATA_END, LINE_END};
use crate::sink::Envelope;

/// Where a connection stands in the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Connected, no HELO yet.
    AwaitingGreeting,
    /// Greeted; idle or somewhere inside a transaction.
    Command,
    /// Collecting a message body after `354`.
    Data,
    /// QUIT accepted, the connection is about to close.
    Quit,
}

/// Per-connection transaction state.
#[derive(Debug)]
pub struct SmtpSession {
    pub mode: Mode,
    pub greeting: Option<String>,
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub body: String,
}

impl Default for SmtpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpSession {
    pub fn new() -> Self {
        Self {
            mode: Mode::AwaitingGreeting,
            greeting: None,
            sender: None,
            recipients: Vec::new(),
            body: String::new(),
        }
    }

    /// Terminator the next read has to wait for.
    pub fn terminator(&self) -> &'static [u8] {
        match self.mode {
            Mode::Data => DATA_END,
            _ => LINE_END,
        }
    }

    /// Drops the current transaction. The greeting survives.
    pub fn reset(&mut self) {
        self.mode = if self.greeting.is_some() {
            Mode::Command
        } else {
            Mode::AwaitingGreeting
        };
        self.sender = None;
        self.recipients.clear();
        self.body.clear();
    }

    /// Moves sender, recipients and body out into an [`Envelope`] and
    /// resets the transaction.
    pub fn take_envelope(&mut self) -> Envelope {
        let envelope = Envelope {
            sender: self.sender.take().unwrap_or_default(),
            recipients: std::mem::take(&mut self.recipients),
            body: std::mem::take(&mut self.body),
        };
        self.reset();
        envelope
    }

    pub fn is_quit(&self) -> bool {
        self.mode == Mode::Quit
    }
}
