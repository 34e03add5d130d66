//! Messages exchanged between the gateway and its actors.
//!
//! Every actor owns one bounded mailbox. Producers post without blocking;
//! a full mailbox drops the message.

use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Width of one display line.
pub const SHORT_TEXT_LEN: usize = 11;

/// Text that fits one display line, truncated on construction.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ShortText(heapless::String<SHORT_TEXT_LEN>);

impl ShortText {
    pub fn new(text: &str) -> Self {
        let mut inner = heapless::String::new();
        for c in text.chars() {
            if inner.push(c).is_err() {
                break;
            }
        }
        Self(inner)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ShortText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for ShortText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ShortText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Sending half of an actor mailbox.
#[derive(Debug)]
pub struct Mailbox<M> {
    name: &'static str,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<M: fmt::Debug> Mailbox<M> {
    /// Create a mailbox holding at most `capacity` messages.
    pub fn channel(name: &'static str, capacity: usize) -> (Self, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { name, tx }, rx)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Post without waiting. Returns false when the message was dropped.
    pub fn post(&self, message: M) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!("{} mailbox full, dropping {:?}", self.name, message);
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!("{} mailbox closed, dropping {:?}", self.name, message);
                false
            }
        }
    }
}

/// Inbound work for the gateway task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayMessage {
    /// Run one diagnostic view step (0 to 6).
    View(u8),
    /// Last rendered output state.
    State(ShortText),
}

/// Requests for the output actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMessage {
    WriteOne { pin: u32, on: bool },
    WriteAllOff,
    /// Render the state to the display and the gateway.
    ReadAll,
    /// Answer the terminal with the output bit mask.
    ReadAllTerminal,
    /// Clear all outputs and acknowledge to the terminal.
    WriteAllOffTerminal,
}

/// Display line or control selected by a [`DisplayMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    Init,
    Signal,
    Provider,
    CallerId,
    Date,
    Time,
    Status,
    Number,
    BacklightOn,
    BacklightOff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub kind: DisplayKind,
    pub text: ShortText,
    pub value: i32,
}

impl DisplayMessage {
    pub fn new(kind: DisplayKind, text: &str, value: i32) -> Self {
        Self {
            kind,
            text: ShortText::new(text),
            value,
        }
    }

    pub fn control(kind: DisplayKind) -> Self {
        Self::new(kind, "", 0)
    }

    /// Status log line; `init` clears the log first.
    pub fn status(text: &str, init: bool) -> Self {
        Self::new(DisplayKind::Status, text, if init { 0 } else { 1 })
    }
}

/// Input for the terminal actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMessage {
    /// One byte from the terminal line.
    Receive(u8),
    /// Modem clock, unix seconds.
    RtcSet(i64),
    ClearAllAck(u32),
    ReadAllAck(u32),
}

/// Control for the view ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerCommand {
    Start,
    Stop,
    /// Restart the cycle at step 0 with the fast period.
    Clear,
}

/// Queued outbound SMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRequest {
    pub destination: String,
    pub body: String,
}

impl SmsRequest {
    pub fn new(destination: &str, body: impl Into<String>) -> Self {
        Self {
            destination: destination.to_string(),
            body: body.into(),
        }
    }
}
