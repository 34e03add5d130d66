//! Terminal actor: answers requests from the wired terminal line.

use super::terminal_proto::{TerminalCommand, TerminalProto, make_response};
use super::{RECV_TIMEOUT, Recv, is_cancelled, recv_within};
use crate::messages::{Mailbox, OutputMessage, TerminalMessage};
use chrono::DateTime;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Wall clock derived from the last modem time.
#[derive(Debug, Clone, Copy)]
struct TimeBase {
    unix: i64,
    at: Instant,
}

impl TimeBase {
    fn now(&self) -> i64 {
        self.unix + self.at.elapsed().as_secs() as i64
    }
}

pub struct TerminalActor<W: Write + Send> {
    proto: TerminalProto,
    time_base: Option<TimeBase>,
    output: Mailbox<OutputMessage>,
    writer: W,
}

impl<W: Write + Send> TerminalActor<W> {
    pub fn new(output: Mailbox<OutputMessage>, writer: W) -> Self {
        Self {
            proto: TerminalProto::new(),
            time_base: None,
            output,
            writer,
        }
    }

    /// Current unix time, once the modem clock has been received.
    pub fn now(&self) -> Option<i64> {
        self.time_base.map(|base| base.now())
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn respond(&mut self, command: TerminalCommand, value: Option<&str>) {
        let frame = make_response(command, value, self.proto.is_checksum_required());
        debug!("Terminal response: {frame}");
        let result = write!(self.writer, "{frame}\r\n").and_then(|()| self.writer.flush());
        if let Err(e) = result {
            warn!("Terminal write failed: {e}");
        }
    }

    fn on_request(&mut self) {
        let Some(command) = self.proto.command() else {
            return;
        };
        match command {
            TerminalCommand::Time => {
                let value = self.now().map(|t| t.to_string());
                self.respond(command, value.as_deref());
            }
            TerminalCommand::AsciiTime => {
                let value = self
                    .now()
                    .and_then(|t| DateTime::from_timestamp(t, 0))
                    .map(|t| t.format("%H:%M:%S %d.%m.%Y").to_string());
                self.respond(command, value.as_deref());
            }
            TerminalCommand::Read => {
                self.output.post(OutputMessage::ReadAllTerminal);
            }
            TerminalCommand::Clear => {
                self.output.post(OutputMessage::WriteAllOffTerminal);
            }
        }
    }

    pub fn handle(&mut self, message: TerminalMessage) {
        match message {
            TerminalMessage::Receive(byte) => {
                if self.proto.parse(byte) {
                    self.on_request();
                }
            }
            TerminalMessage::RtcSet(unix) => {
                self.time_base = Some(TimeBase {
                    unix,
                    at: Instant::now(),
                });
            }
            TerminalMessage::ClearAllAck(value) => {
                self.respond(TerminalCommand::Clear, Some(&value.to_string()));
            }
            TerminalMessage::ReadAllAck(value) => {
                self.respond(TerminalCommand::Read, Some(&value.to_string()));
            }
        }
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<TerminalMessage>, cancel: Arc<AtomicBool>) {
        while !is_cancelled(&cancel) {
            match recv_within(&mut rx, RECV_TIMEOUT).await {
                Recv::Message(message) => self.handle(message),
                Recv::Idle => {}
                Recv::Closed => break,
            }
        }
        debug!("Terminal actor stopped");
    }
}

/// Read the terminal line on its own thread, one mailbox message per byte.
pub fn spawn_reader<R>(mut reader: R, mailbox: Mailbox<TerminalMessage>, cancel: Arc<AtomicBool>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = [0u8; 64];
        while !is_cancelled(&cancel) {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    for &byte in &buf[..n] {
                        mailbox.post(TerminalMessage::Receive(byte));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
                Err(e) => {
                    warn!("Terminal read failed: {e}");
                    break;
                }
            }
        }
        debug!("Terminal reader stopped");
    })
}
