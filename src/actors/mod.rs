//! Mailbox-driven actors around the gateway task.
//!
//! Each actor drains its own bounded mailbox with a short receive timeout
//! and stops once the shared cancel flag is set or every sender is gone.

pub mod display;
pub mod output;
pub mod terminal;
pub mod terminal_proto;
pub mod ticker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Receive window of every actor loop.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(50);

pub use display::{ConsoleSink, DisplayActor, DisplaySink, Screen};
pub use output::{LoggingPins, OutputActor, OutputPins};
pub use terminal::{TerminalActor, spawn_reader};
pub use terminal_proto::{TerminalCommand, TerminalProto};
pub use ticker::ViewTicker;

pub(crate) enum Recv<M> {
    Message(M),
    Idle,
    Closed,
}

/// Wait up to `window` for the next message.
pub(crate) async fn recv_within<M>(rx: &mut mpsc::Receiver<M>, window: Duration) -> Recv<M> {
    match tokio::time::timeout(window, rx.recv()).await {
        Ok(Some(message)) => Recv::Message(message),
        Ok(None) => Recv::Closed,
        Err(_) => Recv::Idle,
    }
}

pub(crate) fn is_cancelled(cancel: &Arc<AtomicBool>) -> bool {
    cancel.load(Ordering::Relaxed)
}
