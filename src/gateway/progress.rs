//! Shows driver progress on the display while the modem boots.

use crate::actors::RECV_TIMEOUT;
use crate::gsm::ModemProgress;
use crate::literals::display;
use crate::messages::{DisplayKind, DisplayMessage, Mailbox};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Turns progress events into status lines and a step counter.
pub struct ProgressView {
    display: Mailbox<DisplayMessage>,
    step: i32,
}

impl ProgressView {
    pub fn new(display: Mailbox<DisplayMessage>) -> Self {
        Self { display, step: 0 }
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    pub fn handle(&mut self, progress: ModemProgress) {
        match progress {
            ModemProgress::HwInit => {
                self.step = 0;
                self.display.post(DisplayMessage::status(display::HW_INIT, true));
            }
            ModemProgress::Wait => {
                self.display.post(DisplayMessage::status(display::WAIT, false));
            }
            ModemProgress::Ping | ModemProgress::Gnss => {
                self.step += 1;
                self.display.post(DisplayMessage::new(DisplayKind::Number, "", self.step));
            }
            ModemProgress::Rx | ModemProgress::Tx => {}
        }
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<ModemProgress>, cancel: Arc<AtomicBool>) {
        while !cancel.load(Ordering::Relaxed) {
            match tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await {
                Ok(Some(progress)) => self.handle(progress),
                Ok(None) => break,
                Err(_) => {}
            }
        }
        debug!("Progress view stopped");
    }
}
