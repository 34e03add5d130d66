//! Periodic view-step ticks for the gateway.

use super::{RECV_TIMEOUT, Recv, is_cancelled, recv_within};
use crate::messages::{GatewayMessage, Mailbox, TickerCommand};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// Last view step of a cycle.
pub const LAST_VIEW_STEP: u8 = 6;

/// Emits `View(0..=6)` round robin. The first cycle after `Clear` runs at
/// the fast period, later ones at the slow period.
pub struct ViewTicker {
    gateway: Mailbox<GatewayMessage>,
    fast: Duration,
    slow: Duration,
    running: bool,
    initial: bool,
    step: u8,
    next: Instant,
}

impl ViewTicker {
    pub fn new(gateway: Mailbox<GatewayMessage>, fast: Duration, slow: Duration) -> Self {
        Self {
            gateway,
            fast,
            slow,
            running: false,
            initial: true,
            step: 0,
            next: Instant::now(),
        }
    }

    fn period(&self) -> Duration {
        if self.initial { self.fast } else { self.slow }
    }

    fn command(&mut self, command: TickerCommand) {
        debug!("Ticker {command:?}");
        match command {
            TickerCommand::Start => {
                self.running = true;
                self.next = Instant::now() + self.period();
            }
            TickerCommand::Stop => self.running = false,
            TickerCommand::Clear => {
                self.initial = true;
                self.step = 0;
                self.next = Instant::now() + self.fast;
            }
        }
    }

    fn tick(&mut self) {
        self.gateway.post(GatewayMessage::View(self.step));
        self.step += 1;
        if self.step > LAST_VIEW_STEP {
            self.step = 0;
            self.initial = false;
        }
        self.next = Instant::now() + self.period();
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<TickerCommand>, cancel: Arc<AtomicBool>) {
        while !is_cancelled(&cancel) {
            let window = if self.running {
                self.next.saturating_duration_since(Instant::now()).min(RECV_TIMEOUT)
            } else {
                RECV_TIMEOUT
            };
            match recv_within(&mut rx, window).await {
                Recv::Message(command) => self.command(command),
                Recv::Idle => {}
                Recv::Closed => break,
            }
            if self.running && Instant::now() >= self.next {
                self.tick();
            }
        }
        debug!("Ticker stopped");
    }
}
