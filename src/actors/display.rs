//! Display actor: keeps a model of the status screen and renders it.

use super::{RECV_TIMEOUT, Recv, is_cancelled, recv_within};
use crate::literals::display;
use crate::messages::{DisplayKind, DisplayMessage};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Rows of the rolling status log.
pub const STATUS_ROWS: usize = 5;

const SIGNAL_CELLS: usize = 10;

/// What the screen currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    pub header: String,
    pub provider: String,
    pub date: String,
    pub time: String,
    pub caller: String,
    pub status: Vec<String>,
    /// Boot step counter, shown large while the modem starts.
    pub number: Option<i32>,
    /// Signal bar level, 0 to 100.
    pub signal: i32,
    pub backlight: bool,
}

impl Screen {
    pub fn new() -> Self {
        Self {
            backlight: true,
            ..Self::default()
        }
    }

    fn cls(&mut self) {
        *self = Self {
            backlight: self.backlight,
            ..Self::default()
        };
    }

    fn welcome(&mut self) {
        self.cls();
        self.header = display::WELCOME.to_string();
    }

    pub fn apply(&mut self, message: &DisplayMessage) {
        let text = message.text.as_str().to_string();
        match message.kind {
            DisplayKind::Init => self.cls(),
            DisplayKind::BacklightOn => self.backlight = true,
            DisplayKind::BacklightOff => self.backlight = false,
            DisplayKind::Provider => self.provider = text,
            DisplayKind::Date => self.date = text,
            DisplayKind::Time => self.time = text,
            DisplayKind::CallerId => self.caller = text,
            DisplayKind::Signal => self.signal = (message.value * 2).clamp(0, 100),
            DisplayKind::Number => {
                if message.value == 0 || message.value == 1 {
                    self.welcome();
                }
                self.status.clear();
                self.number = Some(message.value);
                self.signal = (message.value * 4).clamp(0, 100);
            }
            DisplayKind::Status => {
                if message.value == 0 {
                    self.welcome();
                }
                if self.status.len() >= STATUS_ROWS {
                    self.status.clear();
                }
                self.status.push(text);
            }
        }
    }

    /// Signal level as a ten cell bar.
    pub fn signal_bar(&self) -> String {
        let filled = (self.signal as usize / SIGNAL_CELLS).min(SIGNAL_CELLS);
        format!("{}{}", "#".repeat(filled), ".".repeat(SIGNAL_CELLS - filled))
    }
}

/// Renders the screen model somewhere visible.
pub trait DisplaySink: Send {
    fn render(&mut self, screen: &Screen);
}

/// Sink that writes the screen to the log.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl DisplaySink for ConsoleSink {
    fn render(&mut self, screen: &Screen) {
        let step = screen.number.map(|n| format!(" [{n}]")).unwrap_or_default();
        info!(
            target: "display",
            "{}{} | {} | {} {} | {} | {} | {}{}",
            screen.header,
            step,
            screen.provider,
            screen.date,
            screen.time,
            screen.caller,
            screen.status.join(" / "),
            screen.signal_bar(),
            if screen.backlight { "" } else { " (dark)" },
        );
    }
}

pub struct DisplayActor<S: DisplaySink> {
    screen: Screen,
    sink: S,
}

impl<S: DisplaySink> DisplayActor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            screen: Screen::new(),
            sink,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn handle(&mut self, message: &DisplayMessage) {
        self.screen.apply(message);
        self.sink.render(&self.screen);
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<DisplayMessage>, cancel: Arc<AtomicBool>) {
        while !is_cancelled(&cancel) {
            match recv_within(&mut rx, RECV_TIMEOUT).await {
                Recv::Message(message) => self.handle(&message),
                Recv::Idle => {}
                Recv::Closed => break,
            }
        }
        debug!("Display actor stopped");
    }
}
