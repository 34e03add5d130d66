//! Output actor: owns the relay image and drives the pins.

use super::{RECV_TIMEOUT, Recv, is_cancelled, recv_within};
use crate::literals::display;
use crate::messages::{DisplayKind, DisplayMessage, GatewayMessage, Mailbox, OutputMessage, ShortText, TerminalMessage};
use crate::sms_commands::output_pins;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Physical output driver.
pub trait OutputPins: Send {
    fn set(&mut self, pin: u32, on: bool);
    /// Switch off every pin in `mask`.
    fn clear_mask(&mut self, mask: u32);
}

/// Pins that only log their changes.
#[derive(Debug, Default)]
pub struct LoggingPins;

impl OutputPins for LoggingPins {
    fn set(&mut self, pin: u32, on: bool) {
        info!("Output pin {pin} -> {}", if on { "ON" } else { "OFF" });
    }

    fn clear_mask(&mut self, mask: u32) {
        info!("Output pins {mask:#010x} -> OFF");
    }
}

/// Bit mask of every output pin.
pub fn output_mask() -> u32 {
    output_pins().iter().fold(0, |mask, pin| mask | (1 << pin))
}

/// One character per output: its ordinal when on, `-` when off.
pub fn outputs_to_string(outputs: u32) -> String {
    output_pins()
        .iter()
        .enumerate()
        .map(|(i, pin)| {
            if outputs & (1 << pin) != 0 {
                char::from_digit((i + 1) as u32, 10).unwrap_or('?')
            } else {
                '-'
            }
        })
        .collect()
}

/// Pin image renumbered so output N is bit N-1.
pub fn outputs_to_order(outputs: u32) -> u32 {
    output_pins()
        .iter()
        .enumerate()
        .filter(|(_, pin)| outputs & (1 << *pin) != 0)
        .fold(0, |order, (i, _)| order | (1 << i))
}

pub struct OutputActor<P: OutputPins> {
    pins: P,
    outputs: u32,
    mask: u32,
    display: Mailbox<DisplayMessage>,
    gateway: Mailbox<GatewayMessage>,
    terminal: Mailbox<TerminalMessage>,
}

impl<P: OutputPins> OutputActor<P> {
    pub fn new(
        pins: P,
        display: Mailbox<DisplayMessage>,
        gateway: Mailbox<GatewayMessage>,
        terminal: Mailbox<TerminalMessage>,
    ) -> Self {
        Self {
            pins,
            outputs: 0,
            mask: output_mask(),
            display,
            gateway,
            terminal,
        }
    }

    /// Current pin image.
    pub fn outputs(&self) -> u32 {
        self.outputs
    }

    fn all_off(&mut self) {
        self.outputs = 0;
        self.pins.clear_mask(self.mask);
    }

    pub fn handle(&mut self, message: OutputMessage) {
        debug!("Output message: {message:?}");
        match message {
            OutputMessage::WriteOne { pin, on } => {
                if pin >= u32::BITS || self.mask & (1 << pin) == 0 {
                    warn!("Ignoring write to unknown output pin {pin}");
                    return;
                }
                self.pins.set(pin, on);
                if on {
                    self.outputs |= 1 << pin;
                } else {
                    self.outputs &= !(1 << pin);
                }
            }
            OutputMessage::WriteAllOff => self.all_off(),
            OutputMessage::ReadAll => {
                let text = format!("{}{}", display::OUTPUT, outputs_to_string(self.outputs));
                self.display.post(DisplayMessage::new(
                    DisplayKind::CallerId,
                    &text,
                    self.outputs as i32,
                ));
                self.gateway.post(GatewayMessage::State(ShortText::new(&text)));
            }
            OutputMessage::ReadAllTerminal => {
                self.terminal
                    .post(TerminalMessage::ReadAllAck(outputs_to_order(self.outputs)));
            }
            OutputMessage::WriteAllOffTerminal => {
                self.all_off();
                self.terminal.post(TerminalMessage::ClearAllAck(self.outputs));
            }
        }
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<OutputMessage>, cancel: Arc<AtomicBool>) {
        self.all_off();
        while !is_cancelled(&cancel) {
            match recv_within(&mut rx, RECV_TIMEOUT).await {
                Recv::Message(message) => self.handle(message),
                Recv::Idle => {}
                Recv::Closed => break,
            }
        }
        debug!("Output actor stopped");
    }
}
