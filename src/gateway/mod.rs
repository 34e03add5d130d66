//! Gateway task: boots the modem, polls it and acts on calls and SMS.
//!
//! The task owns the driver and the commander registry and runs as one
//! blocking loop:
//!
//! ```text
//! Booting -> SimChecking -> Viewing -> (Restarting -> Booting) | Halted
//! ```
//!
//! Boot and SIM failures halt the gateway; repeated failures while viewing
//! restart the whole modem bring-up.

pub mod progress;

#[cfg(test)]
mod tests;

use crate::at::ResponseStatus;
use crate::commanders::{CommanderRegistry, RegistryError};
use crate::gsm::{GsmDriver, GsmError, ModemTransport, SmsMessage, is_service_usable};
use crate::literals::{display, sms};
use crate::messages::{
    DisplayKind, DisplayMessage, GatewayMessage, Mailbox, OutputMessage, ShortText, SmsRequest, TerminalMessage,
    TickerCommand,
};
use crate::sms_commands::{CommandKind, analyze, list_of_commands};
use chrono::{Datelike, NaiveDateTime};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Replies waiting to be sent.
pub const OUTBOX_CAPACITY: usize = 5;

/// Modem clocks older than this are treated as unset.
const MIN_PLAUSIBLE_YEAR: i32 = 2023;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Booting,
    SimChecking,
    Viewing,
    Restarting,
    /// Boot or SIM failure; needs service.
    Halted,
    /// Cancelled from outside.
    Stopped,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub with_gnss: bool,
    /// Failures in a row that restart the modem.
    pub max_failures: u32,
    /// Read window of each status poll.
    pub status_poll_ms: u64,
    /// Enroll callers only after an `ADD` or while the list is empty.
    pub enroll_requires_learning: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            with_gnss: true,
            max_failures: 5,
            status_poll_ms: 500,
            enroll_requires_learning: false,
        }
    }
}

/// Mailboxes the gateway posts to.
#[derive(Debug, Clone)]
pub struct GatewayLinks {
    pub display: Mailbox<DisplayMessage>,
    pub output: Mailbox<OutputMessage>,
    pub terminal: Mailbox<TerminalMessage>,
    pub ticker: Mailbox<TickerCommand>,
}

enum ViewExit {
    Restart,
    Cancelled,
}

pub struct GatewayTask<T: ModemTransport> {
    driver: GsmDriver<T>,
    registry: CommanderRegistry,
    inbox: mpsc::Receiver<GatewayMessage>,
    links: GatewayLinks,
    settings: GatewaySettings,
    cancel: Arc<AtomicBool>,
    state: GatewayState,
    learning: bool,
    fail_count: u32,
    last_out: ShortText,
    outbox: heapless::Deque<SmsRequest, OUTBOX_CAPACITY>,
}

impl<T: ModemTransport> GatewayTask<T> {
    pub fn new(
        driver: GsmDriver<T>,
        registry: CommanderRegistry,
        inbox: mpsc::Receiver<GatewayMessage>,
        links: GatewayLinks,
        settings: GatewaySettings,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            driver,
            registry,
            inbox,
            links,
            settings,
            cancel,
            state: GatewayState::Booting,
            learning: false,
            fail_count: 0,
            last_out: ShortText::default(),
            outbox: heapless::Deque::new(),
        }
    }

    pub fn state(&self) -> GatewayState {
        self.state
    }

    pub fn registry(&self) -> &CommanderRegistry {
        &self.registry
    }

    pub fn is_learning(&self) -> bool {
        self.learning
    }

    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn set_state(&mut self, state: GatewayState) {
        if self.state != state {
            debug!("Gateway {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }

    /// Run until halted or cancelled. Returns the final state.
    pub fn run(&mut self) -> GatewayState {
        loop {
            self.fail_count = 0;
            self.set_state(GatewayState::Booting);
            match self.driver.init(self.settings.with_gnss) {
                Ok(()) => {}
                Err(GsmError::Cancelled) => return self.stop(),
                Err(e) => {
                    error!("Modem init failed: {e}");
                    self.status(display::GSM_ERROR, true);
                    return self.halt();
                }
            }
            self.status(display::GSM_OK, true);

            self.set_state(GatewayState::SimChecking);
            if let Err(e) = self.check_sim() {
                if self.is_cancelled() {
                    return self.stop();
                }
                error!("SIM check failed: {e}");
                return self.halt();
            }

            self.set_state(GatewayState::Viewing);
            match self.view_loop() {
                ViewExit::Restart => {
                    warn!("{} failures in a row, restarting modem", self.fail_count);
                    self.set_state(GatewayState::Restarting);
                }
                ViewExit::Cancelled => return self.stop(),
            }
        }
    }

    fn halt(&mut self) -> GatewayState {
        self.set_state(GatewayState::Halted);
        error!("Gateway halted, service required");
        self.state
    }

    fn stop(&mut self) -> GatewayState {
        self.set_state(GatewayState::Stopped);
        info!("Gateway stopped");
        self.state
    }

    // ---- display helpers ----

    fn status(&self, text: &str, init: bool) {
        self.links.display.post(DisplayMessage::status(text, init));
    }

    fn show(&self, kind: DisplayKind, text: &str) {
        self.links.display.post(DisplayMessage::new(kind, text, 1));
    }

    fn show_value(&self, kind: DisplayKind, value: i32) {
        self.links.display.post(DisplayMessage::new(kind, "", value));
    }

    fn show_control(&self, kind: DisplayKind) {
        self.links.display.post(DisplayMessage::control(kind));
    }

    // ---- boot ----

    /// Gated SIM checks; the first failing gate stops the sequence.
    fn check_sim(&mut self) -> Result<(), GsmError> {
        match self.driver.iccid() {
            Ok(iccid) if !iccid.is_empty() => {
                info!("SIM {iccid}");
                self.status(display::SIM_OK, false);
            }
            Ok(_) => {
                self.status(display::SIM_ERROR, false);
                return Err(GsmError::MissingField("CCID"));
            }
            Err(e) => {
                self.status(display::SIM_ERROR_2, false);
                return Err(e);
            }
        }

        match self.driver.pin_not_required() {
            Ok(true) => self.status(display::PIN_OK, false),
            Ok(false) => {
                self.status(display::PIN_ERROR, false);
                return Err(GsmError::Rejected("SIM PIN required".to_string()));
            }
            Err(e) => {
                self.status(display::PIN_ERROR, false);
                return Err(e);
            }
        }

        if let Err(e) = self.driver.set_caller_id(true) {
            self.status(display::CALLER_ID_ERROR, false);
            return Err(e);
        }
        self.status(display::CALLER_ID_OK, false);

        // clearing old SMS is not a gate
        if let Err(e) = self.driver.delete_all_sms() {
            warn!("Failed to clear SMS storage: {e}");
        }

        let stat = match self.driver.registration() {
            Ok(stat) => stat,
            Err(e) => {
                self.status(display::REGISTRATION_ERROR, false);
                return Err(e);
            }
        };
        if !is_service_usable(stat) {
            self.status(display::REGISTRATION_ERROR, false);
            return Err(GsmError::Rejected(format!("not registered (stat {stat})")));
        }
        Ok(())
    }

    // ---- viewing ----

    fn start_view(&self) {
        self.links.ticker.post(TickerCommand::Clear);
        self.links.ticker.post(TickerCommand::Start);
        self.show_control(DisplayKind::Init);
        self.show_value(DisplayKind::Signal, 0);
    }

    fn view_loop(&mut self) -> ViewExit {
        self.registry.refresh();
        if self.registry.is_empty() {
            info!("No commanders yet, waiting for the first caller");
            self.learning = true;
        }
        self.start_view();

        loop {
            if self.is_cancelled() {
                return ViewExit::Cancelled;
            }

            match self.inbox.try_recv() {
                Ok(GatewayMessage::View(step)) => {
                    self.process_view(step);
                }
                Ok(GatewayMessage::State(text)) => self.last_out = text,
                Err(_) => {}
            }

            self.process_gsm_status();
            self.flush_outbox();

            if self.fail_count >= self.settings.max_failures {
                return ViewExit::Restart;
            }
        }
    }

    fn process_view(&mut self, step: u8) -> bool {
        match step {
            0 => match self.driver.operator() {
                Ok(name) => {
                    self.show(DisplayKind::Provider, &name);
                    self.fail_count = 0;
                    true
                }
                Err(e) => {
                    debug!("Operator query failed: {e}");
                    self.fail_count += 1;
                    false
                }
            },
            1 => match self.driver.signal_quality() {
                Ok(signal) => {
                    self.show_value(DisplayKind::Signal, i32::from(signal));
                    true
                }
                Err(e) => {
                    debug!("Signal query failed: {e}");
                    false
                }
            },
            2 => match self.driver.read_rtc() {
                Ok(time) if time.year() >= MIN_PLAUSIBLE_YEAR => {
                    self.links
                        .terminal
                        .post(TerminalMessage::RtcSet(time.and_utc().timestamp()));
                    self.show_time(&time, display::GSM_TIME_OK);
                    true
                }
                Ok(_) => {
                    self.show(DisplayKind::Time, display::GSM_TIME_ERROR);
                    true
                }
                Err(e) => {
                    debug!("RTC query failed: {e}");
                    false
                }
            },
            3 => match self.driver.gnss_info() {
                Ok(gnss) => {
                    self.show_time(&gnss.time, display::GPS_TIME_OK);
                    true
                }
                Err(e) => {
                    debug!("GNSS query failed: {e}");
                    self.show(DisplayKind::Time, display::GPS_TIME_ERROR);
                    true
                }
            },
            4 => {
                if self.learning {
                    self.show(DisplayKind::CallerId, display::LEARNING);
                }
                true
            }
            5 => {
                if self.learning {
                    self.show(DisplayKind::CallerId, display::LEARNING);
                } else {
                    self.links.output.post(OutputMessage::ReadAll);
                }
                self.show_control(DisplayKind::BacklightOff);
                true
            }
            6 => match self.driver.registration() {
                Ok(stat) if is_service_usable(stat) => {
                    self.fail_count = 0;
                    true
                }
                result => {
                    debug!("Registration check failed: {result:?}");
                    self.fail_count += 1;
                    false
                }
            },
            other => {
                warn!("Unknown view step {other}");
                false
            }
        }
    }

    fn show_time(&self, time: &NaiveDateTime, suffix: &str) {
        let text = format!("{}{suffix}", time.format("%H:%M"));
        self.show(DisplayKind::Time, &text);
        self.show(DisplayKind::Date, &time.format("%d.%m.%Y").to_string());
    }

    // ---- events ----

    fn process_gsm_status(&mut self) {
        let status = match self.driver.check_status(self.settings.status_poll_ms) {
            Ok(status) => status,
            Err(e) => {
                warn!("Status poll failed: {e}");
                return;
            }
        };

        match status {
            ResponseStatus::CallerId => {
                let caller = self.driver.last_caller_id().to_string();
                if let Err(e) = self.driver.disconnect() {
                    warn!("Hang up failed: {e}");
                }
                self.ring_operation(&caller);
            }
            ResponseStatus::Ring => {
                self.show_control(DisplayKind::BacklightOn);
                self.show(DisplayKind::CallerId, display::RING);
            }
            ResponseStatus::NewSms => {
                self.show_control(DisplayKind::BacklightOn);
                let index = self.driver.incoming_sms_index();
                match self.driver.read_sms(index) {
                    Ok(message) => self.sms_operation(&message, index),
                    Err(e) => warn!("Failed to read SMS {index}: {e}"),
                }
            }
            _ => {}
        }
    }

    fn ring_operation(&mut self, caller: &str) {
        if caller.is_empty() {
            warn!("Caller id without a number");
            return;
        }
        let may_enroll = self.learning || self.registry.is_empty() || !self.settings.enroll_requires_learning;
        if !may_enroll {
            info!("Call from {caller} ignored, not learning");
            return;
        }

        self.links.ticker.post(TickerCommand::Stop);
        self.status(display::REGISTRATION, true);
        self.status(caller, false);
        if self.registry.is_empty() {
            self.status(display::MASTER, false);
        }

        match self.registry.add_new(caller) {
            Ok(()) => {
                self.status(display::OK, false);
                self.queue_reply(caller, sms::REGISTRATION_ACCEPTED);
            }
            Err(RegistryError::Full) => {
                self.status(display::FULL_ERROR, false);
                self.queue_reply(caller, sms::FULL);
            }
            Err(e) => {
                warn!("Enrollment of {caller} failed: {e}");
                self.status(display::ERROR, false);
                self.queue_reply(caller, sms::FAILED);
            }
        }

        self.learning = false;
        self.start_view();
    }

    fn sms_operation(&mut self, message: &SmsMessage, index: u32) {
        let sender = message.sender.as_str();
        if self.registry.is_exist(sender) {
            self.execute_command(sender, &message.body);
        } else {
            info!("SMS from unknown number {sender} ignored");
        }

        if let Err(e) = self.driver.delete_sms(index) {
            warn!("Failed to delete SMS {index}: {e}");
        }
        self.start_view();
    }

    fn execute_command(&mut self, sender: &str, body: &str) {
        self.links.ticker.post(TickerCommand::Stop);
        self.status(display::SMS_COMMAND, true);
        self.status(sender, false);

        let command = analyze(body);
        info!("SMS command from {sender}: {:?}", command.kind);

        if command.is_admin_only() && !self.registry.is_supreme(sender) {
            self.queue_reply(sender, sms::help(&list_of_commands()));
            self.status(display::OK, false);
            return;
        }

        match command.kind {
            CommandKind::Add => {
                if self.registry.is_full() {
                    self.learning = false;
                    self.status(display::ERROR, false);
                    self.queue_reply(sender, sms::FULL);
                } else {
                    self.learning = true;
                    self.status(display::OK, false);
                    self.queue_reply(sender, sms::ADD);
                }
            }
            CommandKind::None => {
                self.status(display::OK, false);
                self.queue_reply(sender, sms::help(&list_of_commands()));
            }
            CommandKind::State => {
                let reply = sms::state(self.last_out.as_str());
                self.queue_reply(sender, reply);
            }
            CommandKind::List => {
                self.status(display::OK, false);
                let reply = sms::operators(&self.registry.get_list());
                self.queue_reply(sender, reply);
            }
            CommandKind::AllOff => {
                self.status(display::OK, false);
                self.links.output.post(OutputMessage::WriteAllOff);
                self.queue_reply(sender, sms::ACCEPTED);
            }
            CommandKind::Output { .. } => {
                let Some(pin) = command.pin else {
                    warn!("Output command without a pin");
                    return;
                };
                self.status(display::OK, false);
                self.links.output.post(OutputMessage::WriteOne { pin, on: command.on });
                self.queue_reply(sender, sms::ACCEPTED);
            }
        }
    }

    // ---- replies ----

    fn queue_reply(&mut self, destination: &str, body: impl Into<String>) {
        if self.outbox.push_back(SmsRequest::new(destination, body)).is_err() {
            warn!("SMS outbox full, reply to {destination} dropped");
        }
    }

    fn flush_outbox(&mut self) {
        while let Some(request) = self.outbox.pop_front() {
            if let Err(e) = self.driver.send_sms(&request.destination, &request.body) {
                warn!("Failed to send SMS to {}: {e}", request.destination);
            }
        }
    }
}
