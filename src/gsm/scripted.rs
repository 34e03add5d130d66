//! Deterministic modem double for driver and gateway tests.
//!
//! Time is simulated: every idle poll advances the clock by one
//! millisecond, so long timeouts finish instantly.

use super::error::{GsmError, Result};
use super::transport::ModemTransport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct Rule {
    prefix: String,
    response: Vec<u8>,
    delay_us: u64,
}

#[derive(Debug, Default)]
struct Inner {
    clock_us: u64,
    rx: VecDeque<(u64, u8)>,
    rules: Vec<Rule>,
    line: Vec<u8>,
    commands: Vec<String>,
    sms_target: Option<String>,
    sent_sms: Vec<(String, String)>,
    stalled: bool,
    bring_ups: u32,
    power_cycles: u32,
    dead_until_cycles: u32,
}

impl Inner {
    fn on_line(&mut self) {
        let raw = std::mem::take(&mut self.line);
        let text = String::from_utf8_lossy(&raw).trim_end_matches(['\r', '\n']).to_string();

        let command = if let Some(body) = text.strip_suffix('\x1a') {
            if let Some(target) = self.sms_target.take() {
                self.sent_sms.push((target, body.to_string()));
            }
            "\x1a".to_string()
        } else {
            text
        };

        self.commands.push(command.clone());

        if self.power_cycles < self.dead_until_cycles {
            return;
        }
        let rule = self
            .rules
            .iter()
            .filter(|r| command.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())
            .cloned();
        let Some(rule) = rule else {
            return;
        };
        let ready_at = self.clock_us + rule.delay_us;
        self.rx.extend(rule.response.iter().map(|&b| (ready_at, b)));

        // a prompt switches to body mode until Ctrl-Z
        if rule.response.ends_with(b"> ") {
            if let Some(number) = command
                .strip_prefix("AT+CMGS=\"")
                .and_then(|rest| rest.strip_suffix('"'))
            {
                self.sms_target = Some(number.to_string());
            }
        }
    }

    /// Whether `byte` ends the line being written. SMS bodies may hold
    /// line breaks, so only Ctrl-Z followed by LF ends one.
    fn ends_line(&self, byte: u8) -> bool {
        byte == b'\n' && (self.sms_target.is_none() || self.line.contains(&0x1a))
    }
}

/// Cloneable handle; clones share one simulated modem.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedModem {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedModem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A modem that answers the usual boot, SIM and poll commands.
    pub fn healthy() -> Self {
        let modem = Self::new();
        modem.respond("ATE0", "\r\nOK\r\n");
        modem.respond("AT+CCID", "\r\n89420310200012345678\r\n\r\nOK\r\n");
        modem.respond("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n");
        modem.respond("AT+CLIP=", "\r\nOK\r\n");
        modem.respond("AT+CMGF=1", "\r\nOK\r\n");
        modem.respond("AT+CMGD=", "\r\nOK\r\n");
        modem.respond("AT+CREG?", "\r\n+CREG: 0,1\r\n\r\nOK\r\n");
        modem.respond("AT+CSQ", "\r\n+CSQ: 20,0\r\n\r\nOK\r\n");
        modem.respond("AT+COPS?", "\r\n+COPS: 0,0,\"Vodafone CZ\"\r\n\r\nOK\r\n");
        modem.respond("AT+CCLK?", "\r\n+CCLK: \"24/05/17,10:15:00+08\"\r\n\r\nOK\r\n");
        modem.respond("AT+CGNSPWR=", "\r\nOK\r\n");
        modem.respond(
            "AT+CGNSINF",
            "\r\n+CGNSINF: 1,1,20240517081500.000,50.08,14.42,250.0\r\n\r\nOK\r\n",
        );
        modem.respond("AT+CMGS=", "\r\n> ");
        modem.respond("\x1a", "\r\n+CMGS: 7\r\n\r\nOK\r\n");
        modem.respond("ATH", "\r\nOK\r\n");
        modem.respond("ATA", "\r\nOK\r\n");
        modem.respond("ATD", "\r\nOK\r\n");
        modem.respond("AT+CLTS=", "\r\nOK\r\n");
        modem.respond("AT&W", "\r\nOK\r\n");
        modem.respond("AT+CPMS?", "\r\n+CPMS: \"SM\",2,30,\"SM\",2,30,\"SM\",2,30\r\n\r\nOK\r\n");
        modem.respond("AT", "\r\nOK\r\n");
        modem
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Answer commands starting with `prefix`. The longest matching prefix wins.
    pub fn respond(&self, prefix: &str, response: &str) {
        self.respond_after(prefix, response, 0);
    }

    /// Like `respond`, but the answer becomes readable `delay_ms` later.
    pub fn respond_after(&self, prefix: &str, response: &str, delay_ms: u64) {
        let mut inner = self.lock();
        let rule = Rule {
            prefix: prefix.to_string(),
            response: response.as_bytes().to_vec(),
            delay_us: delay_ms * 1_000,
        };
        match inner.rules.iter_mut().find(|r| r.prefix == prefix) {
            Some(existing) => *existing = rule,
            None => inner.rules.push(rule),
        }
    }

    /// Stop answering `prefix`.
    pub fn silence(&self, prefix: &str) {
        self.lock().rules.retain(|r| r.prefix != prefix);
    }

    /// Push unsolicited bytes, readable immediately.
    pub fn inject(&self, bytes: &str) {
        let mut inner = self.lock();
        let now = inner.clock_us;
        inner.rx.extend(bytes.bytes().map(|b| (now, b)));
    }

    /// Ignore every command until the modem has been power cycled `cycles` times.
    pub fn dead_until_power_cycles(&self, cycles: u32) {
        self.lock().dead_until_cycles = cycles;
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.lock().stalled = stalled;
    }

    /// Command lines written so far, without CRLF.
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn count_commands(&self, prefix: &str) -> usize {
        self.lock().commands.iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// `(destination, body)` of every SMS completed with Ctrl-Z.
    pub fn sent_sms(&self) -> Vec<(String, String)> {
        self.lock().sent_sms.clone()
    }

    pub fn power_cycles(&self) -> u32 {
        self.lock().power_cycles
    }

    pub fn bring_ups(&self) -> u32 {
        self.lock().bring_ups
    }

    pub fn clock_ms(&self) -> u64 {
        self.lock().clock_us / 1_000
    }
}

impl ModemTransport for ScriptedModem {
    fn is_readable(&mut self) -> bool {
        let mut inner = self.lock();
        let now = inner.clock_us;
        match inner.rx.front() {
            Some(&(ready_at, _)) if ready_at <= now => true,
            _ => {
                inner.clock_us += 1_000;
                false
            }
        }
    }

    fn is_writable(&mut self) -> bool {
        let mut inner = self.lock();
        if inner.stalled {
            inner.clock_us += 1_000;
            return false;
        }
        true
    }

    fn read_byte(&mut self) -> Result<u8> {
        // reads take no simulated time, so a line is never split by a window edge
        let mut inner = self.lock();
        inner
            .rx
            .pop_front()
            .map(|(_, b)| b)
            .ok_or_else(|| GsmError::Io(std::io::Error::new(std::io::ErrorKind::WouldBlock, "empty")))
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        let mut inner = self.lock();
        inner.clock_us += 10;
        inner.line.push(byte);
        if inner.ends_line(byte) {
            inner.on_line();
        }
        Ok(())
    }

    fn delay_ms(&mut self, ms: u64) {
        self.lock().clock_us += ms * 1_000;
    }

    fn now_micros(&mut self) -> u64 {
        self.lock().clock_us
    }

    fn hardware_bring_up(&mut self) -> Result<()> {
        self.lock().bring_ups += 1;
        Ok(())
    }

    fn power_cycle(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.power_cycles += 1;
        inner.rx.clear();
        inner.line.clear();
        inner.sms_target = None;
        Ok(())
    }
}
