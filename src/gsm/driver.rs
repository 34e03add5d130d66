//! Timeout-bounded command/response exchanges with the modem.

use super::commands as cmd;
use super::error::{GsmError, Result};
use super::transport::ModemTransport;
use super::types::{DriverTimings, ModemProgress, SmsMessage};
use crate::at::{AtParser, GnssTime, ParserState, ResponseStatus, break_time};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// AT command driver on top of a [`ModemTransport`].
pub struct GsmDriver<T: ModemTransport> {
    transport: T,
    parser: AtParser,
    timings: DriverTimings,
    progress: Option<mpsc::Sender<ModemProgress>>,
    cancel: Arc<AtomicBool>,
    echo: bool,
    line: Vec<u8>,
    last_number: String,
    last_storage: String,
    last_index: u32,
}

impl<T: ModemTransport> GsmDriver<T> {
    /// Create a driver with default timings.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            parser: AtParser::new(),
            timings: DriverTimings::default(),
            progress: None,
            cancel: Arc::new(AtomicBool::new(false)),
            echo: true,
            line: Vec::new(),
            last_number: String::new(),
            last_storage: String::new(),
            last_index: 0,
        }
    }

    pub fn with_timings(mut self, timings: DriverTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Report progress on `tx`. Sending never blocks the driver; events
    /// that do not fit are dropped.
    pub fn with_progress(mut self, tx: mpsc::Sender<ModemProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Share a shutdown flag; setting it stops `init` and pending exchanges.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn timings(&self) -> &DriverTimings {
        &self.timings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_echo_on(&self) -> bool {
        self.echo
    }

    /// Number from the last caller-id notification seen by `check_status`.
    pub fn last_caller_id(&self) -> &str {
        &self.last_number
    }

    /// Storage name of the last new-SMS notification.
    pub fn last_storage(&self) -> &str {
        &self.last_storage
    }

    /// Index of the last new-SMS notification.
    pub fn incoming_sms_index(&self) -> u32 {
        self.last_index
    }

    fn notify(&self, progress: ModemProgress) {
        if let Some(tx) = &self.progress {
            if tx.try_send(progress).is_err() {
                trace!("Progress {progress:?} dropped");
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn elapsed_ms(&mut self, since_us: u64) -> u64 {
        self.transport.now_micros().saturating_sub(since_us) / 1_000
    }

    // ---- boot ----

    /// Bring the modem up and retry until it answers.
    ///
    /// Retries forever while the modem stays silent, power cycling it
    /// between attempts; only the cancel flag ends the loop early.
    pub fn init(&mut self, with_gnss: bool) -> Result<()> {
        self.notify(ModemProgress::HwInit);
        self.transport.hardware_bring_up()?;
        self.notify(ModemProgress::Wait);
        self.transport.delay_ms(self.timings.settle_ms);

        let mut attempt = 0u32;
        loop {
            if self.is_cancelled() {
                return Err(GsmError::Cancelled);
            }
            attempt += 1;

            self.notify(ModemProgress::Ping);
            if self.ping().is_ok() {
                self.notify(ModemProgress::Ping);
                self.drain(self.timings.boot_drain_ms)?;
                self.notify(ModemProgress::Ping);
                if self.ping().is_ok() && self.ping().is_ok() {
                    self.notify(ModemProgress::Ping);
                    self.echo_off()?;
                    break;
                }
            }

            if self.is_cancelled() {
                return Err(GsmError::Cancelled);
            }
            warn!("Modem not answering (attempt {attempt}), power cycling");
            self.notify(ModemProgress::Ping);
            if let Err(e) = self.transport.power_cycle() {
                warn!("Power cycle failed: {e}");
            }
            self.notify(ModemProgress::Ping);
            self.transport.delay_ms(self.timings.power_cycle_pause_ms);
        }

        info!("Modem answering after {attempt} attempt(s)");

        if with_gnss {
            self.notify(ModemProgress::Gnss);
            self.gnss_power(true)?;
        }
        Ok(())
    }

    /// Read and discard lines for `window_ms`.
    fn drain(&mut self, window_ms: u64) -> Result<()> {
        let start = self.transport.now_micros();
        while self.elapsed_ms(start) < window_ms {
            if self.is_cancelled() {
                return Err(GsmError::Cancelled);
            }
            let remaining = window_ms.saturating_sub(self.elapsed_ms(start));
            if self.read_line(remaining)? > 0 {
                trace!("RX drained: {:?}", String::from_utf8_lossy(&self.line));
            }
        }
        Ok(())
    }

    // ---- polling ----

    /// Wait up to `max_wait_ms` for one unsolicited line and classify it.
    ///
    /// `NewSms` fills [`incoming_sms_index`](Self::incoming_sms_index) and
    /// `CallerId` fills [`last_caller_id`](Self::last_caller_id). Silence
    /// yields `Unknown`.
    pub fn check_status(&mut self, max_wait_ms: u64) -> Result<ResponseStatus> {
        self.last_storage.clear();
        self.last_number.clear();
        self.last_index = 0;

        self.parser.init(ParserState::AnswerBegin);
        self.parser.set_preferred(None);

        if self.read_line(max_wait_ms)? == 0 {
            return Ok(ResponseStatus::Unknown);
        }
        trace!("RX: {:?}", String::from_utf8_lossy(&self.line));
        if !self.parser.feed_bytes(&self.line) {
            return Ok(ResponseStatus::Unknown);
        }

        let status = self.parser.status();
        match status {
            ResponseStatus::NewSms => {
                if let Some((storage, index)) = self.parser.text_and_number() {
                    self.last_storage = storage;
                    self.last_index = u32::try_from(index).unwrap_or(0);
                }
            }
            ResponseStatus::CallerId => {
                if let Some(number) = self.parser.quoted_text() {
                    self.last_number = number;
                }
            }
            _ => {}
        }
        debug!("Modem status: {status:?}");
        Ok(status)
    }

    // ---- exchange primitive ----

    /// Write `command`, then parse until `expected` or the window closes.
    pub fn send_and_read(&mut self, command: &str, expected: ResponseStatus, timeout_ms: u64) -> Result<()> {
        self.send_command(command)?;
        self.parser.set_preferred(Some(expected));
        self.process_response(expected, timeout_ms)?;

        let actual = self.parser.status();
        if actual == expected {
            // data answers end with a separate OK line
            if !matches!(expected, ResponseStatus::Ok | ResponseStatus::SmsReady) {
                self.skip_trailing_ok()?;
            }
            Ok(())
        } else {
            debug!("{command}: expected {expected:?}, got {actual:?}");
            Err(GsmError::UnexpectedStatus { expected, actual })
        }
    }

    fn send_command(&mut self, command: &str) -> Result<()> {
        trace!("TX: {command:?}");
        let mut framed = Vec::with_capacity(command.len() + 2);
        framed.extend_from_slice(command.as_bytes());
        framed.extend_from_slice(b"\r\n");
        self.write_bounded(&framed)
    }

    fn send_data(&mut self, data: &str) -> Result<()> {
        trace!("TX data: {} bytes", data.len());
        self.write_bounded(data.as_bytes())
    }

    fn write_bounded(&mut self, bytes: &[u8]) -> Result<()> {
        self.notify(ModemProgress::Tx);
        let start = self.transport.now_micros();
        let mut written = 0;
        while written < bytes.len() {
            if self.elapsed_ms(start) > self.timings.tx_ms {
                return Err(GsmError::WriteStall {
                    written,
                    total: bytes.len(),
                });
            }
            if !self.transport.is_writable() {
                continue;
            }
            self.transport.write_byte(bytes[written])?;
            written += 1;
        }
        Ok(())
    }

    /// Feed answer bytes into the parser until it completes.
    fn process_response(&mut self, expected: ResponseStatus, timeout_ms: u64) -> Result<()> {
        self.parser.init(ParserState::AnswerBegin);
        self.notify(ModemProgress::Rx);
        self.line.clear();

        let start = self.transport.now_micros();
        loop {
            if self.is_cancelled() {
                return Err(GsmError::Cancelled);
            }
            if self.transport.is_readable() {
                let byte = self.transport.read_byte()?;
                self.line.push(byte);
                let done = self.parser.feed(byte);
                if byte == b'\n' || done {
                    trace!("RX: {:?}", String::from_utf8_lossy(&self.line));
                    self.line.clear();
                }
                if done {
                    return Ok(());
                }
            }
            if self.elapsed_ms(start) > timeout_ms {
                return Err(GsmError::Timeout(expected));
            }
        }
    }

    fn skip_trailing_ok(&mut self) -> Result<()> {
        let window_ms = self.timings.check_ms;
        let start = self.transport.now_micros();
        while self.elapsed_ms(start) < window_ms {
            let remaining = window_ms.saturating_sub(self.elapsed_ms(start));
            if self.read_line(remaining)? > 0 && String::from_utf8_lossy(&self.line).trim().eq_ignore_ascii_case("OK") {
                break;
            }
        }
        Ok(())
    }

    /// Read up to and including `\n`, or whatever arrived in `max_wait_ms`.
    fn read_line(&mut self, max_wait_ms: u64) -> Result<usize> {
        self.line.clear();
        let start = self.transport.now_micros();
        while self.elapsed_ms(start) < max_wait_ms {
            if self.transport.is_readable() {
                let byte = self.transport.read_byte()?;
                self.line.push(byte);
                if byte == b'\n' {
                    break;
                }
            }
        }
        Ok(self.line.len())
    }

    // ---- modem operations ----

    /// `AT` liveness check on the short window.
    pub fn ping(&mut self) -> Result<()> {
        self.send_and_read(cmd::AT, ResponseStatus::Ok, self.timings.check_ms)
    }

    pub fn echo_off(&mut self) -> Result<()> {
        self.send_and_read(cmd::ECHO_OFF, ResponseStatus::Ok, self.timings.rx_ms)?;
        self.echo = false;
        Ok(())
    }

    pub fn echo_on(&mut self) -> Result<()> {
        self.send_and_read(cmd::ECHO_ON, ResponseStatus::Ok, self.timings.rx_ms)?;
        self.echo = true;
        Ok(())
    }

    /// Radio off.
    pub fn flight_mode(&mut self) -> Result<()> {
        self.send_and_read(cmd::FLIGHT_MODE, ResponseStatus::Ok, self.timings.rx_ms)
    }

    /// Radio on; swallows the `RDY`/`+CFUN` chatter that follows.
    pub fn phone_mode(&mut self) -> Result<()> {
        self.send_and_read(cmd::PHONE_MODE, ResponseStatus::Ok, self.timings.rx_ms)?;
        self.drain(2_000)
    }

    pub fn set_caller_id(&mut self, enable: bool) -> Result<()> {
        let command = if enable { cmd::CALLER_ID_ON } else { cmd::CALLER_ID_OFF };
        self.send_and_read(command, ResponseStatus::Ok, self.timings.rx_ms)
    }

    /// Hang up any call, then dial `number` as a voice call.
    pub fn ring(&mut self, number: &str) -> Result<()> {
        if number.is_empty() {
            return Err(GsmError::InvalidArgument("empty phone number".to_string()));
        }
        self.disconnect()?;
        let command = format!("{} {number};", cmd::DIAL);
        self.send_and_read(&command, ResponseStatus::Ok, self.timings.rx_ms)
    }

    /// Hang up.
    pub fn disconnect(&mut self) -> Result<()> {
        self.send_and_read(cmd::HANG_UP, ResponseStatus::Ok, self.timings.check_ms)
    }

    /// Pick up an incoming call.
    pub fn answer(&mut self) -> Result<()> {
        self.send_and_read(cmd::ANSWER, ResponseStatus::Ok, self.timings.check_ms)
    }

    /// True when the SIM reports `READY`.
    pub fn pin_not_required(&mut self) -> Result<bool> {
        self.send_and_read(cmd::PIN_STATUS, ResponseStatus::Ok, self.timings.rx_ms)?;
        self.parser
            .compare_response_text(cmd::PIN_READY)
            .ok_or(GsmError::MissingField("CPIN"))
    }

    /// SIM card identifier.
    pub fn iccid(&mut self) -> Result<String> {
        self.send_and_read(cmd::ICCID, ResponseStatus::Ok, self.timings.rx_ms)?;
        self.parser.text(cmd::ICCID).ok_or(GsmError::MissingField("CCID"))
    }

    /// Network operator name.
    pub fn operator(&mut self) -> Result<String> {
        self.send_and_read(cmd::OPERATOR, ResponseStatus::Ok, self.timings.rx_ms)?;
        self.parser
            .two_values_and_text()
            .map(|(_, _, name)| name)
            .ok_or(GsmError::MissingField("COPS"))
    }

    /// GNSS time and fix flags.
    pub fn gnss_info(&mut self) -> Result<GnssTime> {
        self.send_and_read(cmd::GNSS_INFO, ResponseStatus::Ok, self.timings.check_ms)?;
        self.parser
            .gnss_time(cmd::GNSS_INFO_MARKER)
            .ok_or(GsmError::MissingField("CGNSINF"))
    }

    pub fn gnss_power(&mut self, on: bool) -> Result<()> {
        let command = if on { cmd::GNSS_POWER_ON } else { cmd::GNSS_POWER_OFF };
        self.send_and_read(command, ResponseStatus::Ok, self.timings.rx_ms)
    }

    /// `(used, total)` message slots of the preferred storage.
    pub fn number_of_sms(&mut self) -> Result<(u32, u32)> {
        self.send_and_read(cmd::SMS_STORAGE, ResponseStatus::MsgNum, self.timings.rx_ms)?;
        let (storage, used, total) = self
            .parser
            .text_and_two_numbers()
            .ok_or(GsmError::MissingField("CPMS"))?;
        self.last_storage = storage;
        Ok((u32::try_from(used).unwrap_or(0), u32::try_from(total).unwrap_or(0)))
    }

    /// Read the SMS stored at `index`.
    pub fn read_sms(&mut self, index: u32) -> Result<SmsMessage> {
        self.send_and_read(cmd::SMS_TEXT_MODE, ResponseStatus::Ok, self.timings.rx_ms)?;
        let command = format!("{}{index}", cmd::SMS_READ);
        self.send_and_read(&command, ResponseStatus::Ok, self.timings.rx_ms)?;

        let envelope = self
            .parser
            .sms_envelope(cmd::SMS_READ_MARKER)
            .ok_or(GsmError::MissingField("CMGR"))?;
        let received = break_time(&envelope.timestamp).ok_or(GsmError::MissingField("CMGR timestamp"))?;

        Ok(SmsMessage {
            body: envelope.body,
            sender: envelope.sender,
            received,
        })
    }

    /// Delete every stored SMS.
    pub fn delete_all_sms(&mut self) -> Result<()> {
        self.send_and_read(cmd::SMS_TEXT_MODE, ResponseStatus::Ok, self.timings.rx_ms)?;
        let command = format!("{}1,4", cmd::SMS_DELETE);
        self.send_and_read(&command, ResponseStatus::Ok, self.timings.rx_ms)
    }

    pub fn delete_sms(&mut self, index: u32) -> Result<()> {
        self.send_and_read(cmd::SMS_TEXT_MODE, ResponseStatus::Ok, self.timings.rx_ms)?;
        let command = format!("{}{index}", cmd::SMS_DELETE);
        self.send_and_read(&command, ResponseStatus::Ok, self.timings.rx_ms)
    }

    /// Send a text-mode SMS.
    pub fn send_sms(&mut self, number: &str, text: &str) -> Result<()> {
        if number.is_empty() {
            return Err(GsmError::InvalidArgument("empty phone number".to_string()));
        }
        if text.is_empty() {
            return Err(GsmError::InvalidArgument("empty SMS body".to_string()));
        }

        self.send_and_read(cmd::SMS_TEXT_MODE, ResponseStatus::Ok, self.timings.rx_ms)?;
        let command = format!("{}=\"{number}\"", cmd::SMS_SEND);
        self.send_and_read(&command, ResponseStatus::SmsReady, self.timings.rx_ms)?;
        self.send_data(text)?;
        self.send_and_read(cmd::CTRL_Z, ResponseStatus::Ok, self.timings.rx_ms)?;
        info!("SMS sent to {number} ({} chars)", text.len());
        Ok(())
    }

    /// Received signal strength, 0 to 31 or 99 when unknown.
    pub fn signal_quality(&mut self) -> Result<u8> {
        self.send_and_read(cmd::SIGNAL_QUALITY, ResponseStatus::Ok, self.timings.rx_ms)?;
        let (rssi, _ber) = self.parser.two_values().ok_or(GsmError::MissingField("CSQ"))?;
        u8::try_from(rssi).map_err(|_| GsmError::Rejected(format!("signal quality {rssi}")))
    }

    /// `CREG` stat value; see [`is_service_usable`](super::is_service_usable).
    pub fn registration(&mut self) -> Result<u8> {
        self.send_and_read(cmd::REGISTRATION, ResponseStatus::Ok, self.timings.rx_ms)?;
        let (_n, stat) = self.parser.two_values().ok_or(GsmError::MissingField("CREG"))?;
        u8::try_from(stat).map_err(|_| GsmError::Rejected(format!("registration stat {stat}")))
    }

    /// Modem clock normalized to UTC.
    pub fn read_rtc(&mut self) -> Result<NaiveDateTime> {
        self.send_and_read(cmd::READ_CLOCK, ResponseStatus::Clock, self.timings.rx_ms)?;
        self.parser.date_time().ok_or(GsmError::MissingField("CCLK"))
    }

    /// Toggle network time sync and store it in the modem profile.
    pub fn enable_rtc(&mut self, enable: bool) -> Result<()> {
        let command = if enable { cmd::NETWORK_TIME_ON } else { cmd::NETWORK_TIME_OFF };
        self.send_and_read(command, ResponseStatus::Ok, self.timings.rx_ms)?;
        self.send_and_read(cmd::SAVE_PROFILE, ResponseStatus::Ok, self.timings.rx_ms)
    }
}
