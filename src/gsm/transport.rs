//! Byte transport between the driver and the modem.

use super::error::Result;
use serialport::{ClearBuffer, SerialPort};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Byte-wise access to a modem plus its two hardware control hooks.
///
/// The driver polls `is_readable`/`is_writable` in tight loops and measures
/// every window against `now_micros`, so implementations must keep that clock
/// monotonic.
pub trait ModemTransport: Send {
    fn is_readable(&mut self) -> bool;
    fn is_writable(&mut self) -> bool;
    /// Take one byte; only called after `is_readable` returned true.
    fn read_byte(&mut self) -> Result<u8>;
    fn write_byte(&mut self, byte: u8) -> Result<()>;
    fn delay_ms(&mut self, ms: u64);
    /// Monotonic clock in microseconds.
    fn now_micros(&mut self) -> u64;
    /// Prepare the line and power the modem.
    fn hardware_bring_up(&mut self) -> Result<()>;
    /// Restart an unresponsive modem.
    fn power_cycle(&mut self) -> Result<()>;
}

/// Modem on a local serial port.
///
/// Power control goes through DTR, which most carrier boards wire to the
/// modem's power key.
pub struct SerialModem {
    port_name: String,
    baud_rate: u32,
    power_pulse: Duration,
    port: Option<Box<dyn SerialPort>>,
    pending: VecDeque<u8>,
    started: Instant,
}

impl SerialModem {
    /// Create a modem handle; the port opens during `hardware_bring_up`.
    pub fn new(port_name: &str, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            power_pulse: Duration::from_millis(1_200),
            port: None,
            pending: VecDeque::new(),
            started: Instant::now(),
        }
    }

    /// Length of the DTR pulse used for `power_cycle`.
    pub fn with_power_pulse(mut self, pulse: Duration) -> Self {
        self.power_pulse = pulse;
        self
    }

    fn open(&self) -> Result<Box<dyn SerialPort>> {
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(10))
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .open()?;
        Ok(port)
    }

    fn fill_pending(&mut self) -> Result<()> {
        let Some(port) = self.port.as_mut() else {
            return Ok(());
        };
        let available = port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(());
        }
        let mut chunk = vec![0u8; available.min(512)];
        match port.read(&mut chunk) {
            Ok(n) => self.pending.extend(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

impl ModemTransport for SerialModem {
    fn is_readable(&mut self) -> bool {
        if self.pending.is_empty() {
            if let Err(e) = self.fill_pending() {
                warn!("Serial read failed on {}: {e}", self.port_name);
            }
        }
        if self.pending.is_empty() {
            // the driver polls in a loop; yield instead of spinning
            std::thread::sleep(Duration::from_millis(1));
            return false;
        }
        true
    }

    fn is_writable(&mut self) -> bool {
        self.port.is_some()
    }

    fn read_byte(&mut self) -> Result<u8> {
        self.pending
            .pop_front()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::WouldBlock, "no byte pending").into())
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "serial port closed"))?;
        port.write_all(&[byte])?;
        Ok(())
    }

    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn now_micros(&mut self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }

    fn hardware_bring_up(&mut self) -> Result<()> {
        info!("Opening modem port {} at {} baud", self.port_name, self.baud_rate);
        let mut port = self.open()?;
        port.write_data_terminal_ready(true)?;
        port.write_request_to_send(true)?;
        port.clear(ClearBuffer::All)?;
        self.pending.clear();
        self.port = Some(port);
        Ok(())
    }

    fn power_cycle(&mut self) -> Result<()> {
        if self.port.is_none() {
            return self.hardware_bring_up();
        }
        let pulse = self.power_pulse;
        if let Some(port) = self.port.as_mut() {
            debug!("Power cycling modem on {} ({:?} pulse)", self.port_name, pulse);
            port.write_data_terminal_ready(false)?;
            std::thread::sleep(pulse);
            port.write_data_terminal_ready(true)?;
            port.clear(ClearBuffer::All)?;
        }
        self.pending.clear();
        Ok(())
    }
}
