//! Cellular modem driver.
//!
//! [`GsmDriver`] runs blocking, timeout-bounded AT exchanges over any
//! [`ModemTransport`]; [`SerialModem`] is the serial port implementation.

mod commands;
mod driver;
mod error;
mod transport;
mod types;

#[cfg(test)]
pub(crate) mod scripted;
#[cfg(test)]
mod tests;

pub use driver::GsmDriver;
pub use error::{GsmError, Result};
pub use transport::{ModemTransport, SerialModem};
pub use types::{DriverTimings, ModemProgress, SIGNAL_UNKNOWN, SmsMessage, is_service_usable};
