//! GSM driver types and defaults.

use chrono::NaiveDateTime;

/// Signal quality value meaning "not known or not detectable".
pub const SIGNAL_UNKNOWN: u8 = 99;

/// Progress reported by the driver while it works.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemProgress {
    /// Hardware bring-up started; first event of `init`.
    HwInit,
    /// Waiting for the modem to settle.
    Wait,
    /// One step of the ping handshake.
    Ping,
    /// GNSS power-up; last event of `init`.
    Gnss,
    /// Reading an answer.
    Rx,
    /// Writing a command.
    Tx,
}

/// A stored SMS read back from the modem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub body: String,
    pub sender: String,
    /// Service centre timestamp, UTC.
    pub received: NaiveDateTime,
}

/// Windows and pauses used by the driver, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTimings {
    /// Whole-command write window.
    pub tx_ms: u64,
    /// Default answer window.
    pub rx_ms: u64,
    /// Short answer window for liveness checks.
    pub check_ms: u64,
    /// Pause after hardware bring-up.
    pub settle_ms: u64,
    /// Boot chatter drain window after the first successful ping.
    pub boot_drain_ms: u64,
    /// Pause after a power cycle before the next ping.
    pub power_cycle_pause_ms: u64,
}

impl Default for DriverTimings {
    fn default() -> Self {
        Self {
            tx_ms: 100,
            rx_ms: 20_000,
            check_ms: 500,
            settle_ms: 5_000,
            boot_drain_ms: 3_000,
            power_cycle_pause_ms: 2_000,
        }
    }
}

/// `CREG` stat values 1 (home) and 5 (roaming) mean service is usable.
pub fn is_service_usable(stat: u8) -> bool {
    matches!(stat, 1 | 5)
}
