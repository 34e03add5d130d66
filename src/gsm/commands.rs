//! AT command strings.

pub(crate) const AT: &str = "AT";
pub(crate) const ECHO_OFF: &str = "ATE0";
pub(crate) const ECHO_ON: &str = "ATE1";
pub(crate) const FLIGHT_MODE: &str = "AT+CFUN=0";
pub(crate) const PHONE_MODE: &str = "AT+CFUN=1";
pub(crate) const READ_CLOCK: &str = "AT+CCLK?";
pub(crate) const NETWORK_TIME_ON: &str = "AT+CLTS=1";
pub(crate) const NETWORK_TIME_OFF: &str = "AT+CLTS=0";
pub(crate) const SAVE_PROFILE: &str = "AT&W";
pub(crate) const REGISTRATION: &str = "AT+CREG?";
pub(crate) const SIGNAL_QUALITY: &str = "AT+CSQ";
pub(crate) const PIN_STATUS: &str = "AT+CPIN?";
pub(crate) const SMS_TEXT_MODE: &str = "AT+CMGF=1";
pub(crate) const SMS_SEND: &str = "AT+CMGS";
pub(crate) const ICCID: &str = "AT+CCID";
pub(crate) const OPERATOR: &str = "AT+COPS?";
pub(crate) const ANSWER: &str = "ATA";
pub(crate) const HANG_UP: &str = "ATH";
pub(crate) const DIAL: &str = "ATD+";
pub(crate) const CALLER_ID_ON: &str = "AT+CLIP=1";
pub(crate) const CALLER_ID_OFF: &str = "AT+CLIP=0";
pub(crate) const SMS_DELETE: &str = "AT+CMGD=";
pub(crate) const SMS_READ: &str = "AT+CMGR=";
pub(crate) const SMS_STORAGE: &str = "AT+CPMS?";
pub(crate) const GNSS_POWER_ON: &str = "AT+CGNSPWR=1";
pub(crate) const GNSS_POWER_OFF: &str = "AT+CGNSPWR=0";
pub(crate) const GNSS_INFO: &str = "AT+CGNSINF";

/// Terminates an SMS body after the `> ` prompt.
pub(crate) const CTRL_Z: &str = "\x1a";

// answer markers
pub(crate) const SMS_READ_MARKER: &str = "CMGR";
pub(crate) const GNSS_INFO_MARKER: &str = "CGNSINF";
pub(crate) const PIN_READY: &str = "READY";
