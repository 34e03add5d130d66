//! Fixed display lines and SMS replies.
//!
//! Display strings are sized for an 11-column line; several carry
//! trailing spaces that overwrite whatever was shown before.

/// Lines shown on the status display.
pub mod display {
    pub const WELCOME: &str = " GSM & GPS";
    pub const HW_INIT: &str = "HW init";
    pub const WAIT: &str = "waiting ... ";
    pub const GSM_ERROR: &str = ">error ";
    pub const GSM_OK: &str = ">ready";
    pub const PIN_ERROR: &str = "UNLOCK PIN";
    pub const PIN_OK: &str = ">pin OK";
    pub const SIM_ERROR: &str = "SIM ERROR";
    pub const SIM_ERROR_2: &str = "SIM ERROR 2";
    pub const SIM_OK: &str = ">sim OK";
    pub const REGISTRATION_ERROR: &str = "network ERR";
    pub const CALLER_ID_ERROR: &str = "CALLID ERROR";
    pub const CALLER_ID_OK: &str = ">call ID OK";
    pub const GSM_TIME_ERROR: &str = "GSM error  ";
    pub const GPS_TIME_ERROR: &str = "GPS error  ";
    pub const GSM_TIME_OK: &str = " GSM  ";
    pub const GPS_TIME_OK: &str = " GPS  ";
    pub const RING: &str = "RING       ";
    pub const LEARNING: &str = "CALL ME!";
    pub const REGISTRATION: &str = "Registered: ";
    pub const MASTER: &str = "as master";
    pub const OK: &str = "OK";
    pub const ERROR: &str = "ERROR";
    pub const SMS_COMMAND: &str = "SMS command:";
    pub const FULL_ERROR: &str = "FULL storage";
    pub const OUTPUT: &str = "O: ";
}

/// Replies sent back to the commander by SMS.
pub mod sms {
    pub const FULL: &str = "cannot be added, positions occupied";
    pub const ADD: &str = "Command accepted. The new user must call the gateway.";
    pub const ACCEPTED: &str = "Command accepted.";
    pub const REGISTRATION_ACCEPTED: &str = "The registration of the phone number was successful.";
    pub const FAILED: &str = "Execution of the command failed. ";

    /// Help reply listing the commands anyone may send.
    pub fn help(list_of_commands: &str) -> String {
        format!("allowed commands:\n{list_of_commands}")
    }

    /// Reply to `LIST`.
    pub fn operators(list: &str) -> String {
        format!("List of operators: \n{list}")
    }

    /// Reply to `STATE`.
    pub fn state(last_out: &str) -> String {
        format!("Output states: \n{last_out}")
    }
}
