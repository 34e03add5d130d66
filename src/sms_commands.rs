//! SMS command table and analyzer.

use crate::at::contains_ignore_case;

/// What an SMS asks the gateway to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Nothing recognized; answered with the help text.
    None,
    /// Switch output `index` (1-based).
    Output { index: u8, on: bool },
    AllOff,
    State,
    Add,
    List,
}

/// One row of the command table.
#[derive(Debug, Clone, Copy)]
pub struct CommandEntry {
    /// Case-insensitive pattern searched anywhere in the message.
    pub pattern: &'static str,
    pub kind: CommandKind,
    /// Hardware pin for output commands.
    pub pin: Option<u32>,
    /// Only the supreme commander may use it.
    pub admin_only: bool,
}

const AUX_PINS: [u32; 7] = [16, 17, 18, 19, 20, 21, 22];

const fn output(pattern: &'static str, index: u8, on: bool) -> CommandEntry {
    CommandEntry {
        pattern,
        kind: CommandKind::Output { index, on },
        pin: Some(AUX_PINS[index as usize - 1]),
        admin_only: false,
    }
}

const fn plain(pattern: &'static str, kind: CommandKind, admin_only: bool) -> CommandEntry {
    CommandEntry {
        pattern,
        kind,
        pin: None,
        admin_only,
    }
}

/// Scanned in order; the first match wins.
pub const COMMANDS: &[CommandEntry] = &[
    output("1 ON", 1, true),
    output("1 OFF", 1, false),
    output("2 ON", 2, true),
    output("2 OFF", 2, false),
    output("3 ON", 3, true),
    output("3 OFF", 3, false),
    output("4 ON", 4, true),
    output("4 OFF", 4, false),
    output("5 ON", 5, true),
    output("5 OFF", 5, false),
    output("6 ON", 6, true),
    output("6 OFF", 6, false),
    output("7 ON", 7, true),
    output("7 OFF", 7, false),
    plain("ALL OFF", CommandKind::AllOff, false),
    plain("STATE", CommandKind::State, false),
    plain("ADD", CommandKind::Add, true),
    plain("LIST", CommandKind::List, true),
];

/// Result of [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmsCommand {
    pub kind: CommandKind,
    pub pin: Option<u32>,
    pub on: bool,
}

impl SmsCommand {
    pub const UNASSIGNED: SmsCommand = SmsCommand {
        kind: CommandKind::None,
        pin: None,
        on: false,
    };

    pub fn is_admin_only(&self) -> bool {
        matches!(self.kind, CommandKind::Add | CommandKind::List)
    }
}

/// Find the first table entry whose pattern occurs in `text`.
pub fn analyze(text: &str) -> SmsCommand {
    COMMANDS
        .iter()
        .find(|entry| contains_ignore_case(text, entry.pattern))
        .map(|entry| SmsCommand {
            kind: entry.kind,
            pin: entry.pin,
            on: matches!(entry.kind, CommandKind::Output { on: true, .. }),
        })
        .unwrap_or(SmsCommand::UNASSIGNED)
}

/// Every pattern anyone may send, one per line.
pub fn list_of_commands() -> String {
    COMMANDS
        .iter()
        .filter(|entry| !entry.admin_only)
        .map(|entry| format!("{}\n", entry.pattern))
        .collect()
}

/// Output pins in output order.
pub fn output_pins() -> Vec<u32> {
    let mut pins: Vec<u32> = COMMANDS.iter().filter_map(|entry| entry.pin).collect();
    pins.dedup();
    pins
}
