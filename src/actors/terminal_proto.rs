//! Line protocol of the wired terminal.
//!
//! Request: `<address><command>[value];[checksum]` closed by CR, LF is
//! ignored. An uppercase command carries no checksum, a lowercase one must
//! be followed by the checksum character after `;`.
//!
//! | cmd | meaning                     |
//! |-----|-----------------------------|
//! | `R` | read output states          |
//! | `C` | clear outputs               |
//! | `T` | unix time                   |
//! | `A` | time and date as text       |
//!
//! Response: `<address><command><value>;[checksum]`, echoing the command
//! with the case of the request.

use tracing::trace;

/// Address of this device on the terminal line.
pub const ADDRESS: u8 = b'T';

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const SEPARATOR: u8 = b';';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCommand {
    Read,
    Clear,
    Time,
    AsciiTime,
}

impl TerminalCommand {
    fn from_code(code: u8) -> Option<(Self, bool)> {
        let command = match code.to_ascii_uppercase() {
            b'R' => Self::Read,
            b'C' => Self::Clear,
            b'T' => Self::Time,
            b'A' => Self::AsciiTime,
            _ => return None,
        };
        Some((command, code.is_ascii_lowercase()))
    }

    /// Command letter, lowercase when a checksum is used.
    pub fn code(self, checksum: bool) -> char {
        let code = match self {
            Self::Read => 'R',
            Self::Clear => 'C',
            Self::Time => 'T',
            Self::AsciiTime => 'A',
        };
        if checksum { code.to_ascii_lowercase() } else { code }
    }
}

/// Fold a checksum byte into the printable range `!`..=`~`.
pub fn convert_to_char(value: u8) -> char {
    let mut c = value;
    if c < 33 {
        c += 33;
    } else if c > 126 {
        c -= 126;
        if c < 33 {
            c += 32;
        }
        if c > 126 {
            c -= 32;
        }
    }
    char::from(c)
}

/// XOR of all bytes, printable.
pub fn checksum(bytes: &[u8]) -> char {
    convert_to_char(bytes.iter().fold(0, |acc, b| acc ^ b))
}

/// Build a response frame, without line end.
pub fn make_response(command: TerminalCommand, value: Option<&str>, with_checksum: bool) -> String {
    let mut frame = String::new();
    frame.push(char::from(ADDRESS));
    frame.push(command.code(with_checksum));
    if let Some(value) = value {
        frame.push_str(value);
    }
    frame.push(char::from(SEPARATOR));
    if with_checksum {
        let check = checksum(frame.as_bytes());
        frame.push(check);
    }
    frame
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Address,
    Command,
    Value,
    Check,
    Done,
}

/// Byte-wise request parser.
#[derive(Debug)]
pub struct TerminalProto {
    step: Step,
    ignore: bool,
    with_checksum: bool,
    command: Option<TerminalCommand>,
    value: u32,
    acc: String,
    check: u8,
}

impl Default for TerminalProto {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalProto {
    pub fn new() -> Self {
        Self {
            step: Step::Address,
            ignore: false,
            with_checksum: false,
            command: None,
            value: 0,
            acc: String::new(),
            check: 0,
        }
    }

    /// Consume one byte. Returns true when a complete, valid request ended with it.
    pub fn parse(&mut self, byte: u8) -> bool {
        match byte {
            LF => return false,
            CR => {
                self.step = Step::Address;
                self.ignore = false;
                self.check = 0;
                return false;
            }
            _ if self.ignore => return false,
            _ => {}
        }

        match self.step {
            Step::Address => {
                if byte == ADDRESS {
                    self.check = byte;
                    self.with_checksum = false;
                    self.command = None;
                    self.acc.clear();
                    self.step = Step::Command;
                } else {
                    self.ignore = true;
                }
                false
            }
            Step::Command => {
                self.check ^= byte;
                match TerminalCommand::from_code(byte) {
                    Some((command, with_checksum)) => {
                        self.command = Some(command);
                        self.with_checksum = with_checksum;
                        self.step = Step::Value;
                    }
                    None => {
                        self.command = None;
                        self.ignore = true;
                    }
                }
                false
            }
            Step::Value => {
                self.check ^= byte;
                if byte != SEPARATOR {
                    self.acc.push(char::from(byte));
                    return false;
                }
                self.value = self.acc.trim().parse().unwrap_or(0);
                if self.with_checksum {
                    self.step = Step::Check;
                    false
                } else {
                    self.step = Step::Done;
                    true
                }
            }
            Step::Check => {
                let expected = convert_to_char(self.check);
                trace!("Terminal checksum expected {expected:?}, got {:?}", char::from(byte));
                self.step = Step::Done;
                expected == char::from(byte)
            }
            Step::Done => false,
        }
    }

    pub fn command(&self) -> Option<TerminalCommand> {
        self.command
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn is_checksum_required(&self) -> bool {
        self.with_checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(proto: &mut TerminalProto, frame: &[u8]) -> bool {
        frame.iter().fold(false, |done, &b| proto.parse(b) || done)
    }

    #[test]
    fn test_plain_read() {
        let mut proto = TerminalProto::new();
        assert!(feed(&mut proto, b"TR;"));
        assert_eq!(proto.command(), Some(TerminalCommand::Read));
        assert!(!proto.is_checksum_required());
    }

    #[test]
    fn test_value_parsed() {
        let mut proto = TerminalProto::new();
        assert!(feed(&mut proto, b"\r\nTC12;"));
        assert_eq!(proto.command(), Some(TerminalCommand::Clear));
        assert_eq!(proto.value(), 12);
    }

    #[test]
    fn test_checksum_required() {
        let frame = b"Tt;";
        let check = checksum(frame) as u8;

        let mut proto = TerminalProto::new();
        let mut request = frame.to_vec();
        request.push(check);
        assert!(feed(&mut proto, &request));
        assert!(proto.is_checksum_required());
        assert_eq!(proto.command(), Some(TerminalCommand::Time));

        let mut proto = TerminalProto::new();
        let wrong = if check == b'!' { b'"' } else { b'!' };
        assert!(!feed(&mut proto, &[b'T', b't', b';', wrong]));
    }

    #[test]
    fn test_other_address_ignored_until_cr() {
        let mut proto = TerminalProto::new();
        assert!(!feed(&mut proto, b"XR;TR;"));
        assert!(feed(&mut proto, b"\rTR;"));
    }

    #[test]
    fn test_unknown_command_ignored() {
        let mut proto = TerminalProto::new();
        assert!(!feed(&mut proto, b"TX;"));
        assert_eq!(proto.command(), None);
    }

    #[test]
    fn test_convert_to_char_printable() {
        for value in 0..=255u8 {
            let c = convert_to_char(value);
            assert!(('!'..='~').contains(&c), "{value} -> {c:?}");
        }
    }

    #[test]
    fn test_make_response() {
        assert_eq!(make_response(TerminalCommand::Read, Some("5"), false), "TR5;");
        assert_eq!(make_response(TerminalCommand::Time, None, false), "TT;");

        let checked = make_response(TerminalCommand::Read, Some("5"), true);
        assert!(checked.starts_with("Tr5;"));
        assert_eq!(checked.chars().last(), Some(checksum(b"Tr5;")));
    }
}
