//! Response vocabulary and query terminator tables.

/// Category a modem line resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    Ok,
    Error,
    Status,
    Clock,
    SmsReady,
    Busy,
    Ring,
    NoCarrier,
    NewSms,
    CallerId,
    NoDial,
    MsgNum,
    /// No recognized terminator inside the line budget.
    Unknown,
}

/// Kind of an echoed command, derived from its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Unknown,
    Test,
    Get,
    Set,
    Urc,
    Exec,
}

/// Parser position inside one response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    QueryBegin,
    QueryContent,
    AnswerBegin,
    AnswerContent,
    /// Terminal; only `AtParser::init` leaves it.
    AnswerEnd,
}

/// Line delimiter of modem answers.
pub const LINE_DELIMITER: u8 = b'\r';

/// Byte dropped before it reaches any state.
pub const IGNORED_DELIMITER: u8 = b'\n';

/// Prefix markers stripped from the start of an answer line (`+CSQ`, `#SGACT`, ...).
pub(crate) const ANSWER_MARKERS: &[u8] = b"+#$%\\&";

/// Command terminators, longest first so `=?` wins over `?`.
pub(crate) const QUERY_TERMINATORS: &[(&str, QueryType)] = &[
    ("=?", QueryType::Test),
    ("?", QueryType::Get),
    ("=", QueryType::Set),
    (":", QueryType::Urc),
    ("\r", QueryType::Exec),
];

/// Label prefixes in match order. The first two are the terminator-less special cases.
pub(crate) const VOCABULARY: &[(&str, ResponseStatus)] = &[
    ("CLIP", ResponseStatus::CallerId),
    ("> ", ResponseStatus::SmsReady),
    ("RING", ResponseStatus::Ring),
    ("OK", ResponseStatus::Ok),
    ("CPMS", ResponseStatus::MsgNum),
    ("ERROR", ResponseStatus::Error),
    ("NOT READY", ResponseStatus::Status),
    ("CONNECT OK", ResponseStatus::Status),
    ("CONNECT FAIL", ResponseStatus::Error),
    ("SEND OK", ResponseStatus::Status),
    ("SEND FAIL", ResponseStatus::Error),
    ("DATA ACCEPT", ResponseStatus::Status),
    ("CLOSED", ResponseStatus::Status),
    (">", ResponseStatus::Status),
    ("VOICE CALL: END", ResponseStatus::Status),
    ("CALL READY", ResponseStatus::Status),
    ("SMS READY", ResponseStatus::Status),
    ("NORMAL POWER DOWN", ResponseStatus::Status),
    ("CCLK:", ResponseStatus::Clock),
    ("BUSY", ResponseStatus::Busy),
    ("CMTI", ResponseStatus::NewSms),
    ("NO CARRIER", ResponseStatus::NoCarrier),
    ("NO DIALTONE", ResponseStatus::NoDial),
    ("UNKNOWN", ResponseStatus::Unknown),
];

/// First vocabulary entry whose label prefixes `line`, case-insensitively.
pub(crate) fn classify_prefix(line: &str) -> Option<(&'static str, ResponseStatus)> {
    VOCABULARY
        .iter()
        .copied()
        .find(|(label, _)| starts_with_ignore_case(line, label))
}

/// Labels belonging to `status`, in table order.
pub(crate) fn labels_of(status: ResponseStatus) -> impl Iterator<Item = &'static str> {
    VOCABULARY
        .iter()
        .filter(move |(_, s)| *s == status)
        .map(|(label, _)| *label)
}

pub(crate) fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len() && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

pub(crate) fn ends_with_ignore_case(text: &str, suffix: &str) -> bool {
    text.len() >= suffix.len() && text.as_bytes()[text.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}

/// Byte offset of the first case-insensitive occurrence of `needle`.
pub(crate) fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    find_ignore_case(haystack, needle).is_some()
}
