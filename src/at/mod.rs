//! AT command response parsing.
//!
//! Turns the line-oriented byte stream of a cellular modem into one
//! classified response per cycle and offers extractors for the usual
//! answer shapes (`CSQ`, `CREG`, `CMGR`, `CCLK`, ...).

mod extract;
mod parser;
mod vocabulary;


pub use extract::{GnssTime, SmsEnvelope, between_quotes, break_time, key_value};
pub use parser::{AtParser, MAX_RESPONSE_LINES};
pub use vocabulary::{IGNORED_DELIMITER, LINE_DELIMITER, ParserState, QueryType, ResponseStatus};
pub(crate) use vocabulary::contains_ignore_case;
