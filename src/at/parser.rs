//! Byte-driven AT response state machine.

use super::vocabulary::{
    ANSWER_MARKERS, IGNORED_DELIMITER, LINE_DELIMITER, ParserState, QUERY_TERMINATORS, QueryType, ResponseStatus,
    classify_prefix, contains_ignore_case, ends_with_ignore_case, labels_of,
};
use super::between_quotes;
use tracing::trace;

/// Lines kept per cycle before the answer is declared `Unknown`.
pub const MAX_RESPONSE_LINES: usize = 10;

/// Classifies a modem byte stream into one response per cycle.
///
/// Feed bytes with [`AtParser::feed`] until it returns `true`, read the
/// results, then call [`AtParser::init`] before the next cycle.
#[derive(Debug)]
pub struct AtParser {
    state: ParserState,
    preferred: Option<ResponseStatus>,
    status: ResponseStatus,
    query_type: QueryType,
    query: String,
    query_param: String,
    buffer: String,
    lines: Vec<String>,
    max_lines: usize,
}

impl Default for AtParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AtParser {
    /// Create a parser waiting for an answer.
    pub fn new() -> Self {
        Self {
            state: ParserState::AnswerBegin,
            preferred: None,
            status: ResponseStatus::Unknown,
            query_type: QueryType::Unknown,
            query: String::new(),
            query_param: String::new(),
            buffer: String::new(),
            lines: Vec::new(),
            max_lines: MAX_RESPONSE_LINES,
        }
    }

    /// Override the line budget.
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Reset all buffers and start a new cycle at `start`.
    pub fn init(&mut self, start: ParserState) {
        self.state = start;
        self.clear_content();
    }

    /// Status the next cycle searches for first. `None` accepts any vocabulary prefix.
    pub fn set_preferred(&mut self, preferred: Option<ResponseStatus>) {
        self.preferred = preferred;
    }

    pub fn preferred(&self) -> Option<ResponseStatus> {
        self.preferred
    }

    /// Consume one byte. Returns true once the cycle is complete.
    pub fn feed(&mut self, byte: u8) -> bool {
        if byte == IGNORED_DELIMITER {
            return self.is_complete();
        }

        match self.state {
            ParserState::QueryBegin => {
                self.clear_content();
                self.buffer.push(char::from(byte));
                self.state = ParserState::QueryContent;
            }
            ParserState::QueryContent => self.query_content(byte),
            ParserState::AnswerBegin => self.answer_begin(byte),
            ParserState::AnswerContent => self.answer_content(byte),
            ParserState::AnswerEnd => {}
        }

        self.is_complete()
    }

    /// Feed bytes left to right, stopping at the first completed cycle.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> bool {
        for &byte in bytes {
            if self.feed(byte) {
                return true;
            }
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParserState::AnswerEnd
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Status resolved by the last completed cycle.
    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    /// Lines collected during the current cycle, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn query_param(&self) -> &str {
        &self.query_param
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Whether any collected line contains a label of `status`.
    pub fn is_status_exists(&self, status: ResponseStatus) -> bool {
        labels_of(status).any(|label| self.lines.iter().any(|line| contains_ignore_case(line, label)))
    }

    fn clear_content(&mut self) {
        self.query.clear();
        self.query_param.clear();
        self.buffer.clear();
        self.lines.clear();
        self.query_type = QueryType::Unknown;
        self.status = ResponseStatus::Unknown;
    }

    fn query_content(&mut self, byte: u8) {
        self.buffer.push(char::from(byte));

        let Some(&(terminator, kind)) = QUERY_TERMINATORS
            .iter()
            .find(|(terminator, _)| ends_with_ignore_case(&self.buffer, terminator))
        else {
            return;
        };

        match kind {
            QueryType::Exec => {
                self.buffer.truncate(self.buffer.len() - terminator.len());
                if self.query_type == QueryType::Unknown {
                    self.query_type = QueryType::Exec;
                    self.query = std::mem::take(&mut self.buffer);
                } else {
                    self.query_param = std::mem::take(&mut self.buffer);
                }
                self.state = ParserState::AnswerBegin;
            }
            // `=` already closed the command name; a bare `?` after it is `=?`
            QueryType::Get if self.query_type == QueryType::Set && self.buffer == "?" => {
                self.query_type = QueryType::Test;
                self.buffer.clear();
            }
            _ if self.query_type == QueryType::Unknown => {
                self.buffer.truncate(self.buffer.len() - terminator.len());
                self.query_type = kind;
                self.query = std::mem::take(&mut self.buffer);
            }
            // parameter text may carry `:` or `=`
            _ => {}
        }
    }

    fn answer_begin(&mut self, byte: u8) {
        if byte == LINE_DELIMITER {
            return;
        }
        if ANSWER_MARKERS.contains(&byte) {
            self.buffer.clear();
            return;
        }
        self.buffer.push(char::from(byte));
        self.state = ParserState::AnswerContent;
    }

    fn answer_content(&mut self, byte: u8) {
        if byte == LINE_DELIMITER {
            let line = std::mem::take(&mut self.buffer);
            if !line.is_empty() {
                self.finish_line(line);
            }
            if !self.is_complete() {
                self.state = ParserState::AnswerBegin;
            }
            return;
        }

        self.buffer.push(char::from(byte));
        self.special_case();
    }

    fn finish_line(&mut self, line: String) {
        let resolved = match self.preferred {
            None => classify_prefix(&line).map(|(_, status)| status),
            Some(preferred) => labels_of(preferred)
                .any(|label| contains_ignore_case(&line, label))
                .then_some(preferred),
        };

        self.lines.push(line);

        if let Some(status) = resolved {
            self.complete(status);
        } else if self.lines.len() > self.max_lines {
            trace!("AT line budget exhausted after {} lines", self.lines.len());
            self.complete(ResponseStatus::Unknown);
        }
    }

    /// Prompt and caller-id lines carry no delimiter worth waiting for.
    fn special_case(&mut self) {
        match classify_prefix(&self.buffer) {
            Some((_, ResponseStatus::SmsReady)) => {
                let line = std::mem::take(&mut self.buffer);
                self.lines.push(line);
                self.complete(ResponseStatus::SmsReady);
            }
            Some((_, ResponseStatus::CallerId)) if !between_quotes(&self.buffer).is_empty() => {
                let line = std::mem::take(&mut self.buffer);
                self.lines.push(line);
                self.complete(ResponseStatus::CallerId);
            }
            _ => {}
        }
    }

    fn complete(&mut self, status: ResponseStatus) {
        self.status = status;
        self.state = ParserState::AnswerEnd;
    }
}
