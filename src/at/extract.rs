//! Field extractors run over the lines of a completed cycle.

use super::parser::AtParser;
use super::vocabulary::{contains_ignore_case, find_ignore_case};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Minimum length of a quoted `yy/MM/dd,hh:mm:ss±zz` stamp.
const DATE_TIME_MIN_LEN: usize = 20;

/// Sender, timestamp and body of one stored SMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsEnvelope {
    pub sender: String,
    pub timestamp: String,
    pub body: String,
}

/// Time and flags reported by a GNSS information line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnssTime {
    pub time: NaiveDateTime,
    pub fix: bool,
    pub running: bool,
}

/// Text between the first pair of `"` marks, or empty.
pub fn between_quotes(text: &str) -> &str {
    let Some(begin) = text.find('"') else {
        return "";
    };
    match text[begin + 1..].find('"') {
        Some(len) => &text[begin + 1..begin + 1 + len],
        None => "",
    }
}

/// Split `key: value` at the first colon, dropping whitespace outside quotes.
pub fn key_value(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    Some((strip_whitespace(key), strip_whitespace(value)))
}

fn strip_whitespace(text: &str) -> String {
    let mut quoted = false;
    text.chars()
        .filter(|&c| {
            if c == '"' {
                quoted = !quoted;
            }
            quoted || !c.is_whitespace()
        })
        .collect()
}

/// Leading signed decimal of a field, ignoring anything after the digits.
fn leading_int(field: &str) -> Option<i32> {
    let field = field.trim();
    let digits_end = field
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(field.len(), |(i, _)| i);
    field[..digits_end].parse().ok()
}

/// Largest zone offset accepted, in quarter hours.
const MAX_ZONE_QUARTERS: i64 = 96;

/// Convert `yy/MM/dd,hh:mm:ss±zz` to UTC. The zone counts quarter hours.
pub fn break_time(stamp: &str) -> Option<NaiveDateTime> {
    let (date, time) = stamp.trim().split_once(',')?;

    let mut date_parts = date.split('/');
    let year: i32 = date_parts.next()?.trim().parse().ok()?;
    let month: u32 = date_parts.next()?.trim().parse().ok()?;
    let day: u32 = date_parts.next()?.trim().parse().ok()?;

    let sign_at = time.find(['+', '-'])?;
    let (clock, zone) = time.split_at(sign_at);
    let zone_sign = if zone.starts_with('-') { 1 } else { -1 };
    let zone_quarters: i64 = zone[1..].trim().parse().ok()?;
    if !(0..=MAX_ZONE_QUARTERS).contains(&zone_quarters) {
        return None;
    }

    let mut clock_parts = clock.split(':');
    let hour: u32 = clock_parts.next()?.trim().parse().ok()?;
    let minute: u32 = clock_parts.next()?.trim().parse().ok()?;
    let second: u32 = clock_parts.next()?.trim().parse().ok()?;

    let local = NaiveDate::from_ymd_opt(2000i32.checked_add(year)?, month, day)?.and_hms_opt(hour, minute, second)?;
    local.checked_add_signed(TimeDelta::try_minutes(zone_sign * zone_quarters * 15)?)
}

impl AtParser {
    /// Key/value pairs of collected lines that have both parts.
    fn values(&self) -> impl Iterator<Item = String> + '_ {
        self.lines()
            .iter()
            .filter_map(|line| key_value(line))
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .map(|(_, value)| value)
    }

    /// Compare the first value against `expected`, e.g. `CPIN: READY`.
    pub fn compare_response_text(&self, expected: &str) -> Option<bool> {
        self.values().next().map(|value| value.eq_ignore_ascii_case(expected))
    }

    /// First non-empty line not containing `ignore`, with whitespace removed.
    pub fn text(&self, ignore: &str) -> Option<String> {
        self.lines()
            .iter()
            .filter(|line| !line.is_empty())
            .find(|line| ignore.is_empty() || !contains_ignore_case(line, ignore))
            .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect())
    }

    /// `n1,n2` as in `CREG: 0,1` or `CSQ: 20,0`.
    pub fn two_values(&self) -> Option<(i32, i32)> {
        self.values().find_map(|value| {
            let mut fields = value.split(',');
            Some((leading_int(fields.next()?)?, leading_int(fields.next()?)?))
        })
    }

    /// `"text",n` as in `CMTI: "SM",3`.
    pub fn text_and_number(&self) -> Option<(String, i32)> {
        self.values().find_map(|value| {
            let mut fields = value.split(',');
            let text = fields.next().filter(|f| !f.is_empty())?;
            Some((between_quotes(text).to_string(), leading_int(fields.next()?)?))
        })
    }

    /// `"text",n1,n2` as in `CPMS: "SM",3,30,...`.
    pub fn text_and_two_numbers(&self) -> Option<(String, i32, i32)> {
        self.values().find_map(|value| {
            let mut fields = value.split(',');
            let text = fields.next().filter(|f| !f.is_empty())?;
            Some((
                between_quotes(text).to_string(),
                leading_int(fields.next()?)?,
                leading_int(fields.next()?)?,
            ))
        })
    }

    /// `n1,n2,"text"` as in `COPS: 0,0,"Vodafone CZ"`.
    pub fn two_values_and_text(&self) -> Option<(i32, i32, String)> {
        self.values().find_map(|value| {
            let mut fields = value.splitn(3, ',');
            let a = leading_int(fields.next()?)?;
            let b = leading_int(fields.next()?)?;
            let rest = fields.next().filter(|f| !f.is_empty())?;
            Some((a, b, between_quotes(rest).to_string()))
        })
    }

    /// `"text",n,"text"`.
    pub fn text_number_text(&self) -> Option<(String, i32, String)> {
        self.values().find_map(|value| {
            let mut fields = value.splitn(3, ',');
            let first = fields.next().filter(|f| !f.is_empty())?;
            let n = leading_int(fields.next()?)?;
            let rest = fields.next().filter(|f| !f.is_empty())?;
            Some((between_quotes(first).to_string(), n, between_quotes(rest).to_string()))
        })
    }

    /// First non-empty quoted value, e.g. the number of a `CLIP` line.
    pub fn quoted_text(&self) -> Option<String> {
        self.values().find_map(|value| {
            let text = between_quotes(&value);
            (!text.is_empty()).then(|| text.to_string())
        })
    }

    /// Envelope line starting with `marker` followed by the body line.
    pub fn sms_envelope(&self, marker: &str) -> Option<SmsEnvelope> {
        let mut header: Option<(String, String)> = None;

        for line in self.lines() {
            if find_ignore_case(line, marker) == Some(0) {
                let Some((_, value)) = key_value(line) else {
                    continue;
                };
                // "REC UNREAD","+420111222333","","23/03/04,08:22:23+04"
                let mut fields = value.splitn(4, ',');
                let _state = fields.next();
                let sender = fields.next().map(between_quotes).unwrap_or_default();
                let _alpha = fields.next();
                let stamp = fields.next().map(between_quotes).unwrap_or_default();
                if !sender.is_empty() && !stamp.is_empty() {
                    header = Some((sender.to_string(), stamp.to_string()));
                }
            } else if let Some((sender, timestamp)) = header.take() {
                return Some(SmsEnvelope {
                    sender,
                    timestamp,
                    body: line.clone(),
                });
            }
        }
        None
    }

    /// `<run>,<fix>,<yyyyMMddhhmmss.sss>,...` after `marker`.
    pub fn gnss_time(&self, marker: &str) -> Option<GnssTime> {
        self.lines()
            .iter()
            .filter(|line| find_ignore_case(line, marker) == Some(0))
            .filter_map(|line| key_value(line))
            .find_map(|(_, value)| {
                let mut fields = value.split(',');
                let running = leading_int(fields.next()?)? != 0;
                let fix = leading_int(fields.next()?)? != 0;
                let stamp = fields.next()?;
                if stamp.len() < 14 {
                    return None;
                }
                let time = NaiveDateTime::parse_from_str(stamp.get(..14)?, "%Y%m%d%H%M%S").ok()?;
                Some(GnssTime { time, fix, running })
            })
    }

    /// First quoted `yy/MM/dd,hh:mm:ss±zz` stamp, normalized to UTC.
    pub fn date_time(&self) -> Option<NaiveDateTime> {
        let stamp = self
            .lines()
            .iter()
            .map(|line| between_quotes(line))
            .find(|text| !text.is_empty())?;
        if stamp.len() < DATE_TIME_MIN_LEN {
            return None;
        }
        break_time(stamp)
    }
}
