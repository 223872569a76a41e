//! Minimal iCalendar (RFC 5545) reader.
//!
//! Only what the agenda needs is extracted from each VEVENT: start, end or
//! duration, summary and location. Nested components such as VALARM are
//! skipped, and recurrence rules are not interpreted because the CalDAV
//! server expands recurring events before they reach this parser.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// A date or date-time value as written in the calendar data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IcalTime {
    /// VALUE=DATE, an all-day value
    Date(NaiveDate),
    /// Local time, optionally tied to a TZID parameter
    Floating {
        value: NaiveDateTime,
        tzid: Option<String>,
    },
    /// Absolute time ("Z" suffix)
    Utc(DateTime<Utc>),
}

impl IcalTime {
    /// Timezone named by the value, if any
    pub fn tzid(&self) -> Option<&str> {
        match self {
            IcalTime::Floating { tzid, .. } => tzid.as_deref(),
            _ => None,
        }
    }
}

/// One VEVENT as found in the calendar data, before normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub start: Option<IcalTime>,
    pub end: Option<IcalTime>,
    pub duration: Option<Duration>,
    pub summary: Option<String>,
    pub location: Option<String>,
}

/// Parse all VEVENT components of an iCalendar document.
pub fn parse_events(ics: &str) -> Vec<RawEvent> {
    let mut events = Vec::new();
    let mut current: Option<RawEvent> = None;
    let mut nested = 0usize;

    for line in unfold(ics) {
        let Some(property) = Property::parse(&line) else {
            continue;
        };
        match (property.name.as_str(), current.as_mut()) {
            ("BEGIN", None) if property.value.eq_ignore_ascii_case("VEVENT") => {
                current = Some(RawEvent::default());
                nested = 0;
            }
            ("BEGIN", Some(_)) => nested += 1,
            ("END", Some(_)) if nested > 0 => nested -= 1,
            ("END", Some(_)) if property.value.eq_ignore_ascii_case("VEVENT") => {
                events.extend(current.take());
            }
            (_, Some(event)) if nested == 0 => property.apply(event),
            _ => {}
        }
    }
    events
}

/// Join folded lines (CRLF followed by a space or tab).
fn unfold(ics: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in ics.lines() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        match (raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')), lines.last_mut()) {
            (Some(continuation), Some(last)) => last.push_str(continuation),
            _ if raw.is_empty() => {}
            _ => lines.push(raw.to_string()),
        }
    }
    lines
}

struct Property {
    name: String,
    params: Vec<(String, String)>,
    value: String,
}

impl Property {
    fn parse(line: &str) -> Option<Self> {
        // The value starts at the first colon outside a quoted parameter
        let mut in_quotes = false;
        let split = line.char_indices().find_map(|(i, c)| match c {
            '"' => {
                in_quotes = !in_quotes;
                None
            }
            ':' if !in_quotes => Some(i),
            _ => None,
        })?;
        let (head, value) = (&line[..split], &line[split + 1..]);

        let mut parts = head.split(';');
        let name = parts.next()?.trim().to_ascii_uppercase();
        if name.is_empty() {
            return None;
        }
        let params = parts
            .filter_map(|p| p.split_once('='))
            .map(|(k, v)| (k.trim().to_ascii_uppercase(), v.trim_matches('"').to_string()))
            .collect();

        Some(Property {
            name,
            params,
            value: value.to_string(),
        })
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn apply(self, event: &mut RawEvent) {
        match self.name.as_str() {
            "DTSTART" => event.start = self.time(),
            "DTEND" => event.end = self.time(),
            "DURATION" => event.duration = parse_duration(&self.value),
            "SUMMARY" => event.summary = Some(unescape_text(&self.value)),
            "LOCATION" => event.location = Some(unescape_text(&self.value)),
            _ => {}
        }
    }

    fn time(&self) -> Option<IcalTime> {
        let value = self.value.trim();
        let is_date = self
            .param("VALUE")
            .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
            || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()));
        if is_date {
            return NaiveDate::parse_from_str(value, "%Y%m%d")
                .ok()
                .map(IcalTime::Date);
        }
        if let Some(utc) = value.strip_suffix('Z') {
            return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                .ok()
                .map(|naive| IcalTime::Utc(Utc.from_utc_datetime(&naive)));
        }
        NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
            .ok()
            .map(|value| IcalTime::Floating {
                value,
                tzid: self.param("TZID").map(str::to_string),
            })
    }
}

/// Parse an RFC 5545 duration such as `PT1H30M`, `P1D` or `-P2W`.
///
/// Values outside the representable range are treated as malformed.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, rest) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    let rest = rest.strip_prefix('P')?;

    let mut total = Duration::zero();
    let mut number = String::new();
    let mut in_time = false;
    let mut seen_unit = false;
    for c in rest.chars() {
        match c {
            '0'..='9' => number.push(c),
            'T' => in_time = true,
            unit => {
                let n: i64 = number.parse().ok()?;
                number.clear();
                let part = match (unit, in_time) {
                    ('W', false) => Duration::try_weeks(n),
                    ('D', false) => Duration::try_days(n),
                    ('H', true) => Duration::try_hours(n),
                    ('M', true) => Duration::try_minutes(n),
                    ('S', true) => Duration::try_seconds(n),
                    _ => return None,
                }?;
                total = total.checked_add(&part)?;
                seen_unit = true;
            }
        }
    }
    if !number.is_empty() || !seen_unit {
        return None;
    }
    if negative {
        Duration::zero().checked_sub(&total)
    } else {
        Some(total)
    }
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push(' '),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
