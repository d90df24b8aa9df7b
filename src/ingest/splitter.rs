//! Log splitter (spec §4.4): groups lines into timestamped events, carrying
//! multi-line continuations (stack traces, diagnostic reports) with the
//! event that introduced them.

use chrono::TimeZone;
use chrono_tz::Tz;
use std::sync::LazyLock;

static TIMESTAMP_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^\d{4}[-/]\d{2}[-/]\d{2}\s\d{2}:\d{2}:\d{2}\.\d{3}").unwrap()
});

/// One grouped log event before timestamp parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub timestamp: String,
    pub content: String,
}

/// Splits `text` into [`RawEvent`]s per the spec's line-grouping algorithm.
pub fn split_events(text: &str) -> Vec<RawEvent> {
    let mut events = Vec::new();
    let mut current_event = String::new();
    let mut current_timestamp = String::new();

    for line in text.lines() {
        if TIMESTAMP_RE.is_match(line) {
            if !current_event.is_empty() {
                events.push(RawEvent { timestamp: current_timestamp.clone(), content: std::mem::take(&mut current_event) });
            }
            current_event = line.to_string();
            current_timestamp = line.chars().take(23).collect();
        } else if !current_event.is_empty() {
            current_event.push('\n');
            current_event.push_str(line);
        } else {
            // File started with a non-timestamp line: standalone event with
            // an empty timestamp (spec §4.4).
            current_event = line.to_string();
            current_timestamp.clear();
        }
    }

    if !current_event.is_empty() {
        events.push(RawEvent { timestamp: current_timestamp, content: current_event });
    }

    events
}

#[derive(thiserror::Error, Debug, Clone)]
#[error("unparseable timestamp prefix: {0:?}")]
pub struct TimestampParseError(pub String);

/// Parses the 23-char timestamp prefix (`split on \t, space, '.', ':', '-',
/// '/'`, expecting `[Y, M, D, h, m, s, ms]`) under `zone` into epoch
/// milliseconds (spec §4.4).
pub fn parse_log_timestamp(prefix: &str, zone: Tz) -> Result<i64, TimestampParseError> {
    let parts: Vec<&str> = prefix
        .split(|c| matches!(c, '\t' | ' ' | '.' | ':' | '-' | '/'))
        .filter(|s| !s.is_empty())
        .collect();

    let [y, mo, d, h, mi, s, ms] = parts.as_slice() else {
        return Err(TimestampParseError(prefix.to_string()));
    };

    let parse = |s: &str| s.parse::<u32>().map_err(|_| TimestampParseError(prefix.to_string()));
    let year: i32 = y.parse().map_err(|_| TimestampParseError(prefix.to_string()))?;
    let (month, day, hour, minute, second, millis) =
        (parse(mo)?, parse(d)?, parse(h)?, parse(mi)?, parse(s)?, parse(ms)?);

    let naive = chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_milli_opt(hour, minute, second, millis))
        .ok_or_else(|| TimestampParseError(prefix.to_string()))?;

    match zone.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.timestamp_millis()),
        chrono::LocalResult::Ambiguous(dt, _) => Ok(dt.timestamp_millis()),
        chrono::LocalResult::None => Err(TimestampParseError(prefix.to_string())),
    }
}
