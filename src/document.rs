use crate::encoder::{unescape, FIELD_DELIMITER, LINE_TIME_PARSE_FORMAT, MIRROR_FIELD_COUNT};
use crate::entry::Entry;
use chrono::{Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

/// Category that switches a document to trace enrichment.
pub const TRACE_CATEGORY: &str = "trace";

/// Typed hand-off from the write path to the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRecord {
    /// Milliseconds since the Unix epoch, `0` if the time was unreadable.
    pub time_ms: i64,
    pub level: String,
    pub source: String,
    pub category: String,
    pub payload: String,
}

/// Error produced when a rendered line does not carry the mirror columns.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("expected at least {expected} tab-separated fields, found {found}")]
pub struct MalformedLine {
    pub expected: usize,
    pub found: usize,
}

impl MirrorRecord {
    pub fn from_entry(entry: &Entry) -> Self {
        MirrorRecord {
            time_ms: entry.time.timestamp_millis(),
            level: entry.level.as_str().to_string(),
            source: entry.caller.clone().unwrap_or_default(),
            category: entry.logger_name.clone(),
            payload: entry.message.clone(),
        }
    }

    /// Read the mirror columns from a line rendered by
    /// [`TabEncoder`](crate::encoder::TabEncoder).
    ///
    /// Text columns are unescaped, so the record holds the same raw text as
    /// one built with [`MirrorRecord::from_entry`]. Columns past the payload
    /// (rendered context fields) are ignored. An unreadable timestamp yields
    /// `time_ms == 0` rather than an error.
    pub fn parse_line(line: &str) -> Result<Self, MalformedLine> {
        let line = line.trim_end_matches(&['\n', '\r'][..]);
        let mut columns = line.split(FIELD_DELIMITER);

        let parsed = (columns.next(), columns.next(), columns.next(), columns.next(), columns.next());
        let (Some(time), Some(level), Some(source), Some(category), Some(payload)) = parsed else {
            return Err(MalformedLine {
                expected: MIRROR_FIELD_COUNT,
                found: line.split(FIELD_DELIMITER).count(),
            });
        };

        Ok(MirrorRecord {
            time_ms: parse_local_millis(time),
            level: level.to_string(),
            source: unescape(source).into_owned(),
            category: unescape(category).into_owned(),
            payload: unescape(payload).into_owned(),
        })
    }
}

fn parse_local_millis(raw: &str) -> i64 {
    NaiveDateTime::parse_from_str(raw.trim(), LINE_TIME_PARSE_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|time| time.timestamp_millis())
        .unwrap_or(0)
}

/// Correlation identifiers carried by trace payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Correlation {
    pub uid: i64,
    pub tid: i64,
    pub parent: i64,
}

impl Correlation {
    /// Decode `{"uid","tid","parent"}` leniently: each missing or non-integer
    /// field is zero, and a payload that is not JSON yields all zeros.
    ///
    /// Keys match case-insensitively, an exact match winning over others.
    pub fn decode(payload: &str) -> Self {
        let Ok(serde_json::Value::Object(object)) = serde_json::from_str::<serde_json::Value>(payload) else {
            return Correlation::default();
        };
        let int = |key: &str| {
            object
                .get(key)
                .or_else(|| object.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0)
        };
        Correlation { uid: int("uid"), tid: int("tid"), parent: int("parent") }
    }
}

/// Flattened document persisted to the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDocument {
    pub time: i64,
    pub log_level: String,
    pub src: String,
    pub server_name: String,
    pub uid: i64,
    pub tid: i64,
    pub parent: i64,
    #[serde(rename = "req_data")]
    pub data: String,
}

impl LogDocument {
    pub fn from_record(record: MirrorRecord) -> Self {
        let correlation = if record.category == TRACE_CATEGORY {
            Correlation::decode(&record.payload)
        } else {
            Correlation::default()
        };

        LogDocument {
            time: record.time_ms,
            log_level: record.level,
            src: record.source,
            server_name: record.category,
            uid: correlation.uid,
            tid: correlation.tid,
            parent: correlation.parent,
            data: record.payload,
        }
    }

    pub fn is_trace(&self) -> bool {
        self.server_name == TRACE_CATEGORY
    }
}
