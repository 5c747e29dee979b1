use crate::entry::Entry;
use crate::field::{Context, Field};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::io::Write;

/// Layout used by [`TabEncoder`] to render the timestamp column.
pub const LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
/// Layout used to read the timestamp column back. The fraction is optional.
pub const LINE_TIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
/// Column separator of the line layout.
pub const FIELD_DELIMITER: char = '\t';
/// Columns the mirror reads: time, level, source, category, payload.
pub const MIRROR_FIELD_COUNT: usize = 5;

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("failed to serialize entry: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render entry: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders an entry plus its context and call-site fields into `buf`.
///
/// Encoders are stateless: context lives in the immutable [`Context`] owned
/// by the core, so one encoder instance is shared by a core and all of its
/// clones.
pub trait Encoder: Send + Sync {
    fn encode_entry(
        &self,
        entry: &Entry,
        context: &Context,
        fields: &[Field],
        buf: &mut Vec<u8>,
    ) -> Result<(), EncodeError>;
}

fn merged_fields(context: &Context, fields: &[Field]) -> Map<String, Value> {
    let mut map = Map::new();
    for field in context.fields().iter().chain(fields) {
        map.insert(field.key.clone(), field.value.clone());
    }
    map
}

/// Human-readable line layout, one entry per line:
///
/// `time \t LEVEL \t caller \t category \t message [\t {fields}]`
///
/// This is the layout the mirror line parser understands. Backslashes, tabs
/// and line breaks inside text columns are escaped so they cannot shift
/// columns; [`unescape`] restores the original text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabEncoder;

fn write_escaped(buf: &mut Vec<u8>, text: &str) {
    for ch in text.chars() {
        match ch {
            '\\' => buf.extend_from_slice(b"\\\\"),
            '\t' => buf.extend_from_slice(b"\\t"),
            '\n' => buf.extend_from_slice(b"\\n"),
            '\r' => buf.extend_from_slice(b"\\r"),
            _ => {
                let mut tmp = [0u8; 4];
                buf.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
}

/// Reverse the text-column escaping of [`TabEncoder`]. Unknown sequences
/// are kept as written.
pub fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('\\') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}

impl Encoder for TabEncoder {
    fn encode_entry(
        &self,
        entry: &Entry,
        context: &Context,
        fields: &[Field],
        buf: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        let mut tab = [0u8; 4];
        let tab = FIELD_DELIMITER.encode_utf8(&mut tab).as_bytes();

        write!(buf, "{}", entry.time.format(LINE_TIME_FORMAT))?;
        buf.extend_from_slice(tab);
        buf.extend_from_slice(entry.level.as_str().as_bytes());
        buf.extend_from_slice(tab);
        write_escaped(buf, entry.caller.as_deref().unwrap_or(""));
        buf.extend_from_slice(tab);
        write_escaped(buf, &entry.logger_name);
        buf.extend_from_slice(tab);
        write_escaped(buf, &entry.message);

        if !context.is_empty() || !fields.is_empty() {
            buf.extend_from_slice(tab);
            serde_json::to_writer(&mut *buf, &merged_fields(context, fields))?;
        }
        buf.push(b'\n');
        Ok(())
    }
}

/// One JSON object per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode_entry(
        &self,
        entry: &Entry,
        context: &Context,
        fields: &[Field],
        buf: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        let mut object = Map::new();
        object.insert("time".to_string(), Value::from(entry.time.timestamp_millis()));
        object.insert("level".to_string(), Value::from(entry.level.as_str()));
        if !entry.logger_name.is_empty() {
            object.insert("logger".to_string(), Value::from(entry.logger_name.as_str()));
        }
        if let Some(caller) = &entry.caller {
            object.insert("caller".to_string(), Value::from(caller.as_str()));
        }
        object.insert("msg".to_string(), Value::from(entry.message.as_str()));
        object.extend(merged_fields(context, fields));

        serde_json::to_writer(&mut *buf, &object)?;
        buf.push(b'\n');
        Ok(())
    }
}
