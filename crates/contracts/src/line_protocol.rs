//! Canonical text wire format
//!
//! ```text
//! <name>[,<tag>=<value>...] <field>=<value>[,<field>=<value>...] <nanos>
//! ```
//!
//! - measurement: `,` and space are escaped with `\`
//! - tag keys, tag values, field keys: `,`, `=` and space are escaped
//! - measurement may not start with `#` or whitespace
//! - string fields are double-quoted, `"` and `\` escaped inside, line
//!   breaks written as `\n` and `\r`
//! - `12i` signed, `12u` unsigned, `1.5` float, `true`/`false` boolean
//! - the nanosecond timestamp is mandatory
//!
//! Tags are written in key order. Encoded messages never span physical
//! lines. The decoder still accepts raw line breaks inside quoted strings,
//! so it walks the whole buffer instead of splitting on newlines.

use chrono::{TimeZone, Utc};
use std::collections::BTreeSet;

use crate::{ContractError, FieldValue, Fields, Message, Tags};

const MEASUREMENT_ESCAPES: &[u8] = b", ";
const KEY_ESCAPES: &[u8] = b",= ";

impl Message {
    /// Encode as one line (no trailing newline).
    ///
    /// Meta keys listed in `meta_as_tags` are written as tags for this
    /// encoding only.
    ///
    /// # Errors
    /// `Encoding` when the message cannot be represented: empty name, a name
    /// starting with `#` or whitespace, no fields, empty or newline-carrying keys, a key ending in `\`, a
    /// non-finite float, or a timestamp outside the nanosecond range.
    pub fn encode_line(&self, meta_as_tags: &BTreeSet<String>) -> Result<String, ContractError> {
        if self.name().is_empty() {
            return Err(ContractError::encoding("empty measurement name"));
        }
        if self.fields().is_empty() {
            return Err(ContractError::encoding(format!(
                "message '{}' has no fields",
                self.name()
            )));
        }
        // a leading '#' reads back as a comment and leading blanks are skipped
        if self.name().starts_with('#') || self.name().starts_with(char::is_whitespace) {
            return Err(ContractError::encoding(format!(
                "measurement '{}' starts with '#' or whitespace",
                self.name().escape_debug()
            )));
        }
        let nanos = self.timestamp_nanos().ok_or_else(|| {
            ContractError::encoding(format!("timestamp {} out of range", self.time()))
        })?;

        let mut out = String::with_capacity(64);
        push_escaped(&mut out, "measurement", self.name(), MEASUREMENT_ESCAPES)?;

        for (key, value) in self.promoted_tags(meta_as_tags) {
            out.push(',');
            push_escaped(&mut out, "tag key", key, KEY_ESCAPES)?;
            out.push('=');
            push_escaped(&mut out, "tag value", value, KEY_ESCAPES)?;
        }

        for (i, (key, value)) in self.fields().iter().enumerate() {
            out.push(if i == 0 { ' ' } else { ',' });
            push_escaped(&mut out, "field key", key, KEY_ESCAPES)?;
            out.push('=');
            push_field_value(&mut out, key, value)?;
        }

        out.push(' ');
        out.push_str(&nanos.to_string());
        Ok(out)
    }

    /// Decode every line in `data`.
    ///
    /// Blank lines and `#` comments are skipped. Decoded messages carry no
    /// meta. The first malformed line fails the whole batch.
    pub fn decode_all(data: &[u8]) -> Result<Vec<Message>, ContractError> {
        let input = std::str::from_utf8(data).map_err(|e| {
            let line = data[..e.valid_up_to()]
                .iter()
                .filter(|b| **b == b'\n')
                .count()
                + 1;
            ContractError::parse(line, format!("invalid utf-8: {e}"))
        })?;

        let mut decoder = Decoder::new(input);
        let mut out = Vec::new();
        while let Some(msg) = decoder.next_message()? {
            out.push(msg);
        }
        Ok(out)
    }
}

fn push_escaped(
    out: &mut String,
    what: &str,
    token: &str,
    escapes: &[u8],
) -> Result<(), ContractError> {
    if token.is_empty() {
        return Err(ContractError::encoding(format!("empty {what}")));
    }
    if token.ends_with('\\') {
        return Err(ContractError::encoding(format!(
            "{what} '{token}' ends with a backslash"
        )));
    }
    for c in token.chars() {
        match c {
            '\n' | '\r' => {
                return Err(ContractError::encoding(format!(
                    "{what} '{}' contains a line break",
                    token.escape_debug()
                )));
            }
            c if c.is_ascii() && escapes.contains(&(c as u8)) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    Ok(())
}

fn push_field_value(out: &mut String, key: &str, value: &FieldValue) -> Result<(), ContractError> {
    match value {
        FieldValue::Int(v) => {
            out.push_str(&v.to_string());
            out.push('i');
        }
        FieldValue::UInt(v) => {
            out.push_str(&v.to_string());
            out.push('u');
        }
        FieldValue::Float(v) => {
            if !v.is_finite() {
                return Err(ContractError::encoding(format!(
                    "field '{key}' has non-finite value {v}"
                )));
            }
            out.push_str(&v.to_string());
        }
        FieldValue::Bool(v) => out.push_str(if *v { "true" } else { "false" }),
        FieldValue::Str(v) => {
            out.push('"');
            for c in v.chars() {
                match c {
                    '"' | '\\' => {
                        out.push('\\');
                        out.push(c);
                    }
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    c => out.push(c),
                }
            }
            out.push('"');
        }
    }
    Ok(())
}

/// Cursor over the input buffer.
///
/// All separators are ASCII, so byte positions found by scanning are always
/// valid `str` slice boundaries.
struct Decoder<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> ContractError {
        ContractError::parse(self.line, message)
    }

    /// Skip blank lines, leading whitespace and comment lines.
    fn skip_to_record(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'#' => {
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    /// Read an escaped token up to (not including) the first unescaped stop
    /// byte, line break or end of input.
    fn read_token(&mut self, stops: &[u8], escapes: &[u8]) -> String {
        let mut out = String::new();
        let mut start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'\\' {
                if let Some(next) = self.bytes.get(self.pos + 1) {
                    if escapes.contains(next) {
                        out.push_str(&self.input[start..self.pos]);
                        start = self.pos + 1;
                        self.pos += 2;
                        continue;
                    }
                }
            }
            if b == b'\n' || b == b'\r' || stops.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        out.push_str(&self.input[start..self.pos]);
        out
    }

    fn next_message(&mut self) -> Result<Option<Message>, ContractError> {
        self.skip_to_record();
        if self.peek().is_none() {
            return Ok(None);
        }

        let name = self.read_token(MEASUREMENT_ESCAPES, MEASUREMENT_ESCAPES);
        if name.is_empty() {
            return Err(self.error("empty measurement name"));
        }

        let mut tags = Tags::new();
        while self.peek() == Some(b',') {
            self.pos += 1;
            let (key, value) = self.read_tag()?;
            tags.insert(key, value);
        }

        if self.peek() != Some(b' ') {
            return Err(self.error(format!("measurement '{name}' has no fields")));
        }
        self.skip_spaces();

        let fields = self.read_fields()?;
        let nanos = self.read_timestamp()?;

        let msg = Message::new(name, tags, Tags::new(), fields, Utc.timestamp_nanos(nanos))
            .map_err(|e| self.error(e.to_string()))?;
        Ok(Some(msg))
    }

    fn read_tag(&mut self) -> Result<(String, String), ContractError> {
        let key = self.read_token(KEY_ESCAPES, KEY_ESCAPES);
        if self.peek() != Some(b'=') {
            return Err(self.error(format!("tag '{key}' is missing '='")));
        }
        if key.is_empty() {
            return Err(self.error("empty tag key"));
        }
        self.pos += 1;

        let value = self.read_token(KEY_ESCAPES, KEY_ESCAPES);
        if self.peek() == Some(b'=') {
            return Err(self.error(format!("tag '{key}' has an unescaped '=' in its value")));
        }
        if value.is_empty() {
            return Err(self.error(format!("tag '{key}' has an empty value")));
        }
        Ok((key, value))
    }

    fn read_fields(&mut self) -> Result<Fields, ContractError> {
        let mut fields = Fields::new();
        loop {
            let key = self.read_token(KEY_ESCAPES, KEY_ESCAPES);
            if self.peek() != Some(b'=') {
                return Err(self.error(format!("field '{key}' is missing '='")));
            }
            if key.is_empty() {
                return Err(self.error("empty field key"));
            }
            self.pos += 1;

            let value = self.read_field_value(&key)?;
            fields.insert(key, value);

            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b' ') => return Ok(fields),
                _ => return Err(self.error("missing timestamp")),
            }
        }
    }

    fn read_field_value(&mut self, key: &str) -> Result<FieldValue, ContractError> {
        if self.peek() == Some(b'"') {
            return self.read_quoted(key).map(FieldValue::Str);
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b',' | b' ' | b'\n' | b'\r') {
                break;
            }
            self.pos += 1;
        }
        let token = &self.input[start..self.pos];
        parse_scalar(token)
            .ok_or_else(|| self.error(format!("field '{key}' has invalid value '{token}'")))
    }

    fn read_quoted(&mut self, key: &str) -> Result<String, ContractError> {
        self.pos += 1;
        let mut out = String::new();
        let mut start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b'\\' if matches!(self.bytes.get(self.pos + 1), Some(b'"' | b'\\')) => {
                    out.push_str(&self.input[start..self.pos]);
                    start = self.pos + 1;
                    self.pos += 2;
                }
                b'\\' if matches!(self.bytes.get(self.pos + 1), Some(b'n' | b'r')) => {
                    out.push_str(&self.input[start..self.pos]);
                    out.push(if self.bytes[self.pos + 1] == b'n' { '\n' } else { '\r' });
                    self.pos += 2;
                    start = self.pos;
                }
                b'"' => {
                    out.push_str(&self.input[start..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error(format!("field '{key}' has an unterminated string")))
    }

    fn read_timestamp(&mut self) -> Result<i64, ContractError> {
        self.skip_spaces();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        let token = &self.input[start..self.pos];
        if token.is_empty() {
            return Err(self.error("missing timestamp"));
        }
        let nanos = token
            .parse::<i64>()
            .map_err(|_| self.error(format!("invalid timestamp '{token}'")))?;

        self.skip_spaces();
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        match self.peek() {
            None | Some(b'\n') => Ok(nanos),
            Some(_) => Err(self.error("unexpected data after timestamp")),
        }
    }
}

fn parse_scalar(token: &str) -> Option<FieldValue> {
    match token {
        "t" | "T" | "true" | "True" | "TRUE" => return Some(FieldValue::Bool(true)),
        "f" | "F" | "false" | "False" | "FALSE" => return Some(FieldValue::Bool(false)),
        _ => {}
    }
    if let Some(digits) = token.strip_suffix('i') {
        return digits.parse::<i64>().ok().map(FieldValue::Int);
    }
    if let Some(digits) = token.strip_suffix('u') {
        return digits.parse::<u64>().ok().map(FieldValue::UInt);
    }
    // f64::from_str also takes "inf"/"NaN"; only plain numeric literals count
    let numeric = !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !numeric {
        return None;
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(FieldValue::Float)
}
