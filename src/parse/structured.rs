//! Recursive-descent parser for structured text (objects, arrays, strings, numbers, literals).
//!
//! The grammar is the familiar one: `{ "key": value, ... }`, `[ value, ... ]`, quoted strings
//! with backslash escapes, numbers with optional sign/fraction/exponent, and `true`, `false`,
//! `null`. A number literal containing `.`, `e` or `E` is a float; anything else is an integer
//! (falling back to a float when it overflows `i64`). Object keys keep insertion order.
//!
//! Documents are rendered back to compact text by the `Display` impl of
//! [`DocValue`](crate::document::DocValue).

use crate::document::{DocMap, DocValue};
use crate::error::{EngineError, Result};
use tracing::warn;

/// Parse exactly one value; only whitespace may follow it.
///
/// # Errors
/// [`EngineError::Parse`] with the byte offset of the offending input.
pub fn parse_document(text: &str) -> Result<DocValue> {
    let mut cursor = Cursor::new(text);
    let value = cursor.parse_value()?;
    cursor.skip_whitespace();
    if cursor.pos < cursor.bytes.len() {
        return Err(cursor.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Parse an input that holds either one document or one document per line.
///
/// A single value wins when it parses. Otherwise, for multi-line input, every non-empty line
/// is parsed on its own and failing lines are skipped with a warning.
///
/// # Errors
/// The single-value error when the input is one line, or when no line parses.
pub fn parse_documents(text: &str) -> Result<DocValue> {
    let whole_err = match parse_document(text) {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    if lines.len() < 2 {
        return Err(whole_err);
    }
    let mut docs = Vec::with_capacity(lines.len());
    for (line_no, line) in lines {
        match parse_document(line) {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping document that failed to parse")
            }
        }
    }
    if docs.is_empty() {
        return Err(whole_err);
    }
    Ok(DocValue::Array(docs))
}

/// Deepest nesting of objects and arrays accepted before parsing fails.
pub const MAX_DEPTH: usize = 512;

struct Cursor<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<DocValue> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'{') => self.nested(Self::parse_object),
            Some(b'[') => self.nested(Self::parse_array),
            Some(b'"') => self.parse_string().map(DocValue::String),
            Some(b'-' | b'0'..=b'9') => self.parse_number(),
            Some(_) => self.parse_literal(),
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Result<DocValue>) -> Result<DocValue> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting exceeds {MAX_DEPTH} levels")));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_literal(&mut self) -> Result<DocValue> {
        let rest = &self.bytes[self.pos..];
        for (word, value) in [
            (&b"true"[..], DocValue::Bool(true)),
            (&b"false"[..], DocValue::Bool(false)),
            (&b"null"[..], DocValue::Null),
        ] {
            if rest.starts_with(word) {
                self.pos += word.len();
                return Ok(value);
            }
        }
        let c = self.text[self.pos..].chars().next().unwrap_or('?');
        Err(self.error(format!("unexpected character '{c}'")))
    }

    fn parse_object(&mut self) -> Result<DocValue> {
        self.pos += 1;
        let mut map = DocMap::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(DocValue::Object(map));
        }
        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(self.error("expected string key"));
            }
            let key = self.parse_string()?;
            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return Err(self.error("expected ':'"));
            }
            self.pos += 1;
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(DocValue::Object(map));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_array(&mut self) -> Result<DocValue> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(DocValue::Array(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(DocValue::Array(items));
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.text[self.pos..].chars().next() else {
                self.pos = start;
                return Err(self.error("unterminated string"));
            };
            self.pos += c.len_utf8();
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let Some(e) = self.text[self.pos..].chars().next() else {
                        self.pos = start;
                        return Err(self.error("unterminated string"));
                    };
                    self.pos += e.len_utf8();
                    match e {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'u' => out.push(self.parse_unicode_escape()?),
                        // covers \" \\ \/ and any other character taken literally
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn parse_hex4(&mut self) -> Result<u32> {
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| self.error("truncated \\u escape"))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid \\u escape"))?;
        self.pos += 4;
        Ok(code)
    }

    fn parse_unicode_escape(&mut self) -> Result<char> {
        let hi = self.parse_hex4()?;
        if (0xD800..0xDC00).contains(&hi) && self.bytes[self.pos..].starts_with(b"\\u") {
            let save = self.pos;
            self.pos += 2;
            let lo = self.parse_hex4()?;
            if (0xDC00..0xE000).contains(&lo) {
                let code = 0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00);
                return Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            self.pos = save;
        }
        Ok(char::from_u32(hi).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn parse_number(&mut self) -> Result<DocValue> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        self.skip_digits();
        if self.pos == digits_start {
            return Err(self.error("expected digit"));
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            self.skip_digits();
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.skip_digits();
        }
        let literal = &self.text[start..self.pos];
        if !is_float && let Ok(i) = literal.parse::<i64>() {
            return Ok(DocValue::Int(i));
        }
        literal
            .parse::<f64>()
            .map(DocValue::Float)
            .map_err(|_| EngineError::Parse {
                position: start,
                message: format!("invalid number '{literal}'"),
            })
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }
}

/// Write `s` as a quoted string literal.
pub(crate) fn write_quoted(out: &mut impl std::fmt::Write, s: &str) -> std::fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            '\r' => out.write_str("\\r")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}
