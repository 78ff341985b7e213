//! Tolerant parser for JSON prefixes.
//!
//! Containers and strings left open at the end of the input are closed
//! implicitly. Anything whose final value cannot be known yet (an incomplete
//! key, a number or literal touching the end, a dangling escape) is left out
//! rather than guessed, so a value accepted from one prefix is never
//! contradicted by a longer prefix.

use std::collections::BTreeSet;

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartialJsonError {
    #[error("unexpected character '{found}' at byte {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid escape sequence at byte {0}")]
    InvalidEscape(usize),

    #[error("trailing characters at byte {0}")]
    TrailingCharacters(usize),
}

/// Result of parsing a JSON prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialDocument {
    /// `None` until the first value has started to arrive.
    pub value: Option<Value>,
    /// JSON pointers of objects and arrays that were still open.
    pub open_paths: BTreeSet<String>,
    /// Pointer of the string cut off by the end of input, if any.
    pub truncated_string: Option<String>,
    /// True when the input was a complete JSON document.
    pub complete: bool,
}

impl PartialDocument {
    /// Wraps a value that is known to be complete.
    pub fn complete(value: Value) -> Self {
        Self {
            value: Some(value),
            open_paths: BTreeSet::new(),
            truncated_string: None,
            complete: true,
        }
    }

    pub fn is_open(&self, pointer: &str) -> bool {
        self.open_paths.contains(pointer)
    }
}

pub fn parse_partial(input: &str) -> Result<PartialDocument, PartialJsonError> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        open_paths: BTreeSet::new(),
        truncated_string: None,
    };

    parser.skip_whitespace();
    let value = parser.parse_value("")?;
    parser.skip_whitespace();

    if !parser.at_end() {
        return Err(PartialJsonError::TrailingCharacters(parser.pos));
    }

    let complete =
        value.is_some() && parser.open_paths.is_empty() && parser.truncated_string.is_none();

    Ok(PartialDocument {
        value,
        open_paths: parser.open_paths,
        truncated_string: parser.truncated_string,
        complete,
    })
}

/// Appends one reference token to a JSON pointer.
pub fn child_pointer(parent: &str, token: &str) -> String {
    format!("{parent}/{}", token.replace('~', "~0").replace('/', "~1"))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    open_paths: BTreeSet<String>,
    truncated_string: Option<String>,
}

enum Scanned {
    Closed(String),
    Truncated(String),
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn unexpected(&self) -> PartialJsonError {
        let found = self.src[self.pos..].chars().next().unwrap_or('\0');
        PartialJsonError::Unexpected {
            found,
            offset: self.pos,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\n' | b'\r' | b'\t')) {
            self.pos += 1;
        }
    }

    /// `Ok(None)` means the input ended before this value could be settled.
    fn parse_value(&mut self, pointer: &str) -> Result<Option<Value>, PartialJsonError> {
        self.skip_whitespace();
        let Some(byte) = self.peek() else {
            return Ok(None);
        };

        match byte {
            b'{' => self.parse_object(pointer).map(Some),
            b'[' => self.parse_array(pointer).map(Some),
            b'"' => match self.scan_string()? {
                Scanned::Closed(text) => Ok(Some(Value::String(text))),
                Scanned::Truncated(text) => {
                    self.truncated_string = Some(pointer.to_string());
                    Ok(Some(Value::String(text)))
                }
            },
            b't' => self.parse_literal("true", Value::Bool(true)),
            b'f' => self.parse_literal("false", Value::Bool(false)),
            b'n' => self.parse_literal("null", Value::Null),
            b'-' | b'0'..=b'9' => self.parse_number(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_object(&mut self, pointer: &str) -> Result<Value, PartialJsonError> {
        self.pos += 1;
        let mut map = Map::new();
        let mut first = true;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(self.left_open(pointer, Value::Object(map))),
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(b',') if !first => {
                    self.pos += 1;
                    self.skip_whitespace();
                    if self.at_end() {
                        return Ok(self.left_open(pointer, Value::Object(map)));
                    }
                }
                Some(_) if !first => return Err(self.unexpected()),
                Some(_) => {}
            }
            first = false;

            if self.peek() != Some(b'"') {
                return Err(self.unexpected());
            }
            let key = match self.scan_string()? {
                Scanned::Closed(key) => key,
                Scanned::Truncated(_) => return Ok(self.left_open(pointer, Value::Object(map))),
            };

            self.skip_whitespace();
            match self.peek() {
                None => return Ok(self.left_open(pointer, Value::Object(map))),
                Some(b':') => self.pos += 1,
                Some(_) => return Err(self.unexpected()),
            }

            let child = child_pointer(pointer, &key);
            match self.parse_value(&child)? {
                Some(value) => {
                    map.insert(key, value);
                }
                None => return Ok(self.left_open(pointer, Value::Object(map))),
            }
        }
    }

    fn parse_array(&mut self, pointer: &str) -> Result<Value, PartialJsonError> {
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Ok(self.left_open(pointer, Value::Array(items))),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(b',') if !items.is_empty() => {
                    self.pos += 1;
                    self.skip_whitespace();
                    if self.at_end() {
                        return Ok(self.left_open(pointer, Value::Array(items)));
                    }
                }
                Some(_) if !items.is_empty() => return Err(self.unexpected()),
                Some(_) => {}
            }

            let child = child_pointer(pointer, &items.len().to_string());
            match self.parse_value(&child)? {
                Some(value) => items.push(value),
                None => return Ok(self.left_open(pointer, Value::Array(items))),
            }
        }
    }

    fn left_open(&mut self, pointer: &str, value: Value) -> Value {
        self.open_paths.insert(pointer.to_string());
        value
    }

    fn parse_literal(&mut self, word: &str, value: Value) -> Result<Option<Value>, PartialJsonError> {
        let rest = &self.src[self.pos..];
        if rest.starts_with(word) {
            self.pos += word.len();
            return Ok(Some(value));
        }
        if word.starts_with(rest) {
            self.pos = self.src.len();
            return Ok(None);
        }
        Err(self.unexpected())
    }

    fn parse_number(&mut self) -> Result<Option<Value>, PartialJsonError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
        ) {
            self.pos += 1;
        }

        // More digits may still follow.
        if self.at_end() {
            return Ok(None);
        }

        let text = &self.src[start..self.pos];
        serde_json::from_str::<Number>(text)
            .map(|number| Some(Value::Number(number)))
            .map_err(|_| PartialJsonError::InvalidNumber(text.to_string()))
    }

    fn scan_string(&mut self) -> Result<Scanned, PartialJsonError> {
        self.pos += 1;
        let mut out = String::new();

        loop {
            let Some(ch) = self.src[self.pos..].chars().next() else {
                return Ok(Scanned::Truncated(out));
            };

            match ch {
                '"' => {
                    self.pos += 1;
                    return Ok(Scanned::Closed(out));
                }
                '\\' => {
                    let escape_at = self.pos;
                    match self.scan_escape(escape_at)? {
                        Some(decoded) => out.push(decoded),
                        None => {
                            self.pos = self.src.len();
                            return Ok(Scanned::Truncated(out));
                        }
                    }
                }
                other => {
                    out.push(other);
                    self.pos += other.len_utf8();
                }
            }
        }
    }

    /// Decodes the escape at `self.pos`; `None` when the input ends inside it.
    fn scan_escape(&mut self, escape_at: usize) -> Result<Option<char>, PartialJsonError> {
        let bytes = self.src.as_bytes();
        let Some(&kind) = bytes.get(escape_at + 1) else {
            return Ok(None);
        };

        let simple = match kind {
            b'"' => Some('"'),
            b'\\' => Some('\\'),
            b'/' => Some('/'),
            b'b' => Some('\u{0008}'),
            b'f' => Some('\u{000C}'),
            b'n' => Some('\n'),
            b'r' => Some('\r'),
            b't' => Some('\t'),
            b'u' => None,
            _ => return Err(PartialJsonError::InvalidEscape(escape_at)),
        };
        if let Some(decoded) = simple {
            self.pos = escape_at + 2;
            return Ok(Some(decoded));
        }

        let Some(high) = self.hex4(escape_at + 2)? else {
            return Ok(None);
        };

        if !(0xD800..0xDC00).contains(&high) {
            self.pos = escape_at + 6;
            return char::from_u32(high)
                .map(Some)
                .ok_or(PartialJsonError::InvalidEscape(escape_at));
        }

        // Surrogate pair: the low half must follow as another \u escape.
        let low_at = escape_at + 6;
        match (bytes.get(low_at), bytes.get(low_at + 1)) {
            (None, _) | (Some(b'\\'), None) => return Ok(None),
            (Some(b'\\'), Some(b'u')) => {}
            _ => return Err(PartialJsonError::InvalidEscape(escape_at)),
        }
        let Some(low) = self.hex4(low_at + 2)? else {
            return Ok(None);
        };
        if !(0xDC00..0xE000).contains(&low) {
            return Err(PartialJsonError::InvalidEscape(escape_at));
        }

        self.pos = low_at + 6;
        let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(code)
            .map(Some)
            .ok_or(PartialJsonError::InvalidEscape(escape_at))
    }

    fn hex4(&self, at: usize) -> Result<Option<u32>, PartialJsonError> {
        let bytes = self.src.as_bytes();
        let available = bytes.len().saturating_sub(at).min(4);
        let digits = &bytes[at.min(bytes.len())..at.min(bytes.len()) + available];

        if !digits.iter().all(u8::is_ascii_hexdigit) {
            return Err(PartialJsonError::InvalidEscape(at));
        }
        if digits.len() < 4 {
            return Ok(None);
        }

        let text = std::str::from_utf8(digits).map_err(|_| PartialJsonError::InvalidEscape(at))?;
        u32::from_str_radix(text, 16)
            .map(Some)
            .map_err(|_| PartialJsonError::InvalidEscape(at))
    }
}
