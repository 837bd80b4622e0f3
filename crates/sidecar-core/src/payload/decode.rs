//! Parser for the Lua-table subset used by sidecar files.
//!
//! Accepts what current and legacy writers produced: comments, an optional
//! `return`, one table constructor with bracketed, named or positional
//! fields, and literal values. Function calls, variables and arithmetic are
//! rejected, except the `math.huge` and `0/0` spellings of non-finite floats.

use super::{Key, SettingsBlob, Table, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {offset}")]
pub struct PayloadError {
    pub offset: usize,
    pub message: String,
}

/// Nesting deeper than this is treated as corrupt input.
const MAX_DEPTH: usize = 128;

/// Parse complete sidecar file text into a blob.
pub fn decode(text: &str) -> Result<SettingsBlob, PayloadError> {
    let mut parser = Parser::new(text.as_bytes());
    parser.skip_trivia()?;
    if parser.peek_word("return") {
        parser.pos += "return".len();
        parser.skip_trivia()?;
    }
    let table = match parser.parse_value(0)? {
        Some(Value::Table(t)) => t,
        Some(Value::Array(items)) => array_to_table(items),
        _ => return Err(parser.error("expected a table")),
    };
    parser.skip_trivia()?;
    if parser.peek() == Some(b';') {
        parser.pos += 1;
        parser.skip_trivia()?;
    }
    if parser.pos != parser.bytes.len() {
        return Err(parser.error("trailing characters after table"));
    }
    Ok(SettingsBlob::from(table))
}

fn array_to_table(items: Vec<Value>) -> Table {
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| (Key::Index(i as i64 + 1), v))
        .collect()
}

/// Number literal as written, before it becomes a key or a value.
enum Number {
    Int(i64),
    Float(f64),
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> PayloadError {
        PayloadError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    /// True if `word` starts here and is not the prefix of a longer name.
    fn peek_word(&self, word: &str) -> bool {
        let end = self.pos + word.len();
        self.bytes.get(self.pos..end) == Some(word.as_bytes())
            && !self.bytes.get(end).is_some_and(|b| is_name_byte(*b))
    }

    fn expect(&mut self, byte: u8) -> Result<(), PayloadError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn skip_trivia(&mut self) -> Result<(), PayloadError> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    self.pos += 2;
                    if let Some(level) = self.long_bracket_level() {
                        self.read_long_bracket(level)?;
                    } else {
                        while let Some(b) = self.peek() {
                            self.pos += 1;
                            if b == b'\n' {
                                break;
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Parse one expression. `nil` yields `None`.
    fn parse_value(&mut self, depth: usize) -> Result<Option<Value>, PayloadError> {
        if depth > MAX_DEPTH {
            return Err(self.error("tables nested too deeply"));
        }
        match self.peek() {
            Some(b'{') => self.parse_table(depth).map(Some),
            Some(b'"') | Some(b'\'') => self.parse_quoted().map(|s| Some(Value::String(s))),
            Some(b'[') if self.long_bracket_level().is_some() => {
                let level = self.long_bracket_level().unwrap_or(0);
                self.read_long_bracket(level).map(|s| Some(Value::String(s)))
            }
            Some(b'-') => {
                self.pos += 1;
                self.skip_trivia()?;
                if self.peek_word("math.huge") {
                    self.pos += "math.huge".len();
                    return Ok(Some(Value::Number(f64::NEG_INFINITY)));
                }
                match self.parse_number(true)? {
                    Number::Int(i) => Ok(Some(Value::Integer(i))),
                    Number::Float(f) => Ok(Some(Value::Number(f))),
                }
            }
            Some(b) if b.is_ascii_digit() || b == b'.' => {
                let number = self.parse_number(false)?;
                if self.peek() == Some(b'/') {
                    return self.parse_nan(number).map(Some);
                }
                Ok(Some(match number {
                    Number::Int(i) => Value::Integer(i),
                    Number::Float(f) => Value::Number(f),
                }))
            }
            _ if self.peek_word("nil") => {
                self.pos += 3;
                Ok(None)
            }
            _ if self.peek_word("true") => {
                self.pos += 4;
                Ok(Some(Value::Bool(true)))
            }
            _ if self.peek_word("false") => {
                self.pos += 5;
                Ok(Some(Value::Bool(false)))
            }
            _ if self.peek_word("math.huge") => {
                self.pos += "math.huge".len();
                Ok(Some(Value::Number(f64::INFINITY)))
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    /// `0/0` is how non-finite NaN is spelled on disk.
    fn parse_nan(&mut self, numerator: Number) -> Result<Value, PayloadError> {
        let start = self.pos;
        self.pos += 1;
        let denominator = self.parse_number(false)?;
        let is_zero = |n: &Number| match n {
            Number::Int(i) => *i == 0,
            Number::Float(f) => *f == 0.0,
        };
        if is_zero(&numerator) && is_zero(&denominator) {
            Ok(Value::Number(f64::NAN))
        } else {
            self.pos = start;
            Err(self.error("arithmetic is not supported"))
        }
    }

    fn parse_table(&mut self, depth: usize) -> Result<Value, PayloadError> {
        self.expect(b'{')?;
        let mut table = Table::new();
        let mut next_index: i64 = 1;

        loop {
            self.skip_trivia()?;
            if self.peek() == Some(b'}') {
                self.pos += 1;
                break;
            }

            let field_start = self.pos;
            let (key, value) = if self.peek() == Some(b'[') && self.long_bracket_level().is_none()
            {
                self.pos += 1;
                self.skip_trivia()?;
                let key = self.parse_key(depth)?;
                self.skip_trivia()?;
                self.expect(b']')?;
                self.skip_trivia()?;
                self.expect(b'=')?;
                self.skip_trivia()?;
                (key, self.parse_value(depth + 1)?)
            } else if let Some(name) = self.named_field()? {
                (Key::Name(name), self.parse_value(depth + 1)?)
            } else {
                let key = Key::Index(next_index);
                next_index += 1;
                (key, self.parse_value(depth + 1)?)
            };

            if let Some(value) = value {
                if table.insert(key, value).is_some() {
                    self.pos = field_start;
                    return Err(self.error("duplicate key"));
                }
            }

            self.skip_trivia()?;
            match self.peek() {
                Some(b',') | Some(b';') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }

        Ok(into_array_if_sequence(table))
    }

    /// `name =` field prefix; restores position when not a named field.
    fn named_field(&mut self) -> Result<Option<String>, PayloadError> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
            _ => return Ok(None),
        }
        while self.peek().is_some_and(is_name_byte) {
            self.pos += 1;
        }
        let name = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
        if matches!(name.as_str(), "true" | "false" | "nil") {
            self.pos = start;
            return Ok(None);
        }
        self.skip_trivia()?;
        if self.peek() == Some(b'=') && self.peek_at(1) != Some(b'=') {
            self.pos += 1;
            self.skip_trivia()?;
            Ok(Some(name))
        } else {
            self.pos = start;
            Ok(None)
        }
    }

    fn parse_key(&mut self, depth: usize) -> Result<Key, PayloadError> {
        let start = self.pos;
        match self.parse_value(depth + 1)? {
            Some(Value::String(s)) => Ok(Key::Name(s)),
            Some(Value::Integer(i)) => Ok(Key::Index(i)),
            // Lua normalizes integral float keys to integers.
            Some(Value::Number(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Ok(Key::Index(f as i64))
            }
            _ => {
                self.pos = start;
                Err(self.error("unsupported table key"))
            }
        }
    }

    /// Numeric literal. `negative` applies a minus sign already consumed,
    /// so `-9223372036854775808` stays an integer.
    fn parse_number(&mut self, negative: bool) -> Result<Number, PayloadError> {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = std::str::from_utf8(&self.bytes[digits_start..self.pos])
                .map_err(|_| self.error("invalid hex literal"))?;
            // Lua wraps hex literals modulo 2^64.
            return u64::from_str_radix(digits, 16)
                .map(|u| {
                    let i = u as i64;
                    Number::Int(if negative { i.wrapping_neg() } else { i })
                })
                .map_err(|_| self.error("invalid hex literal"));
        }

        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    is_float = true;
                    self.pos += 1;
                }
                b'e' | b'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        let literal = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.error("invalid number"))?;
        if literal.is_empty() {
            return Err(self.error("expected a number"));
        }
        let signed = if negative {
            format!("-{}", literal)
        } else {
            literal.to_string()
        };
        if !is_float && let Ok(i) = signed.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        // Decimal integers that overflow i64 become floats, as in Lua.
        signed.parse::<f64>().map(Number::Float).map_err(|_| {
            let mut err = self.error("invalid number");
            err.offset = start;
            err
        })
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    fn parse_quoted(&mut self) -> Result<String, PayloadError> {
        let quote = self.peek().ok_or_else(|| self.error("expected string"))?;
        self.pos += 1;
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let b = self
                .peek()
                .ok_or_else(|| self.error("unterminated string"))?;
            self.pos += 1;
            match b {
                b if b == quote => break,
                b'\n' => return Err(self.error("unterminated string")),
                b'\\' => self.parse_escape(&mut buf)?,
                b => buf.push(b),
            }
        }

        String::from_utf8(buf).map_err(|_| self.error("string is not valid UTF-8"))
    }

    fn parse_escape(&mut self, buf: &mut Vec<u8>) -> Result<(), PayloadError> {
        let b = self
            .peek()
            .ok_or_else(|| self.error("unterminated escape"))?;
        self.pos += 1;
        match b {
            b'n' => buf.push(b'\n'),
            b't' => buf.push(b'\t'),
            b'r' => buf.push(b'\r'),
            b'a' => buf.push(0x07),
            b'b' => buf.push(0x08),
            b'f' => buf.push(0x0c),
            b'v' => buf.push(0x0b),
            b'\\' | b'"' | b'\'' => buf.push(b),
            b'\n' => buf.push(b'\n'),
            b'z' => {
                while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
                    self.pos += 1;
                }
            }
            b'x' => {
                let hex = self
                    .bytes
                    .get(self.pos..self.pos + 2)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| self.error("invalid \\x escape"))?;
                self.pos += 2;
                buf.push(hex);
            }
            b'u' => {
                self.expect(b'{')?;
                let start = self.pos;
                while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
                    self.pos += 1;
                }
                let c = std::str::from_utf8(&self.bytes[start..self.pos])
                    .ok()
                    .and_then(|h| u32::from_str_radix(h, 16).ok())
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid \\u escape"))?;
                self.expect(b'}')?;
                let mut utf8 = [0u8; 4];
                buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
            b'0'..=b'9' => {
                let mut value: u32 = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'9') => {
                            value = value * 10 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(value).map_err(|_| self.error("decimal escape too large"))?;
                buf.push(byte);
            }
            _ => return Err(self.error("invalid escape sequence")),
        }
        Ok(())
    }

    /// Level of a long bracket opening (`[[`, `[=[`, ...) at the cursor.
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek() != Some(b'[') {
            return None;
        }
        let mut level = 0;
        while self.peek_at(1 + level) == Some(b'=') {
            level += 1;
        }
        (self.peek_at(1 + level) == Some(b'[')).then_some(level)
    }

    fn read_long_bracket(&mut self, level: usize) -> Result<String, PayloadError> {
        self.pos += level + 2;
        // A newline directly after the opening bracket is skipped.
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
        let start = self.pos;
        let mut close = Vec::with_capacity(level + 2);
        close.push(b']');
        close.extend(std::iter::repeat_n(b'=', level));
        close.push(b']');

        let end = self.bytes[start..]
            .windows(close.len())
            .position(|w| w == close.as_slice())
            .map(|i| start + i)
            .ok_or_else(|| self.error("unterminated long bracket"))?;
        self.pos = end + close.len();
        String::from_utf8(self.bytes[start..end].to_vec())
            .map_err(|_| self.error("string is not valid UTF-8"))
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

/// Tables keyed exactly `1..=n` become arrays.
fn into_array_if_sequence(table: Table) -> Value {
    let is_sequence = !table.is_empty()
        && table
            .keys()
            .enumerate()
            .all(|(i, k)| *k == Key::Index(i as i64 + 1));
    if is_sequence {
        Value::Array(table.into_values().collect())
    } else {
        Value::Table(table)
    }
}
