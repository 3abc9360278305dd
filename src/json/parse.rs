//! Purpose: Decode JSON text into `JsonValue` without an external JSON crate.
//! Exports: `parse`, `Parser`, `MAX_DEPTH`.
//! Role: Recursive-descent front end for the loadout import path.
//! Invariants: Offsets in errors count Unicode scalar values from the start of input.
//! Invariants: Nesting is bounded by `MAX_DEPTH`; deeper input is rejected, not recursed.
//! Invariants: Exactly one value is consumed; trailing input is left for the caller.
//! Notes: Numbers follow the narrow grammar `-?[0-9]+(\.[0-9]+)?` (no exponents).

use crate::core::error::{Error, ErrorKind};
use crate::json::value::{JsonObject, JsonValue, Number};

pub const MAX_DEPTH: usize = 128;

pub fn parse(text: &str) -> Result<JsonValue, Error> {
    Parser::new(text).parse_value()
}

pub struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    pub fn parse_value(&mut self) -> Result<JsonValue, Error> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some('"') => self.parse_string().map(JsonValue::String),
            Some('t') => self.parse_literal("true", JsonValue::Bool(true)),
            Some('f') => self.parse_literal("false", JsonValue::Bool(false)),
            Some('n') => self.parse_literal("null", JsonValue::Null),
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) => Err(self.error_at(self.pos, format!("unexpected character '{c}'"))),
            None => Err(self.error_at(self.pos, "unexpected end of input")),
        }
    }

    /// Offset of the first non-whitespace character after the parsed value,
    /// or `None` when only whitespace remains.
    pub fn rest_offset(&mut self) -> Option<usize> {
        self.skip_ws();
        (self.pos < self.chars.len()).then_some(self.pos)
    }

    fn skip_ws(&mut self) {
        while let Some(' ' | '\t' | '\n' | '\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, wanted: char, context: &str) -> Result<(), Error> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error_at(
                self.pos,
                format!("expected '{wanted}' {context}, found '{c}'"),
            )),
            None => Err(self.error_at(
                self.pos,
                format!("expected '{wanted}' {context}, found end of input"),
            )),
        }
    }

    fn parse_literal(&mut self, word: &str, value: JsonValue) -> Result<JsonValue, Error> {
        for wanted in word.chars() {
            match self.peek() {
                Some(c) if c == wanted => self.pos += 1,
                Some(c) => {
                    return Err(self.error_at(
                        self.pos,
                        format!("unexpected character '{c}' in literal `{word}`"),
                    ));
                }
                None => return Err(self.error_at(self.pos, "unexpected end of input")),
            }
        }
        Ok(value)
    }

    fn parse_number(&mut self) -> Result<JsonValue, Error> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        if self.eat_digits() == 0 {
            return Err(self.error_at(self.pos, "expected digit in number"));
        }
        let mut is_float = false;
        if self.peek() == Some('.') {
            self.pos += 1;
            if self.eat_digits() == 0 {
                return Err(self.error_at(self.pos, "expected digit after decimal point"));
            }
            is_float = true;
        }

        let literal: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            literal
                .parse::<f64>()
                .map(|value| JsonValue::Number(Number::Float(value)))
                .map_err(|_| self.error_at(start, format!("invalid number `{literal}`")))
        } else {
            literal
                .parse::<i64>()
                .map(|value| JsonValue::Number(Number::Int(value)))
                .map_err(|_| self.error_at(start, format!("integer `{literal}` out of range")))
        }
    }

    fn eat_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn parse_string(&mut self) -> Result<String, Error> {
        self.expect('"', "to open string")?;
        let mut out = String::new();
        loop {
            let at = self.pos;
            match self.bump() {
                None => return Err(self.error_at(at, "unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => self.parse_escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), Error> {
        let at = self.pos;
        match self.bump() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let unit = self.parse_hex4()?;
                out.push(self.compose_unit(unit, at)?);
            }
            Some(c) => {
                return Err(self.error_at(at, format!("unsupported escape sequence '\\{c}'")));
            }
            None => return Err(self.error_at(at, "unterminated escape sequence")),
        }
        Ok(())
    }

    // A high surrogate must be followed by `\u` + low surrogate; lone halves cannot
    // be stored in a Rust string.
    fn compose_unit(&mut self, unit: u16, at: usize) -> Result<char, Error> {
        match unit {
            0xD800..=0xDBFF => {
                if self.peek() != Some('\\') || self.chars.get(self.pos + 1) != Some(&'u') {
                    return Err(self.error_at(at, "unpaired high surrogate in \\u escape"));
                }
                self.pos += 2;
                let low = self.parse_hex4()?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(self.error_at(at, "invalid low surrogate in \\u escape"));
                }
                let code = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                char::from_u32(code)
                    .ok_or_else(|| self.error_at(at, "invalid surrogate pair in \\u escape"))
            }
            0xDC00..=0xDFFF => Err(self.error_at(at, "unpaired low surrogate in \\u escape")),
            _ => char::from_u32(u32::from(unit))
                .ok_or_else(|| self.error_at(at, "invalid \\u escape")),
        }
    }

    fn parse_hex4(&mut self) -> Result<u16, Error> {
        let mut value: u16 = 0;
        for _ in 0..4 {
            let at = self.pos;
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error_at(at, "expected four hex digits in \\u escape"))?;
            value = (value << 4) | digit as u16;
        }
        Ok(value)
    }

    fn parse_array(&mut self) -> Result<JsonValue, Error> {
        self.enter()?;
        self.expect('[', "to open array")?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.pos += 1;
            self.depth -= 1;
            return Ok(JsonValue::Array(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            let at = self.pos;
            match self.bump() {
                Some(',') => continue,
                Some(']') => break,
                Some(c) => {
                    return Err(self.error_at(at, format!("expected ',' or ']' in array, found '{c}'")));
                }
                None => return Err(self.error_at(at, "unexpected end of input in array")),
            }
        }
        self.depth -= 1;
        Ok(JsonValue::Array(items))
    }

    fn parse_object(&mut self) -> Result<JsonValue, Error> {
        self.enter()?;
        self.expect('{', "to open object")?;
        let mut object = JsonObject::new();
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            self.depth -= 1;
            return Ok(JsonValue::Object(object));
        }
        loop {
            self.skip_ws();
            let key = self.parse_string()?;
            self.skip_ws();
            self.expect(':', "after object key")?;
            let value = self.parse_value()?;
            object.insert(key, value);
            self.skip_ws();
            let at = self.pos;
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                Some(c) => {
                    return Err(self.error_at(at, format!("expected ',' or '}}' in object, found '{c}'")));
                }
                None => return Err(self.error_at(at, "unexpected end of input in object")),
            }
        }
        self.depth -= 1;
        Ok(JsonValue::Object(object))
    }

    fn enter(&mut self) -> Result<(), Error> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error_at(
                self.pos,
                format!("nesting deeper than {MAX_DEPTH} levels"),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Parse)
            .with_message(message)
            .with_offset(offset as u64)
    }
}
