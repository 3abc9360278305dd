//! Purpose: Encode `JsonValue` trees and raw record fields as compact JSON text.
//! Exports: `escape_into`, `quote`, `string_array`, `to_string`, `ObjectBuilder`.
//! Role: Output side of the loadout codec; export builds objects through `ObjectBuilder`.
//! Invariants: Non-ASCII text is copied verbatim; only `"`, `\` and C0 controls are escaped.
//! Invariants: `ObjectBuilder` never emits a member whose value is null.
//! Invariants: Floats always carry a fractional part so they re-parse as floats.

use std::fmt::Write as _;

use crate::json::value::{JsonObject, JsonValue, Number};

pub fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

/// Quoted JSON string, or the bare literal `null` for a missing value.
pub fn quote(text: Option<&str>) -> String {
    match text {
        None => "null".to_string(),
        Some(text) => {
            let mut out = String::with_capacity(text.len() + 2);
            push_quoted(&mut out, text);
            out
        }
    }
}

pub fn string_array<S: AsRef<str>>(items: &[S]) -> String {
    let mut out = String::from("[");
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        push_quoted(&mut out, item.as_ref());
    }
    out.push(']');
    out
}

pub fn to_string(value: &JsonValue) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn push_quoted(out: &mut String, text: &str) {
    out.push('"');
    escape_into(out, text);
    out.push('"');
}

fn write_value(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        JsonValue::Number(Number::Int(n)) => {
            let _ = write!(out, "{n}");
        }
        JsonValue::Number(Number::Float(n)) => {
            if n.is_finite() {
                let _ = write!(out, "{n:?}");
            } else {
                out.push_str("null");
            }
        }
        JsonValue::String(text) => push_quoted(out, text),
        JsonValue::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        JsonValue::Object(object) => {
            out.push('{');
            for (idx, (key, member)) in object.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                push_quoted(out, key);
                out.push(':');
                write_value(member, out);
            }
            out.push('}');
        }
    }
}

/// Assembles an object member by member, dropping null values so optional
/// attributes are omitted rather than written as `null`.
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    object: JsonObject,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(mut self, key: &str, value: JsonValue) -> Self {
        if !value.is_null() {
            self.object.insert(key, value);
        }
        self
    }

    pub fn build(self) -> JsonValue {
        JsonValue::Object(self.object)
    }
}
