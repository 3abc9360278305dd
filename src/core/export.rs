// Record collection -> JSON array projection.
use tracing::warn;

use crate::core::list_codec;
use crate::core::record::{Collection, Record, Slot};
use crate::core::store::AttrValue;
use crate::json::value::JsonValue;
use crate::json::write::ObjectBuilder;

/// How list-valued attributes are rendered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ListMode {
    /// Raw delimited string, exactly as stored.
    Strings,
    /// JSON array of trimmed, non-empty items.
    Arrays,
}

impl ListMode {
    pub fn from_flag(arrays: bool) -> Self {
        if arrays {
            ListMode::Arrays
        } else {
            ListMode::Strings
        }
    }
}

/// A missing collection exports as an empty array.
pub fn export<R: Record>(collection: Option<&Collection<R>>, mode: ListMode) -> JsonValue {
    let Some(collection) = collection else {
        warn!("record collection not found; exporting empty array");
        return JsonValue::Array(Vec::new());
    };
    JsonValue::Array(
        collection
            .records()
            .iter()
            .map(|record| record_json(record, mode))
            .collect(),
    )
}

pub fn record_json<R: Record>(record: &R, mode: ListMode) -> JsonValue {
    let mut builder = ObjectBuilder::new();
    for field in R::fields() {
        let value = match (field.read(record), &field.slot) {
            (AttrValue::Null, _) => JsonValue::Null,
            (AttrValue::Int(number), _) => JsonValue::from(i64::from(number)),
            (AttrValue::Text(text), Slot::List { .. }) if mode == ListMode::Arrays => {
                JsonValue::Array(
                    list_codec::to_json_array(&text)
                        .into_iter()
                        .map(JsonValue::String)
                        .collect(),
                )
            }
            (AttrValue::Text(text), _) => JsonValue::String(text),
        };
        builder = builder.member(field.name, value);
    }
    builder.build()
}
