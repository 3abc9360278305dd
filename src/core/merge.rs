//! Purpose: Merge an imported JSON array into a record collection by key.
//! Exports: `merge`, `MergeReport`.
//! Role: Write-path core; builds the replacement collection as a new value.
//! Invariants: Output holds exactly the keyed input objects, in input order.
//! Invariants: Existing records are reused so attributes outside the schema survive.
//! Invariants: Every schema field is assigned; a member missing from the object is null.
//! Invariants: Any error aborts the merge; the source collection is never modified.
//! Notes: Duplicate input keys are all kept (each becomes its own record).

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::core::accessor;
use crate::core::error::{Error, ErrorKind};
use crate::core::list_codec;
use crate::core::record::{Collection, Field, Record, Slot, KEY_FIELD};
use crate::core::store::AttrValue;
use crate::json::value::{JsonObject, JsonValue, Number};
use crate::json::write;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub updated: usize,
    pub created: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub duplicate_keys: Vec<String>,
}

impl MergeReport {
    pub fn imported(&self) -> usize {
        self.updated + self.created
    }
}

pub fn merge<R: Record>(
    collection: &Collection<R>,
    input: &JsonValue,
) -> Result<(Collection<R>, MergeReport), Error> {
    let items = input.as_array().ok_or_else(|| {
        Error::new(ErrorKind::Parse).with_message(format!(
            "expected top-level array, found {}",
            input.type_name()
        ))
    })?;

    let key_field = accessor::field::<R>(KEY_FIELD)?;
    let mut index = HashMap::new();
    for (pos, record) in collection.records().iter().enumerate() {
        if let AttrValue::Text(key) = key_field.read(record) {
            index.insert(key, pos);
        }
    }

    let mut report = MergeReport::default();
    let mut seen = HashSet::new();
    let mut reused = HashSet::new();
    let mut merged = Vec::with_capacity(items.len());
    for (pos, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            debug!(index = pos, kind = item.type_name(), "skipping non-object entry");
            report.skipped += 1;
            continue;
        };
        let key = match object.get(KEY_FIELD) {
            None | Some(JsonValue::Null) => {
                debug!(index = pos, "skipping entry without key");
                report.skipped += 1;
                continue;
            }
            Some(value) => scalar_text(KEY_FIELD, value)?,
        };
        if !seen.insert(key.clone()) {
            warn!(key = %key, "duplicate key in import; keeping every occurrence");
            report.duplicate_keys.push(key.clone());
        }

        let mut target = match index.get(&key) {
            Some(&existing) => {
                report.updated += 1;
                reused.insert(existing);
                collection.records()[existing].clone()
            }
            None => {
                report.created += 1;
                accessor::new_instance::<R>(collection.element_type())?
            }
        };
        apply_object(&mut target, object).map_err(|err| {
            err.with_hint(format!(
                "while importing record {} (entry {pos})",
                write::quote(Some(&key))
            ))
        })?;
        merged.push(target);
    }

    // Earlier duplicates and keyless source records are never reused.
    report.dropped = collection.len() - reused.len();
    Ok((Collection::new(merged), report))
}

fn apply_object<R: Record>(target: &mut R, object: &JsonObject) -> Result<(), Error> {
    for field in R::fields() {
        let value = attr_from_json(field, object.get(field.name))?;
        field.write(target, value)?;
    }
    Ok(())
}

fn attr_from_json<R>(field: &Field<R>, value: Option<&JsonValue>) -> Result<AttrValue, Error> {
    let Some(value) = value else {
        return Ok(AttrValue::Null);
    };
    match (&field.slot, value) {
        (_, JsonValue::Null) => Ok(AttrValue::Null),
        (Slot::List { .. }, JsonValue::Array(items)) => {
            let items = items
                .iter()
                .map(|item| match item {
                    JsonValue::Null => Ok(None),
                    other => scalar_text(field.name, other).map(Some),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttrValue::Text(list_codec::encode(
                items.iter().map(|item| item.as_deref()),
            )))
        }
        (Slot::Int { .. }, JsonValue::Number(Number::Int(number))) => i32::try_from(*number)
            .map(AttrValue::Int)
            .map_err(|_| out_of_range(field.name, &number.to_string())),
        (Slot::Int { .. }, JsonValue::Number(Number::Float(number))) => {
            let truncated = number.trunc();
            if truncated >= f64::from(i32::MIN) && truncated <= f64::from(i32::MAX) {
                Ok(AttrValue::Int(truncated as i32))
            } else {
                Err(out_of_range(field.name, &number.to_string()))
            }
        }
        (Slot::Int { .. }, JsonValue::String(text)) => Ok(AttrValue::Text(text.clone())),
        (Slot::Int { .. }, other) => Err(type_mismatch(field.name, "an integer", other)),
        (_, other) => scalar_text(field.name, other).map(AttrValue::Text),
    }
}

// Strings pass through; numbers and booleans use their JSON spelling.
fn scalar_text(field: &str, value: &JsonValue) -> Result<String, Error> {
    match value {
        JsonValue::String(text) => Ok(text.clone()),
        JsonValue::Number(_) | JsonValue::Bool(_) => Ok(write::to_string(value)),
        other => Err(type_mismatch(field, "a string", other)),
    }
}

fn type_mismatch(field: &str, expected: &str, found: &JsonValue) -> Error {
    Error::new(ErrorKind::Schema).with_message(format!(
        "field `{field}` expects {expected}, found {}",
        found.type_name()
    ))
}

fn out_of_range(field: &str, literal: &str) -> Error {
    Error::new(ErrorKind::Schema)
        .with_message(format!("field `{field}` value {literal} is out of integer range"))
}
