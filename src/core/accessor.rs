//! Purpose: Named get/set over records through their static field tables.
//! Exports: `get`, `set`, `field`, `new_instance`, `from_attributes`, `to_attributes`.
//! Role: The only path by which export, merge and the store touch record attributes.
//! Invariants: An unknown attribute name is a `Schema` error, never a silent skip.
//! Invariants: Writing null to a primitive integer stores 0; stored nulls load as null.
//! Invariants: Non-numeric text on an integer field fails.

use crate::core::error::{Error, ErrorKind};
use crate::core::record::{element_type_error, Field, IntRepr, Record, Slot};
use crate::core::store::{AttrValue, Attribute};

impl<R> Field<R> {
    pub fn read(&self, record: &R) -> AttrValue {
        match &self.slot {
            Slot::Text { get, .. } | Slot::List { get, .. } => get(record)
                .map(|text| AttrValue::Text(text.to_string()))
                .unwrap_or(AttrValue::Null),
            Slot::Int { get, .. } => get(record).map(AttrValue::Int).unwrap_or(AttrValue::Null),
        }
    }

    pub fn write(&self, record: &mut R, value: AttrValue) -> Result<(), Error> {
        match &self.slot {
            Slot::Text { set, .. } | Slot::List { set, .. } => {
                let text = match value {
                    AttrValue::Null => None,
                    AttrValue::Int(number) => Some(number.to_string()),
                    AttrValue::Text(text) => Some(text),
                };
                set(record, text);
            }
            Slot::Int { repr, set, .. } => {
                let number = match value {
                    AttrValue::Null => None,
                    AttrValue::Int(number) => Some(number),
                    AttrValue::Text(text) => parse_int(self.name, &text)?,
                };
                let number = match (number, repr) {
                    (None, IntRepr::Primitive) => Some(0),
                    (number, _) => number,
                };
                set(record, number);
            }
        }
        Ok(())
    }

    // Stored nulls stay null; primitive defaulting only applies to writes.
    fn load(&self, record: &mut R, value: AttrValue) -> Result<(), Error> {
        match (&self.slot, value) {
            (Slot::Int { set, .. }, AttrValue::Null) => {
                set(record, None);
                Ok(())
            }
            (_, value) => self.write(record, value),
        }
    }
}

fn parse_int(field: &str, text: &str) -> Result<Option<i32>, Error> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<i32>().map(Some).map_err(|err| {
        Error::new(ErrorKind::Schema)
            .with_message(format!("field `{field}` expects an integer, got `{trimmed}`"))
            .with_source(err)
    })
}

pub fn field<R: Record>(name: &str) -> Result<&'static Field<R>, Error> {
    R::fields()
        .iter()
        .find(|field| field.name == name)
        .ok_or_else(|| {
            Error::new(ErrorKind::Schema).with_message(format!(
                "record type `{}` has no field `{name}`",
                R::TYPE_NAME
            ))
        })
}

pub fn get<R: Record>(record: &R, name: &str) -> Result<AttrValue, Error> {
    Ok(field::<R>(name)?.read(record))
}

pub fn set<R: Record>(record: &mut R, name: &str, value: AttrValue) -> Result<(), Error> {
    field::<R>(name)?.write(record, value)
}

/// Fresh record for a collection whose elements are `element_type`.
pub fn new_instance<R: Record>(element_type: &str) -> Result<R, Error> {
    if element_type != R::TYPE_NAME {
        return Err(element_type_error::<R>(element_type));
    }
    Ok(R::default())
}

pub fn from_attributes<R: Record>(element_type: &str, attributes: &[Attribute]) -> Result<R, Error> {
    let mut record = new_instance::<R>(element_type)?;
    for attribute in attributes {
        match R::fields().iter().find(|field| field.name == attribute.name) {
            Some(field) => field.load(&mut record, attribute.value.clone())?,
            None => record.extra_mut().push(attribute.clone()),
        }
    }
    Ok(record)
}

pub fn to_attributes<R: Record>(record: &R) -> Vec<Attribute> {
    let mut attributes = R::fields()
        .iter()
        .map(|field| Attribute::new(field.name, field.read(record)))
        .collect::<Vec<_>>();
    attributes.extend(record.extra().iter().cloned());
    attributes
}
