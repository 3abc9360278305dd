//! Purpose: Compile-time attribute schema for store records, plus the `Loadout` record.
//! Exports: `Record`, `Field`, `Slot`, `IntRepr`, `Collection`, `Loadout`, `KEY_FIELD`.
//! Role: Replaces name-based reflection with a static table of typed accessor pairs.
//! Invariants: Table order is the JSON member order used by export.
//! Invariants: Attributes not named by the table are carried in `extra` untouched.

use crate::core::accessor;
use crate::core::error::{Error, ErrorKind};
use crate::core::store::{Attribute, RecordTable};

pub const KEY_FIELD: &str = "key";

/// A record type addressable by attribute name.
pub trait Record: Clone + Default + 'static {
    /// Element type name recorded in the store for tables of this record.
    const TYPE_NAME: &'static str;

    fn fields() -> &'static [Field<Self>];

    fn extra(&self) -> &[Attribute];

    fn extra_mut(&mut self) -> &mut Vec<Attribute>;
}

/// How a null is stored into an integer attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IntRepr {
    /// Declared as a plain integer: null is written as 0.
    Primitive,
    /// Declared as an optional integer: null stays null.
    Nullable,
}

pub enum Slot<R> {
    Text {
        get: fn(&R) -> Option<&str>,
        set: fn(&mut R, Option<String>),
    },
    /// Text attribute holding a `", "`-delimited list.
    List {
        get: fn(&R) -> Option<&str>,
        set: fn(&mut R, Option<String>),
    },
    Int {
        repr: IntRepr,
        get: fn(&R) -> Option<i32>,
        set: fn(&mut R, Option<i32>),
    },
}

pub struct Field<R> {
    pub name: &'static str,
    pub slot: Slot<R>,
}

/// Typed view of a stored record table.
#[derive(Clone, Debug, PartialEq)]
pub struct Collection<R> {
    element_type: String,
    records: Vec<R>,
}

impl<R: Record> Collection<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            element_type: R::TYPE_NAME.to_string(),
            records,
        }
    }

    pub fn from_table(table: &RecordTable) -> Result<Self, Error> {
        if table.element_type != R::TYPE_NAME {
            return Err(element_type_error::<R>(&table.element_type));
        }
        let records = table
            .rows
            .iter()
            .map(|row| accessor::from_attributes::<R>(&table.element_type, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            element_type: table.element_type.clone(),
            records,
        })
    }

    pub fn to_table(&self) -> RecordTable {
        RecordTable {
            element_type: self.element_type.clone(),
            rows: self.records.iter().map(accessor::to_attributes).collect(),
        }
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub(crate) fn element_type_error<R: Record>(found: &str) -> Error {
    Error::new(ErrorKind::Schema).with_message(format!(
        "collection holds `{found}` records, expected `{}`",
        R::TYPE_NAME
    ))
}

/// One character loadout as stored in the game's data cache.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Loadout {
    pub key: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub select_major_skills: Option<i32>,
    pub select_minor_skills: Option<i32>,
    pub major_skills: Option<String>,
    pub minor_skills: Option<String>,
    pub abilities: Option<String>,
    pub perks: Option<String>,
    pub select_perks: Option<String>,
    pub loot_table: Option<String>,
    pub loot_description: Option<String>,
    pub card: Option<String>,
    pub card_small: Option<String>,
    pub card_square: Option<String>,
    pub default_body_type: Option<String>,
    pub warning: Option<String>,
    pub extra: Vec<Attribute>,
}

macro_rules! text_field {
    ($name:literal, $member:ident) => {
        Field {
            name: $name,
            slot: Slot::Text {
                get: |record| record.$member.as_deref(),
                set: |record, value| record.$member = value,
            },
        }
    };
}

macro_rules! list_field {
    ($name:literal, $member:ident) => {
        Field {
            name: $name,
            slot: Slot::List {
                get: |record| record.$member.as_deref(),
                set: |record, value| record.$member = value,
            },
        }
    };
}

macro_rules! int_field {
    ($name:literal, $member:ident) => {
        Field {
            name: $name,
            slot: Slot::Int {
                repr: IntRepr::Primitive,
                get: |record| record.$member,
                set: |record, value| record.$member = value,
            },
        }
    };
}

static LOADOUT_FIELDS: [Field<Loadout>; 18] = [
    text_field!("key", key),
    text_field!("name", name),
    text_field!("description", description),
    int_field!("sortOrder", sort_order),
    int_field!("selectMajorSkills", select_major_skills),
    int_field!("selectMinorSkills", select_minor_skills),
    list_field!("majorSkills", major_skills),
    list_field!("minorSkills", minor_skills),
    list_field!("abilities", abilities),
    list_field!("perks", perks),
    list_field!("selectPerks", select_perks),
    text_field!("lootTable", loot_table),
    text_field!("lootDescription", loot_description),
    text_field!("card", card),
    text_field!("cardSmall", card_small),
    text_field!("cardSquare", card_square),
    text_field!("defaultBodyType", default_body_type),
    text_field!("warning", warning),
];

impl Record for Loadout {
    const TYPE_NAME: &'static str = "Loadout";

    fn fields() -> &'static [Field<Self>] {
        &LOADOUT_FIELDS
    }

    fn extra(&self) -> &[Attribute] {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.extra
    }
}
