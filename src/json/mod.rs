//! Purpose: Self-contained JSON codec for loadout export and import.
//! Exports: `value` (document model), `parse` (decoder), `write` (encoder).
//! Role: Single seam for record JSON; the codec path uses no external JSON crate.
//! Invariants: Parse and write agree on escaping so quoted text round-trips.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub mod parse;
pub mod value;
pub mod write;

pub use parse::{parse, Parser};
pub use value::{JsonObject, JsonValue, Number};
