//! Purpose: Library crate behind the `loadout-bridge` CLI and its tests.
//! Exports: `core` (store container, record schema, export/merge, persistence, errors)
//! and `json` (hand-written JSON model, parser and writer).
//! Role: Converts loadout record tables to JSON for editing and merges edits back.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
//! Invariants: Only `core::persist` and `core::store::Store::load` touch the filesystem.
pub mod core;
pub mod json;
