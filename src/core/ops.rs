//! Purpose: Store-level export, import and key listing for the loadout collection.
//! Exports: `export_json`, `import_json`, `list_keys`, `ImportOutcome`.
//! Role: Glue between the store container and the codec; no file I/O happens here.
//! Invariants: Export soft-fails to `[]` when the collection is missing; import hard-fails.
//! Invariants: Import swaps the collection only after the whole document merged cleanly.

use tracing::{info, warn};

use crate::core::error::{Error, ErrorKind};
use crate::core::export::{export, ListMode};
use crate::core::merge::{merge, MergeReport};
use crate::core::record::{Collection, Loadout};
use crate::core::store::Store;
use crate::json::parse::Parser;
use crate::json::write;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOutcome {
    pub collection: String,
    pub report: MergeReport,
}

pub fn export_json(store: &Store, collection: &str, mode: ListMode) -> Result<String, Error> {
    let typed = match store
        .locate_collection(collection)
        .and_then(|path| store.table(path))
    {
        Some(table) => Some(Collection::<Loadout>::from_table(table)?),
        None => {
            warn!(collection, "collection not found in store");
            None
        }
    };
    Ok(write::to_string(&export(typed.as_ref(), mode)))
}

pub fn import_json(store: &mut Store, collection: &str, text: &str) -> Result<ImportOutcome, Error> {
    // Offsets are reported against the file as given, BOM included.
    let (text, shift) = match text.strip_prefix('\u{feff}') {
        Some(rest) => (rest, 1),
        None => (text, 0),
    };
    let mut parser = Parser::new(text);
    let input = parser.parse_value().map_err(|err| match err.offset() {
        Some(offset) => err.with_offset(offset + shift as u64),
        None => err,
    })?;
    if let Some(offset) = parser.rest_offset() {
        warn!(offset = offset + shift, "ignoring trailing content after top-level value");
    }

    let path = store
        .locate_collection(collection)
        .map(str::to_string)
        .ok_or_else(|| not_found(collection))?;
    let table = store.table(&path).ok_or_else(|| not_found(collection))?;
    let current = Collection::<Loadout>::from_table(table)?;

    let (merged, report) = merge(&current, &input)?;
    store.replace_table(&path, merged.to_table());
    if !report.duplicate_keys.is_empty() {
        warn!(
            collection = %path,
            keys = %write::string_array(&report.duplicate_keys),
            "import kept records with duplicate keys"
        );
    }
    info!(
        collection = %path,
        imported = report.imported(),
        created = report.created,
        dropped = report.dropped,
        skipped = report.skipped,
        "merged import into collection"
    );
    Ok(ImportOutcome {
        collection: path,
        report,
    })
}

pub fn list_keys(store: &Store, collection: &str) -> Result<Vec<String>, Error> {
    let table = store
        .locate_collection(collection)
        .and_then(|path| store.table(path))
        .ok_or_else(|| not_found(collection))?;
    let typed = Collection::<Loadout>::from_table(table)?;
    Ok(typed
        .records()
        .iter()
        .filter_map(|record| record.key.clone())
        .collect())
}

fn not_found(collection: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_message(format!("record collection `{collection}` not found in store"))
        .with_hint("Check --collection; the default is /modules/loadouts/data/loadouts.xml.")
}
