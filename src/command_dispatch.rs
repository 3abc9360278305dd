//! Purpose: Hold top-level CLI command dispatch for `loadout-bridge`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap; sequence file I/O around the library ops.
//! Invariants: Import holds the store lock from load through the atomic replace.
//! Invariants: Nothing is written unless the whole import merged cleanly.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use super::*;
use loadout_bridge::core::export::ListMode;
use loadout_bridge::core::ops;
use loadout_bridge::core::persist::{self, StoreLock};
use loadout_bridge::core::store::Store;

#[derive(Debug, Serialize)]
struct ImportSummary {
    store: String,
    collection: String,
    imported: usize,
    created: usize,
    updated: usize,
    skipped: usize,
    dropped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    duplicate_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backup: Option<String>,
    sha256: String,
    written_at: String,
}

#[derive(Debug, Serialize)]
struct RestoreSummary {
    store: String,
    restored_from: String,
    sha256: String,
}

pub(super) fn dispatch_command(command: Command, collection: &str) -> Result<RunOutcome, Error> {
    match command {
        Command::Export { store, arrays } => {
            let loaded = Store::load(&store)?;
            let text = ops::export_json(&loaded, collection, ListMode::from_flag(arrays))?;
            write_stdout(text.as_bytes())?;
            Ok(RunOutcome::ok())
        }
        Command::Import {
            store,
            json_file,
            no_backup,
        } => {
            let summary = import_file(&store, &json_file, collection, !no_backup)?;
            emit_json(&summary)?;
            Ok(RunOutcome::ok())
        }
        Command::Restore { store } => {
            persist::require_backup(&store)?;
            let _lock = StoreLock::acquire(&store)?;
            let bytes = persist::restore_backup(&store)?;
            emit_json(&RestoreSummary {
                store: store.display().to_string(),
                restored_from: persist::backup_path(&store).display().to_string(),
                sha256: persist::sha256_digest(&bytes),
            })?;
            Ok(RunOutcome::ok())
        }
        Command::Keys { store } => {
            let loaded = Store::load(&store)?;
            let mut out = String::new();
            for key in ops::list_keys(&loaded, collection)? {
                out.push_str(&key);
                out.push('\n');
            }
            write_stdout(out.as_bytes())?;
            Ok(RunOutcome::ok())
        }
    }
}

fn import_file(
    store_path: &Path,
    json_path: &Path,
    collection: &str,
    backup: bool,
) -> Result<ImportSummary, Error> {
    persist::require_existing(store_path, "store")?;
    let _lock = StoreLock::acquire(store_path)?;
    let mut store = Store::load(store_path)?;
    let text = read_json_text(json_path)?;
    let outcome =
        ops::import_json(&mut store, collection, &text).map_err(|err| match err.kind() {
            ErrorKind::Parse | ErrorKind::Schema => err.with_path(json_path),
            _ => err.with_path(store_path),
        })?;

    let backup_created = if backup {
        persist::ensure_backup(store_path)?
    } else {
        None
    };
    let bytes = store.save_atomic(store_path)?;
    let sha256 = persist::sha256_digest(&bytes);
    info!(store = %store_path.display(), %sha256, "store written");

    let report = outcome.report;
    Ok(ImportSummary {
        store: store_path.display().to_string(),
        collection: outcome.collection,
        imported: report.imported(),
        created: report.created,
        updated: report.updated,
        skipped: report.skipped,
        dropped: report.dropped,
        duplicate_keys: report.duplicate_keys,
        backup: backup_created.map(|path| path.display().to_string()),
        sha256,
        written_at: now_rfc3339()?,
    })
}

fn read_json_text(path: &Path) -> Result<String, Error> {
    let bytes = std::fs::read(path).map_err(|err| {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::Permission,
            _ => ErrorKind::Io,
        };
        Error::new(kind)
            .with_message("failed to read json file")
            .with_path(path)
            .with_source(err)
    })?;
    String::from_utf8(bytes).map_err(|err| {
        let offset = err.utf8_error().valid_up_to() as u64;
        Error::new(ErrorKind::Parse)
            .with_message("json file is not valid UTF-8 (offset counts bytes)")
            .with_path(path)
            .with_offset(offset)
            .with_source(err)
    })
}

fn now_rfc3339() -> Result<String, Error> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to format timestamp")
            .with_source(err)
    })
}

fn emit_json<T: Serialize>(value: &T) -> Result<(), Error> {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode summary")
            .with_source(err)
    })?;
    println!("{json}");
    Ok(())
}

fn write_stdout(bytes: &[u8]) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.flush())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write stdout")
                .with_source(err)
        })
}
