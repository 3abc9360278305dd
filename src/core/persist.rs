// Crash-safe store writes, one-time backups, the import lock, and content digests.
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::core::error::{Error, ErrorKind};
use crate::core::store::io_error_kind;

pub fn backup_path(store: &Path) -> PathBuf {
    sibling_with_suffix(store, ".backup")
}

pub fn lock_path(store: &Path) -> PathBuf {
    sibling_with_suffix(store, ".lock")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes `bytes` to a temp file beside `path`, syncs it, then renames it into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|err| io_error(err, dir, "failed to create temp file"))?;
    temp.write_all(bytes)
        .map_err(|err| io_error(err, temp.path(), "failed to write temp file"))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| io_error(err, temp.path(), "failed to sync temp file"))?;
    temp.persist(path)
        .map_err(|err| io_error(err.error, path, "failed to replace file"))?;
    debug!(path = %path.display(), bytes = bytes.len(), "file replaced atomically");
    Ok(())
}

/// Copies the store to its `.backup` sibling unless a backup already exists.
/// Returns the backup path when one was created.
pub fn ensure_backup(store: &Path) -> Result<Option<PathBuf>, Error> {
    let backup = backup_path(store);
    if backup.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(store).map_err(|err| io_error(err, store, "failed to read store"))?;
    write_atomic(&backup, &bytes)?;
    info!(backup = %backup.display(), "created store backup");
    Ok(Some(backup))
}

const NO_BACKUP_HINT: &str = "A backup is created by the first import. Nothing to restore until then.";

/// Fails with `NotFound` (or the matching I/O kind) unless `path` exists.
/// Callers check before taking a `StoreLock` so a missing file leaves no sidecar behind.
pub fn require_existing(path: &Path, what: &str) -> Result<(), Error> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|err| io_error(err, path, &format!("failed to read {what}")))
}

pub fn require_backup(store: &Path) -> Result<(), Error> {
    require_existing(&backup_path(store), "backup").map_err(|err| err.with_hint(NO_BACKUP_HINT))
}

pub fn restore_backup(store: &Path) -> Result<Vec<u8>, Error> {
    let backup = backup_path(store);
    let bytes = std::fs::read(&backup)
        .map_err(|err| io_error(err, &backup, "failed to read backup").with_hint(NO_BACKUP_HINT))?;
    write_atomic(store, &bytes)?;
    info!(store = %store.display(), "restored store from backup");
    Ok(bytes)
}

pub fn sha256_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex = digest
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    format!("sha256:{hex}")
}

/// Exclusive, non-blocking lock held for the duration of a store rewrite.
///
/// The `<store>.lock` sidecar is left in place after release; deleting it while
/// another process waits on the same inode would let two writers in.
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    pub fn acquire(store: &Path) -> Result<Self, Error> {
        let path = lock_path(store);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| io_error(err, &path, "failed to open lock file"))?;
        file.try_lock_exclusive().map_err(|err| {
            Error::new(lock_error_kind(&err))
                .with_message("store is locked by another import")
                .with_path(&path)
                .with_source(err)
        })?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == libc::EACCES || errno == libc::EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn io_error(err: io::Error, path: &Path, message: &str) -> Error {
    Error::new(io_error_kind(&err))
        .with_message(message)
        .with_path(path)
        .with_source(err)
}
