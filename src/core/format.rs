//! Purpose: Centralize store container versioning and magic bytes.
//! Exports: `STORE_MAGIC`, `STORE_FORMAT_VERSION`, `SUPPORTED_STORE_FORMAT_VERSIONS`, `store_version_error`.
//! Role: Shared policy for gating on-disk compatibility when decoding a store.
//! Invariants: Version list is additive; bump only for incompatible on-disk changes.

use crate::core::error::{Error, ErrorKind};

pub const STORE_MAGIC: [u8; 4] = *b"LDST";
pub const STORE_FORMAT_VERSION: u32 = 1;
pub const SUPPORTED_STORE_FORMAT_VERSIONS: &[u32] = &[STORE_FORMAT_VERSION];

pub fn store_version_error(detected: u32) -> Error {
    let supported = SUPPORTED_STORE_FORMAT_VERSIONS
        .iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Error::new(ErrorKind::Corrupt)
        .with_message(format!(
            "unsupported store format version {detected} (supported: {supported})"
        ))
        .with_hint("The store was written by a newer tool. Upgrade loadout-bridge and retry.")
}
