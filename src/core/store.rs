// Store container: a path-keyed document cache holding one or more record tables.
use std::collections::HashSet;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::format::{
    store_version_error, STORE_FORMAT_VERSION, STORE_MAGIC, SUPPORTED_STORE_FORMAT_VERSIONS,
};

pub const DEFAULT_COLLECTION_PATH: &str = "/modules/loadouts/data/loadouts.xml";

const HEADER_LEN: usize = 12;
const DOC_BLOB: u8 = 0;
const DOC_RECORDS: u8 = 1;
const TAG_NULL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_TEXT: u8 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    Null,
    Int(i32),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttrValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Untyped record collection as stored: element type name plus attribute rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordTable {
    pub element_type: String,
    pub rows: Vec<Vec<Attribute>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Document {
    Blob(Vec<u8>),
    Records(RecordTable),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Store {
    documents: Vec<(String, Document)>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message("failed to read store")
                .with_path(path)
                .with_source(err)
        })?;
        Self::decode(&bytes).map_err(|err| err.with_path(path))
    }

    /// Encodes the store and atomically replaces the file at `path`; returns the bytes written.
    pub fn save_atomic(&self, path: impl AsRef<Path>) -> Result<Vec<u8>, Error> {
        let bytes = self.encode();
        crate::core::persist::write_atomic(path.as_ref(), &bytes)?;
        Ok(bytes)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.documents.iter().map(|(path, doc)| (path.as_str(), doc))
    }

    /// Adds or replaces the document stored under `path`, keeping its position.
    pub fn insert(&mut self, path: impl Into<String>, document: Document) {
        let path = path.into();
        match self.documents.iter_mut().find(|(name, _)| *name == path) {
            Some((_, slot)) => *slot = document,
            None => self.documents.push((path, document)),
        }
    }

    /// Resolves the record table for `preferred`: an exact path match first, then the
    /// first table whose path ends with the same file name (case-insensitive).
    pub fn locate_collection(&self, preferred: &str) -> Option<&str> {
        let exact = self
            .documents
            .iter()
            .find(|(path, doc)| path.as_str() == preferred && matches!(doc, Document::Records(_)));
        if let Some((path, _)) = exact {
            debug!(collection = %path, "located collection by exact path");
            return Some(path.as_str());
        }

        let suffix = preferred
            .rsplit('/')
            .next()
            .unwrap_or(preferred)
            .to_lowercase();
        if suffix.is_empty() {
            return None;
        }
        let found = self.documents.iter().find(|(path, doc)| {
            path.to_lowercase().ends_with(&suffix) && matches!(doc, Document::Records(_))
        });
        if let Some((path, _)) = found {
            debug!(collection = %path, wanted = preferred, "located collection by file name");
        }
        found.map(|(path, _)| path.as_str())
    }

    pub fn table(&self, path: &str) -> Option<&RecordTable> {
        self.documents.iter().find_map(|(name, doc)| match doc {
            Document::Records(table) if name.as_str() == path => Some(table),
            _ => None,
        })
    }

    /// Swaps in `table` for the record table at `path` and returns the previous one.
    pub fn replace_table(&mut self, path: &str, table: RecordTable) -> Option<RecordTable> {
        let current = self.documents.iter_mut().find_map(|(name, doc)| match doc {
            Document::Records(current) if name.as_str() == path => Some(current),
            _ => None,
        })?;
        Some(std::mem::replace(current, table))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.documents.len() * 64);
        out.extend_from_slice(&STORE_MAGIC);
        write_u32(&mut out, STORE_FORMAT_VERSION);
        write_len(&mut out, self.documents.len());
        for (path, doc) in &self.documents {
            write_str(&mut out, path);
            match doc {
                Document::Blob(bytes) => {
                    out.push(DOC_BLOB);
                    write_len(&mut out, bytes.len());
                    out.extend_from_slice(bytes);
                }
                Document::Records(table) => {
                    out.push(DOC_RECORDS);
                    encode_table(&mut out, table);
                }
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::new(ErrorKind::Corrupt).with_message("store header too small"));
        }
        if buf[0..4] != STORE_MAGIC {
            return Err(Error::new(ErrorKind::Corrupt).with_message("bad store magic"));
        }
        let mut reader = Reader::new(buf);
        reader.pos = 4;
        let version = reader.read_u32()?;
        if !SUPPORTED_STORE_FORMAT_VERSIONS.contains(&version) {
            return Err(store_version_error(version));
        }

        let count = reader.read_u32()? as usize;
        let mut documents = Vec::new();
        let mut seen = HashSet::new();
        for _ in 0..count {
            let path = reader.read_string()?;
            if !seen.insert(path.clone()) {
                return Err(Error::new(ErrorKind::Corrupt)
                    .with_message(format!("duplicate document path `{path}`"))
                    .with_offset(reader.pos as u64));
            }
            let doc = match reader.read_u8()? {
                DOC_BLOB => {
                    let len = reader.read_u32()? as usize;
                    Document::Blob(reader.read_bytes(len)?.to_vec())
                }
                DOC_RECORDS => Document::Records(decode_table(&mut reader)?),
                other => {
                    return Err(Error::new(ErrorKind::Corrupt)
                        .with_message(format!("unknown document kind {other}"))
                        .with_offset(reader.pos as u64 - 1));
                }
            };
            documents.push((path, doc));
        }
        if reader.pos != buf.len() {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message("trailing bytes after last document")
                .with_offset(reader.pos as u64));
        }
        Ok(Self { documents })
    }
}

fn encode_table(out: &mut Vec<u8>, table: &RecordTable) {
    write_str(out, &table.element_type);
    write_len(out, table.rows.len());
    for row in &table.rows {
        write_len(out, row.len());
        for attr in row {
            write_str(out, &attr.name);
            match &attr.value {
                AttrValue::Null => out.push(TAG_NULL),
                AttrValue::Int(value) => {
                    out.push(TAG_INT);
                    out.extend_from_slice(&value.to_le_bytes());
                }
                AttrValue::Text(text) => {
                    out.push(TAG_TEXT);
                    write_str(out, text);
                }
            }
        }
    }
}

fn decode_table(reader: &mut Reader<'_>) -> Result<RecordTable, Error> {
    let element_type = reader.read_string()?;
    let row_count = reader.read_u32()? as usize;
    let mut rows = Vec::new();
    for _ in 0..row_count {
        let attr_count = reader.read_u32()? as usize;
        let mut row = Vec::new();
        for _ in 0..attr_count {
            let name = reader.read_string()?;
            let value = match reader.read_u8()? {
                TAG_NULL => AttrValue::Null,
                TAG_INT => AttrValue::Int(i32::from_le_bytes(reader.read_4()?)),
                TAG_TEXT => AttrValue::Text(reader.read_string()?),
                other => {
                    return Err(Error::new(ErrorKind::Corrupt)
                        .with_message(format!("unknown attribute tag {other} on `{name}`"))
                        .with_offset(reader.pos as u64 - 1));
                }
            };
            row.push(Attribute { name, value });
        }
        rows.push(row);
    }
    Ok(RecordTable { element_type, rows })
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

// Lengths above u32::MAX cannot occur for in-memory stores this tool builds.
fn write_len(out: &mut Vec<u8>, len: usize) {
    write_u32(out, len as u32);
}

fn write_str(out: &mut Vec<u8>, text: &str) {
    write_len(out, text.len());
    out.extend_from_slice(text.as_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("store truncated")
                    .with_offset(self.pos as u64)
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_4(&mut self) -> Result<[u8; 4], Error> {
        let mut out = [0u8; 4];
        out.copy_from_slice(self.read_bytes(4)?);
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.read_4()?))
    }

    fn read_string(&mut self) -> Result<String, Error> {
        let len = self.read_u32()? as usize;
        let start = self.pos;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("invalid utf-8 in store string")
                .with_offset(start as u64)
                .with_source(err)
        })
    }
}

pub(crate) fn io_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == libc::EACCES || errno == libc::EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{AttrValue, Attribute, Document, RecordTable, Store, DEFAULT_COLLECTION_PATH};
    use crate::core::error::ErrorKind;

    fn sample_store() -> Store {
        let mut store = Store::new();
        store.insert("/modules/items/data/items.xml", Document::Blob(vec![1, 2, 3]));
        store.insert(
            "/Modules/Loadouts/Data/LOADOUTS.XML",
            Document::Records(RecordTable {
                element_type: "Loadout".to_string(),
                rows: vec![vec![
                    Attribute::new("key", AttrValue::Text("A".to_string())),
                    Attribute::new("sortOrder", AttrValue::Int(-3)),
                    Attribute::new("warning", AttrValue::Null),
                ]],
            }),
        );
        store
    }

    #[test]
    fn encode_decode_preserves_documents() {
        let store = sample_store();
        let decoded = Store::decode(&store.encode()).expect("decode");
        assert_eq!(decoded, store);
    }

    #[test]
    fn save_atomic_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("game.store");
        let store = sample_store();
        let written = store.save_atomic(&path).expect("save");
        assert_eq!(std::fs::read(&path).expect("read"), written);
        assert_eq!(Store::load(&path).expect("load"), store);

        let err = Store::load(dir.path().join("missing.store")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.path().is_some());
    }

    #[test]
    fn locate_prefers_exact_path_then_file_name() {
        let mut store = sample_store();
        assert_eq!(
            store.locate_collection(DEFAULT_COLLECTION_PATH),
            Some("/Modules/Loadouts/Data/LOADOUTS.XML")
        );

        store.insert(
            DEFAULT_COLLECTION_PATH,
            Document::Records(RecordTable::default()),
        );
        assert_eq!(
            store.locate_collection(DEFAULT_COLLECTION_PATH),
            Some(DEFAULT_COLLECTION_PATH)
        );
    }

    #[test]
    fn locate_ignores_blobs_and_missing_tables() {
        let mut store = Store::new();
        store.insert(DEFAULT_COLLECTION_PATH, Document::Blob(Vec::new()));
        assert_eq!(store.locate_collection(DEFAULT_COLLECTION_PATH), None);
        assert!(store.table(DEFAULT_COLLECTION_PATH).is_none());
    }

    #[test]
    fn replace_table_swaps_contents() {
        let mut store = sample_store();
        let path = "/Modules/Loadouts/Data/LOADOUTS.XML";
        let previous = store
            .replace_table(path, RecordTable::default())
            .expect("previous table");
        assert_eq!(previous.rows.len(), 1);
        assert!(store.table(path).expect("table").rows.is_empty());
        assert!(store.replace_table("/missing.xml", RecordTable::default()).is_none());
    }

    #[test]
    fn corrupt_inputs_are_rejected() {
        let bytes = sample_store().encode();

        let err = Store::decode(b"NOPE\x01\0\0\0\0\0\0\0").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);

        let err = Store::decode(&bytes[..bytes.len() - 2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);

        let mut trailing = bytes.clone();
        trailing.push(0);
        let err = Store::decode(&trailing).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);

        let mut future = bytes;
        future[4] = 9;
        let err = Store::decode(&future).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert!(err.message().unwrap().contains("version 9"));
    }

    #[test]
    fn missing_file_maps_to_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Store::load(dir.path().join("absent.dat")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.path().is_some());
    }
}
