//! On-disk artifacts of a collection: the metadata sidecar, atomic writes and
//! the change stamp that makes repeated loads no-ops.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

use ragdb_core::error::{Error, Result};
use ragdb_core::{ChunkRecord, Modality};

/// Sidecar document: id counter plus the metadata table keyed `<modality>_<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sidecar {
    pub collection: String,
    pub next_id: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

pub fn record_key(modality: Modality, id: usize) -> String { format!("{}_{}", modality.as_str(), id) }

fn parse_key(modality: Modality, key: &str) -> Option<usize> {
    key.strip_prefix(modality.as_str())?.strip_prefix('_')?.parse().ok()
}

impl Sidecar {
    pub fn new(collection: &str, modality: Modality, next_id: usize, records: &BTreeMap<usize, ChunkRecord>) -> Result<Self> {
        let mut metadata = BTreeMap::new();
        for (id, record) in records { metadata.insert(record_key(modality, *id), serde_json::to_value(record)?); }
        Ok(Self { collection: collection.to_string(), next_id, metadata })
    }

    /// Decode the table one entry at a time; malformed entries are logged and skipped.
    pub fn records(self, modality: Modality) -> BTreeMap<usize, ChunkRecord> {
        let mut out = BTreeMap::new();
        for (key, value) in self.metadata {
            let Some(id) = parse_key(modality, &key) else {
                warn!("Collection '{}': ignoring metadata key '{}'", self.collection, key);
                continue;
            };
            match serde_json::from_value::<ChunkRecord>(value) {
                Ok(record) => { out.insert(id, record); }
                Err(e) => warn!("Collection '{}': skipping malformed record '{}': {}", self.collection, key, e),
            }
        }
        out
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::corrupt(path, e.to_string()))
    }

    pub fn write_to(&self, path: &Path) -> Result<()> { write_atomic(path, &serde_json::to_vec_pretty(self)?) }
}

/// Write `bytes` next to `path` and rename into place, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
}

/// Fail unless `path` could be created: its nearest existing ancestor must be a directory.
pub fn ensure_creatable(path: &Path) -> Result<()> {
    let mut ancestor = path.parent();
    while let Some(dir) = ancestor.filter(|p| !p.as_os_str().is_empty()) {
        match fs::metadata(dir) {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => return Err(Error::InvalidConfig(format!("{} is not a directory, cannot store {}", dir.display(), path.display()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => ancestor = dir.parent(),
            Err(e) => return Err(Error::io(dir, e)),
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

/// Size and mtime of both artifacts as last seen by a load or save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactStamp {
    index: Option<FileStamp>,
    sidecar: Option<FileStamp>,
}

/// Only a missing file counts as absent; any other stat failure is an error.
fn stamp_file(path: &Path) -> Result<Option<FileStamp>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(FileStamp { len: meta.len(), modified: meta.modified().ok() })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

impl ArtifactStamp {
    pub fn of(index_path: &Path, sidecar_path: &Path) -> Result<Self> {
        Ok(Self { index: stamp_file(index_path)?, sidecar: stamp_file(sidecar_path)? })
    }

    pub fn index_exists(&self) -> bool { self.index.is_some() }
    pub fn sidecar_exists(&self) -> bool { self.sidecar.is_some() }
}
