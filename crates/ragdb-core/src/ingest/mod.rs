//! Directory ingestion: turns files into [`Chunk`]s ready for embedding.
//!
//! `.txt`/`.md` are split into overlapping text windows, images become one
//! chunk each, and `.json` drug sheets become one chunk per section.

pub mod drug;
pub mod splitter;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::types::Chunk;

pub use drug::{parse_drug_sheet, DrugInfo};
pub use splitter::TextSplitter;

const TEXT_EXTS: [&str; 2] = ["txt", "md"];
const IMAGE_EXTS: [&str; 3] = ["png", "jpg", "jpeg"];
/// Store sidecars may live next to the data; never ingest them.
const SIDECAR_SUFFIXES: [&str; 2] = ["metadata.json", ".meta.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Text,
    Image,
    DrugSheet,
}

fn classify(path: &Path) -> Option<FileKind> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    if TEXT_EXTS.contains(&ext.as_str()) { return Some(FileKind::Text); }
    if IMAGE_EXTS.contains(&ext.as_str()) { return Some(FileKind::Image); }
    if ext == "json" && !SIDECAR_SUFFIXES.iter().any(|s| name.ends_with(s)) { return Some(FileKind::DrugSheet); }
    None
}

#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    splitter: TextSplitter,
}

impl DocumentLoader {
    pub fn new(splitter: TextSplitter) -> Self { Self { splitter } }

    /// Load every supported file under `data_dir`. A file that fails to load
    /// is logged and skipped; only a missing directory is an error.
    pub fn load_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> { self.load_directory_limited(data_dir, usize::MAX) }

    pub fn load_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Chunk>> {
        if !data_dir.is_dir() { return Err(Error::NotFound(format!("data directory {}", data_dir.display()))); }
        info!("Ingesting directory: {}", data_dir.display());
        let mut files = self.list_files(data_dir);
        if files.len() > limit { files.truncate(limit); info!("Limited to first {} files", limit); }
        let mut all_chunks = Vec::new();
        for (file_index, (path, kind)) in files.iter().enumerate() {
            debug!("Processing file {}/{}: {}", file_index + 1, files.len(), path.display());
            let rel = path.strip_prefix(data_dir).unwrap_or(path);
            match self.load_file(path, rel, *kind) {
                Ok(chunks) => all_chunks.extend(chunks),
                Err(e) => error!("Failed to load {}: {}", path.display(), e),
            }
        }
        info!("Processed {} files into {} chunks", files.len(), all_chunks.len());
        Ok(all_chunks)
    }

    fn load_file(&self, path: &Path, rel: &Path, kind: FileKind) -> Result<Vec<Chunk>> {
        let source = path.to_string_lossy().to_string();
        let doc_id = rel.to_string_lossy().to_string();
        match kind {
            FileKind::Text => {
                let content = read_file_content(path)?;
                let file_type = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
                Ok(self.chunk_text(&content, &doc_id, &source, &file_type))
            }
            FileKind::Image => Ok(vec![self.load_image(path, &doc_id)]),
            FileKind::DrugSheet => {
                let content = read_file_content(path)?;
                let drugs = parse_drug_sheet(&content).map_err(|e| Error::corrupt(path, e.to_string()))?;
                Ok(drugs.iter().enumerate().flat_map(|(i, d)| d.to_chunks(&doc_id, i, &source)).collect())
            }
        }
    }

    /// Split `content` and stamp each window with its position.
    pub fn chunk_text(&self, content: &str, doc_id: &str, source: &str, file_type: &str) -> Vec<Chunk> {
        self.splitter
            .split(content)
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                Chunk::text(format!("{doc_id}:{i}"), source, text)
                    .with_meta("chunk_index", i.to_string())
                    .with_meta("file_type", file_type)
            })
            .collect()
    }

    fn load_image(&self, path: &Path, doc_id: &str) -> Chunk {
        let source = path.to_string_lossy().to_string();
        let file_type = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
        Chunk::image(format!("{doc_id}:0"), source.clone(), source).with_meta("file_type", file_type)
    }

    fn list_files(&self, root: &Path) -> Vec<(PathBuf, FileKind)> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            match classify(entry.path()) {
                Some(kind) => files.push((entry.path().to_path_buf(), kind)),
                None => debug!("Skipping unsupported file type: {}", entry.path().display()),
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path).map_err(|e| Error::io(file_path, e))?).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_extension() {
        assert_eq!(classify(Path::new("a/notes.MD")), Some(FileKind::Text));
        assert_eq!(classify(Path::new("a/scan.jpeg")), Some(FileKind::Image));
        assert_eq!(classify(Path::new("a/ibuprofen.json")), Some(FileKind::DrugSheet));
        assert_eq!(classify(Path::new("a/metadata.json")), None);
        assert_eq!(classify(Path::new("a/rag_text.meta.json")), None);
        assert_eq!(classify(Path::new("a/report.pdf")), None);
        assert_eq!(classify(Path::new("a/README")), None);
    }
}
