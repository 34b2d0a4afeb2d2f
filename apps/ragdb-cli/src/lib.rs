//! Wiring shared by the `ragdb` subcommands: embedding ingested chunks,
//! assembling a retriever from settings and rendering results.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use ragdb_core::config::Settings;
use ragdb_core::ingest::DocumentLoader;
use ragdb_core::traits::EmbedInput;
use ragdb_core::{Chunk, Modality, Payload, QueryResult};
use ragdb_embed::SharedEmbedder;
use ragdb_retrieve::{KeywordBoost, Retriever, RetrieverOptions, TermOverlapReranker};
use ragdb_vector::{AddReport, VectorStore};

/// Fill each chunk's embedding with its modality's provider. Chunks that fail
/// to embed keep no embedding and are skipped by the store.
pub fn embed_chunks(chunks: &mut [Chunk], embedders: &BTreeMap<Modality, SharedEmbedder>, progress: bool) -> usize {
    let pb = if progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}") { pb.set_style(style); }
    pb.set_message("embedding");
    let mut failed = 0;
    for chunk in chunks.iter_mut() {
        pb.inc(1);
        let Some(embedder) = embedders.get(&chunk.modality()) else { continue };
        let input = match &chunk.payload {
            Payload::Text(t) => EmbedInput::Text(t),
            Payload::Image(p) => EmbedInput::ImageFile(Path::new(p)),
        };
        match embedder.embed(input) {
            Ok(v) => chunk.embedding = Some(v),
            Err(e) => {
                warn!("Failed to embed {}: {:#}", chunk.id, e);
                failed += 1;
            }
        }
    }
    pb.finish_and_clear();
    failed
}

/// Load `data_dir`, embed every chunk and append it to the configured store.
pub fn ingest(settings: &Settings, data_dir: &Path, limit: Option<usize>, progress: bool) -> Result<AddReport> {
    let loader = DocumentLoader::default();
    let mut chunks = loader.load_directory_limited(data_dir, limit.unwrap_or(usize::MAX))?;
    info!("Loaded {} chunks from {}", chunks.len(), data_dir.display());
    let embedders = ragdb_embed::embedders(settings)?;
    let failed = embed_chunks(&mut chunks, &embedders, progress);
    if failed > 0 { warn!("{} chunks could not be embedded", failed); }
    let mut store = VectorStore::open(&settings.store)?;
    Ok(store.add_documents(&chunks)?)
}

/// Store, embedders, reranker and boost policy as configured.
pub fn build_retriever(settings: &Settings) -> Result<Retriever> {
    let store = VectorStore::open(&settings.store)?;
    let mut retriever = Retriever::new(store, RetrieverOptions::from(&settings.retrieval));
    for (modality, embedder) in ragdb_embed::embedders(settings)? { retriever = retriever.with_embedder(modality, embedder); }
    if settings.retrieval.use_reranker { retriever = retriever.with_reranker(Box::new(TermOverlapReranker)); }
    if let Some(boost) = KeywordBoost::from_settings(&settings.boost)? { retriever = retriever.with_boost(boost); }
    Ok(retriever)
}

fn file_name(path: &str) -> String {
    PathBuf::from(path).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| path.to_string())
}

/// One line per result: rank, modality, source file, section and score.
pub fn format_results(results: &[QueryResult]) -> String {
    let mut out = format!("{:<4} {:<6} {:<32} {:<22} {:>9}\n", "#", "type", "source", "section", "score");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!(
            "{:<4} {:<6} {:<32} {:<22} {:>9.4}\n",
            i + 1,
            r.chunk.modality().as_str(),
            file_name(&r.chunk.source),
            r.chunk.section().unwrap_or("-"),
            r.score
        ));
    }
    out
}
