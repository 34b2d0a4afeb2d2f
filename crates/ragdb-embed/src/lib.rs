//! Embedding providers and the factory that picks one per modality.
//!
//! Respects `APP_USE_FAKE_EMBEDDINGS=1` (or `embedding.use_fake`) to switch to
//! the [`HashEmbedder`] for fast and deterministic outputs in tests and development.

pub mod hash;
pub mod model;
pub mod pool;
pub mod tokenize;

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use ragdb_core::config::{EmbeddingSettings, Settings};
use ragdb_core::traits::EmbeddingProvider;
use ragdb_core::Modality;

pub use hash::HashEmbedder;
pub use model::ModelEmbedder;

pub type SharedEmbedder = Arc<dyn EmbeddingProvider>;

pub fn use_fake_embeddings(settings: &EmbeddingSettings) -> bool {
    settings.use_fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Text embedder for a collection of dimension `dim`.
pub fn text_embedder(settings: &EmbeddingSettings, dim: usize) -> Result<SharedEmbedder> {
    if use_fake_embeddings(settings) {
        info!("Using HashEmbedder for text (d{})", dim);
        return Ok(Arc::new(HashEmbedder::new(dim)?));
    }
    let dir = model::resolve_model_dir(settings.text_model_dir.as_deref())?;
    let embedder = ModelEmbedder::load(&dir, settings.max_len)?;
    if embedder.dim() != dim { bail!("text model produces {} dims but the text collection expects {}", embedder.dim(), dim); }
    Ok(Arc::new(embedder))
}

/// Image embedder. Images and text queries against them share one hashed space.
pub fn image_embedder(dim: usize) -> Result<SharedEmbedder> {
    info!("Using HashEmbedder for images (d{})", dim);
    Ok(Arc::new(HashEmbedder::new(dim)?))
}

/// One embedder per configured collection, keyed by the modality it serves.
pub fn embedders(settings: &Settings) -> Result<BTreeMap<Modality, SharedEmbedder>> {
    let mut out = BTreeMap::new();
    for c in &settings.store.collections {
        let embedder = match c.modality {
            Modality::Text => text_embedder(&settings.embedding, c.dim)?,
            Modality::Image => image_embedder(c.dim)?,
        };
        out.insert(c.modality, embedder);
    }
    Ok(out)
}
