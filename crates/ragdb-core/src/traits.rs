use std::path::Path;

use crate::types::QueryResult;

/// What an embedding provider is asked to encode.
#[derive(Debug, Clone, Copy)]
pub enum EmbedInput<'a> {
    Text(&'a str),
    ImageFile(&'a Path),
}

pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hash:d512`).
    fn embedder_id(&self) -> &str;
    /// Dimensionality of every vector this provider returns.
    fn dim(&self) -> usize;
    fn embed(&self, input: EmbedInput<'_>) -> anyhow::Result<Vec<f32>>;

    fn embed_text(&self, text: &str) -> anyhow::Result<Vec<f32>> { self.embed(EmbedInput::Text(text)) }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

/// Relevance model scoring `(query, candidate_text)` pairs; higher is more relevant.
pub trait Reranker: Send + Sync {
    fn score(&self, query: &str, candidates: &[&str]) -> anyhow::Result<Vec<f32>>;
}

/// Answer generator consuming ranked context.
///
/// The returned iterator is pull-driven: dropping it abandons the generation.
/// Backend failures surface as a final error-text fragment, never a panic.
pub trait GenerationClient {
    fn generate_stream<'a>(&'a self, query: &str, results: &[QueryResult]) -> Box<dyn Iterator<Item = String> + 'a>;

    fn generate(&self, query: &str, results: &[QueryResult]) -> String { self.generate_stream(query, results).collect() }
}
