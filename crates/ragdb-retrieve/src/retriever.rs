use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use ragdb_core::config::RetrievalSettings;
use ragdb_core::traits::{EmbeddingProvider, Reranker};
use ragdb_core::types::sort_results;
use ragdb_core::{Modality, QueryResult};
use ragdb_vector::VectorStore;

use crate::boost::KeywordBoost;
use crate::rerank::rerank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrieverOptions {
    pub top_k: usize,
    /// Over-fetch multiplier used while a reranker is attached.
    pub fetch_factor: usize,
}

impl Default for RetrieverOptions {
    fn default() -> Self { Self { top_k: 5, fetch_factor: 3 } }
}

impl From<&RetrievalSettings> for RetrieverOptions {
    fn from(s: &RetrievalSettings) -> Self { Self { top_k: s.top_k, fetch_factor: s.rerank_fetch_factor } }
}

/// Query-time pipeline over a [`VectorStore`]: embed the query per modality,
/// search, optionally rerank text and boost sections, then concatenate.
pub struct Retriever {
    store: VectorStore,
    embedders: BTreeMap<Modality, Arc<dyn EmbeddingProvider>>,
    reranker: Option<Box<dyn Reranker>>,
    boost: Option<KeywordBoost>,
    options: RetrieverOptions,
}

impl Retriever {
    pub fn new(store: VectorStore, options: RetrieverOptions) -> Self {
        Self { store, embedders: BTreeMap::new(), reranker: None, boost: None, options }
    }

    /// Provider used to embed queries searched against `modality`.
    pub fn with_embedder(mut self, modality: Modality, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedders.insert(modality, embedder);
        self
    }

    pub fn with_reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_boost(mut self, boost: KeywordBoost) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn options(&self) -> RetrieverOptions { self.options }
    pub fn store(&self) -> &VectorStore { &self.store }
    pub fn store_mut(&mut self) -> &mut VectorStore { &mut self.store }

    /// Every modality the store serves, with the configured `top_k`.
    pub fn retrieve_default(&mut self, query: &str) -> Vec<QueryResult> {
        let modalities = self.store.modalities();
        self.retrieve(query, self.options.top_k, &modalities)
    }

    /// Ranked results for `query`, at most `top_k` per modality, concatenated
    /// in the order of `modalities`. A modality that fails contributes nothing.
    pub fn retrieve(&mut self, query: &str, top_k: usize, modalities: &[Modality]) -> Vec<QueryResult> {
        let mut all = Vec::new();
        for &modality in modalities {
            match self.retrieve_modality(query, top_k, modality) {
                Ok(results) => {
                    debug!("{} {} results", results.len(), modality);
                    all.extend(results);
                }
                Err(e) => error!("Retrieval failed for {}: {:#}", modality, e),
            }
        }
        info!("Retrieved {} results for query", all.len());
        all
    }

    fn retrieve_modality(&mut self, query: &str, top_k: usize, modality: Modality) -> Result<Vec<QueryResult>> {
        let embedder = self.embedders.get(&modality).ok_or_else(|| anyhow!("no embedder for {modality}"))?;
        let query_vec = embedder.embed_text(query)?;
        let fetch_k = if self.reranker.is_some() { top_k.saturating_mul(self.options.fetch_factor) } else { top_k };
        let mut results = self.store.search(modality, &query_vec, fetch_k)?;

        match (&self.reranker, modality) {
            (Some(reranker), Modality::Text) => {
                let native = results.clone();
                results = match rerank(reranker.as_ref(), query, results) {
                    Ok(reranked) => reranked,
                    Err(e) => {
                        warn!("Reranker failed, keeping index order: {:#}", e);
                        native
                    }
                };
            }
            _ => {
                if let Some(first) = results.first() {
                    let order = first.order;
                    sort_results(&mut results, order);
                }
            }
        }

        if let Some(boost) = &self.boost { boost.apply(query, &mut results); }
        results.truncate(top_k);
        Ok(results)
    }
}
