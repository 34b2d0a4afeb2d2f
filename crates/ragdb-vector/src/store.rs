//! Named collections routed by modality.

use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use ragdb_core::config::StoreSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::{Chunk, ChunkRecord, Modality, QueryResult};

use crate::collection::{CollectionConfig, VectorCollection};

/// Per-call summary of [`VectorStore::add_documents`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub added: BTreeMap<Modality, usize>,
    pub dropped_capacity: usize,
    pub skipped_no_embedding: usize,
    pub skipped_no_collection: usize,
    pub skipped_bad_dimension: usize,
}

impl AddReport {
    pub fn total_added(&self) -> usize { self.added.values().sum() }
}

/// Fixed set of collections, at most one per modality.
#[derive(Debug)]
pub struct VectorStore {
    collections: Vec<VectorCollection>,
}

impl VectorStore {
    /// Build every configured collection, restoring persisted state unless
    /// `lazy_load` is set.
    pub fn open(settings: &StoreSettings) -> Result<Self> {
        let collections = settings
            .collections
            .iter()
            .map(|c| VectorCollection::open(CollectionConfig::from_settings(settings, c), settings.lazy_load))
            .collect::<Result<Vec<_>>>()?;
        Self::from_collections(collections)
    }

    pub fn from_collections(collections: Vec<VectorCollection>) -> Result<Self> {
        for (i, c) in collections.iter().enumerate() {
            for other in &collections[..i] {
                if other.name() == c.name() { return Err(Error::InvalidConfig(format!("duplicate collection name '{}'", c.name()))); }
                if other.modality() == c.modality() {
                    return Err(Error::InvalidConfig(format!("collections '{}' and '{}' both serve {}", other.name(), c.name(), c.modality())));
                }
            }
        }
        Ok(Self { collections })
    }

    pub fn collection(&self, name: &str) -> Option<&VectorCollection> { self.collections.iter().find(|c| c.name() == name) }

    pub fn collection_for(&self, modality: Modality) -> Option<&VectorCollection> { self.collections.iter().find(|c| c.modality() == modality) }

    pub fn collection_for_mut(&mut self, modality: Modality) -> Option<&mut VectorCollection> {
        self.collections.iter_mut().find(|c| c.modality() == modality)
    }

    pub fn modalities(&self) -> Vec<Modality> { self.collections.iter().map(VectorCollection::modality).collect() }

    /// Partition `chunks` by modality, append each partition to its
    /// collection and persist every collection that received items.
    ///
    /// Chunks without an embedding, without a collection for their modality or
    /// with a wrongly sized embedding are skipped and counted. Only a failing
    /// save is returned as an error.
    pub fn add_documents(&mut self, chunks: &[Chunk]) -> Result<AddReport> {
        let mut report = AddReport::default();
        let mut partitions: BTreeMap<Modality, Vec<(Vec<f32>, ChunkRecord)>> = BTreeMap::new();
        for chunk in chunks {
            let Some(embedding) = &chunk.embedding else {
                debug!("Skipping chunk '{}': no embedding", chunk.id);
                report.skipped_no_embedding += 1;
                continue;
            };
            let Some(collection) = self.collection_for(chunk.modality()) else {
                debug!("Skipping chunk '{}': no {} collection", chunk.id, chunk.modality());
                report.skipped_no_collection += 1;
                continue;
            };
            if embedding.len() != collection.dim() {
                debug!("Skipping chunk '{}': embedding has {} dims, collection '{}' expects {}", chunk.id, embedding.len(), collection.name(), collection.dim());
                report.skipped_bad_dimension += 1;
                continue;
            }
            partitions.entry(chunk.modality()).or_default().push((embedding.clone(), ChunkRecord::from(chunk)));
        }
        if report.skipped_no_embedding > 0 { warn!("Skipped {} chunks without an embedding", report.skipped_no_embedding); }
        if report.skipped_no_collection > 0 { warn!("Skipped {} chunks with no matching collection", report.skipped_no_collection); }
        if report.skipped_bad_dimension > 0 { warn!("Skipped {} chunks with a mismatched embedding dimension", report.skipped_bad_dimension); }

        for (modality, items) in partitions {
            let Some(collection) = self.collection_for_mut(modality) else { continue };
            let outcome = collection.add(items)?;
            collection.save()?;
            info!("Added {} {} chunks to '{}' (total {})", outcome.ids.len(), modality, collection.name(), collection.len());
            report.dropped_capacity += outcome.dropped;
            report.added.insert(modality, outcome.ids.len());
        }
        Ok(report)
    }

    /// Search the collection serving `modality`; an absent collection yields no results.
    pub fn search(&mut self, modality: Modality, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        match self.collection_for_mut(modality) {
            Some(collection) => collection.search(query, top_k),
            None => {
                debug!("No {} collection configured; returning no results", modality);
                Ok(Vec::new())
            }
        }
    }

    pub fn search_text(&mut self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>> { self.search(Modality::Text, query, top_k) }

    pub fn search_image(&mut self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>> { self.search(Modality::Image, query, top_k) }

    pub fn save(&mut self) -> Result<()> {
        for c in &mut self.collections { c.save()?; }
        Ok(())
    }

    /// Reload every collection from disk; unchanged collections are left as they are.
    pub fn load(&mut self) -> Result<()> {
        for c in &mut self.collections { c.load()?; }
        Ok(())
    }
}
