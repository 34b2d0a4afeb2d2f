//! One modality's vector space: a [`FlatIndex`] plus the metadata table that
//! maps each row back to its chunk, persisted as an index file and a JSON sidecar.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use ragdb_core::config::{CollectionSettings, StoreSettings};
use ragdb_core::error::{Error, Result};
use ragdb_core::{Chunk, ChunkRecord, Metric, Modality, QueryResult};

use crate::flat::FlatIndex;
use crate::metric;
use crate::persist::{ensure_creatable, write_atomic, ArtifactStamp, Sidecar};

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionConfig {
    pub name: String,
    pub modality: Modality,
    pub dim: usize,
    pub metric: Metric,
    /// Items beyond this count are dropped on add.
    pub max_items: Option<usize>,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl CollectionConfig {
    pub fn from_settings(store: &StoreSettings, c: &CollectionSettings) -> Self {
        Self {
            name: c.name.clone(),
            modality: c.modality,
            dim: c.dim,
            metric: c.metric,
            max_items: c.max_items,
            index_path: store.index_path(&c.name),
            metadata_path: store.metadata_path(&c.name),
        }
    }
}

/// Ids assigned by one `add` call and how many items the capacity cap refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddOutcome {
    pub ids: Vec<usize>,
    pub dropped: usize,
}

#[derive(Debug)]
pub struct VectorCollection {
    config: CollectionConfig,
    index: FlatIndex,
    records: BTreeMap<usize, ChunkRecord>,
    next_id: usize,
    loaded: bool,
    stamp: Option<ArtifactStamp>,
}

impl VectorCollection {
    /// Empty collection bound to `config`; nothing is read from disk. Both
    /// artifact paths must be creatable.
    pub fn new(config: CollectionConfig) -> Result<Self> {
        if config.dim == 0 { return Err(Error::InvalidConfig(format!("collection '{}' has dimension 0", config.name))); }
        ensure_creatable(&config.index_path)?;
        ensure_creatable(&config.metadata_path)?;
        let index = FlatIndex::new(config.dim, config.metric);
        Ok(Self { config, index, records: BTreeMap::new(), next_id: 0, loaded: false, stamp: None })
    }

    /// Construct and restore persisted state, unless `lazy` defers that to first use.
    pub fn open(config: CollectionConfig, lazy: bool) -> Result<Self> {
        let mut collection = Self::new(config)?;
        if !lazy { collection.load()?; }
        Ok(collection)
    }

    pub fn config(&self) -> &CollectionConfig { &self.config }
    pub fn name(&self) -> &str { &self.config.name }
    pub fn modality(&self) -> Modality { self.config.modality }
    pub fn dim(&self) -> usize { self.config.dim }
    pub fn metric(&self) -> Metric { self.config.metric }
    pub fn is_loaded(&self) -> bool { self.loaded }

    /// Number of vectors held in memory.
    pub fn len(&self) -> usize { self.index.len() }
    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    /// Id the next added item will receive.
    pub fn next_id(&self) -> usize { self.next_id }

    pub fn record(&self, id: usize) -> Option<&ChunkRecord> { self.records.get(&id) }

    /// Restore the index, id counter and metadata table from disk. Absent
    /// artifacts mean an empty collection. Returns `false` when both files are
    /// unchanged since the last load or save, in which case nothing is touched.
    pub fn load(&mut self) -> Result<bool> {
        let (index_path, metadata_path) = (&self.config.index_path, &self.config.metadata_path);
        let stamp = ArtifactStamp::of(index_path, metadata_path)?;
        if self.loaded && self.stamp == Some(stamp) {
            debug!("Collection '{}' unchanged on disk; skipping load", self.config.name);
            return Ok(false);
        }

        let index = if stamp.index_exists() {
            let index = FlatIndex::read_from(index_path)?;
            if index.dim() != self.config.dim || index.metric() != self.config.metric {
                return Err(Error::InvalidConfig(format!(
                    "index {} holds dim {} / {:?} but collection '{}' is configured for dim {} / {:?}",
                    index_path.display(),
                    index.dim(),
                    index.metric(),
                    self.config.name,
                    self.config.dim,
                    self.config.metric
                )));
            }
            index
        } else {
            FlatIndex::new(self.config.dim, self.config.metric)
        };

        let (mut records, stored_next_id) = if stamp.sidecar_exists() {
            let sidecar = Sidecar::read_from(metadata_path)?;
            let next_id = sidecar.next_id;
            (sidecar.records(self.config.modality), next_id)
        } else {
            (BTreeMap::new(), 0)
        };

        // Row positions are the ids, so the index length is the counter.
        let len = index.len();
        if stored_next_id != len {
            warn!("Collection '{}': sidecar counter {} disagrees with {} stored vectors; using {}", self.config.name, stored_next_id, len, len);
            records.retain(|id, _| *id < len);
        }
        let missing = len - records.len().min(len);
        if missing > 0 { warn!("Collection '{}': {} vectors have no metadata and will be skipped in results", self.config.name, missing); }

        self.index = index;
        self.records = records;
        self.next_id = len;
        self.loaded = true;
        self.stamp = Some(stamp);
        info!("Loaded collection '{}' ({} vectors)", self.config.name, len);
        Ok(true)
    }

    pub fn ensure_loaded(&mut self) -> Result<()> {
        if !self.loaded { self.load()?; }
        Ok(())
    }

    /// Append `(embedding, record)` pairs in order. Every item is validated
    /// before anything is stored; items past the capacity cap are dropped.
    /// Inner-product collections store unit-length copies.
    pub fn add(&mut self, items: Vec<(Vec<f32>, ChunkRecord)>) -> Result<AddOutcome> {
        self.ensure_loaded()?;
        let modality = self.config.modality.as_str();
        for (embedding, record) in &items {
            if embedding.len() != self.config.dim { return Err(Error::DimensionMismatch { expected: self.config.dim, actual: embedding.len() }); }
            if record.index_type != modality {
                return Err(Error::Operation(format!("record '{}' is {} but collection '{}' holds {}", record.id, record.index_type, self.config.name, modality)));
            }
        }

        let room = self.config.max_items.map_or(usize::MAX, |max| max.saturating_sub(self.index.len()));
        let dropped = items.len().saturating_sub(room);
        if dropped > 0 {
            warn!("Collection '{}' is at capacity ({:?}); dropping {} of {} items", self.config.name, self.config.max_items, dropped, items.len());
        }

        let mut ids = Vec::with_capacity(items.len() - dropped);
        for (mut embedding, record) in items.into_iter().take(room) {
            if self.config.metric == Metric::InnerProduct { metric::normalize(&mut embedding); }
            let id = self.index.push(&embedding)?;
            debug_assert_eq!(id, self.next_id);
            self.records.insert(id, record);
            self.next_id = id + 1;
            ids.push(id);
        }
        Ok(AddOutcome { ids, dropped })
    }

    /// Up to `top_k` chunks in the metric's native order. Rows whose metadata
    /// is missing or unreadable are skipped.
    pub fn search(&mut self, query: &[f32], top_k: usize) -> Result<Vec<QueryResult>> {
        self.ensure_loaded()?;
        if query.len() != self.config.dim { return Err(Error::DimensionMismatch { expected: self.config.dim, actual: query.len() }); }
        if self.index.is_empty() || top_k == 0 { return Ok(Vec::new()); }

        let hits = match self.config.metric {
            Metric::InnerProduct => self.index.search(&metric::normalized(query), top_k)?,
            Metric::L2 => self.index.search(query, top_k)?,
        };
        let order = self.config.metric.score_order();
        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let Some(record) = self.records.get(&id) else {
                warn!("Collection '{}': no metadata for id {}", self.config.name, id);
                continue;
            };
            match Chunk::try_from(record.clone()) {
                Ok(chunk) => results.push(QueryResult { chunk, score, order }),
                Err(e) => warn!("Collection '{}': skipping id {}: {}", self.config.name, id, e),
            }
        }
        Ok(results)
    }

    /// Write both artifacts, creating missing directories.
    pub fn save(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        write_atomic(&self.config.index_path, &self.index.to_bytes())?;
        Sidecar::new(&self.config.name, self.config.modality, self.next_id, &self.records)?.write_to(&self.config.metadata_path)?;
        self.stamp = Some(ArtifactStamp::of(&self.config.index_path, &self.config.metadata_path)?);
        info!("Saved collection '{}' ({} vectors) to {}", self.config.name, self.index.len(), self.config.index_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &std::path::Path, metric: Metric, max_items: Option<usize>) -> CollectionConfig {
        CollectionConfig {
            name: "text".into(),
            modality: Modality::Text,
            dim: 3,
            metric,
            max_items,
            index_path: dir.join("rag_text.index"),
            metadata_path: dir.join("rag_text.meta.json"),
        }
    }

    fn item(id: &str, v: [f32; 3]) -> (Vec<f32>, ChunkRecord) { (v.to_vec(), ChunkRecord::from(&Chunk::text(id, "s.txt", id))) }

    #[test]
    fn zero_dimension_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = config(tmp.path(), Metric::L2, None);
        cfg.dim = 0;
        assert!(matches!(VectorCollection::new(cfg), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn bad_items_leave_the_collection_untouched() {
        let tmp = TempDir::new().unwrap();
        let mut c = VectorCollection::open(config(tmp.path(), Metric::L2, None), false).unwrap();
        let err = c.add(vec![item("a", [1.0, 0.0, 0.0]), (vec![1.0], ChunkRecord::from(&Chunk::text("b", "s", "b")))]);
        assert!(matches!(err, Err(Error::DimensionMismatch { expected: 3, actual: 1 })));
        let wrong_kind = (vec![0.0; 3], ChunkRecord::from(&Chunk::image("i", "x.png", "x.png")));
        assert!(c.add(vec![wrong_kind]).is_err());
        assert!(c.is_empty());
        assert_eq!(c.next_id(), 0);
    }

    #[test]
    fn inner_product_stores_unit_vectors() {
        let tmp = TempDir::new().unwrap();
        let mut c = VectorCollection::open(config(tmp.path(), Metric::InnerProduct, None), false).unwrap();
        c.add(vec![item("a", [3.0, 4.0, 0.0])]).unwrap();
        let hits = c.search(&[6.0, 8.0, 0.0], 1).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn query_with_wrong_dimension_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut c = VectorCollection::open(config(tmp.path(), Metric::L2, None), false).unwrap();
        assert!(c.search(&[1.0, 0.0], 3).is_err());
    }

    #[test]
    fn lazy_collection_loads_on_first_search() {
        let tmp = TempDir::new().unwrap();
        let mut c = VectorCollection::open(config(tmp.path(), Metric::L2, None), false).unwrap();
        c.add(vec![item("a", [1.0, 0.0, 0.0])]).unwrap();
        c.save().unwrap();

        let mut lazy = VectorCollection::open(config(tmp.path(), Metric::L2, None), true).unwrap();
        assert!(!lazy.is_loaded());
        assert_eq!(lazy.search(&[1.0, 0.0, 0.0], 1).unwrap().len(), 1);
        assert!(lazy.is_loaded());
    }

    #[test]
    fn index_with_other_metric_is_a_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let mut c = VectorCollection::open(config(tmp.path(), Metric::L2, None), false).unwrap();
        c.add(vec![item("a", [1.0, 0.0, 0.0])]).unwrap();
        c.save().unwrap();
        let err = VectorCollection::open(config(tmp.path(), Metric::InnerProduct, None), false);
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }
}
