use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use ragdb_core::config::{BoostRule, CollectionSettings, StoreSettings};
use ragdb_core::traits::{EmbedInput, EmbeddingProvider, Reranker};
use ragdb_core::{Chunk, Metric, Modality, ScoreOrder};
use ragdb_retrieve::{KeywordBoost, Retriever, RetrieverOptions, TermOverlapReranker};
use ragdb_vector::VectorStore;

/// Embeds every query to the same vector.
struct FixedEmbedder(Vec<f32>);

impl EmbeddingProvider for FixedEmbedder {
    fn embedder_id(&self) -> &str { "fixed" }
    fn dim(&self) -> usize { self.0.len() }
    fn embed(&self, _input: EmbedInput<'_>) -> anyhow::Result<Vec<f32>> { Ok(self.0.clone()) }
}

struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embedder_id(&self) -> &str { "down" }
    fn dim(&self) -> usize { 3 }
    fn embed(&self, _input: EmbedInput<'_>) -> anyhow::Result<Vec<f32>> { anyhow::bail!("backend unavailable") }
}

struct FailingReranker;

impl Reranker for FailingReranker {
    fn score(&self, _query: &str, _candidates: &[&str]) -> anyhow::Result<Vec<f32>> { anyhow::bail!("model not loaded") }
}

/// Records how many candidates it was shown.
#[derive(Default)]
struct CountingReranker(Mutex<Vec<usize>>);

impl Reranker for CountingReranker {
    fn score(&self, _query: &str, candidates: &[&str]) -> anyhow::Result<Vec<f32>> {
        self.0.lock().unwrap().push(candidates.len());
        Ok(vec![0.5; candidates.len()])
    }
}

fn settings(dir: &Path, metric: Metric, with_images: bool) -> StoreSettings {
    let mut collections = vec![CollectionSettings { name: "text".into(), modality: Modality::Text, dim: 3, metric, max_items: None }];
    if with_images {
        collections.push(CollectionSettings { name: "image".into(), modality: Modality::Image, dim: 3, metric, max_items: None });
    }
    StoreSettings { base_path: dir.join("rag").to_string_lossy().to_string(), lazy_load: false, collections }
}

fn drug_store(dir: &Path, metric: Metric) -> VectorStore {
    let mut store = VectorStore::open(&settings(dir, metric, false)).unwrap();
    store
        .add_documents(&[
            Chunk::text("aspirin:uses", "aspirin.json", "Aspirin - uses: pain relief").with_meta("section", "uses").with_embedding(vec![1.0, 0.0, 0.0]),
            Chunk::text("aspirin:dosage_info", "aspirin.json", "Aspirin - dosage info: 300 mg")
                .with_meta("section", "dosage_info")
                .with_embedding(vec![0.0, 1.0, 0.0]),
        ])
        .unwrap();
    store
}

fn dosage_boost() -> KeywordBoost {
    KeywordBoost::new(0.2, &[BoostRule { keywords: vec!["dosage".into()], sections: vec!["dosage_info".into()] }]).unwrap()
}

#[test]
fn native_inner_product_ranking() {
    let tmp = TempDir::new().unwrap();
    let mut r = Retriever::new(drug_store(tmp.path(), Metric::InnerProduct), RetrieverOptions::default())
        .with_embedder(Modality::Text, Arc::new(FixedEmbedder(vec![0.9, 0.1, 0.0])));
    let out = r.retrieve("What is the dosage?", 5, &[Modality::Text]);
    assert_eq!(out[0].chunk.id, "aspirin:uses");
    assert!(out[0].score > out[1].score);
}

#[test]
fn boost_adds_exactly_the_boost_value() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(FixedEmbedder(vec![0.9, 0.1, 0.0]));
    let mut plain = Retriever::new(drug_store(tmp.path(), Metric::InnerProduct), RetrieverOptions::default()).with_embedder(Modality::Text, embedder.clone());
    let before = plain.retrieve("What is the dosage?", 5, &[Modality::Text]);

    let mut boosted = Retriever::new(VectorStore::open(&settings(tmp.path(), Metric::InnerProduct, false)).unwrap(), RetrieverOptions::default())
        .with_embedder(Modality::Text, embedder)
        .with_boost(dosage_boost());
    let after = boosted.retrieve("What is the dosage?", 5, &[Modality::Text]);

    let score_of = |rs: &[ragdb_core::QueryResult], id: &str| rs.iter().find(|r| r.chunk.id == id).map(|r| r.score).unwrap();
    let delta = score_of(&after, "aspirin:dosage_info") - score_of(&before, "aspirin:dosage_info");
    assert!((delta - 0.2).abs() < 1e-5);
    assert_eq!(after[0].chunk.id, "aspirin:uses", "0.2 is not enough to overtake here");
}

#[test]
fn boost_can_reorder_close_candidates() {
    let tmp = TempDir::new().unwrap();
    let mut r = Retriever::new(drug_store(tmp.path(), Metric::InnerProduct), RetrieverOptions::default())
        .with_embedder(Modality::Text, Arc::new(FixedEmbedder(vec![0.6, 0.55, 0.0])))
        .with_boost(dosage_boost());
    let out = r.retrieve("What is the dosage?", 5, &[Modality::Text]);
    assert_eq!(out[0].chunk.id, "aspirin:dosage_info");
    assert_eq!(out[0].order, ScoreOrder::HigherIsBetter);
}

#[test]
fn boost_on_l2_distances_moves_matches_forward() {
    let tmp = TempDir::new().unwrap();
    // squared distances from the query: uses 0.04, dose 0.09
    let mut store = VectorStore::open(&settings(tmp.path(), Metric::L2, false)).unwrap();
    store
        .add_documents(&[
            Chunk::text("uses", "a", "uses").with_meta("section", "uses").with_embedding(vec![0.0, 0.0, 0.0]),
            Chunk::text("dose", "a", "dose").with_meta("section", "dosage_info").with_embedding(vec![0.0, 0.0, 0.5]),
        ])
        .unwrap();
    let mut r = Retriever::new(store, RetrieverOptions::default())
        .with_embedder(Modality::Text, Arc::new(FixedEmbedder(vec![0.0, 0.0, 0.2])))
        .with_boost(dosage_boost());
    let out = r.retrieve("dosage please", 5, &[Modality::Text]);
    assert_eq!(out[0].chunk.id, "dose");
    assert_eq!(out[0].order, ScoreOrder::LowerIsBetter);
    assert!(out[0].score < out[1].score);
}

#[test]
fn reranker_over_fetches_and_truncates() {
    let tmp = TempDir::new().unwrap();
    let mut store = VectorStore::open(&settings(tmp.path(), Metric::L2, false)).unwrap();
    let chunks: Vec<Chunk> = (0..10).map(|i| Chunk::text(format!("c{i}"), "a", format!("text {i}")).with_embedding(vec![i as f32, 0.0, 0.0])).collect();
    store.add_documents(&chunks).unwrap();

    let counter = Arc::new(CountingReranker::default());
    struct Shared(Arc<CountingReranker>);
    impl Reranker for Shared {
        fn score(&self, q: &str, c: &[&str]) -> anyhow::Result<Vec<f32>> { self.0.score(q, c) }
    }

    let mut r = Retriever::new(store, RetrieverOptions { top_k: 2, fetch_factor: 3 })
        .with_embedder(Modality::Text, Arc::new(FixedEmbedder(vec![0.0, 0.0, 0.0])))
        .with_reranker(Box::new(Shared(counter.clone())));
    let out = r.retrieve("anything", 2, &[Modality::Text]);
    assert_eq!(out.len(), 2);
    assert_eq!(*counter.0.lock().unwrap(), vec![6]);
    assert!(out.iter().all(|h| h.order == ScoreOrder::HigherIsBetter));
}

#[test]
fn term_overlap_reranker_promotes_lexical_matches() {
    let tmp = TempDir::new().unwrap();
    let mut r = Retriever::new(drug_store(tmp.path(), Metric::InnerProduct), RetrieverOptions::default())
        .with_embedder(Modality::Text, Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])))
        .with_reranker(Box::new(TermOverlapReranker));
    let out = r.retrieve("aspirin 300 mg", 5, &[Modality::Text]);
    assert_eq!(out[0].chunk.id, "aspirin:dosage_info");
}

#[test]
fn failing_reranker_keeps_native_order() {
    let tmp = TempDir::new().unwrap();
    let mut r = Retriever::new(drug_store(tmp.path(), Metric::InnerProduct), RetrieverOptions::default())
        .with_embedder(Modality::Text, Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])))
        .with_reranker(Box::new(FailingReranker));
    let out = r.retrieve("anything", 5, &[Modality::Text]);
    assert_eq!(out[0].chunk.id, "aspirin:uses");
    assert_eq!(out[0].order, ScoreOrder::HigherIsBetter);
}

#[test]
fn a_failing_modality_contributes_nothing() {
    let tmp = TempDir::new().unwrap();
    let mut store = VectorStore::open(&settings(tmp.path(), Metric::InnerProduct, true)).unwrap();
    store.add_documents(&[Chunk::text("t", "a", "alpha").with_embedding(vec![1.0, 0.0, 0.0])]).unwrap();
    let mut r = Retriever::new(store, RetrieverOptions::default())
        .with_embedder(Modality::Text, Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])))
        .with_embedder(Modality::Image, Arc::new(FailingEmbedder));
    let out = r.retrieve_default("alpha");
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].chunk.id, "t");
}

#[test]
fn modalities_are_concatenated_in_request_order() {
    let tmp = TempDir::new().unwrap();
    let mut store = VectorStore::open(&settings(tmp.path(), Metric::InnerProduct, true)).unwrap();
    store
        .add_documents(&[
            Chunk::text("t", "a.txt", "alpha").with_embedding(vec![1.0, 0.0, 0.0]),
            Chunk::image("i", "x.png", "x.png").with_embedding(vec![0.0, 1.0, 0.0]),
        ])
        .unwrap();
    let mut r = Retriever::new(store, RetrieverOptions::default())
        .with_embedder(Modality::Text, Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])))
        .with_embedder(Modality::Image, Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])));
    let out = r.retrieve("alpha", 5, &[Modality::Image, Modality::Text]);
    assert_eq!(out.iter().map(|h| h.chunk.modality()).collect::<Vec<_>>(), vec![Modality::Image, Modality::Text]);
}
