//! Reranking: replace native index scores with relevance scores.

use anyhow::{ensure, Result};
use std::collections::HashSet;

use ragdb_core::traits::Reranker;
use ragdb_core::types::sort_results;
use ragdb_core::{QueryResult, ScoreOrder};

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on", "that", "the", "to", "was",
    "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there", "then", "than", "so", "if", "when", "where", "why",
    "how", "what", "which", "who", "whom", "whose", "can", "could", "should", "would", "may", "might", "must", "shall", "do", "does", "did",
    "have", "had", "having",
];

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Lexical reranker: share of the query's content words found in the candidate.
#[derive(Debug, Clone, Default)]
pub struct TermOverlapReranker;

impl Reranker for TermOverlapReranker {
    fn score(&self, query: &str, candidates: &[&str]) -> Result<Vec<f32>> {
        let q = terms(query);
        if q.is_empty() { return Ok(vec![0.0; candidates.len()]); }
        Ok(candidates
            .iter()
            .map(|c| {
                let c = terms(c);
                q.iter().filter(|t| c.contains(*t)).count() as f32 / q.len() as f32
            })
            .collect())
    }
}

/// Score every candidate that has text, overwrite its score and sort
/// descending. Candidates without text are dropped.
pub fn rerank(reranker: &dyn Reranker, query: &str, results: Vec<QueryResult>) -> Result<Vec<QueryResult>> {
    let mut kept: Vec<QueryResult> = results.into_iter().filter(|r| r.chunk.text_content().is_some_and(|t| !t.trim().is_empty())).collect();
    let texts: Vec<&str> = kept.iter().filter_map(|r| r.chunk.text_content()).collect();
    let scores = reranker.score(query, &texts)?;
    ensure!(scores.len() == kept.len(), "reranker returned {} scores for {} candidates", scores.len(), kept.len());
    for (r, s) in kept.iter_mut().zip(scores) {
        r.score = s;
        r.order = ScoreOrder::HigherIsBetter;
    }
    sort_results(&mut kept, ScoreOrder::HigherIsBetter);
    Ok(kept)
}
