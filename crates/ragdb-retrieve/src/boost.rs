//! Keyword-triggered section boost.
//!
//! Each rule maps query keywords (whole words, optional plural "s") to
//! metadata sections. Candidates whose `section` is triggered get their score
//! moved toward "better" by a fixed amount, respecting the list's score order.

use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

use ragdb_core::config::{BoostRule, BoostSettings};
use ragdb_core::error::{Error, Result};
use ragdb_core::types::sort_results;
use ragdb_core::QueryResult;

#[derive(Debug, Clone)]
struct CompiledRule {
    patterns: Vec<Regex>,
    sections: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct KeywordBoost {
    value: f32,
    rules: Vec<CompiledRule>,
}

impl KeywordBoost {
    pub fn new(value: f32, rules: &[BoostRule]) -> Result<Self> {
        if !value.is_finite() { return Err(Error::InvalidConfig("boost value must be finite".into())); }
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let mut patterns = Vec::new();
            for kw in rule.keywords.iter().map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty()) {
                let re = Regex::new(&format!(r"\b{}s?\b", regex::escape(&kw)))
                    .map_err(|e| Error::InvalidConfig(format!("boost keyword '{kw}': {e}")))?;
                patterns.push(re);
            }
            compiled.push(CompiledRule { patterns, sections: rule.sections.clone() });
        }
        Ok(Self { value, rules: compiled })
    }

    /// `None` when boosting is disabled.
    pub fn from_settings(settings: &BoostSettings) -> Result<Option<Self>> {
        if !settings.enabled { return Ok(None); }
        Self::new(settings.value, &settings.rules).map(Some)
    }

    /// Sections triggered by keyword hits in the lowercased query.
    pub fn sections_for(&self, query: &str) -> HashSet<&str> {
        let q = query.to_lowercase();
        self.rules
            .iter()
            .filter(|r| r.patterns.iter().any(|p| p.is_match(&q)))
            .flat_map(|r| r.sections.iter().map(String::as_str))
            .collect()
    }

    /// Boost matching candidates and re-sort best first. Returns how many were boosted.
    pub fn apply(&self, query: &str, results: &mut [QueryResult]) -> usize {
        let sections = self.sections_for(query);
        if sections.is_empty() || results.is_empty() { return 0; }
        let mut boosted = 0;
        for r in results.iter_mut() {
            if r.chunk.section().is_some_and(|s| sections.contains(s)) {
                r.score = r.order.improve(r.score, self.value);
                boosted += 1;
            }
        }
        let order = results[0].order;
        sort_results(results, order);
        debug!("Boosted {} candidates for sections {:?}", boosted, sections);
        boosted
    }
}
