//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_RETRIEVAL__TOP_K`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::{Metric, Modality};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    /// Wrap an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    /// Typed settings: defaults overlaid with every configured source, then validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(self.figment.clone())
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub retrieval: RetrievalSettings,
    pub boost: BoostSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Prefix of every artifact: `<base>_<name>.index` and `<base>_<name>.meta.json`.
    pub base_path: String,
    /// Defer reading artifacts until a collection is first used.
    pub lazy_load: bool,
    pub collections: Vec<CollectionSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub name: String,
    pub modality: Modality,
    pub dim: usize,
    pub metric: Metric,
    #[serde(default)]
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub use_reranker: bool,
    /// Over-fetch multiplier applied when a reranker is active.
    pub rerank_fetch_factor: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostSettings {
    pub enabled: bool,
    pub value: f32,
    pub rules: Vec<BoostRule>,
}

/// Query keywords that, when present, favour chunks from `sections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostRule {
    pub keywords: Vec<String>,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub use_fake: bool,
    pub text_model_dir: Option<String>,
    pub max_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub ollama_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            base_path: "data/index/rag".to_string(),
            lazy_load: false,
            collections: vec![
                CollectionSettings { name: "text".to_string(), modality: Modality::Text, dim: 1024, metric: Metric::InnerProduct, max_items: None },
                CollectionSettings { name: "image".to_string(), modality: Modality::Image, dim: 512, metric: Metric::InnerProduct, max_items: None },
            ],
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { top_k: 5, use_reranker: true, rerank_fetch_factor: 3 } }
}

impl Default for BoostSettings {
    fn default() -> Self { Self { enabled: false, value: 0.2, rules: Vec::new() } }
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { use_fake: false, text_model_dir: None, max_len: 256 } }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self { ollama_url: "http://localhost:11434".to_string(), model: "mistral".to_string(), temperature: 0.7 }
    }
}

impl StoreSettings {
    pub fn index_path(&self, collection: &str) -> PathBuf { expand_path(format!("{}_{}.index", self.base_path, collection)) }

    pub fn metadata_path(&self, collection: &str) -> PathBuf { expand_path(format!("{}_{}.meta.json", self.base_path, collection)) }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.store.base_path.trim().is_empty() {
            return Err(Error::InvalidConfig("store.base_path is empty".into()));
        }
        let mut names = HashSet::new();
        let mut modalities = HashSet::new();
        for c in &self.store.collections {
            if c.name.trim().is_empty() { return Err(Error::InvalidConfig("collection name is empty".into())); }
            if c.dim == 0 { return Err(Error::InvalidConfig(format!("collection '{}' has dimension 0", c.name))); }
            if !names.insert(c.name.as_str()) { return Err(Error::InvalidConfig(format!("duplicate collection name '{}'", c.name))); }
            if !modalities.insert(c.modality) {
                return Err(Error::InvalidConfig(format!("more than one collection serves modality '{}'", c.modality)));
            }
        }
        if self.retrieval.top_k == 0 { return Err(Error::InvalidConfig("retrieval.top_k must be > 0".into())); }
        if self.retrieval.rerank_fetch_factor == 0 { return Err(Error::InvalidConfig("retrieval.rerank_fetch_factor must be > 0".into())); }
        for (i, rule) in self.boost.rules.iter().enumerate() {
            if rule.keywords.iter().all(|k| k.trim().is_empty()) || rule.sections.is_empty() {
                return Err(Error::InvalidConfig(format!("boost rule #{i} needs at least one keyword and one section")));
            }
        }
        if !self.boost.value.is_finite() { return Err(Error::InvalidConfig("boost.value must be finite".into())); }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
