//! Local XLM-RoBERTa text embedder (BGE-M3 weights) on candle.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use ragdb_core::traits::{EmbedInput, EmbeddingProvider};

use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

/// Metal when built with the `metal` feature and a GPU answers, otherwise CPU.
fn embedding_device(model_dir: &Path) -> Device {
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!("Embedding {} on Metal", model_dir.display());
                return dev;
            }
            Err(e) => warn!("Metal unavailable ({}), embedding on CPU", e),
        }
    }
    info!("Embedding {} on CPU", model_dir.display());
    Device::Cpu
}

pub struct ModelEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    id: String,
}

impl ModelEmbedder {
    /// Load `tokenizer.json`, `config.json` and `pytorch_model.bin` from `model_dir`.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        if max_len == 0 { bail!("max_len must be > 0"); }
        info!("Loading embedding model from {}", model_dir.display());
        let device = embedding_device(model_dir);

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("reading {}", weights_path.display()))?
            .into_iter()
            .collect();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let dim = config.hidden_size;
        info!("Embedding model loaded (dim {})", dim);
        Ok(Self { model, tokenizer, device, dim, max_len, id: format!("xlm-roberta:{}:d{}", model_dir.display(), dim) })
    }

    fn embed_str(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() { bail!("cannot embed empty text"); }
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = Tensor::zeros((1, self.max_len), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        if emb.len() != self.dim { bail!("model returned {} dims, expected {}", emb.len(), self.dim); }
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 { warn!("Slow embedding: {:?}", elapsed); } else { debug!("Embedded in {:?}", elapsed); }
        Ok(emb)
    }
}

impl EmbeddingProvider for ModelEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed(&self, input: EmbedInput<'_>) -> Result<Vec<f32>> {
        match input {
            EmbedInput::Text(text) => self.embed_str(text),
            EmbedInput::ImageFile(path) => bail!("text model cannot embed image {}", path.display()),
        }
    }
}

/// First existing directory among the configured one, `APP_MODEL_DIR`,
/// `MODEL_DIR`, `../models/bge-m3` and `models/bge-m3`.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = configured { candidates.push(ragdb_core::config::expand_path(dir)); }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) { candidates.push(PathBuf::from(dir)); }
    }
    candidates.push(PathBuf::from("../models/bge-m3"));
    candidates.push(PathBuf::from("models/bge-m3"));
    for p in candidates {
        if p.exists() { info!("Using model dir: {}", p.display()); return Ok(p); }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory"))
}
