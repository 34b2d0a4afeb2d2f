//! Deterministic feature-hashing embedder.
//!
//! Needs no model files, so tests and offline development can run the full
//! pipeline. Text is hashed per lowercase word. Image files are hashed from
//! their file-name words plus fixed-size byte blocks, which puts a text query
//! naming an image close to that image in the same space.

use anyhow::{anyhow, bail, Context, Result};
use std::hash::{Hash, Hasher};
use std::path::Path;
use twox_hash::XxHash64;

use ragdb_core::traits::{EmbedInput, EmbeddingProvider};

const BYTE_BLOCK: usize = 64;
/// Image content counts for less than the name so cross-modal queries still land.
const BYTE_WEIGHT: f32 = 0.25;

pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 { bail!("hash embedder dimension must be > 0"); }
        Ok(Self { dim, id: format!("hash:d{dim}") })
    }

    fn add_token<T: Hash + ?Sized>(&self, v: &mut [f32], token: &T, position: usize, weight: f32) {
        let mut hasher = XxHash64::with_seed(0);
        token.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h as usize) % self.dim;
        let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        v[idx] += weight * (val + (position as f32 % 3.0) * 0.01);
    }

    fn add_words(&self, v: &mut [f32], text: &str) -> usize {
        let mut n = 0;
        for (i, word) in words(text).enumerate() {
            self.add_token(v, word.as_str(), i, 1.0);
            n += 1;
        }
        n
    }

    fn embed_image(&self, path: &Path) -> Result<Vec<f32>> {
        let bytes = std::fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
        let mut v = vec![0f32; self.dim];
        if let Some(stem) = path.file_stem() { self.add_words(&mut v, &stem.to_string_lossy()); }
        for (i, block) in bytes.chunks(BYTE_BLOCK).enumerate() { self.add_token(&mut v, block, i, BYTE_WEIGHT); }
        if bytes.is_empty() && v.iter().all(|x| *x == 0.0) { bail!("image {} is empty", path.display()); }
        Ok(unit(v))
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(str::to_lowercase)
}

fn unit(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    for x in &mut v { *x /= norm; }
    v
}

impl EmbeddingProvider for HashEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed(&self, input: EmbedInput<'_>) -> Result<Vec<f32>> {
        match input {
            EmbedInput::Text(text) => {
                let mut v = vec![0f32; self.dim];
                if self.add_words(&mut v, text) == 0 { return Err(anyhow!("cannot embed empty text")); }
                Ok(unit(v))
            }
            EmbedInput::ImageFile(path) => self.embed_image(path),
        }
    }
}
