//! Domain types shared by the store, the retriever and the generators.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Metadata key used by the keyword boost.
pub const SECTION_KEY: &str = "section";

/// Input type of a stored item. Each modality owns its own vector space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub const ALL: [Modality; 2] = [Modality::Text, Modality::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Modality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            other => Err(Error::InvalidConfig(format!("unknown modality '{other}'"))),
        }
    }
}

/// The content carried by a chunk. The variant fixes the chunk's modality,
/// so a text chunk can never carry an image path and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Text(String),
    Image(String),
}

/// A fragment of a source document, independently embedded and stored.
///
/// - `id`: stable identifier assigned at ingestion
/// - `source`: originating file path or origin string
/// - `payload`: text body or image path
/// - `metadata`: free-form string fields (`section`, `file_type`, ...)
/// - `embedding`: filled by the embedding stage, absent before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source: String,
    pub payload: Payload,
    #[serde(default)]
    pub metadata: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn text(id: impl Into<String>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), source: source.into(), payload: Payload::Text(text.into()), metadata: Meta::new(), embedding: None }
    }

    pub fn image(id: impl Into<String>, source: impl Into<String>, image_path: impl Into<String>) -> Self {
        Self { id: id.into(), source: source.into(), payload: Payload::Image(image_path.into()), metadata: Meta::new(), embedding: None }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn modality(&self) -> Modality {
        match self.payload {
            Payload::Text(_) => Modality::Text,
            Payload::Image(_) => Modality::Image,
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(t) => Some(t),
            Payload::Image(_) => None,
        }
    }

    pub fn image_path(&self) -> Option<&str> {
        match &self.payload {
            Payload::Image(p) => Some(p),
            Payload::Text(_) => None,
        }
    }

    pub fn section(&self) -> Option<&str> { self.metadata.get(SECTION_KEY).map(String::as_str) }
}

/// Flat, untyped snapshot of a chunk as written to a collection sidecar.
///
/// `index_type` is the discriminator used to rebuild the typed [`Chunk`].
/// Vectors are not part of the record; they live in the index file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub index_type: String,
    pub id: String,
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default)]
    pub metadata: Meta,
}

impl From<&Chunk> for ChunkRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            index_type: chunk.modality().as_str().to_string(),
            id: chunk.id.clone(),
            source_file: chunk.source.clone(),
            text_content: chunk.text_content().map(str::to_string),
            image_path: chunk.image_path().map(str::to_string),
            metadata: chunk.metadata.clone(),
        }
    }
}

impl TryFrom<ChunkRecord> for Chunk {
    type Error = Error;

    fn try_from(record: ChunkRecord) -> Result<Self, Self::Error> {
        let payload = match record.index_type.parse::<Modality>() {
            Ok(Modality::Text) => Payload::Text(
                record.text_content.ok_or_else(|| Error::Operation(format!("text record '{}' has no text_content", record.id)))?,
            ),
            Ok(Modality::Image) => Payload::Image(
                record.image_path.ok_or_else(|| Error::Operation(format!("image record '{}' has no image_path", record.id)))?,
            ),
            Err(_) => return Err(Error::Operation(format!("record '{}' has unknown index_type '{}'", record.id, record.index_type))),
        };
        Ok(Chunk { id: record.id, source: record.source_file, payload, metadata: record.metadata, embedding: None })
    }
}

/// How a score must be read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    /// Similarities and relevance scores.
    HigherIsBetter,
    /// Distances.
    LowerIsBetter,
}

impl ScoreOrder {
    /// Ordering that puts the better of `a` and `b` first.
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        match self {
            ScoreOrder::HigherIsBetter => b.total_cmp(&a),
            ScoreOrder::LowerIsBetter => a.total_cmp(&b),
        }
    }

    /// Move `score` toward "better" by `amount`.
    pub fn improve(&self, score: f32, amount: f32) -> f32 {
        match self {
            ScoreOrder::HigherIsBetter => score + amount,
            ScoreOrder::LowerIsBetter => score - amount,
        }
    }
}

/// Similarity function of a collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared Euclidean distance; smaller is closer.
    L2,
    /// Inner product over L2-normalized vectors (cosine); larger is closer.
    InnerProduct,
}

impl Metric {
    pub fn score_order(&self) -> ScoreOrder {
        match self {
            Metric::L2 => ScoreOrder::LowerIsBetter,
            Metric::InnerProduct => ScoreOrder::HigherIsBetter,
        }
    }
}

/// A chunk paired with the score that ranked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunk: Chunk,
    pub score: f32,
    pub order: ScoreOrder,
}

/// Stable sort, best first, according to each list's own score order.
pub fn sort_results(results: &mut [QueryResult], order: ScoreOrder) {
    results.sort_by(|a, b| order.compare(a.score, b.score));
}
