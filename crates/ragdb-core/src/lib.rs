pub mod config;
pub mod error;
pub mod ingest;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Chunk, ChunkId, ChunkRecord, Meta, Metric, Modality, Payload, QueryResult, ScoreOrder};
