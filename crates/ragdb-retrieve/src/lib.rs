//! Multi-modality retrieval: query embedding, flat search, rerank, keyword boost and fusion.

pub mod boost;
pub mod rerank;
pub mod retriever;

pub use boost::KeywordBoost;
pub use rerank::{rerank, TermOverlapReranker};
pub use retriever::{Retriever, RetrieverOptions};
