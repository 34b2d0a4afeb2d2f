//! Exact vector search over per-modality collections with file persistence.

pub mod collection;
pub mod flat;
pub mod metric;
pub mod persist;
pub mod store;

pub use collection::{AddOutcome, CollectionConfig, VectorCollection};
pub use flat::FlatIndex;
pub use store::{AddReport, VectorStore};
