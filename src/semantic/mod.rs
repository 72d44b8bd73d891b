//! Embedding infrastructure for history entries.
//!
//! - `embeddings`: wraps fastembed behind the `Embedder` trait
//! - `similarity`: cosine similarity over embedding vectors
//! - `service`: lazily loaded, shared model resources

pub mod embeddings;
mod service;
mod similarity;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use service::ModelResources;
pub use similarity::{cosine_similarity, l2_norm};
