//! 索引模块

pub mod embedding;
pub mod vector;

pub use embedding::{EmbeddingModel, OllamaEmbeddingModel, SimpleEmbeddingModel, create_embedding_model};
pub use vector::{FlatVectorIndex, VectorIndex};
