//! Services layer for the Kairos pipeline
//!
//! Provides the text-generation and embedding provider boundaries.

pub mod embeddings;
pub mod llm;

pub use embeddings::{
    cosine_similarity, EmbeddingConfig, EmbeddingProvider, RemoteEmbeddingService,
    DEFAULT_EMBEDDING_DIM,
};
pub use llm::{ChatMessage, GenerationParams, LlmConfig, LlmProvider, OpenAiCompatibleClient, Role};
