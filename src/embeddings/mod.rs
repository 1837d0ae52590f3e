// Embeddings module
// Text to unit-length vectors, backed by a pluggable embedding model

pub mod generator;
pub mod ollama;

#[cfg(test)]
pub(crate) mod testing;

pub use generator::{EmbeddingGenerator, l2_normalize};
pub use ollama::OllamaClient;

/// A raw text embedding backend
///
/// Implementations return vectors as produced by the model; normalization is
/// applied by [`EmbeddingGenerator`].
pub trait EmbeddingModel: Send + Sync {
    /// Model identifier used in logs
    fn name(&self) -> &str;

    /// Make sure the model can serve requests. Called once at construction.
    fn load(&self) -> anyhow::Result<()>;

    /// Embed every text, returning one vector per input in input order
    fn encode(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>>;
}
