
use tracing::{debug, info};

use super::{EmbeddingModel, OllamaClient};
use crate::config::OllamaConfig;
use crate::{AgentError, Result};

const DIMENSION_PROBE: &str = "dimension probe";

/// Produces L2-normalized embeddings of a fixed dimensionality
///
/// The wrapped model is loaded and probed once when the generator is built;
/// later calls reuse it. Share one generator per process (the vector store
/// takes it as an `Arc`).
pub struct EmbeddingGenerator {
    model: Box<dyn EmbeddingModel>,
    dimension: usize,
}

impl std::fmt::Debug for EmbeddingGenerator {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field("model", &self.model.name())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl EmbeddingGenerator {
    /// Load `model` and detect its output dimensionality
    ///
    /// # Errors
    /// * `AgentError::ModelUnavailable` - the model cannot be loaded or probed
    #[inline]
    pub fn new(model: Box<dyn EmbeddingModel>) -> Result<Self> {
        debug!("Loading embedding model {}", model.name());

        model.load().map_err(|e| {
            AgentError::ModelUnavailable(format!("Failed to load {}: {:#}", model.name(), e))
        })?;

        let probe = model.encode(&[DIMENSION_PROBE]).map_err(|e| {
            AgentError::ModelUnavailable(format!("Failed to probe {}: {:#}", model.name(), e))
        })?;

        let dimension = probe.first().map_or(0, Vec::len);
        if dimension == 0 {
            return Err(AgentError::ModelUnavailable(format!(
                "Model {} returned an empty embedding",
                model.name()
            )));
        }

        info!(
            "Embedding model {} ready with {} dimensions",
            model.name(),
            dimension
        );
        Ok(Self { model, dimension })
    }

    /// Build a generator backed by the configured Ollama server
    #[inline]
    pub fn from_config(config: &OllamaConfig) -> Result<Self> {
        let client = OllamaClient::new(config)
            .map_err(|e| AgentError::ModelUnavailable(format!("{:#}", e)))?;
        Self::new(Box::new(client))
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Embed a single text
    #[inline]
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| AgentError::EncodingFailure("Model returned no embedding".to_string()))
    }

    /// Embed texts in one model call
    ///
    /// Output order matches input order one-to-one. The call either returns
    /// a vector for every input or fails as a whole.
    #[inline]
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts with {}",
            texts.len(),
            self.model.name()
        );

        let raw = self
            .model
            .encode(texts)
            .map_err(|e| AgentError::EncodingFailure(format!("{:#}", e)))?;

        if raw.len() != texts.len() {
            return Err(AgentError::EncodingFailure(format!(
                "Model returned {} embeddings for {} inputs",
                raw.len(),
                texts.len()
            )));
        }

        raw.iter()
            .enumerate()
            .map(|(index, vector)| {
                if vector.len() != self.dimension {
                    return Err(AgentError::EncodingFailure(format!(
                        "Embedding {} has {} dimensions, expected {}",
                        index,
                        vector.len(),
                        self.dimension
                    )));
                }
                l2_normalize(vector).ok_or_else(|| {
                    AgentError::EncodingFailure(format!(
                        "Embedding {} cannot be normalized (zero or non-finite)",
                        index
                    ))
                })
            })
            .collect()
    }

    /// Embed texts and hand each vector back alongside the key it belongs to
    #[inline]
    pub fn embed_keyed<'a, K>(&self, items: Vec<(K, &'a str)>) -> Result<Vec<(K, Vec<f32>)>> {
        let (keys, texts): (Vec<K>, Vec<&'a str>) = items.into_iter().unzip();
        let vectors = self.embed_batch(&texts)?;
        Ok(keys.into_iter().zip(vectors).collect())
    }
}

/// Scale `vector` to unit Euclidean length
///
/// Returns `None` for zero-length, zero-norm or non-finite input.
#[inline]
pub fn l2_normalize(vector: &[f32]) -> Option<Vec<f32>> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm < 1e-12 {
        return None;
    }
    Some(vector.iter().map(|x| x / norm).collect())
}
