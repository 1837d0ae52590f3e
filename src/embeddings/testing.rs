// Deterministic embedding model for unit tests

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};

use super::EmbeddingModel;

/// Bag-of-words hashing model with optional pinned vectors
///
/// Words are lowercased and stripped of punctuation, so `hello 'world'` and
/// `hello world` embed identically.
pub(crate) struct FixtureModel {
    dimension: usize,
    pinned: HashMap<String, Vec<f32>>,
    fail_on: Option<String>,
    unavailable: bool,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl FixtureModel {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            pinned: HashMap::new(),
            fail_on: None,
            unavailable: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn pin(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.pinned.insert(text.to_string(), vector);
        self
    }

    pub(crate) fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Batch sizes of every `encode` call, shared with the model
    pub(crate) fn call_log(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.calls)
    }

    fn hash_embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        let words = text
            .split_whitespace()
            .map(|word| {
                word.chars()
                    .filter(|c| c.is_alphanumeric())
                    .flat_map(char::to_lowercase)
                    .collect::<String>()
            })
            .filter(|word| !word.is_empty());

        for word in words {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        vector
    }
}

impl EmbeddingModel for FixtureModel {
    fn name(&self) -> &str {
        "fixture"
    }

    fn load(&self) -> anyhow::Result<()> {
        if self.unavailable {
            anyhow::bail!("fixture model is unavailable");
        }
        Ok(())
    }

    fn encode(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls
            .lock()
            .expect("call log should not be poisoned")
            .push(texts.len());

        if let Some(fail_on) = &self.fail_on {
            if texts.iter().any(|t| *t == fail_on.as_str()) {
                anyhow::bail!("cannot tokenize {:?}", fail_on);
            }
        }

        Ok(texts
            .iter()
            .map(|text| {
                self.pinned
                    .get(*text)
                    .cloned()
                    .unwrap_or_else(|| self.hash_embed(text))
            })
            .collect())
    }
}
