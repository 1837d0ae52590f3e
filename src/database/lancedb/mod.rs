// LanceDB vector database module
// Handles record storage and exact cosine similarity search

#[cfg(test)]
mod tests;

pub mod vector_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use vector_store::VectorStore;

/// Table holding every ingested record
pub const TABLE_NAME: &str = "chat_messages";

/// Where the store keeps its data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Durable store rooted at a directory
    Path(PathBuf),
    /// Non-durable store, discarded when closed
    InMemory,
}

impl StoreLocation {
    /// Connection URI understood by LanceDB
    #[inline]
    pub fn uri(&self) -> String {
        match self {
            Self::Path(path) => format!("file://{}", path.display()),
            Self::InMemory => "memory://".to_string(),
        }
    }
}

/// A stored record ranked against a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub duration: u32,
    pub offset: u32,
    /// Cosine distance to the query, in `[0, 2]`
    pub distance: f32,
    /// `1 - distance`, in `[-1, 1]`
    pub similarity: f32,
}

/// Outcome of an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows inserted
    pub rows: usize,
    /// Insert round-trips performed
    pub batches: usize,
}
