// Database module
// Record validation and the LanceDB-backed vector store

pub mod lancedb;
pub mod records;

pub use self::lancedb::{ImportSummary, ScoredRecord, StoreLocation, TABLE_NAME, VectorStore};
pub use records::{RawRecord, Record, parse_timestamp};
