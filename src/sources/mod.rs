// Source adapters
// Turn files on disk into the raw rows consumed by the vector store

pub mod document;
pub mod tabular;

pub use document::{extract_pdf_sentences, sentences_to_records, split_sentences};
pub use tabular::{read_csv, read_csv_from};
