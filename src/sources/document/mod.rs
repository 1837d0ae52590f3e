
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, warn};

use crate::database::RawRecord;
use crate::{AgentError, Result};

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// Extract the text of a PDF and split it into sentences
#[inline]
pub fn extract_pdf_sentences(path: &Path) -> Result<Vec<String>> {
    let text = pdf_extract::extract_text(path).map_err(|e| {
        AgentError::Source(format!("Failed to extract text from {}: {}", path.display(), e))
    })?;

    if text.trim().is_empty() {
        warn!(
            "{} contains no extractable text (image-based or encrypted?)",
            path.display()
        );
    }

    let sentences = split_sentences(&text);
    debug!(
        "Extracted {} sentences from {}",
        sentences.len(),
        path.display()
    );
    Ok(sentences)
}

/// Split text into sentence-like units
///
/// Whitespace runs collapse to a single space. A sentence ends after any
/// run of `.`, `!`, `?` or their full-width forms; trailing text without a
/// terminator forms the last sentence.
#[inline]
pub fn split_sentences(text: &str) -> Vec<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = collapsed.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if SENTENCE_TERMINATORS.contains(&c) {
            while let Some(&next) = chars.peek() {
                if !SENTENCE_TERMINATORS.contains(&next) {
                    break;
                }
                current.push(next);
                chars.next();
            }
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        sentences.push(trimmed.to_string());
    }
}

/// Turn document sentences into rows for import
///
/// Ids are `<source_name>-<index>`, the sender name is the source name and
/// the offset is the sentence's position in the document.
#[inline]
pub fn sentences_to_records(
    source_name: &str,
    sentences: &[String],
    timestamp: DateTime<Utc>,
) -> Vec<RawRecord> {
    let timestamp = timestamp.to_rfc3339();
    sentences
        .iter()
        .enumerate()
        .map(|(index, sentence)| {
            RawRecord::new(
                format!("{}-{}", source_name, index),
                source_name,
                sentence.as_str(),
                timestamp.as_str(),
            )
            .with_offset(u32::try_from(index).unwrap_or(u32::MAX))
        })
        .collect()
}
