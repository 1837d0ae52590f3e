// Question answering over retrieved context

pub mod claude;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::database::{ScoredRecord, VectorStore};

pub use claude::ClaudeClient;

/// One retrieved message handed to an answer service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub name: String,
    pub time: DateTime<Utc>,
    pub content: String,
}

impl From<&ScoredRecord> for ContextMessage {
    #[inline]
    fn from(record: &ScoredRecord) -> Self {
        Self {
            name: record.sender_name.clone(),
            time: record.timestamp,
            content: record.content.clone(),
        }
    }
}

impl ScoredRecord {
    #[inline]
    pub fn to_context(&self) -> ContextMessage {
        ContextMessage::from(self)
    }
}

/// Produces a natural-language answer from a question and ranked context
pub trait AnswerService: Send + Sync {
    /// `context` is in rank order, most similar first
    fn answer(&self, question: &str, context: &[ContextMessage]) -> Result<String>;
}

/// Convert ranked search results into answer context, preserving order
#[inline]
pub fn to_context(results: &[ScoredRecord]) -> Vec<ContextMessage> {
    results.iter().map(ScoredRecord::to_context).collect()
}

/// An answer with the records it was based on
#[derive(Debug, Clone)]
pub struct Answer {
    pub context: Vec<ScoredRecord>,
    pub text: String,
}

/// Retrieve the `limit` records closest to `question` and answer from them
#[inline]
pub async fn answer_question(
    store: &VectorStore,
    service: &dyn AnswerService,
    question: &str,
    limit: usize,
) -> Result<Answer> {
    let context = store.search_similar(question, limit).await?;
    let text = service.answer(question, &to_context(&context))?;
    Ok(Answer { context, text })
}

/// Render context as `Name (YYYY-MM-DD HH:MM:SS): content` lines
#[inline]
pub fn format_context(messages: &[ContextMessage]) -> String {
    messages
        .iter()
        .map(|msg| {
            format!(
                "{} ({}): {}",
                msg.name,
                msg.time.format("%Y-%m-%d %H:%M:%S"),
                msg.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
