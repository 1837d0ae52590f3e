use chrono::Utc;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, IngestConfig};
use crate::database::{ImportSummary, RawRecord, ScoredRecord, StoreLocation, VectorStore};
use crate::embeddings::EmbeddingGenerator;
use crate::qa::{AnswerService, ClaudeClient, answer_question};
use crate::sources::{extract_pdf_sentences, read_csv, sentences_to_records};
use crate::{AgentError, Result};

/// Pick the store location: `--in-memory` wins, then `--store`, then config
#[inline]
pub fn resolve_location(config: &Config, store: Option<PathBuf>, in_memory: bool) -> StoreLocation {
    if in_memory {
        StoreLocation::InMemory
    } else {
        StoreLocation::Path(store.unwrap_or_else(|| config.store_path()))
    }
}

/// Load the embedding model and open the vector store
#[inline]
pub async fn open_store(config: &Config, location: StoreLocation) -> Result<VectorStore> {
    let generator = Arc::new(EmbeddingGenerator::from_config(&config.ollama)?);
    VectorStore::open(location, generator).await
}

/// Import chat rows from a CSV file
#[inline]
pub async fn import_csv(
    store: &VectorStore,
    path: &Path,
    ingest: &IngestConfig,
) -> Result<ImportSummary> {
    let rows = read_csv(path)?;
    info!("Importing {} rows from {}", rows.len(), path.display());
    import_with_progress(store, &rows, ingest, &path.display().to_string()).await
}

/// Import the sentences of a PDF document
#[inline]
pub async fn import_pdf(
    store: &VectorStore,
    path: &Path,
    name: Option<String>,
    ingest: &IngestConfig,
) -> Result<ImportSummary> {
    let source_name = name.unwrap_or_else(|| {
        path.file_stem()
            .map_or_else(|| "document".to_string(), |s| s.to_string_lossy().into_owned())
    });

    let sentences = extract_pdf_sentences(path)?;
    let rows = sentences_to_records(&source_name, &sentences, Utc::now());
    info!(
        "Importing {} sentences from {} as {}",
        rows.len(),
        path.display(),
        source_name
    );
    import_with_progress(store, &rows, ingest, &source_name).await
}

async fn import_with_progress(
    store: &VectorStore,
    rows: &[RawRecord],
    ingest: &IngestConfig,
    label: &str,
) -> Result<ImportSummary> {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new(rows.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Importing {msg}")
                .map_err(|e| AgentError::Other(e.into()))?,
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(label.to_string());

    let result = store
        .import_records_with_progress(
            rows,
            ingest.batch_size,
            ingest.embedding_batch_size,
            |summary| bar.set_position(summary.rows as u64),
        )
        .await;
    bar.finish_and_clear();

    let summary = result?;
    eprintln!(
        "{} Imported {} records in {} batches",
        style("✓").green(),
        summary.rows,
        summary.batches
    );
    Ok(summary)
}

/// Search and print the closest records
#[inline]
pub async fn search(store: &VectorStore, query: &str, limit: usize) -> Result<Vec<ScoredRecord>> {
    let results = store.search_similar(query, limit).await?;

    if results.is_empty() {
        println!("No records stored yet.");
    }
    for result in &results {
        print_result(result);
    }
    Ok(results)
}

/// Answer `question` with Claude using the closest records as context
#[inline]
pub async fn ask(config: &Config, store: &VectorStore, question: &str, limit: usize) -> Result<String> {
    let client = ClaudeClient::new(&config.anthropic)?;
    ask_with(store, &client, question, limit).await
}

/// Answer `question` with any answer service and print the context used
#[inline]
pub async fn ask_with(
    store: &VectorStore,
    service: &dyn AnswerService,
    question: &str,
    limit: usize,
) -> Result<String> {
    let answer = answer_question(store, service, question, limit).await?;

    println!("{}", style("Relevant context:").bold().yellow());
    for record in &answer.context {
        println!(
            "- {} ({}): {}",
            record.sender_name,
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.content
        );
    }
    println!();
    println!("{}", style("Answer:").bold().cyan());
    println!("{}", answer.text);

    Ok(answer.text)
}

/// Print the number of stored records
#[inline]
pub async fn show_count(store: &VectorStore) -> Result<u64> {
    let count = store.count().await?;
    println!("{} records stored at {}", count, store.location().uri());
    Ok(count)
}

fn print_result(result: &ScoredRecord) {
    println!(
        "{} {} ({})",
        style(format!("[{:.4}]", result.similarity)).cyan(),
        style(&result.sender_name).bold(),
        result.timestamp.format("%Y-%m-%d %H:%M:%S")
    );
    println!("   {}", result.content);
    println!("   {}", style(format!("id: {}", result.id)).dim());
}
