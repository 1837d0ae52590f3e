use clap::{Parser, Subcommand};
use click_agent::commands::{
    ask, import_csv, import_pdf, open_store, resolve_location, search, show_count,
};
use click_agent::config::{Config, get_config_dir, run_interactive_config, show_config};
use click_agent::database::VectorStore;
use click_agent::{AgentError, Result};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "click-agent")]
#[command(about = "Semantic search and question answering over chat history")]
#[command(version)]
struct Cli {
    /// Directory holding the vector store (overrides the configured path)
    #[arg(long, global = true, conflicts_with = "in_memory")]
    store: Option<PathBuf>,
    /// Use a temporary in-memory store
    #[arg(long, global = true)]
    in_memory: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Import chat messages from a CSV file
    Import {
        /// CSV file with ID, Sender, SenderName, Content, Timestamp columns
        csv: PathBuf,
        /// Rows per insert
        #[arg(long)]
        batch_size: Option<usize>,
        /// Texts per embedding request
        #[arg(long)]
        embedding_batch_size: Option<usize>,
    },
    /// Import the sentences of a PDF document
    ImportPdf {
        /// PDF file to read
        pdf: PathBuf,
        /// Sender name and id prefix for the sentences (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,
    },
    /// Find the stored messages most similar to a query
    Search {
        query: String,
        /// Number of results
        #[arg(long)]
        limit: Option<usize>,
        /// Import this CSV file before searching
        #[arg(long)]
        import: Option<PathBuf>,
    },
    /// Answer a question using the most similar stored messages as context
    Ask {
        question: String,
        /// Number of context messages
        #[arg(long)]
        limit: Option<usize>,
        /// Import this CSV file before asking
        #[arg(long)]
        import: Option<PathBuf>,
    },
    /// Show the number of stored messages
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = get_config_dir().map_err(|e| AgentError::Config(e.to_string()))?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&Config::load(&config_dir)?);
        } else {
            run_interactive_config(&config_dir)?;
        }
        return Ok(());
    }

    let mut config = Config::load(&config_dir)?;
    let location = resolve_location(&config, cli.store, cli.in_memory);
    let mut store = open_store(&config, location).await?;

    let result = run(cli.command, &mut config, &store).await;

    store.close()?;
    result
}

async fn run(command: Commands, config: &mut Config, store: &VectorStore) -> Result<()> {
    match command {
        Commands::Config { .. } => {}
        Commands::Import {
            csv,
            batch_size,
            embedding_batch_size,
        } => {
            let batch_size = batch_size.unwrap_or(config.ingest.batch_size);
            let embedding_batch_size = embedding_batch_size
                .unwrap_or_else(|| config.ingest.embedding_batch_size.min(batch_size));
            config
                .ingest
                .set_batch_sizes(batch_size, embedding_batch_size)
                .map_err(|e| AgentError::InvalidArgument(e.to_string()))?;
            import_csv(store, &csv, &config.ingest).await?;
        }
        Commands::ImportPdf { pdf, name } => {
            import_pdf(store, &pdf, name, &config.ingest).await?;
        }
        Commands::Search {
            query,
            limit,
            import,
        } => {
            if let Some(csv) = import {
                import_csv(store, &csv, &config.ingest).await?;
            }
            search(store, &query, limit.unwrap_or(config.search.limit)).await?;
        }
        Commands::Ask {
            question,
            limit,
            import,
        } => {
            if let Some(csv) = import {
                import_csv(store, &csv, &config.ingest).await?;
            }
            ask(config, store, &question, limit.unwrap_or(config.search.ask_limit)).await?;
        }
        Commands::Count => {
            show_count(store).await?;
        }
    }
    Ok(())
}
