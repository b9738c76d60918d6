use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::path::PathBuf;

use oscar_rag::csv_source::{AwardReader, ColumnMapping, ColumnNaming, DEFAULT_CSV_PATH};
use oscar_rag::database::{QdrantClient, QdrantConfig};
use oscar_rag::gemini::{GeminiClient, GeminiConfig};
use oscar_rag::rag::{print_outcome, EmptyResultPolicy, RagEngine};

/// Question answering over Oscar award nominations using Gemini embeddings and Qdrant
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load award rows from a CSV file into the vector store
    Ingest {
        /// Path to the awards CSV
        #[arg(long, default_value = DEFAULT_CSV_PATH)]
        csv: PathBuf,

        /// Header naming convention used by the CSV
        #[arg(long, value_enum, default_value_t = ColumnNaming::Snake)]
        columns: ColumnNaming,

        /// Maximum number of rows being embedded and stored at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Answer a single question and exit
    Ask {
        question: String,

        /// Behaviour when no awards match the question
        #[arg(long, value_enum, default_value_t = EmptyResultPolicy::Skip)]
        on_empty: EmptyResultPolicy,
    },
    /// Ask questions interactively
    Chat {
        /// Behaviour when no awards match the question
        #[arg(long, value_enum, default_value_t = EmptyResultPolicy::Skip)]
        on_empty: EmptyResultPolicy,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration from environment
    let qdrant_config = QdrantConfig::from_env()?;
    let gemini_config = GeminiConfig::from_env().context("Missing GEMINI_API_KEY")?;

    let qdrant = QdrantClient::new(qdrant_config).context("Failed to initialize Qdrant client")?;
    let gemini = GeminiClient::new(gemini_config);

    match args.command {
        Command::Ingest {
            csv,
            columns,
            concurrency,
        } => {
            qdrant.ensure_collection().await?;

            let reader = AwardReader::from_path(&csv, &ColumnMapping::from(columns))?;
            let rag_engine = RagEngine::new(qdrant, gemini.clone(), gemini);
            let report = rag_engine.ingest(reader, concurrency).await;

            info!("CSV data processing completed: {} awards stored", report.stored);

            if !report.failures.is_empty() {
                for failure in &report.failures {
                    error!("Row {} ({}): {}", failure.row, failure.name, failure.error);
                }
                return Err(anyhow::anyhow!(
                    "{} of {} accepted rows failed to ingest",
                    report.failures.len(),
                    report.accepted
                ));
            }
        }
        Command::Ask { question, on_empty } => {
            let rag_engine = RagEngine::new(qdrant, gemini.clone(), gemini);
            let outcome = rag_engine
                .answer(&question, on_empty)
                .await
                .context("Failed to answer question")?;
            print_outcome(&outcome);
        }
        Command::Chat { on_empty } => {
            let rag_engine = RagEngine::new(qdrant, gemini.clone(), gemini);
            rag_engine
                .run_query_loop(on_empty)
                .await
                .context("Error in query loop")?;
        }
    }

    Ok(())
}
