use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use docrag::config::AppConfig;
use docrag::ingest::IngestionPipeline;
use docrag::rag::Query;
use docrag::rag::RagService;
use docrag::Result;

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "docrag CLI for document ingestion and retrieval-augmented question answering")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a text document into the vector store
    Ingest {
        /// Path to the document
        file: PathBuf,
    },
    /// Ask a question against the ingested documents
    Query {
        /// The question to answer
        question: String,
        /// Number of chunks to retrieve as context
        #[arg(short, long, default_value = "3")]
        top_k: usize,
    },
    /// Start the HTTP API server
    Serve {
        /// Host to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to bind
        #[arg(long, default_value = "8003")]
        port: u16,
        /// Disable permissive CORS
        #[arg(long)]
        no_cors: bool,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    if cli.verbose {
        docrag::logging::init_logging_with_level("debug")?;
    } else {
        docrag::logging::init_logging(&config)?;
    }

    match cli.command {
        Commands::Ingest { file } => {
            let pipeline = IngestionPipeline::from_config(&config).await?;
            let written = pipeline.ingest(&file).await?;
            println!("✅ Ingested {} chunks from {}", written, file.display());
        }
        Commands::Query { question, top_k } => {
            let service = RagService::from_config(&config).await?;
            let answer = service
                .answer(Query::new(question).with_top_k(top_k))
                .await?;
            println!("{}\n", answer.answer);
            println!("Sources ({} chunks):", answer.source_chunks.len());
            for source in &answer.source_chunks {
                println!(
                    "  {}#{} (score {:.3})",
                    source.filename, source.chunk_index, source.score
                );
            }
        }
        Commands::Serve {
            host,
            port,
            no_cors,
        } => {
            docrag::api::serve_api(&config, host, port, !no_cors).await?;
        }
        Commands::Config => {
            println!("{config:#?}");
        }
    }

    Ok(())
}
