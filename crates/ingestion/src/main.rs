//! ReportRAG ingestion binary
//!
//! Processes every PDF of the input folder and appends the resulting
//! chunks to the vector store.

use anyhow::Context;
use clap::Parser;
use reportrag_common::{
    config::AppConfig, db::DbPool, embeddings::create_embedder, llm::create_language_model,
    metrics, Repository, VERSION,
};
use reportrag_ingestion::chunker::ChunkBuilder;
use reportrag_ingestion::interleave::TextInterleaver;
use reportrag_ingestion::layout::LayoutExtractor;
use reportrag_ingestion::oracles::{HttpClassifier, HttpDetector};
use reportrag_ingestion::pdf::{LopdfTextLayer, PdftoppmRasterizer};
use reportrag_ingestion::summarizer::Summarizer;
use reportrag_ingestion::{IngestionDeps, IngestionProcessor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ingest")]
#[command(version = VERSION)]
#[command(about = "Extract, summarize, embed and store PDF reports", long_about = None)]
struct Cli {
    /// Folder of PDFs to ingest (overrides ingestion.pdf_folder)
    #[arg(long = "pdf-folder", env = "REPORTRAG_PDF_FOLDER")]
    pdf_folder: Option<PathBuf>,

    /// Create the vector extension and chunk table when missing
    #[arg(long = "prepare-table")]
    prepare_table: bool,

    /// Configuration file to load instead of the layered config/ directory
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(&config);
    metrics::register_metrics();

    info!("Starting ReportRAG ingestion v{}", VERSION);

    let pool = DbPool::new(&config.database).await?;
    let repository = Repository::new(pool, &config.database.table, config.embedding.dimension)?;
    repository.ping().await?;

    if cli.prepare_table || config.database.prepare_table {
        repository.prepare_table().await?;
    }

    let layout = LayoutExtractor::new(
        Arc::new(HttpDetector::new(&config.layout.detector_url, config.layout_timeout())?),
        Arc::new(HttpClassifier::new(&config.layout.classifier_url, config.layout_timeout())?),
        config.layout.clone(),
    );

    let repository = Arc::new(repository);
    let deps = IngestionDeps {
        text_layer: Arc::new(LopdfTextLayer),
        rasterizer: Arc::new(PdftoppmRasterizer::new(&config.ingestion.pdftoppm_path)),
        layout,
        summarizer: Summarizer::new(create_language_model(&config.llm)?),
        embedder: create_embedder(&config.embedding)?,
        store: repository.clone(),
    };

    let processor = IngestionProcessor::new(
        deps,
        TextInterleaver::new(config.layout.min_words, config.layout.render_scale),
        ChunkBuilder::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?,
    );

    let folder = cli
        .pdf_folder
        .unwrap_or_else(|| PathBuf::from(&config.ingestion.pdf_folder));

    let report = processor.process_directory(&folder).await?;

    drop(processor);
    if let Ok(repository) = Arc::try_unwrap(repository) {
        repository.close().await?;
    }

    println!(
        "Processed {} documents ({} pages, {} table/chart regions), inserted {} chunks",
        report.documents, report.pages, report.regions, report.chunks_inserted
    );
    for failed in &report.failed {
        println!("  skipped: {}", failed.display());
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
