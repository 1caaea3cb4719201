//! ReportRAG chat binary
//!
//! Interactive question answering over the ingested reports.

use anyhow::Context;
use clap::Parser;
use reportrag_chat::commands::{help_text, COMMAND_BAR};
use reportrag_chat::console::ConsolePrompts;
use reportrag_chat::{ChatSession, Command};
use reportrag_common::{
    config::AppConfig, db::DbPool, embeddings::create_embedder, llm::create_language_model,
    metrics, Repository, VERSION,
};
use reportrag_search::{load_figures, QueryPipeline, RetrievalFilter};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chat")]
#[command(version = VERSION)]
#[command(about = "Chat with your ingested PDF reports", long_about = None)]
struct Cli {
    /// Figure metadata JSON (overrides chat.figures_path)
    #[arg(long, env = "REPORTRAG_FIGURES")]
    figures: Option<String>,

    /// Conversation turns to remember (overrides chat.max_history)
    #[arg(long = "max-history")]
    max_history: Option<usize>,

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

    info!("Starting ReportRAG chat v{}", VERSION);

    println!("Connecting to Postgres...");
    let pool = DbPool::new(&config.database).await?;
    let repository = Repository::new(pool, &config.database.table, config.embedding.dimension)?;
    repository.ping().await?;

    println!("Loading figure metadata...");
    let figures_path = cli.figures.unwrap_or_else(|| config.chat.figures_path.clone());
    let figures = load_figures(&figures_path)
        .with_context(|| format!("Failed to load figure metadata from {}", figures_path))?;

    let llm = create_language_model(&config.llm)?;
    let prompts = Arc::new(ConsolePrompts);

    let pipeline = QueryPipeline::new(
        llm.clone(),
        Arc::new(repository),
        figures,
        RetrievalFilter::new(config.retrieval.similarity_threshold),
        prompts.clone(),
    );

    let mut session = ChatSession::new(
        llm,
        create_embedder(&config.embedding)?,
        pipeline,
        prompts,
        cli.max_history.unwrap_or(config.chat.max_history),
    );

    println!("Chatbot ready! Type 'help' to see available commands. Type 'exit' to quit.");
    println!("{}", COMMAND_BAR);

    let stdin = io::stdin();
    loop {
        print!("\nYou: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Exit => {
                println!("Goodbye!");
                break;
            }
            Command::Help => {
                println!("\nAvailable commands:");
                println!("{}", help_text());
            }
            Command::History => {
                println!("\nConversation History:");
                for (i, turn) in session.history().iter().enumerate() {
                    println!("{}. User: {}\n   Bot: {}\n", i + 1, turn.user, turn.bot);
                }
            }
            Command::Query(query) => {
                let answer = session.run_new_query(&query).await;
                println!("\nBot: {}", answer);
            }
            Command::Message(message) => {
                let answer = session.respond(&message).await;
                println!("\nBot: {}", answer);
                println!("\n{}", COMMAND_BAR);
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
