//! ReportRAG Common Library
//!
//! Shared code for the ReportRAG ingestion and chat binaries including:
//! - Configuration management
//! - Error types and handling
//! - Vector store access (pgvector via SeaORM raw statements)
//! - Embedding and LLM oracle abstractions
//! - Report date normalization
//! - Metrics

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod report_date;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use db::{ChunkStore, Repository};
pub use embeddings::Embedder;
pub use llm::LanguageModel;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Default generation model
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";
