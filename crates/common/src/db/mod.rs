//! Database layer for ReportRAG
//!
//! Provides:
//! - The single pgvector connection used by the pipeline
//! - Repository for chunk inserts and similarity search
//! - The `ChunkStore` seam used by retrieval (fakes in tests)

pub mod models;
mod repository;

pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use models::{Chunk, RetrievedRow};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Vector store contract consumed by ingestion and retrieval
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert chunks with their embeddings, paired by position.
    ///
    /// Fails without writing anything when the two slices differ in length.
    async fn insert_chunks(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize>;

    /// Every distinct stored chunk id
    async fn document_ids(&self) -> Result<Vec<String>>;

    /// Every stored chunk ordered by ascending vector distance to `embedding`
    async fn similarity_search(&self, embedding: &[f32]) -> Result<Vec<RetrievedRow>>;
}

/// Database connection wrapper
#[derive(Clone)]
pub struct DbPool {
    pub connection: DatabaseConnection,
}

impl DbPool {
    /// Connect using the configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to vector store...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections.max(1))
            .min_connections(1)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(false);

        let connection = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to vector store: {}", e),
            })?;

        info!("Vector store connection established");

        Ok(Self { connection })
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.connection
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }

    /// Close the connection
    pub async fn close(self) -> Result<()> {
        self.connection.close().await.map_err(Into::into)
    }
}
