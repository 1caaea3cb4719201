//! Repository for the pgvector chunk table
//!
//! All statements are raw SQL: the table name comes from configuration and
//! vector operators are not expressible through the entity API.

use crate::db::models::{format_embedding, Chunk, RetrievedRow};
use crate::db::{ChunkStore, DbPool};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, QueryResult, Statement, TransactionTrait,
};
use tracing::{debug, info, instrument};

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
    table: String,
    dimension: usize,
}

impl Repository {
    /// Create a repository over `table`.
    ///
    /// The table name is interpolated into SQL, so only identifier
    /// characters (and one schema dot) are accepted.
    pub fn new(pool: DbPool, table: impl Into<String>, dimension: usize) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            pool,
            table,
            dimension,
        })
    }

    fn conn(&self) -> &DatabaseConnection {
        &self.pool.connection
    }

    /// Table this repository reads and writes
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Create the `vector` extension and the chunk table when missing
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn prepare_table(&self) -> Result<()> {
        self.conn()
            .execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                content TEXT,
                embedding VECTOR({dimension}),
                report_date TEXT,
                page_num INT,
                type TEXT,
                placeholder TEXT
            )
            "#,
            table = self.table,
            dimension = self.dimension
        );
        self.conn().execute_unprepared(&sql).await?;

        info!("Chunk table ready");
        Ok(())
    }

    /// Release the connection
    pub async fn close(self) -> Result<()> {
        self.pool.close().await
    }
}

#[async_trait]
impl ChunkStore for Repository {
    #[instrument(skip_all, fields(table = %self.table, chunk_count = chunks.len()))]
    async fn insert_chunks(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        ensure_parallel(chunks, embeddings)?;

        let sql = format!(
            r#"
            INSERT INTO {}
            (id, content, embedding, report_date, page_num, type, placeholder)
            VALUES ($1, $2, $3::vector, $4, $5, $6, $7)
            "#,
            self.table
        );

        let txn = self.conn().begin().await?;

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![
                    chunk.chunk_id.clone().into(),
                    chunk.chunk_text.clone().into(),
                    format_embedding(embedding).into(),
                    chunk.report_date.clone().into(),
                    chunk.page_num.into(),
                    chunk.chunk_type.clone().into(),
                    chunk.placeholder_column().into(),
                ],
            );
            txn.execute(stmt).await?;
        }

        txn.commit().await?;

        info!(inserted = chunks.len(), "Chunks inserted");
        Ok(chunks.len())
    }

    async fn document_ids(&self) -> Result<Vec<String>> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!("SELECT DISTINCT id FROM {}", self.table),
        );

        let ids = self
            .conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .filter_map(|row| row.try_get_by_index::<String>(0).ok())
            .collect();

        Ok(ids)
    }

    #[instrument(skip_all, fields(table = %self.table))]
    async fn similarity_search(&self, embedding: &[f32]) -> Result<Vec<RetrievedRow>> {
        let sql = format!(
            r#"
            SELECT id, content, report_date, placeholder,
                   1 - (embedding <-> $1::vector) AS similarity
            FROM {}
            ORDER BY embedding <-> $1::vector
            "#,
            self.table
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![format_embedding(embedding).into()],
        );

        let rows: Vec<RetrievedRow> = self
            .conn()
            .query_all(stmt)
            .await?
            .iter()
            .map(row_to_retrieved)
            .collect::<Result<_>>()?;

        debug!(row_count = rows.len(), "Similarity search complete");
        Ok(rows)
    }
}

fn row_to_retrieved(row: &QueryResult) -> Result<RetrievedRow> {
    Ok(RetrievedRow {
        id: row.try_get("", "id")?,
        content: row.try_get::<Option<String>>("", "content")?.unwrap_or_default(),
        report_date: row.try_get("", "report_date")?,
        placeholder: row.try_get("", "placeholder")?,
        similarity: row.try_get::<Option<f64>>("", "similarity")?.unwrap_or(0.0),
    })
}

/// Enforce the positional pairing of chunks and embeddings
pub(crate) fn ensure_parallel(chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
    if chunks.len() != embeddings.len() {
        return Err(AppError::EmbeddingMismatch {
            chunks: chunks.len(),
            embeddings: embeddings.len(),
        });
    }
    Ok(())
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid_part = |part: &str| {
        !part.is_empty()
            && !part.starts_with(|c: char| c.is_ascii_digit())
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(AppError::Validation {
            message: format!("invalid table name '{}'", table),
            field: Some("database.table".to_string()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PAGE_TEXT_TYPE;

    fn chunk(id: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            chunk_text: "text".to_string(),
            placeholder: vec![],
            page_num: 1,
            chunk_type: PAGE_TEXT_TYPE.to_string(),
            report_date: None,
        }
    }

    #[test]
    fn test_parallel_lengths_enforced() {
        let chunks = vec![chunk("a_page1_chunk0"), chunk("a_page1_chunk1")];
        assert!(ensure_parallel(&chunks, &[vec![0.0], vec![1.0]]).is_ok());

        let err = ensure_parallel(&chunks, &[vec![0.0]]).unwrap_err();
        assert!(matches!(
            err,
            AppError::EmbeddingMismatch {
                chunks: 2,
                embeddings: 1
            }
        ));
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("pdf_chunks_768").is_ok());
        assert!(validate_table_name("public.pdf_chunks_768").is_ok());
        assert!(validate_table_name("chunks; DROP TABLE x").is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("768chunks").is_err());
    }
}
