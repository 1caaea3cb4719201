//! Error types for ReportRAG
//!
//! Provides a single error enum shared by ingestion, search and chat with:
//! - Distinct error types for different failure modes
//! - Machine-readable error codes for structured logs

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,
    EmbeddingMismatch,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    LlmError,
    OracleError,

    // Document errors (85xx)
    ImageError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,
            ErrorCode::EmbeddingMismatch => 7004,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::LlmError => 8007,
            ErrorCode::OracleError => 8008,

            ErrorCode::ImageError => 8502,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Chunk/embedding count mismatch: {chunks} chunks vs {embeddings} embeddings")]
    EmbeddingMismatch { chunks: usize, embeddings: usize },

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("LLM error: {message}")]
    LlmError { message: String },

    #[error("{oracle} oracle error: {message}")]
    OracleError { oracle: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Document errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::EmbeddingMismatch { .. } => ErrorCode::EmbeddingMismatch,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::LlmError { .. } => ErrorCode::LlmError,
            AppError::OracleError { .. } => ErrorCode::OracleError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Image(_) => ErrorCode::ImageError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Shorthand for an LLM failure
    pub fn llm(message: impl Into<String>) -> Self {
        AppError::LlmError {
            message: message.into(),
        }
    }

    /// Shorthand for a detector/classifier failure
    pub fn oracle(oracle: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::OracleError {
            oracle: oracle.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::Validation {
            message: "empty query".into(),
            field: Some("query".into()),
        };
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.code().as_code(), 1001);

        let err = AppError::oracle("detector", "timeout");
        assert_eq!(err.code(), ErrorCode::OracleError);
        assert_eq!(err.to_string(), "detector oracle error: timeout");
        assert_eq!(AppError::llm("empty response").code().as_code(), 8007);
    }

    #[test]
    fn test_mismatch_message() {
        let err = AppError::EmbeddingMismatch {
            chunks: 3,
            embeddings: 2,
        };
        assert_eq!(
            err.to_string(),
            "Chunk/embedding count mismatch: 3 chunks vs 2 embeddings"
        );
    }
}
