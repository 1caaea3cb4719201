//! Ingestion error types

use reportrag_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("Failed to render page {page} of {path}: {message}")]
    RasterizeError {
        path: String,
        page: u32,
        message: String,
    },

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    App(#[from] AppError),
}

impl From<text_splitter::ChunkConfigError> for IngestionError {
    fn from(e: text_splitter::ChunkConfigError) -> Self {
        IngestionError::ChunkingError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;
