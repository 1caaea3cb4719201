//! Configuration management for ReportRAG
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Vector store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding oracle configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation (LLM / VLM) oracle configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Layout detection configuration
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Chat configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Ingestion input configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Postgres URL of the pgvector store
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Chunk table name
    #[serde(default = "default_table")]
    pub table: String,

    /// Maximum number of connections (the pipeline uses one, serially)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Create the vector extension and chunk table when missing
    #[serde(default)]
    pub prepare_table: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: gemini, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Output dimensionality requested from the service
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,

    /// Texts per embedding request (the service caps this at 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// LLM provider: gemini, mock
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Layout detection settings. Class ids follow the DocLayout-YOLO label set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// Detector service endpoint (POST PNG, returns detections)
    #[serde(default = "default_detector_url")]
    pub detector_url: String,

    /// Chart classifier service endpoint (POST PNG, returns top-1)
    #[serde(default = "default_classifier_url")]
    pub classifier_url: String,

    /// Page render scale relative to PDF points
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    /// Minimum detector confidence
    #[serde(default)]
    pub confidence_threshold: f32,

    #[serde(default = "default_figure_class")]
    pub figure_class: i64,

    #[serde(default = "default_figure_caption_class")]
    pub figure_caption_class: i64,

    #[serde(default = "default_table_class")]
    pub table_class: i64,

    #[serde(default = "default_table_caption_class")]
    pub table_caption_class: i64,

    /// Maximum vertical gap (rendered px) for a caption to merge into its box
    #[serde(default = "default_caption_gap")]
    pub caption_gap_px: f32,

    /// Padding added on each side, as a fraction of the merged box size
    #[serde(default = "default_padding_ratio")]
    pub padding_ratio: f32,

    /// Classifier label meaning "chart"
    #[serde(default)]
    pub chart_label: i64,

    /// Minimum classifier confidence for a chart
    #[serde(default = "default_chart_confidence")]
    pub chart_min_confidence: f32,

    /// IoU above which a smaller region is a duplicate
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Fraction of a region inside a kept region that makes it nested
    #[serde(default = "default_containment_tolerance")]
    pub containment_tolerance: f32,

    /// Minimum words for a text line to survive noise filtering
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Timeout for detector/classifier calls in seconds
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Minimum similarity (1 - distance) for a chunk to be used
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Conversation turns kept for follow-up answers
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Figure metadata JSON (placeholder → figures)
    #[serde(default = "default_figures_path")]
    pub figures_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Folder scanned for *.pdf reports
    #[serde(default = "default_pdf_folder")]
    pub pdf_folder: String,

    /// Rasterizer binary (poppler pdftoppm)
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or an EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_database_url() -> String { "postgres://postgres@localhost:5432/postgres".to_string() }
fn default_table() -> String { "pdf_chunks_768".to_string() }
fn default_max_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_provider() -> String { "gemini".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_oracle_timeout() -> u64 { 60 }
fn default_batch_size() -> usize { 100 }
fn default_llm_model() -> String { crate::DEFAULT_LLM_MODEL.to_string() }
fn default_llm_timeout() -> u64 { 120 }
fn default_detector_url() -> String { "http://localhost:8500/detect".to_string() }
fn default_classifier_url() -> String { "http://localhost:8500/classify".to_string() }
fn default_render_scale() -> f32 { 2.0 }
fn default_figure_class() -> i64 { 3 }
fn default_figure_caption_class() -> i64 { 4 }
fn default_table_class() -> i64 { 5 }
fn default_table_caption_class() -> i64 { 6 }
fn default_caption_gap() -> f32 { 150.0 }
fn default_padding_ratio() -> f32 { 0.05 }
fn default_chart_confidence() -> f32 { 0.4 }
fn default_iou_threshold() -> f32 { 0.7 }
fn default_containment_tolerance() -> f32 { 0.95 }
fn default_min_words() -> usize { 5 }
fn default_chunk_size() -> usize { 2500 }
fn default_chunk_overlap() -> usize { 300 }
fn default_similarity_threshold() -> f64 { 0.5 }
fn default_max_history() -> usize { 25 }
fn default_figures_path() -> String { "llamajson/combined_images_data.json".to_string() }
fn default_pdf_folder() -> String { "input_pdfs".to_string() }
fn default_pdftoppm() -> String { "pdftoppm".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RETRIEVAL__SIMILARITY_THRESHOLD=0.4
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get detector/classifier request timeout as Duration
    pub fn layout_timeout(&self) -> Duration {
        Duration::from_secs(self.layout.timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            table: default_table(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
            prepare_table: false,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_oracle_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            detector_url: default_detector_url(),
            classifier_url: default_classifier_url(),
            render_scale: default_render_scale(),
            confidence_threshold: 0.0,
            figure_class: default_figure_class(),
            figure_caption_class: default_figure_caption_class(),
            table_class: default_table_class(),
            table_caption_class: default_table_caption_class(),
            caption_gap_px: default_caption_gap(),
            padding_ratio: default_padding_ratio(),
            chart_label: 0,
            chart_min_confidence: default_chart_confidence(),
            iou_threshold: default_iou_threshold(),
            containment_tolerance: default_containment_tolerance(),
            min_words: default_min_words(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            figures_path: default_figures_path(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            pdf_folder: default_pdf_folder(),
            pdftoppm_path: default_pdftoppm(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.table, "pdf_chunks_768");
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.chunking.chunk_size, 2500);
        assert_eq!(config.chunking.chunk_overlap, 300);
        assert_eq!(config.retrieval.similarity_threshold, 0.5);
    }

    #[test]
    fn test_layout_defaults() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.render_scale, 2.0);
        assert_eq!(layout.caption_gap_px, 150.0);
        assert_eq!(layout.chart_label, 0);
        assert_eq!(layout.figure_class, 3);
        assert_eq!(layout.table_caption_class, 6);
    }

    #[test]
    fn test_empty_sources_deserialize_to_defaults() {
        let config: AppConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.chat.max_history, 25);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
    }
}
