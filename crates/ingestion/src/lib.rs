//! ReportRAG ingestion
//!
//! Turns PDF reports into embedded, stored chunks:
//! layout extraction → text interleaving → page nodes → region summaries →
//! chunking → embedding → vector store.

pub mod chunker;
pub mod dedup;
pub mod errors;
pub mod geometry;
pub mod interleave;
pub mod layout;
pub mod oracles;
pub mod pages;
pub mod pdf;
pub mod processor;
pub mod summarizer;

pub use errors::IngestionError;
pub use processor::{IngestionDeps, IngestionProcessor, IngestionReport};
