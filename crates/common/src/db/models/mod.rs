//! Vector store row models
//!
//! Rows are written and read with raw statements because the table name is
//! configurable and the embedding column is a pgvector `vector(768)`.

mod chunk;

pub use chunk::{format_embedding, parse_placeholders, Chunk, RetrievedRow, PAGE_TEXT_TYPE};
