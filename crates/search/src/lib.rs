//! ReportRAG query side
//!
//! Turns a question plus its embedding into an answer: report dates and
//! document keywords narrow the vector search results, matching figure
//! metadata is attached, and the LLM writes the final tabulated answer.

pub mod figures;
pub mod keywords;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;

pub use figures::{load_figures, FigureNode};
pub use pipeline::{QueryPipeline, UNAVAILABLE_ANSWER};
pub use retrieval::{
    FallbackChoice, FallbackDecider, RejectFallback, RetrievalFilter, RetrievalOutcome,
};
