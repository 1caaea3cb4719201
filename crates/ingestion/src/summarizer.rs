//! Chart and table summarization with a vision-capable LLM

use crate::layout::{MergedNode, RegionKind};
use crate::oracles::encode_png;
use reportrag_common::{LanguageModel, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const CHART_PROMPT: &str =
    "Summarize chart in 3-4 sentences: include title, axes, main trends.";

pub const TABLE_PROMPT: &str = "Summarize table in 6-8 sentences including title, rows, columns, trends, highest/lowest values.";

/// Placeholder to summary text
pub type Summaries = HashMap<String, String>;

pub struct Summarizer {
    llm: Arc<dyn LanguageModel>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Summarize one region crop
    pub async fn summarize(&self, node: &MergedNode) -> Result<String> {
        let prompt = match node.kind {
            RegionKind::Chart => CHART_PROMPT,
            RegionKind::Table => TABLE_PROMPT,
        };
        let png = encode_png(&node.image)?;
        let raw = self.llm.generate_with_image(prompt, &png).await?;
        Ok(clean_summary(&raw))
    }

    /// Summarize every node in order. Failures are logged and leave the
    /// placeholder without a summary.
    #[instrument(skip_all, fields(node_count = nodes.len()))]
    pub async fn summarize_all(&self, nodes: &[MergedNode]) -> Summaries {
        let mut summaries = Summaries::with_capacity(nodes.len());

        for node in nodes {
            match self.summarize(node).await {
                Ok(text) if !text.is_empty() => {
                    summaries.insert(node.placeholder.clone(), text);
                }
                Ok(_) => {
                    warn!(placeholder = %node.placeholder, "Empty summary, skipping");
                }
                Err(e) => {
                    warn!(placeholder = %node.placeholder, error = %e, "Summary failed, skipping");
                }
            }
        }

        info!(summarized = summaries.len(), "Regions summarized");
        summaries
    }
}

/// Trim each non-empty line, replace `|` with a space, join with spaces
pub fn clean_summary(text: &str) -> String {
    text.trim()
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.replace('|', " "))
        .collect::<Vec<_>>()
        .join(" ")
}
