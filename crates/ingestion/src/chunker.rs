//! Text chunking module
//!
//! Page text plus its region summaries is split into overlapping chunks.
//! The splitter prefers paragraph, then sentence, then word boundaries.

use crate::errors::Result;
use crate::pages::PageTextNode;
use crate::summarizer::Summaries;
use regex_lite::Regex;
use reportrag_common::db::models::Chunk;
use std::sync::OnceLock;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

fn summary_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[.*(Chart|Table)\d+_Page\d+\]$").expect("valid placeholder regex"))
}

/// A page node with the summaries of its placeholders attached
#[derive(Debug, Clone, PartialEq)]
pub struct MergedPage {
    pub node: PageTextNode,
    /// `(placeholder, summary)` in the node's placeholder order
    pub summaries: Vec<(String, String)>,
}

impl MergedPage {
    /// Page text followed by each summary, separated by blank lines
    pub fn combined_text(&self) -> String {
        let mut text = self.node.text.clone();
        for (placeholder, summary) in &self.summaries {
            if summary_key_regex().is_match(placeholder) {
                text.push_str("\n\n");
                text.push_str(summary);
            }
        }
        text
    }
}

/// Attach to each page the summaries of its own placeholders
pub fn merge_summaries(nodes: Vec<PageTextNode>, summaries: &Summaries) -> Vec<MergedPage> {
    nodes
        .into_iter()
        .map(|node| {
            let attached = node
                .placeholders
                .iter()
                .filter_map(|ph| summaries.get(ph).map(|s| (ph.clone(), s.clone())))
                .collect();
            MergedPage {
                node,
                summaries: attached,
            }
        })
        .collect()
}

/// Character-budget chunker
pub struct ChunkBuilder {
    splitter: TextSplitter<text_splitter::Characters>,
    chunk_size: usize,
}

impl ChunkBuilder {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = ChunkConfig::new(chunk_size).with_overlap(chunk_overlap)?;
        Ok(Self {
            splitter: TextSplitter::new(config),
            chunk_size,
        })
    }

    /// Chunks of one page; each carries the page's metadata and full
    /// placeholder list
    pub fn chunk_page(&self, page: &MergedPage) -> Vec<Chunk> {
        let text = page.combined_text();
        let node = &page.node;

        let chunks: Vec<Chunk> = self
            .splitter
            .chunks(&text)
            .enumerate()
            .map(|(i, chunk_text)| Chunk {
                chunk_id: format!("{}_chunk{}", node.id, i),
                chunk_text: chunk_text.to_string(),
                placeholder: node.placeholders.clone(),
                page_num: node.page_num as i32,
                chunk_type: node.node_type.clone(),
                report_date: node.report_date.clone(),
            })
            .collect();

        debug!(
            page_id = %node.id,
            input_len = text.len(),
            chunk_count = chunks.len(),
            chunk_size = self.chunk_size,
            "Page chunked"
        );

        chunks
    }

    /// Chunks of every page, in page order
    pub fn build_chunks(&self, pages: &[MergedPage]) -> Vec<Chunk> {
        pages.iter().flat_map(|p| self.chunk_page(p)).collect()
    }
}
