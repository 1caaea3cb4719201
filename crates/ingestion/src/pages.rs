//! Page text nodes built from the interleaved document string

use crate::interleave::PAGE_HEADER_PREFIX;
use crate::layout::PagePlaceholders;
use reportrag_common::db::models::PAGE_TEXT_TYPE;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

fn marker_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[.*?_(Chart|Table)\d+_Page\d+\]$").expect("valid marker-line regex")
    })
}

/// Text of one page with its placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTextNode {
    /// `{docName}_page{N}`
    pub id: String,
    pub report_date: Option<String>,
    pub page_num: u32,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Every placeholder of the page, detection order
    pub placeholders: Vec<String>,
    pub text: String,
}

/// File stem with every non-alphanumeric character removed
pub fn sanitize_doc_name(stem: &str) -> String {
    stem.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Split the interleaved string on page headers into page nodes.
///
/// Body lines are kept in order. Blank lines and lines holding only a
/// placeholder marker are removed; the page's placeholders are carried on
/// the node instead.
pub fn build_page_nodes(
    doc_name: &str,
    report_date: Option<&str>,
    interleaved: &str,
    placeholders: &PagePlaceholders,
) -> Vec<PageTextNode> {
    let mut nodes = Vec::new();

    for segment in interleaved.split(PAGE_HEADER_PREFIX) {
        if segment.trim().is_empty() {
            continue;
        }

        let mut lines = segment.split('\n');
        let header = lines.next().unwrap_or_default();
        let Ok(page_num) = header.trim_matches(|c: char| c == '-' || c.is_whitespace()).parse::<u32>()
        else {
            warn!(doc = %doc_name, header = %header, "Unparseable page header, skipping segment");
            continue;
        };

        let text = lines
            .filter(|l| {
                let line = l.trim();
                !line.is_empty() && !marker_line_regex().is_match(line)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let page_placeholders = placeholders
            .get(&page_num)
            .map(|phs| phs.iter().map(|p| p.placeholder.clone()).collect())
            .unwrap_or_default();

        nodes.push(PageTextNode {
            id: format!("{}_page{}", doc_name, page_num),
            report_date: report_date.map(str::to_string),
            page_num,
            node_type: PAGE_TEXT_TYPE.to_string(),
            placeholders: page_placeholders,
            text,
        });
    }

    nodes
}
