//! Figure metadata matched to retrieved chunks
//!
//! The figure file is a JSON array of `{placeholder, figures: [...]}` nodes
//! produced offline from the cropped chart and table images.

use reportrag_common::db::models::RetrievedRow;
use reportrag_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

/// Figures extracted from one chart or table image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureNode {
    pub placeholder: String,
    #[serde(default)]
    pub figures: Vec<Value>,
}

/// Load the figure file and normalize its placeholders
pub fn load_figures(path: impl AsRef<Path>) -> Result<Vec<FigureNode>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)?;
    let mut nodes: Vec<FigureNode> = serde_json::from_str(&raw)?;

    for node in &mut nodes {
        node.placeholder = normalize_placeholder(&node.placeholder);
    }

    info!(path = %path.display(), nodes = nodes.len(), "Figure metadata loaded");
    Ok(nodes)
}

/// Drop the `.png` suffix of image-derived placeholders and trim
pub fn normalize_placeholder(placeholder: &str) -> String {
    placeholder.replace(".png", "").trim().to_string()
}

/// Figures of every node referenced by the rows' placeholders.
///
/// Each figure is copied and tagged with its node's placeholder; a figure
/// that is not a JSON object becomes `{"text": figure}`.
pub fn match_figures(rows: &[RetrievedRow], nodes: &[FigureNode]) -> Vec<Value> {
    let relevant: Vec<String> = rows.iter().flat_map(RetrievedRow::placeholders).collect();

    let matching: Vec<&FigureNode> = nodes
        .iter()
        .filter(|n| relevant.contains(&n.placeholder))
        .collect();

    let figures: Vec<Value> = matching
        .iter()
        .flat_map(|node| {
            node.figures.iter().map(|figure| {
                let mut object = match figure {
                    Value::Object(map) => map.clone(),
                    other => {
                        let mut map = Map::new();
                        map.insert("text".to_string(), other.clone());
                        map
                    }
                };
                object.insert("placeholder".to_string(), Value::String(node.placeholder.clone()));
                Value::Object(object)
            })
        })
        .collect();

    debug!(
        matching_nodes = matching.len(),
        figures = figures.len(),
        "Figures matched"
    );
    figures
}
