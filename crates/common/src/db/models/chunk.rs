//! Chunk rows of the pgvector table

use serde::{Deserialize, Serialize};

/// Node type carried by every chunk cut from page text
pub const PAGE_TEXT_TYPE: &str = "page_text";

/// A bounded span of page text plus metadata; the unit that is embedded and
/// stored. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{pageNodeId}_chunk{index}`
    pub chunk_id: String,

    pub chunk_text: String,

    /// Every placeholder of the parent page, not only those in this chunk
    pub placeholder: Vec<String>,

    pub page_num: i32,

    #[serde(rename = "type")]
    pub chunk_type: String,

    pub report_date: Option<String>,
}

impl Chunk {
    /// Placeholder list in the text form stored in the `placeholder` column
    pub fn placeholder_column(&self) -> String {
        format!("{{{}}}", self.placeholder.join(","))
    }
}

/// A row returned by similarity search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedRow {
    pub id: String,
    pub content: String,
    pub report_date: Option<String>,
    pub placeholder: Option<String>,
    /// `1 - distance`
    pub similarity: f64,
}

impl RetrievedRow {
    /// Placeholders stored on this row
    pub fn placeholders(&self) -> Vec<String> {
        self.placeholder
            .as_deref()
            .map(parse_placeholders)
            .unwrap_or_default()
    }
}

/// Parse a stored placeholder column back into a list.
///
/// Accepts the comma-joined form, optionally wrapped in braces as Postgres
/// renders arrays cast to text, with optionally quoted elements.
pub fn parse_placeholders(column: &str) -> Vec<String> {
    column
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(|p| p.trim().trim_matches('"').trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Format an embedding as a pgvector literal: `[1,2.5,3]`
pub fn format_embedding(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_column_roundtrip() {
        let chunk = Chunk {
            chunk_id: "TrendForceAug2022_page3_chunk0".into(),
            chunk_text: "text".into(),
            placeholder: vec![
                "[TrendForceAug2022_Chart1_Page3]".into(),
                "[TrendForceAug2022_Table1_Page3]".into(),
            ],
            page_num: 3,
            chunk_type: PAGE_TEXT_TYPE.into(),
            report_date: Some("2022-08".into()),
        };

        let column = chunk.placeholder_column();
        assert_eq!(
            column,
            "{[TrendForceAug2022_Chart1_Page3],[TrendForceAug2022_Table1_Page3]}"
        );
        assert_eq!(parse_placeholders(&column), chunk.placeholder);
    }

    #[test]
    fn test_parse_quoted_and_plain() {
        assert_eq!(
            parse_placeholders(r#"{"[A_Chart1_Page1]", [A_Table2_Page1]}"#),
            vec!["[A_Chart1_Page1]", "[A_Table2_Page1]"]
        );
        assert_eq!(parse_placeholders("[A_Chart1_Page1]"), vec!["[A_Chart1_Page1]"]);
        assert!(parse_placeholders("{}").is_empty());
    }

    #[test]
    fn test_embedding_format() {
        assert_eq!(format_embedding(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
    }

    #[test]
    fn test_chunk_serializes_type_field() {
        let chunk = Chunk {
            chunk_id: "a_page1_chunk0".into(),
            chunk_text: "x".into(),
            placeholder: vec![],
            page_num: 1,
            chunk_type: PAGE_TEXT_TYPE.into(),
            report_date: None,
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["type"], "page_text");
    }
}
