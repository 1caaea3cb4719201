//! Answer prompt assembly

use reportrag_common::db::models::RetrievedRow;
use reportrag_common::Result;
use serde_json::Value;

const INSTRUCTIONS: &str = "
You are given:

1. Retrieved text chunks, with source and report_date metadata.
2. Figures in JSON format, each with its original placeholder.

Task:
For Retrieved text chunks:
- Summarize the key points from the text chunks.
- Use tables wherever possible to provide an easy understandable view.
- Display the document source
For Figures in JSON format:
- Convert figures into human-readable tables with rows/columns.
- Extract 'document source' from placeholder by stripping '_Chart/Table_PageXX'.
- Show 'report_date' alongside the document source.
- Provide short insights for each figure.
- Use only relevant figures that matches with the retrieved text chunks
- Use markdown formatting.
- Important is always have year or quarter or any time period as column headers.
";

/// Instructions, retrieved chunks and figures as indented JSON, then the
/// question
pub fn build_prompt(query: &str, rows: &[RetrievedRow], figures: &[Value]) -> Result<String> {
    let chunks = serde_json::to_string_pretty(rows)?;
    let figures = serde_json::to_string_pretty(figures)?;

    Ok(format!(
        "{INSTRUCTIONS}\n=== Retrieved Chunks ===\n{chunks}\n\n=== Figures JSON ===\n{figures}\n\nQuestion: {query}\n"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sections_in_order() {
        let rows = vec![RetrievedRow {
            id: "Doc_page1_chunk0".into(),
            content: "DRAM prices rose".into(),
            report_date: Some("2022-08".into()),
            placeholder: Some("{[Doc_Chart1_Page1]}".into()),
            similarity: 0.75,
        }];
        let figures = vec![json!({"text": "caption", "placeholder": "[Doc_Chart1_Page1]"})];

        let prompt = build_prompt("What happened to DRAM?", &rows, &figures).unwrap();

        let chunks_at = prompt.find("=== Retrieved Chunks ===").unwrap();
        let figures_at = prompt.find("=== Figures JSON ===").unwrap();
        let question_at = prompt.find("Question: What happened to DRAM?").unwrap();
        assert!(prompt.find("Task:").unwrap() < chunks_at);
        assert!(chunks_at < figures_at && figures_at < question_at);

        assert!(prompt.contains("\"id\": \"Doc_page1_chunk0\""));
        assert!(prompt.contains("\"report_date\": \"2022-08\""));
        assert!(prompt.contains("\"similarity\": 0.75"));
        assert!(prompt.contains("\"placeholder\": \"[Doc_Chart1_Page1]\""));
    }

    #[test]
    fn test_empty_inputs_render_empty_arrays() {
        let prompt = build_prompt("anything?", &[], &[]).unwrap();
        assert!(prompt.contains("=== Retrieved Chunks ===\n[]\n"));
        assert!(prompt.contains("=== Figures JSON ===\n[]\n"));
    }
}
