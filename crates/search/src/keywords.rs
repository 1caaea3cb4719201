//! Keyword extraction and document matching

use reportrag_common::LanguageModel;
use tracing::{debug, warn};

const KEYWORD_PROMPT: &str = "\
Extract the company or document names mentioned in this query.
Return only the names as a comma-separated list.
Example: 'Edgewater and TrendForce data' -> Edgewater, TrendForce
Query: ";

/// Prompt asking the LLM for the names mentioned in `query`
pub fn keyword_prompt(query: &str) -> String {
    format!("{}{}", KEYWORD_PROMPT, query)
}

/// Company or document names mentioned in a query.
///
/// When the LLM fails or answers with nothing, the query itself is the
/// only keyword.
pub async fn extract_keywords(llm: &dyn LanguageModel, query: &str) -> Vec<String> {
    let raw = match llm.generate(&keyword_prompt(query)).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            debug!("Empty keyword answer, using query");
            query.to_string()
        }
        Err(e) => {
            warn!(error = %e, "Keyword extraction failed, using query");
            query.to_string()
        }
    };

    split_keywords(&raw)
}

/// Split on commas and newlines, trim, drop empties and duplicates
pub fn split_keywords(raw: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for kw in raw.split([',', '\n']).map(str::trim) {
        if !kw.is_empty() && !keywords.iter().any(|k| k == kw) {
            keywords.push(kw.to_string());
        }
    }
    keywords
}

/// Ids containing any keyword, case-insensitively, in id order
pub fn match_documents(keywords: &[String], ids: &[String]) -> Vec<String> {
    let lowered: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();

    let mut matched: Vec<String> = ids
        .iter()
        .filter(|id| {
            let id = id.to_lowercase();
            lowered.iter().any(|kw| id.contains(kw.as_str()))
        })
        .cloned()
        .collect();
    matched.dedup();
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reportrag_common::llm::MockLanguageModel;
    use reportrag_common::{AppError, Result};

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(AppError::llm("unavailable"))
        }

        async fn generate_with_image(&self, _prompt: &str, _png: &[u8]) -> Result<String> {
            Err(AppError::llm("unavailable"))
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_prompt_ends_with_query() {
        let prompt = keyword_prompt("Edgewater NAND outlook");
        assert!(prompt.starts_with("Extract the company or document names"));
        assert!(prompt.ends_with("Query: Edgewater NAND outlook"));
    }

    #[test]
    fn test_split_trims_and_dedupes() {
        assert_eq!(
            split_keywords(" Edgewater, TrendForce\nEdgewater ,, "),
            vec!["Edgewater", "TrendForce"]
        );
    }

    #[tokio::test]
    async fn test_llm_answer_split() {
        let llm = MockLanguageModel::new("Edgewater, TrendForce");
        let keywords = extract_keywords(&llm, "Edgewater and TrendForce data").await;
        assert_eq!(keywords, vec!["Edgewater", "TrendForce"]);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_query() {
        let keywords = extract_keywords(&FailingModel, "DRAM prices, Aug 2022").await;
        assert_eq!(keywords, vec!["DRAM prices", "Aug 2022"]);
    }

    #[tokio::test]
    async fn test_empty_answer_falls_back_to_query() {
        let llm = MockLanguageModel::new("  \n ");
        let keywords = extract_keywords(&llm, "TrendForce").await;
        assert_eq!(keywords, vec!["TrendForce"]);
    }

    #[test]
    fn test_match_is_case_insensitive_union() {
        let ids = vec![
            "TrendForceServerDRAMAug2022_page1_chunk0".to_string(),
            "EdgewaterNANDC1Q23_page2_chunk0".to_string(),
            "OtherReport_page1_chunk0".to_string(),
        ];
        let keywords = vec!["trendforce".to_string(), "EDGEWATER".to_string()];
        assert_eq!(
            match_documents(&keywords, &ids),
            vec![
                "TrendForceServerDRAMAug2022_page1_chunk0",
                "EdgewaterNANDC1Q23_page2_chunk0"
            ]
        );
        assert!(match_documents(&["Micron".to_string()], &ids).is_empty());
    }
}
