//! Query pipeline: dates, keywords, retrieval, figures, answer

use crate::figures::{match_figures, FigureNode};
use crate::keywords::{extract_keywords, match_documents};
use crate::prompt::build_prompt;
use crate::retrieval::{FallbackDecider, RetrievalFilter};
use reportrag_common::report_date::DateRequest;
use reportrag_common::{ChunkStore, LanguageModel, Result};
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Answer given when the pipeline cannot produce one
pub const UNAVAILABLE_ANSWER: &str = "Sorry, I cannot process your request right now.";

pub struct QueryPipeline {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn ChunkStore>,
    figures: Vec<FigureNode>,
    filter: RetrievalFilter,
    decider: Arc<dyn FallbackDecider>,
}

impl QueryPipeline {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn ChunkStore>,
        figures: Vec<FigureNode>,
        filter: RetrievalFilter,
        decider: Arc<dyn FallbackDecider>,
    ) -> Self {
        Self {
            llm,
            store,
            figures,
            filter,
            decider,
        }
    }

    /// Answer a query whose embedding is already computed.
    ///
    /// Any failure is logged and answered with [`UNAVAILABLE_ANSWER`].
    pub async fn run(&self, query: &str, embedding: &[f32]) -> String {
        match self.answer(query, embedding).await {
            Ok(answer) => answer,
            Err(e) => {
                error!(error = %e, code = ?e.code(), "Query pipeline failed");
                UNAVAILABLE_ANSWER.to_string()
            }
        }
    }

    #[instrument(skip(self, embedding), fields(dimension = embedding.len()))]
    async fn answer(&self, query: &str, embedding: &[f32]) -> Result<String> {
        let dates = DateRequest::from_query(query);
        info!(report_dates = ?dates.as_strings(), "Report dates extracted");

        let keywords = extract_keywords(self.llm.as_ref(), query).await;
        let available = self.store.document_ids().await?;
        let matched = match_documents(&keywords, &available);
        info!(keywords = ?keywords, matched_docs = matched.len(), "Documents matched");

        let outcome = self
            .filter
            .retrieve(
                self.store.as_ref(),
                embedding,
                &dates,
                &matched,
                self.decider.as_ref(),
            )
            .await?;

        let figures = match_figures(&outcome.rows, &self.figures);
        let prompt = build_prompt(query, &outcome.rows, &figures)?;
        info!(
            chunks = outcome.rows.len(),
            figures = figures.len(),
            prompt_len = prompt.len(),
            "Prompt assembled"
        );

        let answer = self.llm.generate(&prompt).await?;
        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RejectFallback;
    use async_trait::async_trait;
    use reportrag_common::db::models::{Chunk, RetrievedRow};
    use reportrag_common::AppError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers keyword prompts with a fixed list, everything else with a
    /// canned answer, and keeps every prompt
    struct ScriptedModel {
        keywords: String,
        answer: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(keywords: &str, answer: Option<&str>) -> Self {
            Self {
                keywords: keywords.to_string(),
                answer: answer.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if prompt.starts_with("Extract the company") {
                return Ok(self.keywords.clone());
            }
            self.answer
                .clone()
                .ok_or_else(|| AppError::llm("quota exceeded"))
        }

        async fn generate_with_image(&self, _prompt: &str, _png: &[u8]) -> Result<String> {
            Err(AppError::llm("not used"))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct RankedStore(Vec<RetrievedRow>);

    #[async_trait]
    impl ChunkStore for RankedStore {
        async fn insert_chunks(&self, _chunks: &[Chunk], _embeddings: &[Vec<f32>]) -> Result<usize> {
            Ok(0)
        }

        async fn document_ids(&self) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|r| r.id.clone()).collect())
        }

        async fn similarity_search(&self, _embedding: &[f32]) -> Result<Vec<RetrievedRow>> {
            Ok(self.0.clone())
        }
    }

    fn rows() -> Vec<RetrievedRow> {
        vec![
            RetrievedRow {
                id: "TrendForceServerDRAMAug2022_page3_chunk0".into(),
                content: "Server DRAM prices fell 10% in Q3".into(),
                report_date: Some("2022-08".into()),
                placeholder: Some("{[TrendForceServerDRAMAug2022_Chart1_Page3]}".into()),
                similarity: 0.81,
            },
            RetrievedRow {
                id: "EdgewaterNANDJul2022_page1_chunk0".into(),
                content: "NAND demand weakened".into(),
                report_date: Some("2022-07".into()),
                placeholder: Some("{}".into()),
                similarity: 0.77,
            },
        ]
    }

    fn figures() -> Vec<FigureNode> {
        vec![FigureNode {
            placeholder: "[TrendForceServerDRAMAug2022_Chart1_Page3]".into(),
            figures: vec![json!({"title": "Server DRAM ASP"})],
        }]
    }

    #[tokio::test]
    async fn test_full_query_path() {
        let llm = Arc::new(ScriptedModel::new("TrendForce", Some("  | Q3 | -10% |  ")));
        let pipeline = QueryPipeline::new(
            llm.clone(),
            Arc::new(RankedStore(rows())),
            figures(),
            RetrievalFilter::default(),
            Arc::new(RejectFallback),
        );

        let answer = pipeline
            .run("How did TrendForce see server DRAM in Aug 2022?", &[0.0; 4])
            .await;
        assert_eq!(answer, "| Q3 | -10% |");

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        let answer_prompt = &prompts[1];
        assert!(answer_prompt.contains("TrendForceServerDRAMAug2022_page3_chunk0"));
        assert!(!answer_prompt.contains("EdgewaterNANDJul2022_page1_chunk0"));
        assert!(answer_prompt.contains("Server DRAM ASP"));
        assert!(answer_prompt.ends_with("Question: How did TrendForce see server DRAM in Aug 2022?\n"));
    }

    #[tokio::test]
    async fn test_llm_failure_gives_fixed_answer() {
        let pipeline = QueryPipeline::new(
            Arc::new(ScriptedModel::new("TrendForce", None)),
            Arc::new(RankedStore(rows())),
            Vec::new(),
            RetrievalFilter::default(),
            Arc::new(RejectFallback),
        );

        let answer = pipeline.run("TrendForce outlook", &[0.0; 4]).await;
        assert_eq!(answer, UNAVAILABLE_ANSWER);
    }
}
