//! Retrieval filtering over vector search results
//!
//! Similarity search always returns every stored chunk ordered by distance.
//! Filtering happens here, in a fixed order:
//! - report date (explicit periods, or the latest period present)
//! - matched documents
//! - similarity threshold, with an interactive fallback when nothing passes

use reportrag_common::db::models::RetrievedRow;
use reportrag_common::metrics::record_retrieval;
use reportrag_common::report_date::{DateRequest, ReportPeriod};
use reportrag_common::{ChunkStore, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Answer of a [`FallbackDecider`] when no row reaches the threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FallbackChoice {
    /// Use the best row alone
    Accept,
    /// Re-filter the candidates with this threshold
    NewThreshold(f64),
    /// Give up: empty result
    Reject,
}

/// Asked once per retrieval when candidates exist but none passes the
/// threshold
pub trait FallbackDecider: Send + Sync {
    fn decide(&self, best: &RetrievedRow, threshold: f64) -> FallbackChoice;
}

/// Decider that always rejects, for non-interactive runs
pub struct RejectFallback;

impl FallbackDecider for RejectFallback {
    fn decide(&self, _best: &RetrievedRow, _threshold: f64) -> FallbackChoice {
        FallbackChoice::Reject
    }
}

/// Rows kept by a retrieval and how they were obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    pub rows: Vec<RetrievedRow>,
    /// Threshold the rows were finally filtered with
    pub applied_threshold: f64,
    pub was_fallback: bool,
}

impl RetrievalOutcome {
    /// Metric label for this outcome
    pub fn label(&self) -> &'static str {
        match (self.rows.is_empty(), self.was_fallback) {
            (true, _) => "empty",
            (false, true) => "fallback",
            (false, false) => "matched",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalFilter {
    pub threshold: f64,
}

impl Default for RetrievalFilter {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl RetrievalFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Search the store and filter the ranked rows
    #[instrument(skip_all, fields(matched_docs = matched_ids.len(), threshold = self.threshold))]
    pub async fn retrieve(
        &self,
        store: &dyn ChunkStore,
        embedding: &[f32],
        dates: &DateRequest,
        matched_ids: &[String],
        decider: &dyn FallbackDecider,
    ) -> Result<RetrievalOutcome> {
        let start = Instant::now();

        let rows = store.similarity_search(embedding).await?;
        let outcome = self.apply(rows, dates, matched_ids, decider);

        record_retrieval(start.elapsed().as_secs_f64(), outcome.label());
        info!(
            rows = outcome.rows.len(),
            applied_threshold = outcome.applied_threshold,
            was_fallback = outcome.was_fallback,
            "Retrieval complete"
        );

        Ok(outcome)
    }

    /// Date, document and threshold filters over ranked rows
    pub fn apply(
        &self,
        rows: Vec<RetrievedRow>,
        dates: &DateRequest,
        matched_ids: &[String],
        decider: &dyn FallbackDecider,
    ) -> RetrievalOutcome {
        let dated = filter_by_date(rows, dates);
        let candidates = filter_by_documents(dated, matched_ids);
        debug!(candidates = candidates.len(), "Date and document filters applied");

        let passing = above_threshold(&candidates, self.threshold);
        if !passing.is_empty() || candidates.is_empty() {
            return RetrievalOutcome {
                rows: passing,
                applied_threshold: self.threshold,
                was_fallback: false,
            };
        }

        let Some(best) = best_row(&candidates) else {
            return RetrievalOutcome {
                rows: Vec::new(),
                applied_threshold: self.threshold,
                was_fallback: false,
            };
        };

        warn!(
            threshold = self.threshold,
            best_similarity = best.similarity,
            best_id = %best.id,
            "No chunk meets the similarity threshold"
        );

        match decider.decide(best, self.threshold) {
            FallbackChoice::Accept => RetrievalOutcome {
                applied_threshold: best.similarity,
                rows: vec![best.clone()],
                was_fallback: true,
            },
            FallbackChoice::NewThreshold(threshold) => RetrievalOutcome {
                rows: above_threshold(&candidates, threshold),
                applied_threshold: threshold,
                was_fallback: true,
            },
            FallbackChoice::Reject => RetrievalOutcome {
                rows: Vec::new(),
                applied_threshold: self.threshold,
                was_fallback: true,
            },
        }
    }
}

/// Keep rows dated in the explicit set, or rows of the latest period.
///
/// Latest is decided on [`ReportPeriod`] so months and quarters compare;
/// when no row carries a usable date every row passes.
pub fn filter_by_date(rows: Vec<RetrievedRow>, dates: &DateRequest) -> Vec<RetrievedRow> {
    match dates {
        DateRequest::Explicit(set) => rows
            .into_iter()
            .filter(|r| r.report_date.as_ref().is_some_and(|d| set.contains(d)))
            .collect(),
        DateRequest::Latest => {
            let latest = rows.iter().filter_map(row_period).max();
            match latest {
                Some(latest) => rows
                    .into_iter()
                    .filter(|r| row_period(r) == Some(latest))
                    .collect(),
                None => rows,
            }
        }
    }
}

/// Keep rows whose id is matched; no matches keeps everything
pub fn filter_by_documents(rows: Vec<RetrievedRow>, matched_ids: &[String]) -> Vec<RetrievedRow> {
    if matched_ids.is_empty() {
        return rows;
    }
    rows.into_iter()
        .filter(|r| matched_ids.contains(&r.id))
        .collect()
}

fn above_threshold(rows: &[RetrievedRow], threshold: f64) -> Vec<RetrievedRow> {
    rows.iter()
        .filter(|r| r.similarity >= threshold)
        .cloned()
        .collect()
}

fn best_row(rows: &[RetrievedRow]) -> Option<&RetrievedRow> {
    rows.iter()
        .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
}

fn row_period(row: &RetrievedRow) -> Option<ReportPeriod> {
    row.report_date.as_deref().and_then(ReportPeriod::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reportrag_common::db::models::Chunk;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn row(id: &str, date: Option<&str>, similarity: f64) -> RetrievedRow {
        RetrievedRow {
            id: id.to_string(),
            content: format!("content of {}", id),
            report_date: date.map(str::to_string),
            placeholder: None,
            similarity,
        }
    }

    fn ids(rows: &[RetrievedRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    fn explicit(dates: &[&str]) -> DateRequest {
        DateRequest::Explicit(dates.iter().map(|d| d.to_string()).collect::<BTreeSet<_>>())
    }

    /// Replays one choice and records what it was shown
    struct ScriptedDecider {
        choice: FallbackChoice,
        seen: Mutex<Vec<(String, f64)>>,
    }

    impl ScriptedDecider {
        fn new(choice: FallbackChoice) -> Self {
            Self {
                choice,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl FallbackDecider for ScriptedDecider {
        fn decide(&self, best: &RetrievedRow, threshold: f64) -> FallbackChoice {
            self.seen.lock().unwrap().push((best.id.clone(), threshold));
            self.choice
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

    #[test]
    fn test_latest_keeps_only_max_period() {
        let rows = vec![
            row("a", Some("2024-01"), 0.9),
            row("b", Some("2024-03"), 0.8),
            row("c", None, 0.95),
            row("d", Some("2024-03"), 0.6),
        ];
        let kept = filter_by_date(rows, &DateRequest::Latest);
        assert_eq!(ids(&kept), vec!["b", "d"]);
    }

    #[test]
    fn test_latest_compares_quarters_with_months() {
        let rows = vec![
            row("month", Some("2023-11"), 0.9),
            row("quarter", Some("2023-Q4"), 0.9),
            row("older", Some("2023-Q3"), 0.9),
        ];
        // Q4 ends in December, after November
        let kept = filter_by_date(rows, &DateRequest::Latest);
        assert_eq!(ids(&kept), vec!["quarter"]);
    }

    #[test]
    fn test_latest_without_dates_passes_everything() {
        let rows = vec![row("a", None, 0.9), row("b", Some("undated"), 0.8)];
        let kept = filter_by_date(rows, &DateRequest::Latest);
        assert_eq!(ids(&kept), vec!["a", "b"]);
    }

    #[test]
    fn test_explicit_dates() {
        let rows = vec![
            row("a", Some("2022-08"), 0.9),
            row("b", Some("2023-Q1"), 0.8),
            row("c", Some("2022-09"), 0.7),
            row("d", None, 0.7),
        ];
        let kept = filter_by_date(rows, &explicit(&["2022-08", "2023-Q1"]));
        assert_eq!(ids(&kept), vec!["a", "b"]);
    }

    #[test]
    fn test_document_filter() {
        let rows = vec![row("a", None, 0.9), row("b", None, 0.8)];
        assert_eq!(ids(&filter_by_documents(rows.clone(), &[])), vec!["a", "b"]);
        assert_eq!(ids(&filter_by_documents(rows, &["b".to_string()])), vec!["b"]);
    }

    #[test]
    fn test_threshold_without_fallback() {
        let decider = ScriptedDecider::new(FallbackChoice::Reject);
        let outcome = RetrievalFilter::new(0.5).apply(
            vec![row("a", None, 0.9), row("b", None, 0.5), row("c", None, 0.4)],
            &DateRequest::Latest,
            &[],
            &decider,
        );

        assert_eq!(ids(&outcome.rows), vec!["a", "b"]);
        assert_eq!(outcome.applied_threshold, 0.5);
        assert!(!outcome.was_fallback);
        assert_eq!(outcome.label(), "matched");
        assert!(decider.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fallback_accepts_best_row() {
        let decider = ScriptedDecider::new(FallbackChoice::Accept);
        let outcome = RetrievalFilter::new(0.5).apply(
            vec![row("a", None, 0.3), row("b", None, 0.42), row("c", None, 0.1)],
            &DateRequest::Latest,
            &[],
            &decider,
        );

        assert_eq!(ids(&outcome.rows), vec!["b"]);
        assert_eq!(outcome.applied_threshold, 0.42);
        assert!(outcome.was_fallback);
        assert_eq!(outcome.label(), "fallback");
        assert_eq!(
            decider.seen.lock().unwrap().as_slice(),
            &[("b".to_string(), 0.5)]
        );
    }

    #[test]
    fn test_fallback_new_threshold_refilters() {
        let decider = ScriptedDecider::new(FallbackChoice::NewThreshold(0.25));
        let outcome = RetrievalFilter::new(0.5).apply(
            vec![row("a", None, 0.3), row("b", None, 0.42), row("c", None, 0.1)],
            &DateRequest::Latest,
            &[],
            &decider,
        );

        assert_eq!(ids(&outcome.rows), vec!["a", "b"]);
        assert_eq!(outcome.applied_threshold, 0.25);
        assert!(outcome.was_fallback);
    }

    #[test]
    fn test_fallback_reject_is_empty() {
        let outcome = RetrievalFilter::new(0.5).apply(
            vec![row("a", None, 0.3)],
            &DateRequest::Latest,
            &[],
            &RejectFallback,
        );

        assert!(outcome.rows.is_empty());
        assert!(outcome.was_fallback);
        assert_eq!(outcome.label(), "empty");
    }

    #[test]
    fn test_no_candidates_skips_decider() {
        let decider = ScriptedDecider::new(FallbackChoice::Accept);
        let outcome = RetrievalFilter::default().apply(
            vec![row("a", Some("2022-08"), 0.9)],
            &explicit(&["2023-Q1"]),
            &[],
            &decider,
        );

        assert!(outcome.rows.is_empty());
        assert!(!outcome.was_fallback);
        assert!(decider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_filters_store_rows() {
        let store = RankedStore(vec![
            row("TrendForce_page1_chunk0", Some("2024-03"), 0.8),
            row("Edgewater_page1_chunk0", Some("2024-03"), 0.7),
            row("TrendForce_page2_chunk0", Some("2024-01"), 0.9),
        ]);

        let outcome = RetrievalFilter::default()
            .retrieve(
                &store,
                &[0.1, 0.2],
                &DateRequest::Latest,
                &["TrendForce_page1_chunk0".to_string(), "TrendForce_page2_chunk0".to_string()],
                &RejectFallback,
            )
            .await;

        let outcome = tokio_test::assert_ok!(outcome);
        assert_eq!(ids(&outcome.rows), vec!["TrendForce_page1_chunk0"]);
    }
}
