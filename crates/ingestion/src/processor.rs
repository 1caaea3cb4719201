//! Ingestion processor
//!
//! Per document: render and lay out every page, interleave the text layer
//! with placeholders, build page nodes, summarize regions, merge and chunk.
//! Then all chunks of the run are embedded and inserted in one transaction.

use crate::chunker::{merge_summaries, ChunkBuilder};
use crate::errors::{IngestionError, Result};
use crate::interleave::TextInterleaver;
use crate::layout::{page_placeholders, LayoutExtractor, PagePlaceholders};
use crate::pages::{build_page_nodes, sanitize_doc_name};
use crate::pdf::{PageRasterizer, TextLayer};
use crate::summarizer::Summarizer;
use reportrag_common::db::models::Chunk;
use reportrag_common::errors::AppError;
use reportrag_common::report_date::extract_report_date_from_filename;
use reportrag_common::{metrics, ChunkStore, Embedder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// What one document produced before embedding
#[derive(Debug, Clone)]
pub struct DocumentChunks {
    pub doc_name: String,
    pub report_date: Option<String>,
    pub page_count: usize,
    pub region_count: usize,
    pub chunks: Vec<Chunk>,
}

/// Totals of a directory run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionReport {
    pub documents: usize,
    pub pages: usize,
    pub regions: usize,
    pub chunks_inserted: usize,
    /// Files skipped after an error
    pub failed: Vec<PathBuf>,
}

/// External collaborators of the pipeline
pub struct IngestionDeps {
    pub text_layer: Arc<dyn TextLayer>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub layout: LayoutExtractor,
    pub summarizer: Summarizer,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn ChunkStore>,
}

/// Ingestion processor
pub struct IngestionProcessor {
    deps: IngestionDeps,
    interleaver: TextInterleaver,
    chunker: ChunkBuilder,
    render_scale: f32,
}

impl IngestionProcessor {
    pub fn new(
        deps: IngestionDeps,
        interleaver: TextInterleaver,
        chunker: ChunkBuilder,
    ) -> Self {
        let render_scale = interleaver.render_scale;
        Self {
            deps,
            interleaver,
            chunker,
            render_scale,
        }
    }

    /// Extract, summarize and chunk one PDF
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn process_document(&self, path: &Path) -> Result<DocumentChunks> {
        if !path.exists() {
            return Err(IngestionError::FileNotFound(path.display().to_string()));
        }

        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let doc_name = sanitize_doc_name(&stem);
        let report_date = extract_report_date_from_filename(&file_name);

        info!(doc = %doc_name, report_date = ?report_date, "Processing PDF");

        let pages = self.deps.text_layer.extract_words(path)?;

        let mut placeholders = PagePlaceholders::new();
        let mut regions = Vec::new();
        for page_num in 1..=pages.len() as u32 {
            let image = self
                .deps
                .rasterizer
                .render_page(path, page_num, self.render_scale)?;
            let nodes = self
                .deps
                .layout
                .extract_page(&doc_name, page_num, &image)
                .await?;
            if !nodes.is_empty() {
                placeholders.insert(page_num, page_placeholders(&nodes));
            }
            regions.extend(nodes);
        }

        info!(page_count = pages.len(), region_count = regions.len(), "Layout extracted");

        let interleaved = self.interleaver.interleave(&pages, &placeholders);
        let page_nodes = build_page_nodes(&doc_name, report_date.as_deref(), &interleaved, &placeholders);

        let summaries = self.deps.summarizer.summarize_all(&regions).await;
        let merged = merge_summaries(page_nodes, &summaries);
        let chunks = self.chunker.build_chunks(&merged);

        info!(chunk_count = chunks.len(), "Document chunked");

        Ok(DocumentChunks {
            doc_name,
            report_date,
            page_count: pages.len(),
            region_count: regions.len(),
            chunks,
        })
    }

    /// Embed chunk texts and insert the rows in one transaction
    #[instrument(skip_all, fields(chunk_count = chunks.len()))]
    pub async fn embed_and_store(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            info!("No chunks to store");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.chunk_text.clone()).collect();
        let embeddings = self.deps.embedder.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(AppError::EmbeddingMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            }
            .into());
        }

        info!(embedding_count = embeddings.len(), model = %self.deps.embedder.model_name(), "Embeddings generated");

        let inserted = self.deps.store.insert_chunks(chunks, &embeddings).await?;
        Ok(inserted)
    }

    /// Process every `*.pdf` of a directory in name order, then store all
    /// chunks. A failing document is logged and skipped.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn process_directory(&self, dir: &Path) -> Result<IngestionReport> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut paths: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
            {
                paths.push(path);
            }
        }
        paths.sort();

        info!(file_count = paths.len(), "Processing directory of PDFs");

        let mut report = IngestionReport::default();
        let mut all_chunks = Vec::new();

        for path in paths {
            let start = Instant::now();
            match self.process_document(&path).await {
                Ok(doc) => {
                    metrics::record_ingestion(
                        start.elapsed().as_secs_f64(),
                        doc.chunks.len(),
                        doc.region_count,
                    );
                    report.documents += 1;
                    report.pages += doc.page_count;
                    report.regions += doc.region_count;
                    all_chunks.extend(doc.chunks);
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to process PDF");
                    report.failed.push(path);
                }
            }
        }

        report.chunks_inserted = self.embed_and_store(&all_chunks).await?;

        info!(
            documents = report.documents,
            pages = report.pages,
            regions = report.regions,
            chunks = report.chunks_inserted,
            failed = report.failed.len(),
            "Directory processing complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use crate::oracles::{Classification, Classifier, Detection, Detector};
    use crate::pdf::Word;
    use async_trait::async_trait;
    use image::RgbImage;
    use reportrag_common::config::LayoutConfig;
    use reportrag_common::db::models::RetrievedRow;
    use reportrag_common::embeddings::MockEmbedder;
    use reportrag_common::llm::MockLanguageModel;
    use std::sync::Mutex;

    struct FixedText(Vec<Vec<Word>>);

    impl TextLayer for FixedText {
        fn extract_words(&self, _pdf: &Path) -> Result<Vec<Vec<Word>>> {
            Ok(self.0.clone())
        }
    }

    struct BlankPages;

    impl PageRasterizer for BlankPages {
        fn render_page(&self, _pdf: &Path, _page: u32, _scale: f32) -> Result<RgbImage> {
            Ok(RgbImage::new(1224, 1584))
        }
    }

    /// One table on page 1, nothing elsewhere
    struct TableOnFirstPage(Mutex<u32>);

    #[async_trait]
    impl Detector for TableOnFirstPage {
        async fn detect(&self, _image: &RgbImage) -> reportrag_common::Result<Vec<Detection>> {
            let mut calls = self.0.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                Ok(vec![Detection {
                    bbox: BBox::new(100.0, 400.0, 1100.0, 800.0),
                    confidence: 0.9,
                    class_id: 5,
                }])
            } else {
                Ok(vec![])
            }
        }
    }

    struct NeverChart;

    #[async_trait]
    impl Classifier for NeverChart {
        async fn classify(&self, _image: &RgbImage) -> reportrag_common::Result<Classification> {
            Ok(Classification {
                class_id: 1,
                confidence: 1.0,
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<(Chunk, Vec<f32>)>>,
    }

    #[async_trait]
    impl ChunkStore for MemoryStore {
        async fn insert_chunks(
            &self,
            chunks: &[Chunk],
            embeddings: &[Vec<f32>],
        ) -> reportrag_common::Result<usize> {
            let mut rows = self.rows.lock().unwrap();
            for (c, e) in chunks.iter().zip(embeddings) {
                rows.push((c.clone(), e.clone()));
            }
            Ok(chunks.len())
        }

        async fn document_ids(&self) -> reportrag_common::Result<Vec<String>> {
            Ok(self.rows.lock().unwrap().iter().map(|(c, _)| c.chunk_id.clone()).collect())
        }

        async fn similarity_search(
            &self,
            _embedding: &[f32],
        ) -> reportrag_common::Result<Vec<RetrievedRow>> {
            Ok(vec![])
        }
    }

    fn line(text: &str, block: u32, y0: f32) -> Vec<Word> {
        text.split_whitespace()
            .map(|w| Word {
                x0: 0.0,
                y0,
                x1: 10.0,
                y1: y0 + 10.0,
                text: w.to_string(),
                block,
                line: 1,
            })
            .collect()
    }

    fn processor(store: Arc<MemoryStore>) -> IngestionProcessor {
        let mut page1 = line("Server DRAM prices climbed through the quarter", 1, 100.0);
        page1.extend(line("Contract prices by vendor are summarized below", 2, 250.0));
        let page2 = line("Outlook for the next quarter remains firm overall", 1, 100.0);

        let deps = IngestionDeps {
            text_layer: Arc::new(FixedText(vec![page1, page2])),
            rasterizer: Arc::new(BlankPages),
            layout: LayoutExtractor::new(
                Arc::new(TableOnFirstPage(Mutex::new(0))),
                Arc::new(NeverChart),
                LayoutConfig::default(),
            ),
            summarizer: Summarizer::new(Arc::new(MockLanguageModel::new(
                "Table of DRAM contract prices by vendor.",
            ))),
            embedder: Arc::new(MockEmbedder::new(8)),
            store,
        };

        IngestionProcessor::new(
            deps,
            TextInterleaver::default(),
            ChunkBuilder::new(2500, 300).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_directory_run_end_to_end() {
        let dir = std::env::temp_dir().join(format!("reportrag-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("TrendForce_ServerDRAM_Aug2022.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let store = Arc::new(MemoryStore::default());
        let report = processor(store.clone()).process_directory(&dir).await.unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(report.documents, 1);
        assert_eq!(report.pages, 2);
        assert_eq!(report.regions, 1);
        assert_eq!(report.chunks_inserted, 2);
        assert!(report.failed.is_empty());

        let rows = store.rows.lock().unwrap();
        let first = &rows[0].0;
        assert_eq!(first.chunk_id, "TrendForceServerDRAMAug2022_page1_chunk0");
        assert_eq!(first.placeholder, vec!["[TrendForceServerDRAMAug2022_Table1_Page1]"]);
        assert!(first.chunk_text.starts_with(
            "Server DRAM prices climbed through the quarter\nContract prices by vendor are summarized below"
        ));
        assert!(!first.chunk_text.contains("[TrendForceServerDRAMAug2022_Table1_Page1]"));
        assert!(first.chunk_text.ends_with("\n\nTable of DRAM contract prices by vendor."));
        assert_eq!(rows[0].1.len(), 8);

        for (chunk, _) in rows.iter() {
            assert_eq!(chunk.report_date.as_deref(), Some("2022-08"));
        }
        assert!(rows[1].0.placeholder.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let store = Arc::new(MemoryStore::default());
        let err = processor(store)
            .process_document(Path::new("/nonexistent/report.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestionError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_directory_errors() {
        let store = Arc::new(MemoryStore::default());
        let result = processor(store)
            .process_directory(Path::new("/nonexistent/reportrag-pdfs"))
            .await;
        assert!(matches!(result, Err(IngestionError::IoError(_))));
    }

    #[tokio::test]
    async fn test_dropping_processor_releases_store() {
        let store = Arc::new(MemoryStore::default());
        let processor = processor(store.clone());
        processor.embed_and_store(&[]).await.unwrap();
        drop(processor);
        assert!(Arc::try_unwrap(store).is_ok());
    }

    #[tokio::test]
    async fn test_nothing_to_store() {
        let store = Arc::new(MemoryStore::default());
        assert_eq!(processor(store).embed_and_store(&[]).await.unwrap(), 0);
    }
}
