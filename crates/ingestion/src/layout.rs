//! Chart and table region extraction for one rendered page
//!
//! Detections are bucketed into figures, tables and their captions. Each
//! figure/table absorbs the captions sitting just above or below it, is
//! padded, cropped and (figures only) classified. Survivors are
//! deduplicated and named with document-unique placeholders. Charts are
//! deduplicated on their unpadded box, tables on the padded one.

use crate::dedup::{Candidate, RegionDeduplicator};
use crate::geometry::BBox;
use crate::oracles::{Classifier, Detection, Detector};
use image::{imageops, RgbImage};
use reportrag_common::config::LayoutConfig;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Detector classes the pipeline cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionClass {
    Figure,
    FigureCaption,
    Table,
    TableCaption,
}

/// A detection that survived class bucketing and the confidence cut
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub bbox: BBox,
    pub confidence: f32,
    pub class: RegionClass,
}

/// What an emitted region holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Chart,
    Table,
}

impl RegionKind {
    /// Label used inside placeholders
    pub fn label(&self) -> &'static str {
        match self {
            RegionKind::Chart => "Chart",
            RegionKind::Table => "Table",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Chart => write!(f, "chart"),
            RegionKind::Table => write!(f, "table"),
        }
    }
}

/// A chart or table region with its crop, ready for summarization
#[derive(Debug, Clone)]
pub struct MergedNode {
    pub bbox: BBox,
    pub confidence: f32,
    pub kind: RegionKind,
    pub placeholder: String,
    pub page_num: u32,
    pub image: RgbImage,
}

/// Placeholder position on a page, in rendered pixels
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlaceholder {
    pub placeholder: String,
    pub bbox: BBox,
}

/// Page number to placeholders in detection order
pub type PagePlaceholders = BTreeMap<u32, Vec<PagePlaceholder>>;

/// `[{doc}_{Kind}{ordinal}_Page{page}]`, ordinal 1-based
pub fn placeholder(doc_name: &str, kind: RegionKind, ordinal: usize, page_num: u32) -> String {
    format!("[{}_{}{}_Page{}]", doc_name, kind.label(), ordinal, page_num)
}

/// Runs detection and classification over rendered pages
pub struct LayoutExtractor {
    detector: Arc<dyn Detector>,
    classifier: Arc<dyn Classifier>,
    config: LayoutConfig,
    dedup: RegionDeduplicator,
}

impl LayoutExtractor {
    pub fn new(
        detector: Arc<dyn Detector>,
        classifier: Arc<dyn Classifier>,
        config: LayoutConfig,
    ) -> Self {
        let dedup = RegionDeduplicator::new(config.iou_threshold, config.containment_tolerance);
        Self {
            detector,
            classifier,
            config,
            dedup,
        }
    }

    /// Extract the chart and table regions of one page image.
    ///
    /// Charts come first, then tables, each in dedup keep order. A page with
    /// no detections yields no nodes.
    #[instrument(skip(self, image), fields(doc = %doc_name, page = page_num))]
    pub async fn extract_page(
        &self,
        doc_name: &str,
        page_num: u32,
        image: &RgbImage,
    ) -> reportrag_common::Result<Vec<MergedNode>> {
        let detections = self.detector.detect(image).await?;
        let regions = self.bucket(detections);

        let figures = of_class(&regions, RegionClass::Figure);
        let figure_captions = of_class(&regions, RegionClass::FigureCaption);
        let tables = of_class(&regions, RegionClass::Table);
        let table_captions = of_class(&regions, RegionClass::TableCaption);

        let (max_w, max_h) = (image.width() as f32, image.height() as f32);

        let mut chart_candidates = Vec::new();
        for figure in figures {
            let merged = merge_captions(&figure.bbox, &figure_captions, self.config.caption_gap_px);
            let padded = merged.pad(self.config.padding_ratio, false, max_w, max_h);
            let Some(crop) = crop_region(image, &padded) else {
                debug!(?padded, "Skipping empty figure crop");
                continue;
            };

            let class = self.classifier.classify(&crop).await?;
            if class.class_id == self.config.chart_label
                && class.confidence >= self.config.chart_min_confidence
            {
                // charts keep the unpadded box; padding only widens the crop
                chart_candidates.push(Candidate {
                    payload: crop,
                    confidence: figure.confidence,
                    bbox: merged,
                });
            }
        }

        let mut table_candidates = Vec::new();
        for table in tables {
            let merged = merge_captions(&table.bbox, &table_captions, self.config.caption_gap_px);
            let padded = merged.pad(self.config.padding_ratio, true, max_w, max_h);
            let Some(crop) = crop_region(image, &padded) else {
                debug!(?padded, "Skipping empty table crop");
                continue;
            };
            table_candidates.push(Candidate {
                payload: crop,
                confidence: table.confidence,
                bbox: padded,
            });
        }

        let mut nodes = Vec::new();
        for (kind, candidates) in [
            (RegionKind::Chart, chart_candidates),
            (RegionKind::Table, table_candidates),
        ] {
            for (idx, kept) in self.dedup.deduplicate(candidates).into_iter().enumerate() {
                nodes.push(MergedNode {
                    bbox: kept.bbox,
                    confidence: kept.confidence,
                    kind,
                    placeholder: placeholder(doc_name, kind, idx + 1, page_num),
                    page_num,
                    image: kept.payload,
                });
            }
        }

        debug!(regions = nodes.len(), "Page layout extracted");
        Ok(nodes)
    }

    fn bucket(&self, detections: Vec<Detection>) -> Vec<Region> {
        detections
            .into_iter()
            .filter(|d| d.confidence >= self.config.confidence_threshold)
            .filter_map(|d| {
                let class = match d.class_id {
                    c if c == self.config.figure_class => RegionClass::Figure,
                    c if c == self.config.figure_caption_class => RegionClass::FigureCaption,
                    c if c == self.config.table_class => RegionClass::Table,
                    c if c == self.config.table_caption_class => RegionClass::TableCaption,
                    _ => return None,
                };
                Some(Region {
                    bbox: d.bbox,
                    confidence: d.confidence,
                    class,
                })
            })
            .collect()
    }
}

/// Placeholder positions of a page's nodes, in node order
pub fn page_placeholders(nodes: &[MergedNode]) -> Vec<PagePlaceholder> {
    nodes
        .iter()
        .map(|n| PagePlaceholder {
            placeholder: n.placeholder.clone(),
            bbox: n.bbox,
        })
        .collect()
}

fn of_class(regions: &[Region], class: RegionClass) -> Vec<Region> {
    regions.iter().filter(|r| r.class == class).cloned().collect()
}

/// Union `target` with every caption whose top sits within `gap` of the
/// target's bottom, or whose bottom sits within `gap` of the target's top.
/// Gaps are measured against the original target box.
fn merge_captions(target: &BBox, captions: &[Region], gap: f32) -> BBox {
    captions
        .iter()
        .filter(|cap| (cap.bbox.y1 - target.y2).abs() < gap || (target.y1 - cap.bbox.y2).abs() < gap)
        .fold(*target, |merged, cap| merged.union(&cap.bbox))
}

fn crop_region(image: &RgbImage, bbox: &BBox) -> Option<RgbImage> {
    let x1 = (bbox.x1.max(0.0) as u32).min(image.width());
    let y1 = (bbox.y1.max(0.0) as u32).min(image.height());
    let x2 = (bbox.x2.max(0.0) as u32).min(image.width());
    let y2 = (bbox.y2.max(0.0) as u32).min(image.height());

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image())
}
