//! Removal of duplicate and nested detections

use crate::geometry::{iou, is_contained, BBox};
use std::cmp::Ordering;

/// A detected region awaiting deduplication, carrying its crop or any
/// other payload along
#[derive(Debug, Clone)]
pub struct Candidate<T> {
    pub payload: T,
    pub confidence: f32,
    pub bbox: BBox,
}

/// Keeps the largest set of regions that neither overlap too much nor sit
/// inside an already kept region.
#[derive(Debug, Clone, Copy)]
pub struct RegionDeduplicator {
    pub iou_threshold: f32,
    pub containment_tolerance: f32,
}

impl Default for RegionDeduplicator {
    fn default() -> Self {
        Self {
            iou_threshold: 0.7,
            containment_tolerance: 0.95,
        }
    }
}

impl RegionDeduplicator {
    pub fn new(iou_threshold: f32, containment_tolerance: f32) -> Self {
        Self {
            iou_threshold,
            containment_tolerance,
        }
    }

    /// Returns the survivors in keep order, largest first. Ties in area keep
    /// their input order.
    pub fn deduplicate<T>(&self, mut candidates: Vec<Candidate<T>>) -> Vec<Candidate<T>> {
        candidates.sort_by(|a, b| {
            b.bbox
                .area()
                .partial_cmp(&a.bbox.area())
                .unwrap_or(Ordering::Equal)
        });

        let mut kept: Vec<Candidate<T>> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let rejected = kept.iter().any(|k| {
                iou(&candidate.bbox, &k.bbox) > self.iou_threshold
                    || is_contained(&candidate.bbox, &k.bbox, self.containment_tolerance)
            });
            if !rejected {
                kept.push(candidate);
            }
        }
        kept
    }
}
