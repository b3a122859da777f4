//! Face rectangle normalization.
//!
//! Turns the provider's polygon annotations into axis-aligned rectangles in
//! left-to-right order. Degenerate polygons are filtered, never reported as
//! errors.

use crate::types::{RawAnnotation, Rectangle};

/// Normalize raw annotations into rectangles sorted by left edge.
///
/// Annotations without a usable coordinate on either axis are dropped. The
/// sort is stable: rectangles sharing the same `x` keep their input order.
pub fn normalize(annotations: &[RawAnnotation]) -> Vec<Rectangle> {
    let mut rects: Vec<Rectangle> = annotations
        .iter()
        .filter_map(Rectangle::from_annotation)
        .collect();

    let dropped = annotations.len() - rects.len();
    if dropped > 0 {
        tracing::debug!(
            total = annotations.len(),
            dropped,
            "normalize: discarded degenerate annotations"
        );
    }

    rects.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    rects
}
