//! Utility functions for image processing and box geometry.

pub mod image_conversion;
pub mod safe_cast;

use crate::{Error, Result};
use opencv::core::Rect;
use safe_cast::f32_to_i32_clamp;
use std::path::Path;

/// Fail with `ModelError` before ONNX Runtime is touched when a model file is missing
///
/// # Errors
///
/// Returns `ModelError` if `path` is not an existing file
pub fn ensure_model_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::ModelError(format!("Model file not found: {}", path.display())))
    }
}

/// Expand a face box by `shift` of its size on every side, square it and keep
/// it inside a `max_width` x `max_height` image.
///
/// Landmark regressors are trained on square crops with some margin around
/// the detector box.
#[allow(clippy::cast_precision_loss)] // Precision loss acceptable for box dimensions
#[must_use]
pub fn refine_box(bbox: Rect, max_width: i32, max_height: i32, shift: f32) -> Rect {
    let x_shift = f32_to_i32_clamp(bbox.width as f32 * shift, 0, max_width);
    let y_shift = f32_to_i32_clamp(bbox.height as f32 * shift, 0, max_height);

    let x = (bbox.x - x_shift).max(0);
    let y = (bbox.y - y_shift).max(0);
    let width = (bbox.width + 2 * x_shift).min(max_width - x);
    let height = (bbox.height + 2 * y_shift).min(max_height - y);

    let side = width.max(height).min(max_width).min(max_height).max(0);
    let x = x.min(max_width - side).max(0);
    let y = y.min(max_height - side).max(0);

    Rect::new(x, y, side, side)
}

/// Intersection over union of two `[x1, y1, x2, y2]` boxes
#[must_use]
pub fn iou(a: [f32; 4], b: [f32; 4]) -> f32 {
    let area = |r: [f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);

    let w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = w * h;
    let union = area(a) + area(b) - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy non-maximum suppression.
///
/// Returns indices into `boxes`, highest score first. A box is dropped when
/// its IoU with an already kept box exceeds `iou_threshold`.
#[must_use]
pub fn non_max_suppression(boxes: &[[f32; 4]], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep: Vec<usize> = Vec::new();
    for idx in order {
        if keep.iter().all(|&k| iou(boxes[k], boxes[idx]) <= iou_threshold) {
            keep.push(idx);
        }
    }
    keep
}

/// Convert a `[x1, y1, x2, y2]` box to an integer `Rect`
#[must_use]
pub fn corners_to_rect(b: [f32; 4]) -> Rect {
    let x = f32_to_i32_clamp(b[0].round(), i32::MIN / 2, i32::MAX / 2);
    let y = f32_to_i32_clamp(b[1].round(), i32::MIN / 2, i32::MAX / 2);
    let w = f32_to_i32_clamp((b[2] - b[0]).round(), 0, i32::MAX / 2);
    let h = f32_to_i32_clamp((b[3] - b[1]).round(), 0, i32::MAX / 2);
    Rect::new(x, y, w, h)
}
