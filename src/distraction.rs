//! Object-based distraction signal.
//!
//! A detection counts as a distraction only if it passes every gate:
//! confidence, target class and box aspect ratio.

use crate::config::DistractionConfig;
use opencv::core::Rect;

/// Minimum detector confidence for a detection to count
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// Class id of the object of interest (person in COCO ordering)
pub const DEFAULT_TARGET_CLASS: usize = 0;
/// Inclusive width/height ratio band of plausible boxes
pub const DEFAULT_MIN_ASPECT_RATIO: f32 = 0.3;
pub const DEFAULT_MAX_ASPECT_RATIO: f32 = 3.0;

/// One object detector result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectDetection {
    pub bbox: Rect,
    pub confidence: f32,
    pub class_id: usize,
}

#[must_use]
pub fn passes_confidence_gate(confidence: f32, threshold: f32) -> bool {
    confidence >= threshold
}

#[must_use]
pub fn is_target_class(class_id: usize, target: usize) -> bool {
    class_id == target
}

/// Whether `width / height` of `bbox` lies in `[min_ratio, max_ratio]`.
///
/// Degenerate boxes are never plausible.
#[must_use]
pub fn has_plausible_aspect_ratio(bbox: Rect, min_ratio: f32, max_ratio: f32) -> bool {
    if bbox.width <= 0 || bbox.height <= 0 {
        return false;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = bbox.width as f32 / bbox.height as f32;
    (min_ratio..=max_ratio).contains(&ratio)
}

/// Gate applying all three predicates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistractionGate {
    pub confidence_threshold: f32,
    pub target_class: usize,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
}

impl Default for DistractionGate {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            target_class: DEFAULT_TARGET_CLASS,
            min_aspect_ratio: DEFAULT_MIN_ASPECT_RATIO,
            max_aspect_ratio: DEFAULT_MAX_ASPECT_RATIO,
        }
    }
}

impl DistractionGate {
    #[must_use]
    pub fn from_config(config: &DistractionConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            target_class: config.target_class,
            min_aspect_ratio: config.min_aspect_ratio,
            max_aspect_ratio: config.max_aspect_ratio,
        }
    }

    #[must_use]
    pub fn accepts(&self, detection: &ObjectDetection) -> bool {
        passes_confidence_gate(detection.confidence, self.confidence_threshold)
            && is_target_class(detection.class_id, self.target_class)
            && has_plausible_aspect_ratio(detection.bbox, self.min_aspect_ratio, self.max_aspect_ratio)
    }

    /// True if any detection passes the gate
    #[must_use]
    pub fn distraction_detected(&self, detections: &[ObjectDetection]) -> bool {
        let detected = detections.iter().any(|d| self.accepts(d));
        if detected {
            log::debug!("Distraction object present among {} detections", detections.len());
        }
        detected
    }
}
