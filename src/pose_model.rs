//! Per-face scaled 3D reference model for the pose solver.
//!
//! Coordinates: x toward the right of the image, y up, z toward the viewer,
//! nose tip at the origin and every other point behind it. The model is expressed for a face
//! that is [`MODEL_REFERENCE_WIDTH`] units wide and rescaled per frame.

use crate::{
    constants::{MODEL_REFERENCE_WIDTH, NUM_POSE_POINTS},
    landmarks::LandmarkSet,
};
use opencv::core::Point3f;

/// Reference points at unit scale, in the same order as
/// [`LandmarkSet::pose_correspondences`]
const REFERENCE_POINTS: [(f32, f32, f32); NUM_POSE_POINTS] = [
    (0.0, 0.0, 0.0),       // nose tip
    (0.0, -63.6, -12.5),   // chin
    (-43.3, 32.7, -26.0),  // left eye outer corner
    (43.3, 32.7, -26.0),   // right eye outer corner
    (-28.9, -28.9, -24.1), // left mouth corner
    (28.9, -28.9, -24.1),  // right mouth corner
];

/// Six 3D points scaled to the current face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseModel {
    points: [Point3f; NUM_POSE_POINTS],
    scale: f32,
}

impl PoseModel {
    /// Scale the reference model to the face width measured on `landmarks`.
    ///
    /// Returns `None` when the jaw corners coincide, which would collapse the
    /// model onto a single point.
    #[must_use]
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Option<Self> {
        Self::with_scale(landmarks.face_width() / MODEL_REFERENCE_WIDTH)
    }

    /// Build the model at an explicit scale factor
    #[must_use]
    pub fn with_scale(scale: f32) -> Option<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }

        let points = REFERENCE_POINTS.map(|(x, y, z)| Point3f::new(x * scale, y * scale, z * scale));
        Some(Self { points, scale })
    }

    /// Model points in correspondence order
    #[must_use]
    pub fn points(&self) -> &[Point3f; NUM_POSE_POINTS] {
        &self.points
    }

    /// Scale applied to the reference model
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }
}
