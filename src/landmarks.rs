//! 68-point facial landmark sets and the geometry derived from them.

use crate::{
    constants::{
        CHIN, JAW_LEFT, JAW_RIGHT, LEFT_EYE_OUTER, LEFT_EYE_RANGE, MOUTH_LEFT, MOUTH_RIGHT,
        NOSE_TIP, NUM_FACIAL_LANDMARKS, NUM_POSE_POINTS, RIGHT_EYE_OUTER, RIGHT_EYE_RANGE,
    },
    utils::safe_cast::f32_to_i32_clamp,
    Error, Result,
};
use opencv::core::{Point2f, Rect};

/// Which eye a region or observation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    /// Landmarks 36-41
    Left,
    /// Landmarks 42-47
    Right,
}

/// Exactly 68 ordered landmark points in frame pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point2f>,
}

impl LandmarkSet {
    /// Wrap a landmark vector, rejecting anything that is not 68 points long
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the point count is wrong
    pub fn new(points: Vec<Point2f>) -> Result<Self> {
        if points.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected {} landmarks, got {}",
                NUM_FACIAL_LANDMARKS,
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// All points in landmark order
    #[must_use]
    pub fn points(&self) -> &[Point2f] {
        &self.points
    }

    /// Point at a landmark index; indices are always in range for a valid set
    #[must_use]
    pub fn point(&self, index: usize) -> Point2f {
        self.points[index]
    }

    /// Horizontal jaw-to-jaw distance in pixels
    #[must_use]
    pub fn face_width(&self) -> f32 {
        (self.points[JAW_RIGHT].x - self.points[JAW_LEFT].x).abs()
    }

    /// The six image points matching the 3D pose model, in model order:
    /// nose tip, chin, left eye corner, right eye corner, left and right mouth corners
    #[must_use]
    pub fn pose_correspondences(&self) -> [Point2f; NUM_POSE_POINTS] {
        [
            self.points[NOSE_TIP],
            self.points[CHIN],
            self.points[LEFT_EYE_OUTER],
            self.points[RIGHT_EYE_OUTER],
            self.points[MOUTH_LEFT],
            self.points[MOUTH_RIGHT],
        ]
    }

    /// Bounding box of one eye's outline, grown by `padding` pixels on every side
    /// and clipped to the frame. Returns `None` when nothing of it remains inside.
    #[must_use]
    pub fn eye_region(&self, eye: Eye, padding: i32, frame_width: i32, frame_height: i32) -> Option<Rect> {
        let range = match eye {
            Eye::Left => LEFT_EYE_RANGE,
            Eye::Right => RIGHT_EYE_RANGE,
        };

        let outline = &self.points[range];
        let (min_x, max_x, min_y, max_y) = outline.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY),
            |(min_x, max_x, min_y, max_y), p| (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y)),
        );

        #[allow(clippy::cast_precision_loss)]
        let overlaps = max_x >= 0.0 && max_y >= 0.0 && min_x < frame_width as f32 && min_y < frame_height as f32;
        if !overlaps {
            return None;
        }

        let x0 = f32_to_i32_clamp(min_x, 0, frame_width).saturating_sub(padding).max(0);
        let y0 = f32_to_i32_clamp(min_y, 0, frame_height).saturating_sub(padding).max(0);
        let x1 = f32_to_i32_clamp(max_x, 0, frame_width).saturating_add(padding).min(frame_width);
        let y1 = f32_to_i32_clamp(max_y, 0, frame_height).saturating_add(padding).min(frame_height);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}
