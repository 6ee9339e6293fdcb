//! Temporal smoothing of noisy per-frame estimates.
//!
//! Three independent policies share one bounded FIFO type:
//! - head angles: rolling median, robust to a single bad pose solve
//! - pose correspondences: rolling elementwise mean, applied before solving
//! - pupil pixel centres: rolling per-eye mean, used for drawing only

/// Bounded FIFO history shared by every filter
pub mod history;

/// Rolling median over head angles
pub mod median;

/// Rolling means over landmark and pupil positions
pub mod moving_average;

use crate::{constants::NUM_POSE_POINTS, pose_estimation::EulerAngles};
use median::AngleMedianFilter;
use moving_average::{LandmarkMeanFilter, PupilMeanFilter};
use opencv::core::{Point2f, Point2i};

/// Trait for all sample filters
pub trait SampleFilter: Send + Sync {
    /// Raw sample type
    type Sample;
    /// Smoothed output type
    type Output;

    /// Append a sample and return the smoothed value over the current window
    fn apply(&mut self, sample: Self::Sample) -> Self::Output;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// All rolling histories of one tracking session
pub struct Smoother {
    angles: AngleMedianFilter,
    landmarks: LandmarkMeanFilter,
    pupils: PupilMeanFilter,
}

impl Smoother {
    /// Create a smoother whose histories all hold `window_size` samples
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            angles: AngleMedianFilter::new(window_size),
            landmarks: LandmarkMeanFilter::new(window_size),
            pupils: PupilMeanFilter::new(window_size),
        }
    }

    /// Push raw angles, returning the per-axis median
    pub fn smooth_angles(&mut self, angles: EulerAngles) -> EulerAngles {
        self.angles.apply(angles)
    }

    /// Push raw pose correspondences, returning their running mean
    pub fn smooth_landmarks(&mut self, points: [Point2f; NUM_POSE_POINTS]) -> [Point2f; NUM_POSE_POINTS] {
        self.landmarks.apply(points)
    }

    /// Push a detected pupil pair, returning each side's running mean
    pub fn smooth_pupils(&mut self, left: Point2i, right: Point2i) -> (Point2f, Point2f) {
        self.pupils.apply((left, right))
    }

    /// Number of angle samples currently buffered
    #[must_use]
    pub fn angle_samples(&self) -> usize {
        self.angles.len()
    }

    /// Clear every history
    pub fn reset(&mut self) {
        self.angles.reset();
        self.landmarks.reset();
        self.pupils.reset();
    }
}
