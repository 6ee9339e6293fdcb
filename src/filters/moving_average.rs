use super::{history::History, SampleFilter};
use crate::constants::NUM_POSE_POINTS;
use opencv::core::{Point2f, Point2i};

/// Elementwise mean over the buffered pose correspondences.
///
/// Stabilizes the solver input rather than its output.
pub struct LandmarkMeanFilter {
    buffer: History<[Point2f; NUM_POSE_POINTS]>,
}

impl LandmarkMeanFilter {
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            buffer: History::new(window_size),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl SampleFilter for LandmarkMeanFilter {
    type Sample = [Point2f; NUM_POSE_POINTS];
    type Output = [Point2f; NUM_POSE_POINTS];

    #[allow(clippy::cast_precision_loss)] // history lengths are tiny
    fn apply(&mut self, points: Self::Sample) -> Self::Output {
        self.buffer.push(points);

        let n = self.buffer.len() as f32;
        let mut mean = [Point2f::new(0.0, 0.0); NUM_POSE_POINTS];
        for sample in self.buffer.iter() {
            for (acc, p) in mean.iter_mut().zip(sample.iter()) {
                acc.x += p.x;
                acc.y += p.y;
            }
        }
        for acc in &mut mean {
            acc.x /= n;
            acc.y /= n;
        }
        mean
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "LandmarkMeanFilter"
    }
}

/// Per-eye mean of the pupil pixel centres, used for drawing only
pub struct PupilMeanFilter {
    buffer: History<(Point2i, Point2i)>,
}

impl PupilMeanFilter {
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            buffer: History::new(window_size),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl SampleFilter for PupilMeanFilter {
    type Sample = (Point2i, Point2i);
    type Output = (Point2f, Point2f);

    #[allow(clippy::cast_precision_loss)]
    fn apply(&mut self, pair: Self::Sample) -> Self::Output {
        self.buffer.push(pair);

        let n = self.buffer.len() as f32;
        let (mut left, mut right) = (Point2f::new(0.0, 0.0), Point2f::new(0.0, 0.0));
        for (l, r) in self.buffer.iter() {
            left.x += l.x as f32;
            left.y += l.y as f32;
            right.x += r.x as f32;
            right.y += r.y as f32;
        }

        (
            Point2f::new(left.x / n, left.y / n),
            Point2f::new(right.x / n, right.y / n),
        )
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "PupilMeanFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(v: f32) -> [Point2f; NUM_POSE_POINTS] {
        [Point2f::new(v, v * 2.0); NUM_POSE_POINTS]
    }

    #[test]
    fn test_landmark_mean() {
        let mut filter = LandmarkMeanFilter::new(3);

        let m1 = filter.apply(uniform(10.0));
        assert_eq!(m1[0], Point2f::new(10.0, 20.0));

        let m2 = filter.apply(uniform(20.0));
        assert_eq!(m2[5], Point2f::new(15.0, 30.0));

        filter.apply(uniform(30.0));
        // Window is full, oldest value should be dropped
        let m4 = filter.apply(uniform(40.0));
        assert_eq!(m4[3], Point2f::new(30.0, 60.0));
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn test_landmark_mean_is_elementwise() {
        let mut filter = LandmarkMeanFilter::new(5);
        let mut a = uniform(0.0);
        a[2] = Point2f::new(4.0, 8.0);
        filter.apply(uniform(0.0));
        let mean = filter.apply(a);
        assert_eq!(mean[2], Point2f::new(2.0, 4.0));
        assert_eq!(mean[1], Point2f::new(0.0, 0.0));
    }

    #[test]
    fn test_pupil_sides_are_independent() {
        let mut filter = PupilMeanFilter::new(5);
        filter.apply((Point2i::new(10, 10), Point2i::new(100, 50)));
        let (left, right) = filter.apply((Point2i::new(20, 14), Point2i::new(100, 60)));
        assert_eq!(left, Point2f::new(15.0, 12.0));
        assert_eq!(right, Point2f::new(100.0, 55.0));

        filter.reset();
        assert!(filter.is_empty());
    }
}
