use super::{history::History, SampleFilter};
use crate::pose_estimation::EulerAngles;

/// Median of a set of values; the two middle values are averaged for even counts.
/// Returns 0 for an empty input.
#[must_use]
pub fn median<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().collect();
    sorted.sort_by(f64::total_cmp);

    let len = sorted.len();
    if len == 0 {
        0.0
    } else if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    }
}

/// Rolling median over pitch, yaw and roll, one history per axis
pub struct AngleMedianFilter {
    pitch_buffer: History<f64>,
    yaw_buffer: History<f64>,
    roll_buffer: History<f64>,
}

impl AngleMedianFilter {
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            pitch_buffer: History::new(window_size),
            yaw_buffer: History::new(window_size),
            roll_buffer: History::new(window_size),
        }
    }

    /// Number of buffered angle samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.pitch_buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pitch_buffer.is_empty()
    }
}

impl SampleFilter for AngleMedianFilter {
    type Sample = EulerAngles;
    type Output = EulerAngles;

    fn apply(&mut self, angles: EulerAngles) -> EulerAngles {
        self.pitch_buffer.push(angles.pitch);
        self.yaw_buffer.push(angles.yaw);
        self.roll_buffer.push(angles.roll);

        EulerAngles::new(
            median(self.pitch_buffer.iter().copied()),
            median(self.yaw_buffer.iter().copied()),
            median(self.roll_buffer.iter().copied()),
        )
    }

    fn reset(&mut self) {
        self.pitch_buffer.clear();
        self.yaw_buffer.clear();
        self.roll_buffer.clear();
    }

    fn name(&self) -> &str {
        "AngleMedianFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_values() {
        assert_eq!(median([3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median([4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(std::iter::empty()), 0.0);
    }

    #[test]
    fn test_median_filter() {
        let mut filter = AngleMedianFilter::new(3);

        let a1 = filter.apply(EulerAngles::new(10.0, 20.0, 1.0));
        assert_eq!(a1, EulerAngles::new(10.0, 20.0, 1.0));

        let a2 = filter.apply(EulerAngles::new(20.0, 30.0, 3.0));
        assert_eq!(a2.pitch, 15.0); // median of [10, 20]
        assert_eq!(a2.yaw, 25.0);
        assert_eq!(a2.roll, 2.0);

        let a3 = filter.apply(EulerAngles::new(30.0, 40.0, 5.0));
        assert_eq!(a3.pitch, 20.0); // median of [10, 20, 30]
        assert_eq!(a3.yaw, 30.0);
    }

    #[test]
    fn test_median_with_outliers() {
        let mut filter = AngleMedianFilter::new(5);

        filter.apply(EulerAngles::new(10.0, 20.0, 0.0));
        filter.apply(EulerAngles::new(11.0, 21.0, 0.0));
        filter.apply(EulerAngles::new(12.0, 22.0, 0.0));
        filter.apply(EulerAngles::new(13.0, 23.0, 0.0));
        let out = filter.apply(EulerAngles::new(170.0, -150.0, 0.0)); // bad solve

        assert_eq!(out.pitch, 12.0);
        assert_eq!(out.yaw, 21.0);
    }

    #[test]
    fn test_sixth_sample_evicts_first() {
        let mut filter = AngleMedianFilter::new(5);
        for v in [100.0, 1.0, 2.0, 3.0, 4.0] {
            filter.apply(EulerAngles::new(v, v, v));
        }
        // Buffer [1, 2, 3, 4, 0] once the 100 has been evicted
        let out = filter.apply(EulerAngles::new(0.0, 0.0, 0.0));
        assert_eq!(out.pitch, 2.0);
        assert_eq!(filter.len(), 5);
    }

    #[test]
    fn test_reset() {
        let mut filter = AngleMedianFilter::new(5);
        filter.apply(EulerAngles::new(1.0, 1.0, 1.0));
        filter.reset();
        assert!(filter.is_empty());
        assert_eq!(filter.name(), "AngleMedianFilter");
    }
}
