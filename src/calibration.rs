//! Two-phase calibration: neutral head pose first, then neutral pupil position.
//!
//! The aggregation functions are pure so they can be tested directly. The
//! [`CalibrationController`] owns the sample lists and the wall-clock
//! deadlines; callers pass the current [`Instant`] with every observation.

use crate::{
    classifier::{GazeBaseline, GazeDirection, HeadCalibration},
    config::CalibrationConfig,
    filters::median::median,
    pose_estimation::EulerAngles,
    pupil_detection::NormalizedPupil,
};
use std::time::{Duration, Instant};

/// Threshold clamp ranges in degrees, (min, max) for pitch, yaw and roll
const THRESHOLD_RANGES: [(f64, f64); 3] = [(4.0, 6.0), (6.0, 9.0), (2.0, 4.0)];

/// Thresholds derive from this many standard deviations
const THRESHOLD_STD_DEVS: f64 = 2.0;

/// Longest accepted calibration phase in seconds
pub const MAX_PHASE_SECS: f64 = 3600.0;

/// Phase length from configured seconds, clamped to `0..=MAX_PHASE_SECS`
fn phase_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_PHASE_SECS)).unwrap_or(Duration::ZERO)
}

/// Calibration used when too few head samples were collected
pub const FALLBACK_HEAD_CALIBRATION: HeadCalibration = HeadCalibration {
    baseline: EulerAngles::new(0.0, 0.0, 0.0),
    thresholds: EulerAngles::new(5.0, 8.0, 3.0),
};

/// Population standard deviation, 0 for an empty input
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn axis_threshold(values: &[f64], (lo, hi): (f64, f64)) -> f64 {
    (std_dev(values) * THRESHOLD_STD_DEVS).clamp(lo, hi)
}

/// Aggregate head samples into a baseline and thresholds.
///
/// With at least `min_samples` samples the baseline is the per-axis median and
/// each threshold is twice the per-axis standard deviation, clamped to its
/// axis range. Otherwise [`FALLBACK_HEAD_CALIBRATION`] is returned.
#[must_use]
pub fn compute_head_calibration(samples: &[EulerAngles], min_samples: usize) -> HeadCalibration {
    if samples.is_empty() || samples.len() < min_samples {
        return FALLBACK_HEAD_CALIBRATION;
    }

    let mut baseline = [0.0; 3];
    let mut thresholds = [0.0; 3];
    for (axis, range) in THRESHOLD_RANGES.into_iter().enumerate() {
        let values: Vec<f64> = samples.iter().map(|a| a.to_array()[axis]).collect();
        baseline[axis] = median(values.iter().copied());
        thresholds[axis] = axis_threshold(&values, range);
    }

    HeadCalibration {
        baseline: EulerAngles::from_array(baseline),
        thresholds: EulerAngles::from_array(thresholds),
    }
}

/// Aggregate pupil samples into a neutral gaze, `None` below `min_samples`
#[must_use]
pub fn compute_gaze_baseline(
    samples: &[(NormalizedPupil, NormalizedPupil)],
    min_samples: usize,
) -> Option<GazeBaseline> {
    if samples.is_empty() || samples.len() < min_samples {
        return None;
    }

    Some(GazeBaseline {
        left: NormalizedPupil::new(
            median(samples.iter().map(|(l, _)| l.x)),
            median(samples.iter().map(|(l, _)| l.y)),
        ),
        right: NormalizedPupil::new(
            median(samples.iter().map(|(_, r)| r.x)),
            median(samples.iter().map(|(_, r)| r.y)),
        ),
    })
}

/// Current calibration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Head,
    Pupil,
    Complete,
}

/// One frame's worth of calibration input
#[derive(Debug, Clone, Copy, Default)]
pub struct CalibrationSample {
    /// Smoothed head angles, if the pose solved
    pub angles: Option<EulerAngles>,
    /// Normalized pupils, only when both eyes detected
    pub pupils: Option<(NormalizedPupil, NormalizedPupil)>,
    /// Gaze classified for this frame
    pub gaze: Option<GazeDirection>,
}

/// Timed sampler producing the session's head calibration and gaze baseline
#[derive(Debug, Clone)]
pub struct CalibrationController {
    phase: CalibrationPhase,
    deadline: Instant,
    pupil_duration: Duration,
    min_head_samples: usize,
    min_pupil_samples: usize,
    head_samples: Vec<EulerAngles>,
    pupil_samples: Vec<(NormalizedPupil, NormalizedPupil)>,
    head: Option<HeadCalibration>,
    gaze: Option<GazeBaseline>,
}

impl CalibrationController {
    /// Start the head phase at `now`
    #[must_use]
    pub fn start(config: &CalibrationConfig, now: Instant) -> Self {
        log::info!(
            "Head calibration started: keep looking at the screen for {:.1}s",
            config.head_duration_secs
        );
        Self {
            phase: CalibrationPhase::Head,
            deadline: now.checked_add(phase_duration(config.head_duration_secs)).unwrap_or(now),
            pupil_duration: phase_duration(config.pupil_duration_secs),
            min_head_samples: config.min_head_samples,
            min_pupil_samples: config.min_pupil_samples,
            head_samples: Vec::new(),
            pupil_samples: Vec::new(),
            head: None,
            gaze: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == CalibrationPhase::Complete
    }

    /// Time left in the current phase, zero once complete
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.phase {
            CalibrationPhase::Complete => Duration::ZERO,
            _ => self.deadline.saturating_duration_since(now),
        }
    }

    /// Head calibration, available once the head phase has ended
    #[must_use]
    pub fn head_calibration(&self) -> Option<&HeadCalibration> {
        self.head.as_ref()
    }

    /// Gaze baseline, available once the pupil phase has ended with enough samples
    #[must_use]
    pub fn gaze_baseline(&self) -> Option<&GazeBaseline> {
        self.gaze.as_ref()
    }

    #[must_use]
    pub fn head_sample_count(&self) -> usize {
        self.head_samples.len()
    }

    #[must_use]
    pub fn pupil_sample_count(&self) -> usize {
        self.pupil_samples.len()
    }

    /// Feed one frame observed at `now` and return the phase after it.
    ///
    /// An expired deadline closes its phase before the frame is considered,
    /// so a frame arriving late never counts toward the finished phase.
    pub fn observe(&mut self, now: Instant, sample: CalibrationSample) -> CalibrationPhase {
        self.advance(now);

        match self.phase {
            CalibrationPhase::Head => {
                if let Some(angles) = sample.angles {
                    self.head_samples.push(angles);
                }
            }
            CalibrationPhase::Pupil => {
                if let (Some(GazeDirection::Straight), Some(pupils)) = (sample.gaze, sample.pupils) {
                    self.pupil_samples.push(pupils);
                }
            }
            CalibrationPhase::Complete => {}
        }

        self.phase
    }

    /// Close any phase whose deadline has passed
    pub fn advance(&mut self, now: Instant) -> CalibrationPhase {
        if self.phase == CalibrationPhase::Head && now >= self.deadline {
            self.finish_head_phase(now);
        }
        if self.phase == CalibrationPhase::Pupil && now >= self.deadline {
            self.finish_pupil_phase();
        }
        self.phase
    }

    fn finish_head_phase(&mut self, now: Instant) {
        let count = self.head_samples.len();
        let calibration = compute_head_calibration(&self.head_samples, self.min_head_samples);

        if count < self.min_head_samples || count == 0 {
            log::warn!(
                "Head calibration collected {count} samples (need {}), using default thresholds",
                self.min_head_samples
            );
        } else {
            log::info!(
                "Head calibration complete with {count} samples: baseline pitch {:.1} yaw {:.1} roll {:.1}, thresholds {:.1}/{:.1}/{:.1}",
                calibration.baseline.pitch,
                calibration.baseline.yaw,
                calibration.baseline.roll,
                calibration.thresholds.pitch,
                calibration.thresholds.yaw,
                calibration.thresholds.roll
            );
        }

        self.head = Some(calibration);
        self.phase = CalibrationPhase::Pupil;
        self.deadline = now.checked_add(self.pupil_duration).unwrap_or(now);
        log::info!(
            "Pupil calibration started: look straight at the screen for {:.1}s",
            self.pupil_duration.as_secs_f64()
        );
    }

    fn finish_pupil_phase(&mut self) {
        let count = self.pupil_samples.len();
        self.gaze = compute_gaze_baseline(&self.pupil_samples, self.min_pupil_samples);

        match &self.gaze {
            Some(baseline) => log::info!(
                "Pupil calibration complete with {count} samples: left ({:.2}, {:.2}) right ({:.2}, {:.2})",
                baseline.left.x,
                baseline.left.y,
                baseline.right.x,
                baseline.right.y
            ),
            None => log::warn!(
                "Pupil calibration collected {count} samples (need {}), using absolute gaze cutoffs",
                self.min_pupil_samples
            ),
        }

        self.phase = CalibrationPhase::Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CalibrationConfig {
        CalibrationConfig {
            head_duration_secs: 7.0,
            pupil_duration_secs: 5.0,
            min_head_samples: 5,
            min_pupil_samples: 3,
        }
    }

    fn ramp(n: usize) -> Vec<EulerAngles> {
        (0..n)
            .map(|i| {
                let v = i as f64;
                EulerAngles::new(v, v, v)
            })
            .collect()
    }

    #[test]
    fn test_head_calibration_median_and_clamp() {
        let cal = compute_head_calibration(&ramp(5), 5);
        assert_eq!(cal.baseline, EulerAngles::new(2.0, 2.0, 2.0));

        // sigma = sqrt(2), doubled = 2.83
        assert!((cal.thresholds.pitch - 4.0).abs() < 1e-12);
        assert!((cal.thresholds.yaw - 6.0).abs() < 1e-12);
        assert!((cal.thresholds.roll - 2.0 * 2.0f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_high_variance_clamps_to_ceiling() {
        let samples: Vec<_> = (0..10)
            .map(|i| {
                let v = if i % 2 == 0 { -30.0 } else { 30.0 };
                EulerAngles::new(v, v, v)
            })
            .collect();
        let cal = compute_head_calibration(&samples, 5);
        assert_eq!(cal.thresholds, EulerAngles::new(6.0, 9.0, 4.0));
    }

    #[test]
    fn test_insufficient_head_samples_fall_back() {
        assert_eq!(compute_head_calibration(&[], 5), FALLBACK_HEAD_CALIBRATION);
        assert_eq!(compute_head_calibration(&ramp(4), 5), FALLBACK_HEAD_CALIBRATION);
    }

    #[test]
    fn test_gaze_baseline() {
        let samples = vec![
            (NormalizedPupil::new(0.4, 0.5), NormalizedPupil::new(0.6, 0.5)),
            (NormalizedPupil::new(0.5, 0.4), NormalizedPupil::new(0.5, 0.6)),
            (NormalizedPupil::new(0.6, 0.6), NormalizedPupil::new(0.4, 0.4)),
        ];
        let baseline = compute_gaze_baseline(&samples, 3).unwrap();
        assert_eq!(baseline.left, NormalizedPupil::new(0.5, 0.5));
        assert_eq!(baseline.right, NormalizedPupil::new(0.5, 0.5));

        assert!(compute_gaze_baseline(&samples[..2], 3).is_none());
    }

    #[test]
    fn test_controller_phases() {
        let t0 = Instant::now();
        let mut controller = CalibrationController::start(&config(), t0);
        assert_eq!(controller.phase(), CalibrationPhase::Head);
        assert_eq!(controller.remaining(t0), Duration::from_secs(7));

        for (i, angles) in ramp(5).into_iter().enumerate() {
            let sample = CalibrationSample {
                angles: Some(angles),
                ..CalibrationSample::default()
            };
            controller.observe(t0 + Duration::from_secs(i as u64), sample);
        }
        assert_eq!(controller.head_sample_count(), 5);
        assert!(controller.head_calibration().is_none());

        let pupils = (NormalizedPupil::new(0.5, 0.5), NormalizedPupil::new(0.5, 0.5));
        let mut t = t0 + Duration::from_secs(7);
        for _ in 0..3 {
            controller.observe(
                t,
                CalibrationSample {
                    angles: None,
                    pupils: Some(pupils),
                    gaze: Some(GazeDirection::Straight),
                },
            );
            t += Duration::from_secs(1);
        }
        assert_eq!(controller.phase(), CalibrationPhase::Pupil);
        assert_eq!(controller.head_calibration().unwrap().baseline, EulerAngles::new(2.0, 2.0, 2.0));

        // Non-straight gaze is not sampled
        controller.observe(
            t,
            CalibrationSample {
                angles: None,
                pupils: Some(pupils),
                gaze: Some(GazeDirection::Left),
            },
        );
        assert_eq!(controller.pupil_sample_count(), 3);

        assert_eq!(
            controller.advance(t0 + Duration::from_secs(12)),
            CalibrationPhase::Complete
        );
        assert!(controller.is_complete());
        assert_eq!(controller.gaze_baseline().unwrap().left, NormalizedPupil::new(0.5, 0.5));
        assert_eq!(controller.remaining(t0), Duration::ZERO);
    }

    #[test]
    fn test_controller_without_samples_falls_back() {
        let t0 = Instant::now();
        let mut controller = CalibrationController::start(&config(), t0);
        controller.observe(t0 + Duration::from_secs(8), CalibrationSample::default());
        assert_eq!(controller.phase(), CalibrationPhase::Pupil);
        assert_eq!(controller.head_calibration(), Some(&FALLBACK_HEAD_CALIBRATION));

        controller.advance(t0 + Duration::from_secs(20));
        assert!(controller.is_complete());
        assert!(controller.gaze_baseline().is_none());
    }

    #[test]
    fn test_unbounded_durations_are_clamped() {
        let t0 = Instant::now();
        for secs in [f64::INFINITY, 1e30, f64::NAN, -5.0] {
            let cfg = CalibrationConfig {
                head_duration_secs: secs,
                pupil_duration_secs: secs,
                ..config()
            };
            let controller = CalibrationController::start(&cfg, t0);
            assert!(controller.remaining(t0) <= Duration::from_secs_f64(MAX_PHASE_SECS));
        }

        let cfg = CalibrationConfig {
            head_duration_secs: f64::INFINITY,
            ..config()
        };
        let mut controller = CalibrationController::start(&cfg, t0);
        assert_eq!(
            controller.advance(t0 + Duration::from_secs(3601)),
            CalibrationPhase::Pupil
        );
    }
}
