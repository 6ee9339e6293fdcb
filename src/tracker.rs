//! Per-session attention tracking.
//!
//! [`AttentionTracker`] owns everything that outlives a single frame: the
//! rolling histories, the last emitted head state and the calibration
//! results. One call to [`AttentionTracker::process_frame`] runs pose
//! recovery, pupil localization, smoothing and classification for one frame.

use crate::{
    calibration::CalibrationSample,
    classifier::{classify_gaze, GazeBaseline, GazeDirection, HeadCalibration, HeadClassifier, HeadDirection},
    config::Config,
    constants::DEFAULT_HISTORY_LEN,
    filters::Smoother,
    landmarks::{Eye, LandmarkSet},
    pose_estimation::{EulerAngles, PoseEstimate, PoseEstimator},
    pose_model::PoseModel,
    pupil_detection::{NormalizedPupil, PupilLocalizer},
    Error, Result,
};
use opencv::{
    core::{Mat, Point2f, Point2i, Rect},
    prelude::*,
};
use std::fmt;

/// Default padding around the eye outline, in pixels
const DEFAULT_EYE_PADDING: i32 = 8;
/// Length of the projected facing-direction line, in model units
const NOSE_LINE_LENGTH: f32 = 100.0;

/// Why a per-frame estimate is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissReason {
    /// Frame was empty or could not be read
    NoFrame,
    /// No face was found in the frame
    NoFace,
    /// The pose solve failed or the face geometry was degenerate
    NoPose,
    /// At least one pupil was not found
    NoPupil,
    /// Head calibration has not finished yet
    Uncalibrated,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoFrame => "No Frame",
            Self::NoFace => "No Face",
            Self::NoPose => "No Head Direction",
            Self::NoPupil => "No Gaze",
            Self::Uncalibrated => "Calibrating",
        };
        f.write_str(label)
    }
}

/// A per-frame value or the reason it is unavailable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate<T> {
    Detected(T),
    Unavailable(MissReason),
}

impl<T> Estimate<T> {
    #[must_use]
    pub fn is_detected(&self) -> bool {
        matches!(self, Self::Detected(_))
    }

    /// The value, if detected
    pub fn detected(self) -> Option<T> {
        match self {
            Self::Detected(v) => Some(v),
            Self::Unavailable(_) => None,
        }
    }

    pub fn as_ref(&self) -> Estimate<&T> {
        match self {
            Self::Detected(v) => Estimate::Detected(v),
            Self::Unavailable(r) => Estimate::Unavailable(*r),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Estimate<U> {
        match self {
            Self::Detected(v) => Estimate::Detected(f(v)),
            Self::Unavailable(r) => Estimate::Unavailable(r),
        }
    }

    /// The miss reason, if unavailable
    #[must_use]
    pub fn miss_reason(&self) -> Option<MissReason> {
        match self {
            Self::Detected(_) => None,
            Self::Unavailable(r) => Some(*r),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Estimate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detected(v) => v.fmt(f),
            Self::Unavailable(r) => r.fmt(f),
        }
    }
}

/// One located pupil
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PupilReading {
    /// Eye crop the pupil was searched in, frame coordinates
    pub region: Rect,
    /// Pupil centre, frame coordinates
    pub center: Point2i,
    /// Centre relative to the eye crop
    pub normalized: NormalizedPupil,
}

/// Everything the tracker concluded about one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub head: Estimate<HeadDirection>,
    pub gaze: Estimate<GazeDirection>,
    /// Median-smoothed head angles
    pub angles: Estimate<EulerAngles>,
    /// Raw pose solve
    pub pose: Option<PoseEstimate>,
    /// Nose tip and a point in front of it, image coordinates
    pub nose_line: Option<(Point2i, Point2i)>,
    pub left_pupil: Estimate<PupilReading>,
    pub right_pupil: Estimate<PupilReading>,
    /// Mean-smoothed pupil pixel centres, present when both pupils were found
    pub smoothed_pupils: Option<(Point2f, Point2f)>,
    pub distraction_detected: bool,
}

impl FrameAnalysis {
    /// Analysis of a frame in which nothing could be measured
    #[must_use]
    pub fn unavailable(reason: MissReason, distraction_detected: bool) -> Self {
        Self {
            head: Estimate::Unavailable(reason),
            gaze: Estimate::Unavailable(reason),
            angles: Estimate::Unavailable(reason),
            pose: None,
            nose_line: None,
            left_pupil: Estimate::Unavailable(reason),
            right_pupil: Estimate::Unavailable(reason),
            smoothed_pupils: None,
            distraction_detected,
        }
    }

    /// Normalized pupil pair, present only when both eyes were located
    #[must_use]
    pub fn normalized_pupils(&self) -> Option<(NormalizedPupil, NormalizedPupil)> {
        match (self.left_pupil, self.right_pupil) {
            (Estimate::Detected(l), Estimate::Detected(r)) => Some((l.normalized, r.normalized)),
            _ => None,
        }
    }

    /// The parts of this analysis the calibration controller samples
    #[must_use]
    pub fn calibration_sample(&self) -> CalibrationSample {
        CalibrationSample {
            angles: self.angles.detected(),
            pupils: self.normalized_pupils(),
            gaze: self.gaze.detected(),
        }
    }
}

/// Single-face attention tracking session
pub struct AttentionTracker {
    smoother: Smoother,
    classifier: HeadClassifier,
    localizer: PupilLocalizer,
    eye_padding: i32,
    estimator: Option<(i32, PoseEstimator)>,
    head_calibration: Option<HeadCalibration>,
    gaze_baseline: Option<GazeBaseline>,
}

impl Default for AttentionTracker {
    fn default() -> Self {
        Self {
            smoother: Smoother::new(DEFAULT_HISTORY_LEN),
            classifier: HeadClassifier::new(),
            localizer: PupilLocalizer::default(),
            eye_padding: DEFAULT_EYE_PADDING,
            estimator: None,
            head_calibration: None,
            gaze_baseline: None,
        }
    }
}

impl AttentionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker using the smoothing and pupil settings of `config`
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            smoother: Smoother::new(config.smoothing.history_len.max(1)),
            localizer: PupilLocalizer::from_config(&config.pupil),
            eye_padding: config.pupil.eye_padding,
            ..Self::default()
        }
    }

    pub fn set_head_calibration(&mut self, calibration: HeadCalibration) {
        self.head_calibration = Some(calibration);
    }

    pub fn set_gaze_baseline(&mut self, baseline: Option<GazeBaseline>) {
        self.gaze_baseline = baseline;
    }

    #[must_use]
    pub fn head_calibration(&self) -> Option<&HeadCalibration> {
        self.head_calibration.as_ref()
    }

    #[must_use]
    pub fn gaze_baseline(&self) -> Option<&GazeBaseline> {
        self.gaze_baseline.as_ref()
    }

    /// Angle samples in the smoothing window
    #[must_use]
    pub fn angle_samples(&self) -> usize {
        self.smoother.angle_samples()
    }

    /// Last emitted head state
    #[must_use]
    pub fn previous_head_direction(&self) -> HeadDirection {
        self.classifier.previous()
    }

    /// Start a fresh session: clear histories, previous state and calibration
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.classifier.reset();
        self.head_calibration = None;
        self.gaze_baseline = None;
    }

    /// Analyse one frame.
    ///
    /// `landmarks` is the first detected face, in frame coordinates, or `None`
    /// when the face detector found nothing. Misses never produce `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error only when an OpenCV operation fails unexpectedly
    pub fn process_frame(
        &mut self,
        frame: &Mat,
        landmarks: Option<&LandmarkSet>,
        distraction_detected: bool,
    ) -> Result<FrameAnalysis> {
        if frame.empty() || frame.cols() <= 0 || frame.rows() <= 0 {
            return Ok(FrameAnalysis::unavailable(MissReason::NoFrame, distraction_detected));
        }
        let Some(landmarks) = landmarks else {
            return Ok(FrameAnalysis::unavailable(MissReason::NoFace, distraction_detected));
        };

        let (angles, pose) = self.estimate_head(frame.cols(), landmarks)?;
        let nose_line = match &pose {
            Some(pose) => Some(self.estimator_for(frame.cols())?.project_nose_axis(pose, NOSE_LINE_LENGTH)?),
            None => None,
        };
        let head = match (angles, self.head_calibration.as_ref()) {
            (Estimate::Detected(a), Some(calibration)) => Estimate::Detected(self.classifier.classify(a, calibration)),
            (Estimate::Detected(_), None) => Estimate::Unavailable(MissReason::Uncalibrated),
            (Estimate::Unavailable(reason), _) => Estimate::Unavailable(reason),
        };

        let left_pupil = self.locate_pupil(frame, landmarks, Eye::Left)?;
        let right_pupil = self.locate_pupil(frame, landmarks, Eye::Right)?;

        let (gaze, smoothed_pupils) = match (left_pupil, right_pupil) {
            (Estimate::Detected(l), Estimate::Detected(r)) => (
                Estimate::Detected(classify_gaze(l.normalized, r.normalized, self.gaze_baseline.as_ref())),
                Some(self.smoother.smooth_pupils(l.center, r.center)),
            ),
            _ => (Estimate::Unavailable(MissReason::NoPupil), None),
        };

        Ok(FrameAnalysis {
            head,
            gaze,
            angles,
            pose,
            nose_line,
            left_pupil,
            right_pupil,
            smoothed_pupils,
            distraction_detected,
        })
    }

    /// Smoothed angles and the raw solve; a failed solve leaves the angle history untouched
    fn estimate_head(
        &mut self,
        frame_width: i32,
        landmarks: &LandmarkSet,
    ) -> Result<(Estimate<EulerAngles>, Option<PoseEstimate>)> {
        let Some(model) = PoseModel::from_landmarks(landmarks) else {
            log::debug!("Degenerate face width, skipping pose solve");
            return Ok((Estimate::Unavailable(MissReason::NoPose), None));
        };

        let image_points = self.smoother.smooth_landmarks(landmarks.pose_correspondences());
        let estimator = self.estimator_for(frame_width)?;

        match estimator.estimate_pose(&model, &image_points)? {
            Some(pose) => {
                let smoothed = self.smoother.smooth_angles(pose.angles);
                Ok((Estimate::Detected(smoothed), Some(pose)))
            }
            None => Ok((Estimate::Unavailable(MissReason::NoPose), None)),
        }
    }

    /// Pose estimator for the current frame width, rebuilt when the width changes
    fn estimator_for(&mut self, frame_width: i32) -> Result<&PoseEstimator> {
        match &mut self.estimator {
            Some((width, _)) if *width == frame_width => {}
            slot => *slot = Some((frame_width, PoseEstimator::for_frame_width(frame_width)?)),
        }
        self.estimator
            .as_ref()
            .map(|(_, estimator)| estimator)
            .ok_or_else(|| Error::InvalidInput("Pose estimator unavailable".to_string()))
    }

    fn locate_pupil(&self, frame: &Mat, landmarks: &LandmarkSet, eye: Eye) -> Result<Estimate<PupilReading>> {
        let Some(region) = landmarks.eye_region(eye, self.eye_padding, frame.cols(), frame.rows()) else {
            return Ok(Estimate::Unavailable(MissReason::NoPupil));
        };

        Ok(match self.localizer.locate_in_frame(frame, region)? {
            Some(observation) => Estimate::Detected(PupilReading {
                region,
                center: observation.in_frame(region),
                normalized: observation.normalized(),
            }),
            None => Estimate::Unavailable(MissReason::NoPupil),
        })
    }
}
