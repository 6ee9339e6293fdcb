//! Discrete head and gaze direction classification.
//!
//! Both classifiers compare the current reading against a calibrated
//! neutral baseline. The head classifier additionally keeps the last emitted
//! state and repeats it while a reading sits in the dead zone between
//! "within threshold" and "threshold plus one degree".

use crate::{constants::HYSTERESIS_MARGIN, pose_estimation::EulerAngles, pupil_detection::NormalizedPupil};
use std::fmt;

/// Both eyes must move this far downward from neutral to read as `Down`
const GAZE_DOWN_DELTA: f64 = 0.1;
/// Both eyes must move this far horizontally or upward from neutral
const GAZE_SHIFT_DELTA: f64 = 0.15;

/// Absolute cutoffs used while no gaze baseline exists
const ABSOLUTE_DOWN: f64 = 0.45;
const ABSOLUTE_LEFT: f64 = 0.4;
const ABSOLUTE_RIGHT: f64 = 0.6;
const ABSOLUTE_UP: f64 = 0.4;

/// Head orientation relative to the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeadDirection {
    #[default]
    LookingAtScreen,
    Left,
    Right,
    Up,
    Down,
    Tilted,
}

impl fmt::Display for HeadDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::LookingAtScreen => "Looking at Screen",
            Self::Left => "Looking Left",
            Self::Right => "Looking Right",
            Self::Up => "Looking Up",
            Self::Down => "Looking Down",
            Self::Tilted => "Tilted",
        };
        f.write_str(label)
    }
}

/// Eye gaze direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GazeDirection {
    #[default]
    Straight,
    Left,
    Right,
    Up,
    Down,
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Straight => "Straight",
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Up => "Up",
            Self::Down => "Down",
        };
        f.write_str(label)
    }
}

/// Personal neutral head pose and per-axis tolerances, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadCalibration {
    pub baseline: EulerAngles,
    pub thresholds: EulerAngles,
}

/// Neutral normalized pupil positions for both eyes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeBaseline {
    pub left: NormalizedPupil,
    pub right: NormalizedPupil,
}

/// Head direction classifier with previous-state hysteresis
#[derive(Debug, Clone, Default)]
pub struct HeadClassifier {
    previous: HeadDirection,
}

impl HeadClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last emitted state
    #[must_use]
    pub fn previous(&self) -> HeadDirection {
        self.previous
    }

    /// Classify smoothed angles against the calibration.
    ///
    /// Checks run in a fixed order and the first match wins. A reading that is
    /// outside its threshold but not past the hysteresis margin repeats the
    /// previous state. The result always becomes the new previous state.
    pub fn classify(&mut self, angles: EulerAngles, calibration: &HeadCalibration) -> HeadDirection {
        let base = calibration.baseline;
        let th = calibration.thresholds;

        let within = (angles.pitch - base.pitch).abs() <= th.pitch
            && (angles.yaw - base.yaw).abs() <= th.yaw
            && (angles.roll - base.roll).abs() <= th.roll;

        let direction = if within {
            HeadDirection::LookingAtScreen
        } else if angles.yaw < base.yaw - th.yaw - HYSTERESIS_MARGIN {
            HeadDirection::Left
        } else if angles.yaw > base.yaw + th.yaw + HYSTERESIS_MARGIN {
            HeadDirection::Right
        } else if angles.pitch > base.pitch + th.pitch + HYSTERESIS_MARGIN {
            HeadDirection::Up
        } else if angles.pitch < base.pitch - th.pitch - HYSTERESIS_MARGIN {
            HeadDirection::Down
        } else if (angles.roll - base.roll).abs() > th.roll + HYSTERESIS_MARGIN {
            HeadDirection::Tilted
        } else {
            self.previous
        };

        self.previous = direction;
        direction
    }

    /// Forget the previous state
    pub fn reset(&mut self) {
        self.previous = HeadDirection::default();
    }
}

/// Classify gaze from both eyes' normalized pupil positions.
///
/// Downward gaze is checked first, then left, right and up. Without a
/// baseline fixed absolute cutoffs are used in the same order.
#[must_use]
pub fn classify_gaze(left: NormalizedPupil, right: NormalizedPupil, baseline: Option<&GazeBaseline>) -> GazeDirection {
    match baseline {
        Some(neutral) => {
            let dlx = left.x - neutral.left.x;
            let dly = left.y - neutral.left.y;
            let drx = right.x - neutral.right.x;
            let dry = right.y - neutral.right.y;

            if dly > GAZE_DOWN_DELTA && dry > GAZE_DOWN_DELTA {
                GazeDirection::Down
            } else if dlx < -GAZE_SHIFT_DELTA && drx < -GAZE_SHIFT_DELTA {
                GazeDirection::Left
            } else if dlx > GAZE_SHIFT_DELTA && drx > GAZE_SHIFT_DELTA {
                GazeDirection::Right
            } else if dly < -GAZE_SHIFT_DELTA && dry < -GAZE_SHIFT_DELTA {
                GazeDirection::Up
            } else {
                GazeDirection::Straight
            }
        }
        None => {
            if left.y > ABSOLUTE_DOWN && right.y > ABSOLUTE_DOWN {
                GazeDirection::Down
            } else if left.x < ABSOLUTE_LEFT && right.x < ABSOLUTE_LEFT {
                GazeDirection::Left
            } else if left.x > ABSOLUTE_RIGHT && right.x > ABSOLUTE_RIGHT {
                GazeDirection::Right
            } else if left.y < ABSOLUTE_UP && right.y < ABSOLUTE_UP {
                GazeDirection::Up
            } else {
                GazeDirection::Straight
            }
        }
    }
}
