//! Configuration management for the attention tracker

use crate::{calibration::MAX_PHASE_SECS, distraction, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub models: ModelConfig,

    /// Face detection configuration
    pub face_detection: FaceDetectionConfig,

    /// Video capture configuration
    pub camera: CameraConfig,

    /// Rolling history configuration
    pub smoothing: SmoothingConfig,

    /// Pupil localization configuration
    pub pupil: PupilConfig,

    /// Calibration timing and sample requirements
    pub calibration: CalibrationConfig,

    /// Object-based distraction signal
    pub distraction: DistractionConfig,

    /// Display configuration
    pub display: DisplayConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to face detection ONNX model
    pub face_detector: PathBuf,

    /// Path to facial landmarks ONNX model
    pub face_landmarks: PathBuf,

    /// Path to object detection ONNX model
    pub object_detector: PathBuf,
}

/// Face detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectionConfig {
    /// Confidence threshold for face detection (0.0-1.0)
    pub confidence_threshold: f32,

    /// IOU threshold for non-maximum suppression (0.0-1.0)
    pub iou_threshold: f32,

    /// Face region expansion factor before landmark detection
    pub bbox_expansion: f32,
}

/// Video capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera index
    pub index: i32,

    /// Attempts made to open the camera before giving up
    pub open_retries: u32,

    /// Pause between open attempts in milliseconds
    pub retry_backoff_ms: u64,

    /// Flip frames horizontally before processing
    pub mirror: bool,
}

/// Rolling history parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Capacity of every history buffer
    pub history_len: usize,
}

/// Pupil segmentation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PupilConfig {
    /// Pixels added around each eye outline before cropping
    pub eye_padding: i32,

    /// Inverse binary threshold applied after equalization and blur
    pub intensity_threshold: f64,

    /// Contours at or below this area (px²) are rejected
    pub min_area: f64,

    /// Contours at or above this fraction of the crop area are rejected
    pub max_area_fraction: f64,
}

/// Calibration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Head pose sampling duration in seconds
    pub head_duration_secs: f64,

    /// Pupil position sampling duration in seconds
    pub pupil_duration_secs: f64,

    /// Head samples needed to compute a personal baseline
    pub min_head_samples: usize,

    /// Pupil samples needed to compute a gaze baseline
    pub min_pupil_samples: usize,
}

/// Distraction detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistractionConfig {
    /// Run the object detector at all
    pub enabled: bool,

    /// Minimum detection confidence (0.0-1.0)
    pub confidence_threshold: f32,

    /// Class id that counts as a distraction
    pub target_class: usize,

    /// Smallest accepted box width/height ratio
    pub min_aspect_ratio: f32,

    /// Largest accepted box width/height ratio
    pub max_aspect_ratio: f32,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Open a preview window
    pub show_window: bool,

    /// Draw all 68 landmarks on the preview
    pub draw_landmarks: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_detector: PathBuf::from("assets/face_detector.onnx"),
            face_landmarks: PathBuf::from("assets/face_landmarks.onnx"),
            object_detector: PathBuf::from("assets/object_detector.onnx"),
        }
    }
}

impl Default for FaceDetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.4,
            bbox_expansion: 0.2,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            open_retries: 5,
            retry_backoff_ms: 1000,
            mirror: false,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            history_len: crate::constants::DEFAULT_HISTORY_LEN,
        }
    }
}

impl Default for PupilConfig {
    fn default() -> Self {
        Self {
            eye_padding: 8,
            intensity_threshold: 40.0,
            min_area: 10.0,
            max_area_fraction: 0.08,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            head_duration_secs: 7.0,
            pupil_duration_secs: 5.0,
            min_head_samples: 5,
            min_pupil_samples: 3,
        }
    }
}

impl Default for DistractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: distraction::DEFAULT_CONFIDENCE_THRESHOLD,
            target_class: distraction::DEFAULT_TARGET_CLASS,
            min_aspect_ratio: distraction::DEFAULT_MIN_ASPECT_RATIO,
            max_aspect_ratio: distraction::DEFAULT_MAX_ASPECT_RATIO,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_window: true,
            draw_landmarks: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate numeric settings
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.face_detection.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.face_detection.iou_threshold) {
            return Err(Error::ConfigError(
                "IOU threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.smoothing.history_len == 0 {
            return Err(Error::ConfigError(
                "History length must be greater than 0".to_string(),
            ));
        }

        if self.pupil.eye_padding < 0 {
            return Err(Error::ConfigError("Eye padding must be non-negative".to_string()));
        }
        if !(0.0..=255.0).contains(&self.pupil.intensity_threshold) {
            return Err(Error::ConfigError(
                "Pupil intensity threshold must be between 0 and 255".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.pupil.max_area_fraction) || self.pupil.max_area_fraction == 0.0 {
            return Err(Error::ConfigError(
                "Pupil max area fraction must be in (0, 1]".to_string(),
            ));
        }

        let phase_range = 0.0..=MAX_PHASE_SECS;
        if !phase_range.contains(&self.calibration.head_duration_secs)
            || !phase_range.contains(&self.calibration.pupil_duration_secs)
        {
            return Err(Error::ConfigError(format!(
                "Calibration durations must be between 0 and {MAX_PHASE_SECS} seconds"
            )));
        }

        if !(0.0..=1.0).contains(&self.distraction.confidence_threshold) {
            return Err(Error::ConfigError(
                "Distraction confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.distraction.min_aspect_ratio <= 0.0
            || self.distraction.min_aspect_ratio > self.distraction.max_aspect_ratio
        {
            return Err(Error::ConfigError(
                "Aspect ratio range must be positive and ordered".to_string(),
            ));
        }

        Ok(())
    }

    /// Check that every model file the run needs exists
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` naming the first missing model
    pub fn validate_model_paths(&self) -> Result<()> {
        if !self.models.face_detector.exists() {
            return Err(Error::ConfigError(format!(
                "Face detector model not found: {}",
                self.models.face_detector.display()
            )));
        }
        if !self.models.face_landmarks.exists() {
            return Err(Error::ConfigError(format!(
                "Face landmarks model not found: {}",
                self.models.face_landmarks.display()
            )));
        }
        if self.distraction.enabled && !self.models.object_detector.exists() {
            return Err(Error::ConfigError(format!(
                "Object detector model not found: {}",
                self.models.object_detector.display()
            )));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Attention Tracker Configuration

# Model paths
models:
  face_detector: "assets/face_detector.onnx"
  face_landmarks: "assets/face_landmarks.onnx"
  object_detector: "assets/object_detector.onnx"

# Face detection parameters
face_detection:
  confidence_threshold: 0.5
  iou_threshold: 0.4
  bbox_expansion: 0.2

# Video capture
camera:
  index: 0
  open_retries: 5
  retry_backoff_ms: 1000
  mirror: false

# Rolling histories
smoothing:
  history_len: 5

# Pupil segmentation
pupil:
  eye_padding: 8
  intensity_threshold: 40.0
  min_area: 10.0
  max_area_fraction: 0.08

# Calibration
calibration:
  head_duration_secs: 7.0
  pupil_duration_secs: 5.0
  min_head_samples: 5
  min_pupil_samples: 3

# Distraction detection
distraction:
  enabled: true
  confidence_threshold: 0.5
  target_class: 0
  min_aspect_ratio: 0.3
  max_aspect_ratio: 3.0

# Display settings
display:
  show_window: true
  draw_landmarks: false
"#;
