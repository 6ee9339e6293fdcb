//! Head orientation and gaze direction tracking for attention monitoring.
//!
//! Given the 68 facial landmarks of the first face in each frame, the
//! library:
//! 1. Recovers head rotation with a `PnP` solve against a face-scaled 3D model
//! 2. Locates both pupils inside their eye crops by dark-blob segmentation
//! 3. Smooths angles (rolling median), landmarks and pupils (rolling means)
//! 4. Calibrates a personal neutral pose and gaze over two timed phases
//! 5. Classifies head direction with hysteresis and gaze direction
//!
//! An object detector adds an independent distraction signal. Face
//! detection and landmark regression run on ONNX Runtime, image processing
//! and the pose solve on `OpenCV`.
//!
//! # Example
//!
//! ```no_run
//! use attention_tracker::{
//!     calibration::{CalibrationController, CalibrationPhase},
//!     config::Config,
//!     face_detection::FaceDetector,
//!     mark_detection::MarkDetector,
//!     tracker::AttentionTracker,
//!     utils::refine_box,
//! };
//! use opencv::{core::Mat, prelude::*, videoio};
//! use std::time::Instant;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let face_detector = FaceDetector::from_config(&config.models.face_detector, &config.face_detection)?;
//! let mark_detector = MarkDetector::new(&config.models.face_landmarks)?;
//! let mut tracker = AttentionTracker::from_config(&config);
//! let mut calibration = CalibrationController::start(&config.calibration, Instant::now());
//!
//! let mut cap = videoio::VideoCapture::new(0, videoio::CAP_ANY)?;
//! let mut frame = Mat::default();
//! while cap.read(&mut frame)? {
//!     let landmarks = match face_detector.detect(&frame)?.first() {
//!         Some(face) => {
//!             let face_box = refine_box(face.bbox, frame.cols(), frame.rows(), 0.2);
//!             Some(mark_detector.detect(&frame, face_box)?)
//!         }
//!         None => None,
//!     };
//!
//!     let analysis = tracker.process_frame(&frame, landmarks.as_ref(), false)?;
//!     if !calibration.is_complete() {
//!         calibration.observe(Instant::now(), analysis.calibration_sample());
//!         if let (Some(head), None) = (calibration.head_calibration(), tracker.head_calibration()) {
//!             tracker.set_head_calibration(*head);
//!         }
//!         if calibration.phase() == CalibrationPhase::Complete {
//!             tracker.set_gaze_baseline(calibration.gaze_baseline().copied());
//!         }
//!         continue;
//!     }
//!
//!     println!("Head: {} Gaze: {}", analysis.head, analysis.gaze);
//! }
//! # Ok(())
//! # }
//! ```

/// Constants used throughout the application
pub mod constants;

/// Error types and result handling
pub mod error;

/// Configuration management
pub mod config;

/// 68-point facial landmark set
pub mod landmarks;

/// Approximate camera intrinsics from frame size
pub mod camera_model;

/// Face-scaled 3D reference model
pub mod pose_model;

/// Head pose estimation module using `PnP` algorithm
pub mod pose_estimation;

/// Rolling histories for smoothing estimates
pub mod filters;

/// Pupil localization in eye crops
pub mod pupil_detection;

/// Head and gaze direction classification
pub mod classifier;

/// Timed head and gaze calibration
pub mod calibration;

/// Object-based distraction gating
pub mod distraction;

/// Face detection module for finding faces in images
pub mod face_detection;

/// Facial landmark detection module for finding 68 key points
pub mod mark_detection;

/// Object detection feeding the distraction signal
pub mod object_detection;

/// Per-session tracking state and frame processing
pub mod tracker;

/// Utility functions for image processing and box geometry
pub mod utils;

/// Main application module
pub mod app;

pub use error::{Error, Result};
