//! Capture loop: camera, detectors, calibration and overlay around an
//! [`AttentionTracker`].

use crate::{
    calibration::{CalibrationController, CalibrationPhase},
    config::Config,
    distraction::DistractionGate,
    error::{Error, Result},
    face_detection::FaceDetector,
    landmarks::LandmarkSet,
    mark_detection::MarkDetector,
    object_detection::ObjectDetector,
    tracker::{AttentionTracker, Estimate, FrameAnalysis},
    utils::{image_conversion::to_bgr, refine_box, safe_cast::f32_to_i32_clamp},
};
use log::{debug, info, warn};
use opencv::{
    core::{self, Mat, Point, Point2f, Rect, Scalar},
    highgui::{self, WINDOW_NORMAL},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE},
};
use std::{
    thread,
    time::{Duration, Instant},
};

const WINDOW_NAME: &str = "Attention Tracker";
const KEY_ESC: i32 = 27;

/// Overlay colours, BGR
const GREEN: [f64; 3] = [0.0, 255.0, 0.0];
const RED: [f64; 3] = [0.0, 0.0, 255.0];
const YELLOW: [f64; 3] = [0.0, 255.0, 255.0];
const BLUE: [f64; 3] = [255.0, 0.0, 0.0];
const WHITE: [f64; 3] = [255.0, 255.0, 255.0];

fn color([b, g, r]: [f64; 3]) -> Scalar {
    Scalar::new(b, g, r, 0.0)
}

/// Video source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Webcam index
    Camera(i32),
    /// Video file path
    File(String),
}

/// Open a capture, retrying a camera up to `retries` times with a fixed pause.
///
/// # Errors
///
/// Returns [`Error::CameraError`] when the source never opens
pub fn open_capture(source: &VideoSource, retries: u32, backoff: Duration) -> Result<VideoCapture> {
    let attempts = retries.max(1);
    for attempt in 1..=attempts {
        let opened = match source {
            VideoSource::Camera(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            VideoSource::File(path) => VideoCapture::from_file(path, videoio::CAP_ANY),
        };

        match opened {
            Ok(mut cap) if cap.is_opened().unwrap_or(false) => {
                if let VideoSource::Camera(index) = source {
                    // Keep latency low; not every backend supports it
                    if !cap.set(CAP_PROP_BUFFERSIZE, 1.0).unwrap_or(false) {
                        debug!("Camera {index} ignores buffer size setting");
                    }
                }
                info!("Opened {source:?} on attempt {attempt}");
                return Ok(cap);
            }
            Ok(_) => warn!("{source:?} did not open (attempt {attempt}/{attempts})"),
            Err(e) => warn!("{source:?} failed to open (attempt {attempt}/{attempts}): {e}"),
        }

        // Files do not appear by waiting
        if matches!(source, VideoSource::File(_)) {
            break;
        }
        if attempt < attempts {
            thread::sleep(backoff);
        }
    }

    Err(Error::CameraError(format!("Could not open {source:?}")))
}

/// Consecutive failed camera reads, bounded by `limit`
#[derive(Debug, Clone, Copy)]
struct MissedFrames {
    limit: u32,
    count: u32,
}

impl MissedFrames {
    fn new(limit: u32) -> Self {
        Self { limit: limit.max(1), count: 0 }
    }

    /// Count one miss; `false` once the limit is exceeded
    fn record_miss(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count <= self.limit
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub video_source: VideoSource,
    pub settings: Config,
}

/// Outcome of one capture read
enum FrameRead {
    Frame(Mat),
    /// Camera hiccup; the frame is skipped
    Missing,
    /// End of a video file
    End,
}

/// Main application struct
pub struct AttentionApp {
    config: AppConfig,
    capture: VideoCapture,
    face_detector: FaceDetector,
    mark_detector: MarkDetector,
    object_detector: Option<ObjectDetector>,
    gate: DistractionGate,
    tracker: AttentionTracker,
    window_open: bool,
}

impl AttentionApp {
    /// Validate settings, load every model and open the video source.
    ///
    /// # Errors
    ///
    /// Every failure here is a setup failure: invalid settings, a missing or
    /// unloadable model, or a source that cannot be opened
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing attention tracker");
        let settings = &config.settings;
        settings.validate()?;
        settings.validate_model_paths()?;

        let face_detector = FaceDetector::from_config(&settings.models.face_detector, &settings.face_detection)?;
        let mark_detector = MarkDetector::new(&settings.models.face_landmarks)?;
        let object_detector = if settings.distraction.enabled {
            Some(ObjectDetector::new(&settings.models.object_detector)?)
        } else {
            info!("Distraction detection disabled");
            None
        };

        let capture = open_capture(
            &config.video_source,
            settings.camera.open_retries,
            Duration::from_millis(settings.camera.retry_backoff_ms),
        )?;

        let window_open = settings.display.show_window;
        if window_open {
            highgui::named_window(WINDOW_NAME, WINDOW_NORMAL)?;
        }

        Ok(Self {
            gate: DistractionGate::from_config(&settings.distraction),
            tracker: AttentionTracker::from_config(settings),
            config,
            capture,
            face_detector,
            mark_detector,
            object_detector,
            window_open,
        })
    }

    /// Calibrate, then track until the source ends or the user quits
    ///
    /// # Errors
    ///
    /// Returns an error if capture, inference or drawing fails
    pub fn run(&mut self) -> Result<()> {
        info!("Starting main application loop");
        let mut calibration = Some(CalibrationController::start(&self.config.settings.calibration, Instant::now()));
        let mut frame_count: u64 = 0;
        let mut missed = MissedFrames::new(self.config.settings.camera.open_retries);
        let backoff_ms = i32::try_from(self.config.settings.camera.retry_backoff_ms.max(1)).unwrap_or(i32::MAX);

        loop {
            let frame = match self.read_frame()? {
                FrameRead::Frame(frame) => {
                    missed.reset();
                    frame
                }
                FrameRead::Missing => {
                    if !missed.record_miss() {
                        return Err(Error::CameraError(format!(
                            "No frame from {:?} after {} consecutive reads",
                            self.config.video_source, missed.count
                        )));
                    }
                    warn!("Failed to read frame ({}/{}), retrying", missed.count, missed.limit);
                    if self.quit_requested(backoff_ms)? {
                        break;
                    }
                    continue;
                }
                FrameRead::End => {
                    info!("End of video reached after {frame_count} frames");
                    break;
                }
            };
            frame_count += 1;

            let (analysis, face_box, landmarks) = self.analyze(&frame)?;
            debug!(
                "Frame {frame_count}: head {} gaze {} distraction {}",
                analysis.head, analysis.gaze, analysis.distraction_detected
            );

            let now = Instant::now();
            let mut status = None;
            if let Some(controller) = calibration.as_mut() {
                let phase = controller.observe(now, analysis.calibration_sample());
                if self.tracker.head_calibration().is_none() {
                    if let Some(head) = controller.head_calibration() {
                        self.tracker.set_head_calibration(*head);
                    }
                }
                if phase == CalibrationPhase::Complete {
                    self.tracker.set_gaze_baseline(controller.gaze_baseline().copied());
                    calibration = None;
                    info!("Calibration finished, tracking attention");
                } else {
                    status = Some((phase, controller.remaining(now)));
                }
            }

            if self.window_open {
                let mut display = frame;
                self.draw_overlay(&mut display, &analysis, face_box, landmarks.as_ref(), status)?;
                highgui::imshow(WINDOW_NAME, &display)?;

                if self.quit_requested(1)? {
                    break;
                }
            }
        }

        info!("Application shutting down");
        Ok(())
    }

    /// Wait up to `delay_ms` for ESC or `q`; sleeps instead when no window is shown
    fn quit_requested(&self, delay_ms: i32) -> Result<bool> {
        if !self.window_open {
            thread::sleep(Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0)));
            return Ok(false);
        }
        let key = highgui::wait_key(delay_ms)?;
        if key == KEY_ESC || key == i32::from(b'q') {
            info!("Exit requested by user");
            return Ok(true);
        }
        Ok(false)
    }

    fn read_frame(&mut self) -> Result<FrameRead> {
        let mut raw = Mat::default();
        let ok = self.capture.read(&mut raw)?;
        if !ok || raw.empty() {
            if matches!(self.config.video_source, VideoSource::File(_)) {
                return Ok(FrameRead::End);
            }
            return Ok(FrameRead::Missing);
        }

        let frame = to_bgr(&raw)?;
        if self.config.settings.camera.mirror {
            let mut mirrored = Mat::default();
            core::flip(&frame, &mut mirrored, 1)?;
            return Ok(FrameRead::Frame(mirrored));
        }
        Ok(FrameRead::Frame(frame))
    }

    /// Detect the first face, regress its landmarks and run the tracker
    fn analyze(&mut self, frame: &Mat) -> Result<(FrameAnalysis, Option<Rect>, Option<LandmarkSet>)> {
        let distraction = match &self.object_detector {
            Some(detector) => self.gate.distraction_detected(&detector.detect(frame)?),
            None => false,
        };

        let faces = self.face_detector.detect(frame)?;
        let Some(face) = faces.first() else {
            let analysis = self.tracker.process_frame(frame, None, distraction)?;
            return Ok((analysis, None, None));
        };

        let face_box = refine_box(
            face.bbox,
            frame.cols(),
            frame.rows(),
            self.config.settings.face_detection.bbox_expansion,
        );
        if face_box.width <= 0 || face_box.height <= 0 {
            let analysis = self.tracker.process_frame(frame, None, distraction)?;
            return Ok((analysis, None, None));
        }

        let landmarks = self.mark_detector.detect(frame, face_box)?;
        let analysis = self.tracker.process_frame(frame, Some(&landmarks), distraction)?;
        Ok((analysis, Some(face_box), Some(landmarks)))
    }

    fn draw_overlay(
        &self,
        frame: &mut Mat,
        analysis: &FrameAnalysis,
        face_box: Option<Rect>,
        landmarks: Option<&LandmarkSet>,
        calibration: Option<(CalibrationPhase, Duration)>,
    ) -> Result<()> {
        if let Some(face_box) = face_box {
            imgproc::rectangle(frame, face_box, color(GREEN), 2, LINE_8, 0)?;
        }

        if let (Some(landmarks), true) = (landmarks, self.config.settings.display.draw_landmarks) {
            for &p in landmarks.points() {
                let center = to_pixel(frame, p);
                imgproc::circle(frame, center, 1, color(WHITE), -1, LINE_8, 0)?;
            }
        }

        if let Some((left, right)) = analysis.smoothed_pupils {
            for p in [left, right] {
                let center = to_pixel(frame, p);
                imgproc::circle(frame, center, 3, color(BLUE), -1, LINE_8, 0)?;
            }
        }

        if let Some((start, end)) = analysis.nose_line {
            imgproc::line(frame, start, end, color(YELLOW), 2, LINE_8, 0)?;
        }

        put_line(frame, &format!("Head: {}", analysis.head), 0, GREEN)?;
        put_line(frame, &format!("Gaze: {}", analysis.gaze), 1, GREEN)?;
        if let Estimate::Detected(angles) = analysis.angles {
            put_line(
                frame,
                &format!("Pitch {:.1} Yaw {:.1} Roll {:.1}", angles.pitch, angles.yaw, angles.roll),
                2,
                YELLOW,
            )?;
        }
        if analysis.distraction_detected {
            put_line(frame, "Distraction detected", 3, RED)?;
        }

        if let Some((phase, remaining)) = calibration {
            let prompt = match phase {
                CalibrationPhase::Head => "Calibrating head: look at the screen",
                CalibrationPhase::Pupil => "Calibrating gaze: look straight ahead",
                CalibrationPhase::Complete => "Calibration complete",
            };
            put_line(frame, &format!("{prompt} ({:.0}s)", remaining.as_secs_f64().ceil()), 5, WHITE)?;
        }

        Ok(())
    }
}

fn to_pixel(frame: &Mat, p: Point2f) -> Point {
    Point::new(
        f32_to_i32_clamp(p.x.round(), 0, frame.cols()),
        f32_to_i32_clamp(p.y.round(), 0, frame.rows()),
    )
}

/// Draw one line of the text block in the top-left corner
fn put_line(frame: &mut Mat, text: &str, line: i32, bgr: [f64; 3]) -> Result<()> {
    imgproc::put_text(
        frame,
        text,
        Point::new(10, 30 + line * 30),
        FONT_HERSHEY_SIMPLEX,
        0.7,
        color(bgr),
        2,
        LINE_8,
        false,
    )?;
    Ok(())
}

impl Drop for AttentionApp {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release video capture: {e}");
        }
        if self.window_open {
            if let Err(e) = highgui::destroy_all_windows() {
                warn!("Failed to close windows: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_fails_without_retrying() {
        let source = VideoSource::File("/nonexistent/attention-tracker.mp4".to_string());
        let started = Instant::now();
        let result = open_capture(&source, 5, Duration::from_secs(2));
        assert!(matches!(result, Err(Error::CameraError(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_missed_frames_bounded_and_reset() {
        let mut missed = MissedFrames::new(3);
        assert!(missed.record_miss());
        assert!(missed.record_miss());
        missed.reset();
        for _ in 0..3 {
            assert!(missed.record_miss());
        }
        assert!(!missed.record_miss());
    }

    #[test]
    fn test_zero_miss_limit_still_allows_one_retry() {
        let mut missed = MissedFrames::new(0);
        assert!(missed.record_miss());
        assert!(!missed.record_miss());
    }
}
