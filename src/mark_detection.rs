use crate::{
    constants::NUM_FACIAL_LANDMARKS,
    error::Error,
    landmarks::LandmarkSet,
    utils::{ensure_model_file, image_conversion::to_bgr, safe_cast::usize_to_i32},
    Result,
};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Point2f, Rect, Size, Vec3b};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Landmark regressor input size
const LANDMARK_INPUT_SIZE: i32 = 128;

/// 68-point facial landmark regressor using `ONNX` Runtime
///
/// The model takes a square NHWC RGB crop scaled to `[0, 1]` and returns 136
/// values: x/y pairs normalized to the crop.
pub struct MarkDetector {
    session: Session,
    input_size: i32,
}

impl MarkDetector {
    /// Load the regressor from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX runtime environment cannot be created
    /// - The ONNX model file cannot be loaded
    /// - The model has no inputs or outputs
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!("Loading landmark model from {}", model_path.as_ref().display());
        ensure_model_file(model_path.as_ref())?;
        let environment = Arc::new(
            Environment::builder()
                .with_name("mark_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelInputError("Landmark model has no inputs".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(Error::ModelOutputError("Landmark model has no outputs".to_string()));
        }

        Ok(Self {
            session,
            input_size: LANDMARK_INPUT_SIZE,
        })
    }

    /// Regress the 68 landmarks of the face inside `face_box`, in frame coordinates
    ///
    /// `face_box` must lie inside `frame`; use [`crate::utils::refine_box`] on
    /// the detector output first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The crop or preprocessing fails
    /// - Inference fails
    /// - The model returns fewer than 136 values
    pub fn detect(&self, frame: &Mat, face_box: Rect) -> Result<LandmarkSet> {
        if face_box.width <= 0 || face_box.height <= 0 {
            return Err(Error::InvalidInput(format!("Empty face box {face_box:?}")));
        }
        let crop = Mat::roi(frame, face_box)?.try_clone()?;
        let crop = to_bgr(&crop)?;

        let input = self.preprocess(&crop)?;
        let marks = self.forward(input)?;

        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (face_box.width as f32, face_box.height as f32);
        #[allow(clippy::cast_precision_loss)]
        let (x0, y0) = (face_box.x as f32, face_box.y as f32);

        let points = marks
            .chunks_exact(2)
            .take(NUM_FACIAL_LANDMARKS)
            .map(|xy| Point2f::new(x0 + xy[0] * w, y0 + xy[1] * h))
            .collect();
        LandmarkSet::new(points)
    }

    /// Resize, BGR to RGB, scale to `[0, 1]`, NHWC
    #[allow(clippy::cast_sign_loss)] // Input size is a positive constant
    fn preprocess(&self, crop: &Mat) -> Result<Array4<f32>> {
        let mut resized = Mat::default();
        imgproc::resize(
            crop,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let size = self.input_size as usize;
        let mut array = Array4::<f32>::zeros((1, size, size, 3));
        for row in 0..size {
            for col in 0..size {
                let bgr = resized.at_2d::<Vec3b>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                array[[0, row, col, 0]] = f32::from(bgr[2]) / 255.0;
                array[[0, row, col, 1]] = f32::from(bgr[1]) / 255.0;
                array[[0, row, col, 2]] = f32::from(bgr[0]) / 255.0;
            }
        }

        Ok(array)
    }

    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let marks_output = outputs
            .first()
            .ok_or_else(|| Error::ModelOutputError("No output from landmark model".to_string()))?;
        let marks_tensor = marks_output.try_extract::<f32>()?;
        let marks: Vec<f32> = marks_tensor.view().iter().copied().collect();

        if marks.len() < NUM_FACIAL_LANDMARKS * 2 {
            return Err(Error::ModelDataFormatError(format!(
                "Landmark model returned {} values, expected {}",
                marks.len(),
                NUM_FACIAL_LANDMARKS * 2
            )));
        }
        Ok(marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_length_matches_landmark_count() {
        assert_eq!(NUM_FACIAL_LANDMARKS * 2, 136);
        assert_eq!(LANDMARK_INPUT_SIZE, 128);
    }

    #[test]
    fn test_missing_model_is_model_error() {
        match MarkDetector::new("/nonexistent/face_landmarks.onnx") {
            Err(Error::ModelError(msg)) => assert!(msg.contains("face_landmarks.onnx")),
            Err(other) => panic!("Expected ModelError, got {other:?}"),
            Ok(_) => panic!("Expected ModelError"),
        }
    }
}
