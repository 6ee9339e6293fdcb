//! YOLOv8-style object detector feeding the distraction gate.
//!
//! The model output is `[1, 4 + C, N]`: for each of the `N` candidates a
//! centre/size box in input pixels followed by `C` class scores. Each
//! candidate keeps its best class, and candidates under `min_score` are
//! skipped before NMS. The confidence, class and shape policy is applied
//! afterwards by [`crate::distraction::DistractionGate`].

use crate::{
    distraction::ObjectDetection,
    error::Error,
    utils::{
        corners_to_rect, ensure_model_file, image_conversion::to_bgr, non_max_suppression,
        safe_cast::{u32_to_i32, usize_to_i32},
    },
    Result,
};
use ndarray::{Array4, ArrayViewD, CowArray, Ix3};
use opencv::{
    core::{Mat, Size, Vec3b},
    imgproc::{self, InterpolationFlags},
    prelude::*,
};
use ort::{Environment, Session, Value};
use std::{path::Path, sync::Arc};

const DEFAULT_INPUT_SIZE: i32 = 640;
/// Candidates below this score never reach NMS
const DEFAULT_MIN_SCORE: f32 = 0.25;
const DEFAULT_NMS_THRESHOLD: f32 = 0.45;

/// Decode a `[1, 4 + C, N]` prediction tensor.
///
/// Boxes are scaled from input pixels to frame pixels with `scale_x` and
/// `scale_y`.
///
/// # Errors
///
/// Returns an error if the tensor is not three-dimensional or has no class rows
pub fn decode_predictions(
    output: &ArrayViewD<'_, f32>,
    scale_x: f32,
    scale_y: f32,
    min_score: f32,
    nms_threshold: f32,
) -> Result<Vec<ObjectDetection>> {
    let output = output
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|e| Error::ModelDataFormatError(format!("Object detector output is not 3-D: {e}")))?;

    let rows = output.shape()[1];
    if rows <= 4 {
        return Err(Error::ModelDataFormatError(format!(
            "Object detector output has {rows} rows, expected 4 box rows plus class scores"
        )));
    }
    let candidates = output.shape()[2];

    let mut boxes = Vec::new();
    let mut scores = Vec::new();
    let mut classes = Vec::new();

    for i in 0..candidates {
        let (class_id, score) = (4..rows)
            .map(|r| (r - 4, output[[0, r, i]]))
            .fold((0, f32::NEG_INFINITY), |best, c| if c.1 > best.1 { c } else { best });
        if score < min_score {
            continue;
        }

        let (cx, cy) = (output[[0, 0, i]], output[[0, 1, i]]);
        let (w, h) = (output[[0, 2, i]], output[[0, 3, i]]);
        boxes.push([
            (cx - w / 2.0) * scale_x,
            (cy - h / 2.0) * scale_y,
            (cx + w / 2.0) * scale_x,
            (cy + h / 2.0) * scale_y,
        ]);
        scores.push(score);
        classes.push(class_id);
    }

    Ok(non_max_suppression(&boxes, &scores, nms_threshold)
        .into_iter()
        .map(|i| ObjectDetection {
            bbox: corners_to_rect(boxes[i]),
            confidence: scores[i],
            class_id: classes[i],
        })
        .collect())
}

/// ONNX object detector
pub struct ObjectDetector {
    session: Session,
    input_size: i32,
    min_score: f32,
    nms_threshold: f32,
}

impl ObjectDetector {
    /// Load the detector from an ONNX model file
    ///
    /// # Errors
    ///
    /// Returns an error if the ONNX environment cannot be created or the model
    /// cannot be loaded
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!("Loading object detector from {}", model_path.as_ref().display());
        ensure_model_file(model_path.as_ref())?;
        let environment = Arc::new(
            Environment::builder()
                .with_name("object_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input_size = session
            .inputs
            .first()
            .and_then(|input| input.dimensions.get(2).copied().flatten())
            .and_then(|d| u32_to_i32(d).ok())
            .filter(|&d| d > 0)
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            input_size,
            min_score: DEFAULT_MIN_SCORE,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        })
    }

    /// Detect objects in a frame, in frame coordinates
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing, inference or output decoding fails
    #[allow(clippy::cast_precision_loss)]
    pub fn detect(&self, frame: &Mat) -> Result<Vec<ObjectDetection>> {
        if frame.empty() {
            return Ok(Vec::new());
        }
        let frame = to_bgr(frame)?;
        let input = self.preprocess(&frame)?;

        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let output = outputs
            .first()
            .ok_or_else(|| Error::ModelOutputError("No output from object detector".to_string()))?;
        let tensor = output.try_extract::<f32>()?;

        let scale_x = frame.cols() as f32 / self.input_size as f32;
        let scale_y = frame.rows() as f32 / self.input_size as f32;
        decode_predictions(&tensor.view(), scale_x, scale_y, self.min_score, self.nms_threshold)
    }

    /// Stretch to the square input, BGR to RGB, `[0, 1]`, NCHW
    #[allow(clippy::cast_sign_loss)]
    fn preprocess(&self, frame: &Mat) -> Result<Array4<f32>> {
        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let size = self.input_size as usize;
        let mut array = Array4::<f32>::zeros((1, 3, size, size));
        for row in 0..size {
            for col in 0..size {
                let bgr = resized.at_2d::<Vec3b>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                array[[0, 0, row, col]] = f32::from(bgr[2]) / 255.0;
                array[[0, 1, row, col]] = f32::from(bgr[1]) / 255.0;
                array[[0, 2, row, col]] = f32::from(bgr[0]) / 255.0;
            }
        }
        Ok(array)
    }
}
