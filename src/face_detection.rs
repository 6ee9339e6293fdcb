//! SCRFD face detector over ONNX Runtime.
//!
//! The frame is letterboxed into the model input, every stride level yields
//! per-anchor scores and distance-encoded boxes, and the decoded boxes go
//! through NMS. Results are ordered by score, so index 0 is the most
//! confident face.

use crate::{
    config::FaceDetectionConfig,
    constants::{IMAGE_NORMALIZATION_OFFSET, IMAGE_NORMALIZATION_SCALE},
    error::Error,
    utils::{
        corners_to_rect, ensure_model_file, image_conversion::to_bgr, non_max_suppression,
        safe_cast::{u32_to_i32, usize_to_i32},
    },
    Result,
};
use ndarray::{Array4, CowArray};
use opencv::{
    core::{Mat, Rect, Scalar, Size, Vec3b, CV_8UC3},
    imgproc::{self, InterpolationFlags},
    prelude::*,
};
use ort::{Environment, Session, Value};
use std::{path::Path, sync::Arc};

/// Input size used when the model leaves it dynamic
const DEFAULT_INPUT_SIZE: i32 = 640;

/// Face detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRegion {
    /// Bounding box in frame coordinates
    pub bbox: Rect,
    /// Detector confidence
    pub score: f32,
}

/// Output layout of an SCRFD export, derived from its output count
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputLayout {
    /// Distance between the score block and the box block
    offset: usize,
    strides: Vec<i32>,
    anchors_per_cell: usize,
}

impl OutputLayout {
    fn from_output_count(count: usize) -> Self {
        match count {
            6 | 9 => Self {
                offset: 3,
                strides: vec![8, 16, 32],
                anchors_per_cell: 2,
            },
            10 | 15 => Self {
                offset: 5,
                strides: vec![8, 16, 32, 64, 128],
                anchors_per_cell: 1,
            },
            _ => {
                log::warn!("Unknown face detector layout with {count} outputs, assuming 3 strides");
                Self {
                    offset: 3,
                    strides: vec![8, 16, 32],
                    anchors_per_cell: 2,
                }
            }
        }
    }
}

/// Anchor centres for one stride level, row-major with `per_cell` copies per cell
#[allow(clippy::cast_precision_loss)]
fn anchor_centers(height: i32, width: i32, stride: i32, per_cell: usize) -> Vec<(f32, f32)> {
    let mut centers = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let c = ((x * stride) as f32, (y * stride) as f32);
            centers.extend(std::iter::repeat(c).take(per_cell.max(1)));
        }
    }
    centers
}

/// Decode `(left, top, right, bottom)` distances from an anchor centre
fn distance_to_bbox(center: (f32, f32), d: [f32; 4]) -> [f32; 4] {
    [center.0 - d[0], center.1 - d[1], center.0 + d[2], center.1 + d[3]]
}

/// SCRFD face detector
pub struct FaceDetector {
    session: Session,
    input_size: (i32, i32),
    layout: OutputLayout,
    conf_threshold: f32,
    nms_threshold: f32,
}

impl FaceDetector {
    /// Load the detector from an ONNX model file
    ///
    /// # Errors
    ///
    /// Returns an error if the ONNX environment cannot be created, the model
    /// cannot be loaded or it has no inputs
    pub fn new<P: AsRef<Path>>(model_path: P, conf_threshold: f32, nms_threshold: f32) -> Result<Self> {
        log::info!("Loading face detector from {}", model_path.as_ref().display());
        ensure_model_file(model_path.as_ref())?;
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input_meta = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelInputError("Face detector has no inputs".to_string()))?;

        // [batch, channels, height, width]
        let dim = |i: usize| {
            input_meta
                .dimensions
                .get(i)
                .copied()
                .flatten()
                .and_then(|d| u32_to_i32(d).ok())
                .filter(|&d| d > 0)
                .unwrap_or(DEFAULT_INPUT_SIZE)
        };
        let input_size = (dim(3), dim(2));
        let layout = OutputLayout::from_output_count(session.outputs.len());
        log::debug!("Face detector input {input_size:?}, layout {layout:?}");

        Ok(Self {
            session,
            input_size,
            layout,
            conf_threshold,
            nms_threshold,
        })
    }

    /// Load the detector with thresholds from configuration
    ///
    /// # Errors
    ///
    /// See [`FaceDetector::new`]
    pub fn from_config<P: AsRef<Path>>(model_path: P, config: &FaceDetectionConfig) -> Result<Self> {
        Self::new(model_path, config.confidence_threshold, config.iou_threshold)
    }

    /// Detect faces, most confident first
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing, inference or output decoding fails
    pub fn detect(&self, image: &Mat) -> Result<Vec<FaceRegion>> {
        if image.empty() {
            return Ok(Vec::new());
        }
        let image = to_bgr(image)?;
        let (padded, det_scale) = self.letterbox(&image)?;
        let input = Self::preprocess(&padded)?;
        self.forward(input, det_scale)
    }

    /// Resize preserving aspect ratio and pad bottom/right to the input size
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn letterbox(&self, image: &Mat) -> Result<(Mat, f32)> {
        let (input_width, input_height) = self.input_size;
        let ratio_img = image.rows() as f32 / image.cols() as f32;
        let ratio_model = input_height as f32 / input_width as f32;

        let (new_width, new_height) = if ratio_img > ratio_model {
            ((input_height as f32 / ratio_img) as i32, input_height)
        } else {
            (input_width, (input_width as f32 * ratio_img) as i32)
        };
        let new_width = new_width.clamp(1, input_width);
        let new_height = new_height.clamp(1, input_height);

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(new_width, new_height),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut padded = Mat::new_rows_cols_with_default(input_height, input_width, CV_8UC3, Scalar::all(0.0))?;
        let mut roi = padded.roi_mut(Rect::new(0, 0, new_width, new_height))?;
        resized.copy_to(&mut roi)?;

        Ok((padded, new_height as f32 / image.rows() as f32))
    }

    /// RGB, `(p - 127.5) / 128`, NCHW
    #[allow(clippy::cast_sign_loss)]
    fn preprocess(image: &Mat) -> Result<Array4<f32>> {
        let height = image.rows() as usize;
        let width = image.cols() as usize;
        let mut array = Array4::<f32>::zeros((1, 3, height, width));

        for row in 0..height {
            for col in 0..width {
                let bgr = image.at_2d::<Vec3b>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                for (ch, src) in [2usize, 1, 0].into_iter().enumerate() {
                    array[[0, ch, row, col]] =
                        (f32::from(bgr[src]) - IMAGE_NORMALIZATION_OFFSET) / IMAGE_NORMALIZATION_SCALE;
                }
            }
        }

        Ok(array)
    }

    #[allow(clippy::cast_precision_loss)]
    fn forward(&self, input: Array4<f32>, det_scale: f32) -> Result<Vec<FaceRegion>> {
        let (input_width, input_height) = self.input_size;

        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        let mut boxes = Vec::new();
        let mut scores = Vec::new();

        for (idx, &stride) in self.layout.strides.iter().enumerate() {
            let bbox_idx = idx + self.layout.offset;
            let (Some(score_out), Some(bbox_out)) = (outputs.get(idx), outputs.get(bbox_idx)) else {
                return Err(Error::ModelOutputError(format!(
                    "Face detector produced {} outputs, expected at least {}",
                    outputs.len(),
                    bbox_idx + 1
                )));
            };

            let score_tensor = score_out.try_extract::<f32>()?;
            let level_scores: Vec<f32> = score_tensor.view().iter().copied().collect();
            let bbox_tensor = bbox_out.try_extract::<f32>()?;
            let distances: Vec<f32> = bbox_tensor.view().iter().map(|&d| d * stride as f32).collect();

            let centers = anchor_centers(
                input_height / stride,
                input_width / stride,
                stride,
                self.layout.anchors_per_cell,
            );
            if distances.len() < centers.len() * 4 || level_scores.len() < centers.len() {
                return Err(Error::ModelDataFormatError(format!(
                    "Stride {stride}: {} anchors but {} scores and {} distances",
                    centers.len(),
                    level_scores.len(),
                    distances.len()
                )));
            }

            for (i, &center) in centers.iter().enumerate() {
                let score = level_scores[i];
                if score < self.conf_threshold {
                    continue;
                }
                let d = [distances[i * 4], distances[i * 4 + 1], distances[i * 4 + 2], distances[i * 4 + 3]];
                let b = distance_to_bbox(center, d);
                boxes.push(b.map(|v| v / det_scale));
                scores.push(score);
            }
        }

        Ok(non_max_suppression(&boxes, &scores, self.nms_threshold)
            .into_iter()
            .map(|i| FaceRegion {
                bbox: corners_to_rect(boxes[i]),
                score: scores[i],
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_bbox() {
        let b = distance_to_bbox((100.0, 100.0), [10.0, 10.0, 20.0, 20.0]);
        assert_eq!(b, [90.0, 90.0, 120.0, 120.0]);
        assert_eq!(corners_to_rect(b), Rect::new(90, 90, 30, 30));
    }

    #[test]
    fn test_anchor_centers_repeat_per_cell() {
        let centers = anchor_centers(2, 3, 8, 2);
        assert_eq!(centers.len(), 12);
        assert_eq!(centers[0], (0.0, 0.0));
        assert_eq!(centers[1], (0.0, 0.0));
        assert_eq!(centers[2], (8.0, 0.0));
        assert_eq!(centers[6], (0.0, 8.0));
    }

    #[test]
    fn test_layout_from_output_count() {
        assert_eq!(OutputLayout::from_output_count(9).strides, vec![8, 16, 32]);
        assert_eq!(OutputLayout::from_output_count(10).anchors_per_cell, 1);
        assert_eq!(OutputLayout::from_output_count(15).offset, 5);
        assert_eq!(OutputLayout::from_output_count(4).offset, 3);
    }
}
