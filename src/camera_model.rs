//! Approximate camera intrinsics derived from frame width alone.
//!
//! The tracker never runs a photogrammetric calibration. Focal length is taken
//! to be the frame width and the principal point sits at `(w / 2, w * 3 / 8)`,
//! which is the image centre for 4:3 frames.

use crate::{
    constants::{CAMERA_CENTER_X_FACTOR, CAMERA_CENTER_Y_FACTOR, CAMERA_DISTORTION},
    utils::safe_cast::usize_to_i32,
    Result,
};
use nalgebra::Matrix3;
use opencv::{
    core::{Mat, CV_64F},
    prelude::*,
};

/// Pinhole intrinsics plus a fixed distortion vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraModel {
    /// 3x3 intrinsic matrix
    pub matrix: Matrix3<f64>,
    /// Distortion coefficients `(k1, k2, p1, p2)`
    pub distortion: [f64; 4],
}

impl CameraModel {
    /// Build the approximate intrinsics for a frame of the given width
    #[must_use]
    pub fn from_frame_width(width: i32) -> Self {
        let focal_length = f64::from(width);
        let cx = f64::from(width) * CAMERA_CENTER_X_FACTOR;
        let cy = f64::from(width) * CAMERA_CENTER_Y_FACTOR;

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            focal_length, 0.0, cx,
            0.0, focal_length, cy,
            0.0, 0.0, 1.0,
        );

        Self {
            matrix,
            distortion: CAMERA_DISTORTION,
        }
    }

    /// Focal length in pixels
    #[must_use]
    pub fn focal_length(&self) -> f64 {
        self.matrix[(0, 0)]
    }

    /// Principal point `(cx, cy)` in pixels
    #[must_use]
    pub fn principal_point(&self) -> (f64, f64) {
        (self.matrix[(0, 2)], self.matrix[(1, 2)])
    }

    /// Intrinsic matrix as a 3x3 `CV_64F` Mat
    ///
    /// # Errors
    ///
    /// Returns an error if OpenCV matrix allocation or access fails
    pub fn camera_matrix_mat(&self) -> Result<Mat> {
        let mut mat = Mat::zeros(3, 3, CV_64F)?.to_mat()?;
        for i in 0..3 {
            for j in 0..3 {
                *mat.at_2d_mut::<f64>(usize_to_i32(i)?, usize_to_i32(j)?)? = self.matrix[(i, j)];
            }
        }
        Ok(mat)
    }

    /// Distortion vector as a 4x1 `CV_64F` Mat
    ///
    /// # Errors
    ///
    /// Returns an error if OpenCV matrix allocation or access fails
    pub fn distortion_mat(&self) -> Result<Mat> {
        let mut mat = Mat::zeros(4, 1, CV_64F)?.to_mat()?;
        for (i, &value) in self.distortion.iter().enumerate() {
            *mat.at_2d_mut::<f64>(usize_to_i32(i)?, 0)? = value;
        }
        Ok(mat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsics_from_width() {
        let camera = CameraModel::from_frame_width(640);
        assert_eq!(camera.focal_length(), 640.0);
        assert_eq!(camera.principal_point(), (320.0, 240.0));
        assert_eq!(camera.matrix[(1, 1)], 640.0);
        assert_eq!(camera.matrix[(2, 2)], 1.0);
        assert_eq!(camera.matrix[(1, 0)], 0.0);
        assert_eq!(camera.distortion, [0.1, 0.1, 0.0, 0.0]);
    }

    #[test]
    fn test_intrinsics_are_pure() {
        let a = CameraModel::from_frame_width(1280);
        let b = CameraModel::from_frame_width(1280);
        assert_eq!(a, b);
        assert_ne!(a, CameraModel::from_frame_width(640));
    }

    #[test]
    fn test_mat_conversion() {
        let camera = CameraModel::from_frame_width(800);
        let k = camera.camera_matrix_mat().unwrap();
        assert_eq!(*k.at_2d::<f64>(0, 0).unwrap(), 800.0);
        assert_eq!(*k.at_2d::<f64>(1, 2).unwrap(), 300.0);

        let d = camera.distortion_mat().unwrap();
        assert_eq!(d.rows(), 4);
        assert_eq!(*d.at_2d::<f64>(1, 0).unwrap(), 0.1);
    }
}
