//! Channel-count normalization for incoming frames and crops.

use crate::{Error, Result};
use opencv::{
    core::{Mat, CV_8U},
    imgproc,
    prelude::*,
};

/// Convert a frame to 3-channel 8-bit BGR.
///
/// Grayscale and BGRA inputs are converted; 3-channel 8-bit input is copied.
///
/// # Errors
///
/// Returns `InvalidInput` for empty frames or unsupported channel counts
pub fn to_bgr(frame: &Mat) -> Result<Mat> {
    if frame.empty() || frame.rows() <= 0 || frame.cols() <= 0 {
        return Err(Error::InvalidInput("Empty frame".to_string()));
    }

    let frame = to_8bit(frame)?;
    let code = match frame.channels() {
        3 => return Ok(frame),
        1 => imgproc::COLOR_GRAY2BGR,
        4 => imgproc::COLOR_BGRA2BGR,
        n => {
            return Err(Error::InvalidInput(format!("Unsupported channel count: {n}")));
        }
    };

    let mut bgr = Mat::default();
    imgproc::cvt_color(&frame, &mut bgr, code, 0)?;
    Ok(bgr)
}

/// Convert a frame or crop to single-channel 8-bit grayscale
///
/// # Errors
///
/// Returns `InvalidInput` for empty images or unsupported channel counts
pub fn to_grayscale(image: &Mat) -> Result<Mat> {
    if image.empty() || image.rows() <= 0 || image.cols() <= 0 {
        return Err(Error::InvalidInput("Empty image".to_string()));
    }

    let image = to_8bit(image)?;
    let code = match image.channels() {
        1 => return Ok(image),
        3 => imgproc::COLOR_BGR2GRAY,
        4 => imgproc::COLOR_BGRA2GRAY,
        n => {
            return Err(Error::InvalidInput(format!("Unsupported channel count: {n}")));
        }
    };

    let mut gray = Mat::default();
    imgproc::cvt_color(&image, &mut gray, code, 0)?;
    Ok(gray)
}

/// Bring any depth down to 8-bit with the same channel count
fn to_8bit(image: &Mat) -> Result<Mat> {
    if image.depth() == CV_8U {
        return Ok(image.try_clone()?);
    }
    let mut converted = Mat::default();
    image.convert_to(&mut converted, CV_8U, 1.0, 0.0)?;
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_32FC1, CV_8UC1, CV_8UC3, CV_8UC4};

    #[test]
    fn test_to_bgr_channel_counts() {
        for cv_type in [CV_8UC1, CV_8UC3, CV_8UC4] {
            let frame = Mat::new_rows_cols_with_default(10, 20, cv_type, Scalar::all(7.0)).unwrap();
            let bgr = to_bgr(&frame).unwrap();
            assert_eq!(bgr.channels(), 3);
            assert_eq!(bgr.rows(), 10);
            assert_eq!(bgr.cols(), 20);
        }
    }

    #[test]
    fn test_to_grayscale_channel_counts() {
        for cv_type in [CV_8UC1, CV_8UC3, CV_8UC4] {
            let frame = Mat::new_rows_cols_with_default(4, 4, cv_type, Scalar::all(100.0)).unwrap();
            let gray = to_grayscale(&frame).unwrap();
            assert_eq!(gray.channels(), 1);
            assert_eq!(*gray.at_2d::<u8>(0, 0).unwrap(), 100);
        }
    }

    #[test]
    fn test_float_input_is_converted() {
        let frame = Mat::new_rows_cols_with_default(4, 4, CV_32FC1, Scalar::all(12.0)).unwrap();
        let gray = to_grayscale(&frame).unwrap();
        assert_eq!(gray.depth(), CV_8U);
        assert_eq!(*gray.at_2d::<u8>(1, 1).unwrap(), 12);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(to_bgr(&Mat::default()).is_err());
        assert!(to_grayscale(&Mat::default()).is_err());
    }
}
