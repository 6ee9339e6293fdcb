//! Pupil localization inside an eye crop.
//!
//! The pupil is the darkest compact blob of the eye region. The crop is
//! equalized, blurred and inverse-thresholded, and the largest external
//! contour whose area falls inside a plausibility band is taken as the pupil.

use crate::{
    config::PupilConfig,
    constants::NORMALIZED_PUPIL_FALLBACK,
    utils::{image_conversion::to_grayscale, safe_cast::f32_to_i32_clamp},
    Result,
};
use opencv::{
    core::{Mat, Point, Point2f, Point2i, Rect, Size, Vector, BORDER_DEFAULT},
    imgproc,
    prelude::*,
};

/// Gaussian kernel applied before thresholding
const BLUR_KERNEL: i32 = 5;

/// Pupil centre within its eye crop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PupilObservation {
    /// Centre in crop pixel coordinates
    pub center: Point2i,
    /// Crop the centre was measured in
    pub crop_size: Size,
}

impl PupilObservation {
    /// Centre relative to the crop dimensions
    #[must_use]
    pub fn normalized(&self) -> NormalizedPupil {
        NormalizedPupil::from_center(self.center, self.crop_size)
    }

    /// Centre in frame coordinates given the crop's position
    #[must_use]
    pub fn in_frame(&self, region: Rect) -> Point2i {
        Point2i::new(region.x + self.center.x, region.y + self.center.y)
    }
}

/// Pupil position in `[0, 1] x [0, 1]` relative to its eye crop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPupil {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPupil {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Normalize a crop-relative centre; a zero dimension maps to the midpoint
    #[must_use]
    pub fn from_center(center: Point2i, crop_size: Size) -> Self {
        let x = if crop_size.width > 0 {
            f64::from(center.x) / f64::from(crop_size.width)
        } else {
            NORMALIZED_PUPIL_FALLBACK
        };
        let y = if crop_size.height > 0 {
            f64::from(center.y) / f64::from(crop_size.height)
        } else {
            NORMALIZED_PUPIL_FALLBACK
        };
        Self { x, y }
    }
}

/// Whether a contour area is plausible for a pupil in a crop of `crop_area` px².
///
/// Both bounds are exclusive: tiny specks and blobs that fill a large share
/// of the crop (eyelashes, hair, shadows) are rejected.
#[must_use]
pub fn is_plausible_pupil_area(area: f64, crop_area: f64, min_area: f64, max_area_fraction: f64) -> bool {
    area > min_area && area < max_area_fraction * crop_area
}

/// Dark-blob pupil segmenter
#[derive(Debug, Clone)]
pub struct PupilLocalizer {
    intensity_threshold: f64,
    min_area: f64,
    max_area_fraction: f64,
}

impl Default for PupilLocalizer {
    fn default() -> Self {
        Self::from_config(&PupilConfig::default())
    }
}

impl PupilLocalizer {
    #[must_use]
    pub fn new(intensity_threshold: f64, min_area: f64, max_area_fraction: f64) -> Self {
        Self {
            intensity_threshold,
            min_area,
            max_area_fraction,
        }
    }

    #[must_use]
    pub fn from_config(config: &PupilConfig) -> Self {
        Self::new(config.intensity_threshold, config.min_area, config.max_area_fraction)
    }

    /// Locate the pupil in the part of `frame` covered by `region`
    ///
    /// # Errors
    ///
    /// Returns an error if OpenCV fails while cropping or segmenting
    pub fn locate_in_frame(&self, frame: &Mat, region: Rect) -> Result<Option<PupilObservation>> {
        let x0 = region.x.max(0);
        let y0 = region.y.max(0);
        let x1 = (region.x + region.width).min(frame.cols());
        let y1 = (region.y + region.height).min(frame.rows());
        if x1 <= x0 || y1 <= y0 {
            return Ok(None);
        }
        let region = Rect::new(x0, y0, x1 - x0, y1 - y0);

        let crop = Mat::roi(frame, region)?.try_clone()?;
        self.locate(&crop)
    }

    /// Locate the pupil in an eye crop, returning its centre relative to the crop.
    ///
    /// `Ok(None)` covers every "no pupil" outcome: empty crop, no contour and
    /// no contour inside the area band.
    ///
    /// # Errors
    ///
    /// Returns an error if an OpenCV operation fails
    pub fn locate(&self, crop: &Mat) -> Result<Option<PupilObservation>> {
        if crop.empty() || crop.rows() <= 0 || crop.cols() <= 0 {
            return Ok(None);
        }

        let mask = self.segment(crop)?;

        let mut contours: Vector<Vector<Point>> = Vector::new();
        imgproc::find_contours(
            &mask,
            &mut contours,
            imgproc::RETR_EXTERNAL,
            imgproc::CHAIN_APPROX_SIMPLE,
            Point::new(0, 0),
        )?;

        let mut candidates = Vec::with_capacity(contours.len());
        for contour in contours {
            let area = imgproc::contour_area(&contour, false)?;
            candidates.push((area, contour));
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let crop_area = f64::from(crop.rows()) * f64::from(crop.cols());
        let Some((area, contour)) = candidates
            .into_iter()
            .find(|(area, _)| is_plausible_pupil_area(*area, crop_area, self.min_area, self.max_area_fraction))
        else {
            log::debug!("No plausible pupil contour in {}x{} crop", crop.cols(), crop.rows());
            return Ok(None);
        };

        let mut center = Point2f::default();
        let mut radius = 0.0f32;
        imgproc::min_enclosing_circle(&contour, &mut center, &mut radius)?;
        log::trace!("Pupil contour area {area:.1}, radius {radius:.1}");

        Ok(Some(PupilObservation {
            center: Point2i::new(
                f32_to_i32_clamp(center.x.round(), 0, crop.cols()),
                f32_to_i32_clamp(center.y.round(), 0, crop.rows()),
            ),
            crop_size: Size::new(crop.cols(), crop.rows()),
        }))
    }

    /// Binary mask where dark pixels are set
    fn segment(&self, crop: &Mat) -> Result<Mat> {
        let gray = to_grayscale(crop)?;

        let mut equalized = Mat::default();
        imgproc::equalize_hist(&gray, &mut equalized)?;

        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            &equalized,
            &mut blurred,
            Size::new(BLUR_KERNEL, BLUR_KERNEL),
            0.0,
            0.0,
            BORDER_DEFAULT,
        )?;

        let mut mask = Mat::default();
        imgproc::threshold(
            &blurred,
            &mut mask,
            self.intensity_threshold,
            255.0,
            imgproc::THRESH_BINARY_INV,
        )?;

        Ok(mask)
    }
}
