//! Checked numeric conversions between OpenCV, ONNX and pixel types

use crate::{Error, Result};
use opencv::core::{Point2f, Point2i};

/// Pixel coordinates beyond this magnitude are treated as off-image
const MAX_PIXEL_COORD: i32 = 1 << 24;

fn checked_i32<T>(value: T) -> Result<i32>
where
    T: TryInto<i32> + Copy + std::fmt::Display,
{
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("{value} does not fit a pixel index")))
}

/// Loop counter or tensor index as an OpenCV index
///
/// # Errors
///
/// Returns `InvalidInput` above `i32::MAX`
pub fn usize_to_i32(value: usize) -> Result<i32> {
    checked_i32(value)
}

/// ONNX tensor dimension as an OpenCV size
///
/// # Errors
///
/// Returns `InvalidInput` above `i32::MAX`
pub fn u32_to_i32(value: u32) -> Result<i32> {
    checked_i32(value)
}

/// Saturate a float coordinate into `[min, max]` (bounds in either order).
/// NaN and infinities land on the lower bound.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn f32_to_i32_clamp(value: f32, min: i32, max: i32) -> i32 {
    let (lo, hi) = (min.min(max), min.max(max));
    if value.is_finite() {
        // The f32 bounds can round past i32 range, so clamp again after the cast
        (value.clamp(lo as f32, hi as f32) as i32).clamp(lo, hi)
    } else {
        lo
    }
}

/// Round a sub-pixel point to the nearest pixel
#[must_use]
pub fn round_point(p: Point2f) -> Point2i {
    Point2i::new(
        f32_to_i32_clamp(p.x.round(), -MAX_PIXEL_COORD, MAX_PIXEL_COORD),
        f32_to_i32_clamp(p.y.round(), -MAX_PIXEL_COORD, MAX_PIXEL_COORD),
    )
}
