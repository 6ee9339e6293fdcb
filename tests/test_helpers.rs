//! Helper functions and utilities for tests
#![allow(dead_code)]

use attention_tracker::{
    camera_model::CameraModel,
    constants::{
        CHIN, JAW_LEFT, JAW_RIGHT, LEFT_EYE_OUTER, MOUTH_LEFT, MOUTH_RIGHT, NOSE_TIP, NUM_FACIAL_LANDMARKS,
        RIGHT_EYE_OUTER,
    },
    landmarks::{Eye, LandmarkSet},
    pose_estimation::{align_to_viewer, EulerAngles},
    pose_model::PoseModel,
    Result,
};
use nalgebra::{Rotation3, Vector3};
use opencv::{
    calib3d,
    core::{Mat, Point, Point2f, Point3f, Rect, Scalar, Vec3d, Vector, CV_8UC3},
    imgproc,
    prelude::*,
};

pub const FRAME_WIDTH: i32 = 640;
pub const FRAME_HEIGHT: i32 = 480;
/// Jaw-to-jaw width of the synthetic face in pixels
pub const FACE_WIDTH: f32 = 240.0;
/// Distance of the synthetic face from the camera, in model units
pub const FACE_DISTANCE: f64 = 1000.0;
/// Intensity of skin and sclera in synthetic frames
pub const BACKGROUND: f64 = 200.0;

/// Create a test image with specified dimensions and type
pub fn create_test_image(height: i32, width: i32, cv_type: i32) -> Result<Mat> {
    Mat::zeros(height, width, cv_type)?.to_mat().map_err(Into::into)
}

/// Uniform bright BGR frame
pub fn blank_frame() -> Result<Mat> {
    Ok(Mat::new_rows_cols_with_default(
        FRAME_HEIGHT,
        FRAME_WIDTH,
        CV_8UC3,
        Scalar::all(BACKGROUND),
    )?)
}

/// Bright square crop with one dark filled disk
pub fn eye_crop_with_disk(size: i32, center: Point, radius: i32) -> Result<Mat> {
    let mut crop = Mat::new_rows_cols_with_default(size, size, CV_8UC3, Scalar::all(BACKGROUND))?;
    imgproc::circle(&mut crop, center, radius, Scalar::all(0.0), -1, imgproc::LINE_8, 0)?;
    Ok(crop)
}

/// Solver-frame rotation vector that decomposes to `angles`
pub fn rotation_vector_for(angles: EulerAngles) -> Vector3<f64> {
    let head = Rotation3::from_euler_angles(
        angles.pitch.to_radians(),
        angles.yaw.to_radians(),
        angles.roll.to_radians(),
    );
    // The viewer alignment is an involution
    let camera = align_to_viewer(head.matrix());
    Rotation3::from_matrix_unchecked(camera).scaled_axis()
}

/// Project the six model points of a `FACE_WIDTH` face posed at `angles`
pub fn project_pose_points(angles: EulerAngles) -> Result<Vec<Point2f>> {
    let model = PoseModel::with_scale(FACE_WIDTH / 60.0)
        .ok_or_else(|| attention_tracker::Error::InvalidInput("bad scale".to_string()))?;
    let camera = CameraModel::from_frame_width(FRAME_WIDTH);

    let object_points: Vector<Point3f> = model.points().iter().copied().collect();
    let r = rotation_vector_for(angles);
    let rvec = Vec3d::from([r.x, r.y, r.z]);
    let tvec = Vec3d::from([0.0, 0.0, FACE_DISTANCE]);

    let mut projected: Vector<Point2f> = Vector::new();
    calib3d::project_points(
        &object_points,
        &rvec,
        &tvec,
        &camera.camera_matrix_mat()?,
        &camera.distortion_mat()?,
        &mut projected,
        &mut Mat::default(),
        0.0,
    )?;
    Ok(projected.to_vec())
}

/// Full 68-point set whose pose correspondences come from `angles`.
///
/// The jaw corners span `FACE_WIDTH` around the nose so the pose model
/// built from the set matches the projected one. Each eye outline is a
/// 40x20 px hexagon next to its outer corner.
pub fn synthetic_landmarks(angles: EulerAngles) -> Result<LandmarkSet> {
    let projected = project_pose_points(angles)?;
    let mut points = vec![Point2f::new(0.0, 0.0); NUM_FACIAL_LANDMARKS];

    for (idx, p) in [NOSE_TIP, CHIN, LEFT_EYE_OUTER, RIGHT_EYE_OUTER, MOUTH_LEFT, MOUTH_RIGHT]
        .into_iter()
        .zip(projected.iter())
    {
        points[idx] = *p;
    }

    let nose = points[NOSE_TIP];
    points[JAW_LEFT] = Point2f::new(nose.x - FACE_WIDTH / 2.0, nose.y);
    points[JAW_RIGHT] = Point2f::new(nose.x + FACE_WIDTH / 2.0, nose.y);

    // Left eye: 36 outer corner, 39 inner corner toward the nose
    let outer = points[LEFT_EYE_OUTER];
    points[37] = Point2f::new(outer.x + 13.0, outer.y - 10.0);
    points[38] = Point2f::new(outer.x + 27.0, outer.y - 10.0);
    points[39] = Point2f::new(outer.x + 40.0, outer.y);
    points[40] = Point2f::new(outer.x + 27.0, outer.y + 10.0);
    points[41] = Point2f::new(outer.x + 13.0, outer.y + 10.0);

    // Right eye: 42 inner corner, 45 outer corner
    let outer = points[RIGHT_EYE_OUTER];
    points[42] = Point2f::new(outer.x - 40.0, outer.y);
    points[43] = Point2f::new(outer.x - 27.0, outer.y - 10.0);
    points[44] = Point2f::new(outer.x - 13.0, outer.y - 10.0);
    points[46] = Point2f::new(outer.x - 13.0, outer.y + 10.0);
    points[47] = Point2f::new(outer.x - 27.0, outer.y + 10.0);

    LandmarkSet::new(points)
}

/// Eye crops the tracker will search for `landmarks`, with its default padding
pub fn eye_regions(landmarks: &LandmarkSet) -> Option<(Rect, Rect)> {
    Some((
        landmarks.eye_region(Eye::Left, 8, FRAME_WIDTH, FRAME_HEIGHT)?,
        landmarks.eye_region(Eye::Right, 8, FRAME_WIDTH, FRAME_HEIGHT)?,
    ))
}

/// Frame with a dark pupil drawn in each eye crop at the given relative position
pub fn frame_with_pupils(landmarks: &LandmarkSet, rel_x: f64, rel_y: f64) -> Result<Mat> {
    let mut frame = blank_frame()?;
    let (left, right) = eye_regions(landmarks)
        .ok_or_else(|| attention_tracker::Error::InvalidInput("eye outside frame".to_string()))?;

    for region in [left, right] {
        #[allow(clippy::cast_possible_truncation)]
        let center = Point::new(
            region.x + (f64::from(region.width) * rel_x).round() as i32,
            region.y + (f64::from(region.height) * rel_y).round() as i32,
        );
        imgproc::circle(&mut frame, center, 5, Scalar::all(0.0), -1, imgproc::LINE_8, 0)?;
    }
    Ok(frame)
}

/// Assert two angle sets agree within `tolerance` degrees per axis
pub fn assert_angles_close(actual: EulerAngles, expected: EulerAngles, tolerance: f64) {
    for (a, e, axis) in [
        (actual.pitch, expected.pitch, "pitch"),
        (actual.yaw, expected.yaw, "yaw"),
        (actual.roll, expected.roll, "roll"),
    ] {
        assert!(
            (a - e).abs() < tolerance,
            "{axis}: got {a:.3}, expected {e:.3} (actual {actual:?})"
        );
    }
}
