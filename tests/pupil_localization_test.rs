mod test_helpers;

use attention_tracker::{
    classifier::GazeDirection,
    pose_estimation::EulerAngles,
    pupil_detection::PupilLocalizer,
    tracker::{AttentionTracker, Estimate, MissReason},
};
use opencv::{
    core::{Mat, Point, Rect, Scalar, CV_8UC3},
    imgproc,
    prelude::*,
};
use test_helpers::*;

#[test]
fn test_dark_disk_centre_is_found() {
    let crop = eye_crop_with_disk(100, Point::new(50, 40), 13).unwrap();
    let observation = PupilLocalizer::default().locate(&crop).unwrap().expect("pupil");

    assert!((observation.center.x - 50).abs() <= 1, "x = {}", observation.center.x);
    assert!((observation.center.y - 40).abs() <= 1, "y = {}", observation.center.y);

    let normalized = observation.normalized();
    assert!((normalized.x - 0.5).abs() <= 0.01);
    assert!((normalized.y - 0.4).abs() <= 0.01);
}

#[test]
fn test_speck_is_rejected() {
    let crop = eye_crop_with_disk(40, Point::new(20, 20), 1).unwrap();
    assert!(PupilLocalizer::default().locate(&crop).unwrap().is_none());
}

#[test]
fn test_blob_filling_crop_is_rejected() {
    let mut crop = Mat::new_rows_cols_with_default(100, 100, CV_8UC3, Scalar::all(BACKGROUND)).unwrap();
    imgproc::rectangle(
        &mut crop,
        Rect::new(2, 2, 96, 96),
        Scalar::all(0.0),
        -1,
        imgproc::LINE_8,
        0,
    )
    .unwrap();
    assert!(PupilLocalizer::default().locate(&crop).unwrap().is_none());
}

#[test]
fn test_region_offset_maps_to_frame() {
    let mut frame = blank_frame().unwrap();
    imgproc::circle(&mut frame, Point::new(330, 215), 6, Scalar::all(0.0), -1, imgproc::LINE_8, 0).unwrap();

    let region = Rect::new(300, 200, 60, 36);
    let observation = PupilLocalizer::default()
        .locate_in_frame(&frame, region)
        .unwrap()
        .expect("pupil");
    let in_frame = observation.in_frame(region);

    assert!((in_frame.x - 330).abs() <= 1);
    assert!((in_frame.y - 215).abs() <= 1);
}

#[test]
fn test_region_outside_frame_has_no_pupil() {
    let frame = blank_frame().unwrap();
    let region = Rect::new(FRAME_WIDTH + 10, 0, 40, 40);
    assert!(PupilLocalizer::default().locate_in_frame(&frame, region).unwrap().is_none());
}

#[test]
fn test_centred_pupils_read_as_down_without_baseline() {
    let landmarks = synthetic_landmarks(EulerAngles::default()).unwrap();
    let frame = frame_with_pupils(&landmarks, 0.5, 0.5).unwrap();

    let mut tracker = AttentionTracker::new();
    let analysis = tracker.process_frame(&frame, Some(&landmarks), false).unwrap();

    let (left, right) = analysis.normalized_pupils().expect("both pupils");
    assert!((left.x - 0.5).abs() < 0.05 && (right.x - 0.5).abs() < 0.05);
    assert_eq!(analysis.gaze, Estimate::Detected(GazeDirection::Down));
    assert!(analysis.smoothed_pupils.is_some());
}

#[test]
fn test_missing_pupil_is_no_gaze() {
    let landmarks = synthetic_landmarks(EulerAngles::default()).unwrap();
    let frame = blank_frame().unwrap();

    let mut tracker = AttentionTracker::new();
    let analysis = tracker.process_frame(&frame, Some(&landmarks), false).unwrap();

    assert_eq!(analysis.gaze, Estimate::Unavailable(MissReason::NoPupil));
    assert!(analysis.normalized_pupils().is_none());
    assert!(analysis.smoothed_pupils.is_none());
    // Pose is independent of the pupils
    assert!(analysis.angles.is_detected());
}
