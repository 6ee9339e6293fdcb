mod test_helpers;

use attention_tracker::{
    constants::{LEFT_EYE_RANGE, NOSE_TIP, NUM_FACIAL_LANDMARKS},
    landmarks::LandmarkSet,
    pose_estimation::{rotation_matrix_to_euler, align_to_viewer, rotation_vector_to_matrix, EulerAngles, PoseEstimator},
    pose_model::PoseModel,
    tracker::{AttentionTracker, Estimate, MissReason},
};
use opencv::core::Point2f;
use test_helpers::*;

fn solve(angles: EulerAngles) -> attention_tracker::pose_estimation::PoseEstimate {
    let landmarks = synthetic_landmarks(angles).unwrap();
    let model = PoseModel::from_landmarks(&landmarks).unwrap();
    let estimator = PoseEstimator::for_frame_width(FRAME_WIDTH).unwrap();
    estimator
        .estimate_pose(&model, &landmarks.pose_correspondences())
        .unwrap()
        .expect("synthetic face should solve")
}

#[test]
fn test_rotation_vector_helper_round_trips() {
    let angles = EulerAngles::new(-12.0, 20.0, 7.0);
    let r = align_to_viewer(&rotation_vector_to_matrix(&rotation_vector_for(angles)));
    assert_angles_close(rotation_matrix_to_euler(&r), angles, 1e-6);
}

#[test]
fn test_frontal_face_recovers_zero_angles() {
    let pose = solve(EulerAngles::default());
    assert_angles_close(pose.angles, EulerAngles::default(), 1.0);
    assert!(!pose.singular);
    assert!(pose.translation_vec.z > 0.0, "face must be in front of the camera");
}

#[test]
fn test_turned_faces_recover_their_angles() {
    for angles in [
        EulerAngles::new(0.0, 20.0, 0.0),
        EulerAngles::new(0.0, -20.0, 0.0),
        EulerAngles::new(15.0, 0.0, 0.0),
        EulerAngles::new(-10.0, 0.0, 0.0),
        EulerAngles::new(0.0, 0.0, 10.0),
        EulerAngles::new(-8.0, 12.0, 5.0),
    ] {
        let pose = solve(angles);
        assert_angles_close(pose.angles, angles, 1.0);
    }
}

#[test]
fn test_nose_axis_starts_at_nose_tip() {
    let landmarks = synthetic_landmarks(EulerAngles::default()).unwrap();
    let model = PoseModel::from_landmarks(&landmarks).unwrap();
    let estimator = PoseEstimator::for_frame_width(FRAME_WIDTH).unwrap();
    let pose = estimator
        .estimate_pose(&model, &landmarks.pose_correspondences())
        .unwrap()
        .unwrap();

    let (start, _end) = estimator.project_nose_axis(&pose, 100.0).unwrap();
    let nose = landmarks.point(NOSE_TIP);
    assert!((start.x as f32 - nose.x).abs() <= 1.0);
    assert!((start.y as f32 - nose.y).abs() <= 1.0);
}

#[test]
fn test_tracker_smooths_recovered_angles() {
    let mut tracker = AttentionTracker::new();
    let frame = blank_frame().unwrap();
    let landmarks = synthetic_landmarks(EulerAngles::new(0.0, 15.0, 0.0)).unwrap();

    let mut last = None;
    for _ in 0..6 {
        let analysis = tracker.process_frame(&frame, Some(&landmarks), false).unwrap();
        // No calibration yet, so the head state waits
        assert_eq!(analysis.head, Estimate::Unavailable(MissReason::Uncalibrated));
        assert!(analysis.nose_line.is_some());
        last = analysis.angles.detected();
    }

    assert_angles_close(last.unwrap(), EulerAngles::new(0.0, 15.0, 0.0), 1.0);
}

#[test]
fn test_failed_pose_adds_no_angle_sample() {
    let mut tracker = AttentionTracker::new();
    let frame = blank_frame().unwrap();
    let valid = synthetic_landmarks(EulerAngles::new(0.0, 10.0, 0.0)).unwrap();
    let collapsed = LandmarkSet::new(vec![Point2f::new(320.0, 240.0); NUM_FACIAL_LANDMARKS]).unwrap();

    let first = tracker.process_frame(&frame, Some(&valid), false).unwrap();
    assert!(first.angles.is_detected());
    assert_eq!(tracker.angle_samples(), 1);

    let failed = tracker.process_frame(&frame, Some(&collapsed), false).unwrap();
    assert_eq!(failed.angles, Estimate::Unavailable(MissReason::NoPose));
    assert!(failed.nose_line.is_none());
    assert_eq!(tracker.angle_samples(), 1);

    let second = tracker.process_frame(&frame, Some(&valid), false).unwrap();
    assert!(second.angles.is_detected());
    assert_eq!(tracker.angle_samples(), 2);
    assert_angles_close(second.angles.detected().unwrap(), EulerAngles::new(0.0, 10.0, 0.0), 1.0);
}

#[test]
fn test_eye_outside_frame_is_no_pupil() {
    let mut tracker = AttentionTracker::new();
    let frontal = synthetic_landmarks(EulerAngles::default()).unwrap();
    let frame = frame_with_pupils(&frontal, 0.5, 0.5).unwrap();
    let mut points = frontal.points().to_vec();
    for idx in LEFT_EYE_RANGE {
        points[idx].x += FRAME_WIDTH as f32;
    }
    let landmarks = LandmarkSet::new(points).unwrap();

    let analysis = tracker.process_frame(&frame, Some(&landmarks), false).unwrap();
    assert_eq!(analysis.gaze, Estimate::Unavailable(MissReason::NoPupil));
    assert!(analysis.normalized_pupils().is_none());
}
