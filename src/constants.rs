//! Constants used throughout the application

/// Number of facial landmarks for full face
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Number of 2D/3D correspondences fed to the pose solver
pub const NUM_POSE_POINTS: usize = 6;

/// Semantic landmark indices (68-point iBUG layout)
pub const JAW_LEFT: usize = 0;
pub const CHIN: usize = 8;
pub const JAW_RIGHT: usize = 16;
pub const NOSE_TIP: usize = 30;
pub const LEFT_EYE_OUTER: usize = 36;
pub const RIGHT_EYE_OUTER: usize = 45;
pub const MOUTH_LEFT: usize = 48;
pub const MOUTH_RIGHT: usize = 54;

/// Landmark ranges outlining each eye
pub const LEFT_EYE_RANGE: std::ops::Range<usize> = 36..42;
pub const RIGHT_EYE_RANGE: std::ops::Range<usize> = 42..48;

/// Default capacity of every rolling history
pub const DEFAULT_HISTORY_LEN: usize = 5;

/// Face width (jaw to jaw) the 3D reference model is expressed in
pub const MODEL_REFERENCE_WIDTH: f32 = 60.0;

/// Camera principal point factors relative to frame width
pub const CAMERA_CENTER_X_FACTOR: f64 = 0.5;
pub const CAMERA_CENTER_Y_FACTOR: f64 = 3.0 / 8.0;

/// Approximate lens distortion (k1, k2, p1, p2)
pub const CAMERA_DISTORTION: [f64; 4] = [0.1, 0.1, 0.0, 0.0];

/// Below this `sqrt(R00² + R10²)` the Euler decomposition is singular
pub const SINGULARITY_EPSILON: f64 = 1e-6;

/// Extra degrees a reading must exceed its threshold by before it leaves the dead zone
pub const HYSTERESIS_MARGIN: f64 = 1.0;

/// Normalized pupil coordinate used when a crop dimension is zero
pub const NORMALIZED_PUPIL_FALLBACK: f64 = 0.5;

/// Image normalization constants for face detection
pub const IMAGE_NORMALIZATION_OFFSET: f32 = 127.5;
pub const IMAGE_NORMALIZATION_SCALE: f32 = 128.0;
