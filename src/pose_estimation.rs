use crate::{
    camera_model::CameraModel,
    constants::{NUM_POSE_POINTS, SINGULARITY_EPSILON},
    pose_model::PoseModel,
    utils::safe_cast::round_point,
    Result,
};
use nalgebra::{Matrix3, Rotation3, Vector3};
use opencv::{
    calib3d,
    core::{Mat, Point2f, Point2i, Point3f, Vec3d, Vector},
    prelude::*,
};

/// Head orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    /// Rotation about the horizontal axis, positive when the face turns up
    pub pitch: f64,
    /// Rotation about the vertical axis, negative when the subject turns to their left
    pub yaw: f64,
    /// In-plane rotation
    pub roll: f64,
}

impl EulerAngles {
    /// Create a new angle triple
    #[must_use]
    pub const fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Angles as `[pitch, yaw, roll]`
    #[must_use]
    pub fn to_array(self) -> [f64; 3] {
        [self.pitch, self.yaw, self.roll]
    }

    /// Build from `[pitch, yaw, roll]`
    #[must_use]
    pub fn from_array(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }
}

/// Result of a successful pose solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    /// Decomposed orientation in degrees
    pub angles: EulerAngles,
    /// Rodrigues rotation vector as returned by the solver (model to camera)
    pub rotation_vec: Vector3<f64>,
    /// Translation vector in model units
    pub translation_vec: Vector3<f64>,
    /// Whether the decomposition hit the gimbal-lock branch
    pub singular: bool,
}

/// Face-frame alignment applied on the camera side of the solved rotation
#[rustfmt::skip]
const CAMERA_ALIGNMENT: [f64; 9] = [
    -1.0, 0.0, 0.0,
    0.0, 1.0, 0.0,
    0.0, 0.0, -1.0,
];

/// Face-frame alignment applied on the model side of the solved rotation
#[rustfmt::skip]
const MODEL_ALIGNMENT: [f64; 9] = [
    -1.0, 0.0, 0.0,
    0.0, -1.0, 0.0,
    0.0, 0.0, 1.0,
];

/// Re-express a model-to-camera rotation so that a face looking straight at
/// the camera is the identity.
///
/// The model is y-up/z-toward-viewer while the camera is y-down/z-forward, so a
/// frontal solve comes back as a half turn about x. Without this the pitch of a
/// frontal face sits on the ±180° seam and a median over it is meaningless.
#[must_use]
pub fn align_to_viewer(rotation: &Matrix3<f64>) -> Matrix3<f64> {
    let camera = Matrix3::from_row_slice(&CAMERA_ALIGNMENT);
    let model = Matrix3::from_row_slice(&MODEL_ALIGNMENT);
    camera * rotation * model
}

/// Whether a rotation matrix is in the gimbal-lock configuration
#[must_use]
pub fn is_singular(r: &Matrix3<f64>) -> bool {
    (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt() < SINGULARITY_EPSILON
}

/// Convert a rotation matrix to pitch/yaw/roll in degrees.
///
/// In the singular case roll is forced to zero and pitch is recovered from
/// the second column instead.
#[must_use]
pub fn rotation_matrix_to_euler(r: &Matrix3<f64>) -> EulerAngles {
    let sy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();

    let (pitch, yaw, roll) = if sy < SINGULARITY_EPSILON {
        (
            (-r[(1, 2)]).atan2(r[(1, 1)]),
            (-r[(2, 0)]).atan2(sy),
            0.0,
        )
    } else {
        (
            r[(2, 1)].atan2(r[(2, 2)]),
            (-r[(2, 0)]).atan2(sy),
            r[(1, 0)].atan2(r[(0, 0)]),
        )
    };

    EulerAngles::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Rodrigues rotation vector to rotation matrix
#[must_use]
pub fn rotation_vector_to_matrix(rotation_vec: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::new(*rotation_vec).into_inner()
}

/// Head pose estimator using the iterative `PnP` solver
pub struct PoseEstimator {
    camera_matrix: Mat,
    dist_coeffs: Mat,
}

impl PoseEstimator {
    /// Create an estimator for the given camera model
    ///
    /// # Errors
    ///
    /// Returns an error if OpenCV matrix construction fails
    pub fn new(camera: &CameraModel) -> Result<Self> {
        Ok(Self {
            camera_matrix: camera.camera_matrix_mat()?,
            dist_coeffs: camera.distortion_mat()?,
        })
    }

    /// Create an estimator with intrinsics approximated from the frame width
    ///
    /// # Errors
    ///
    /// Returns an error if OpenCV matrix construction fails
    pub fn for_frame_width(width: i32) -> Result<Self> {
        log::info!("Initializing PoseEstimator for {width}px wide frames");
        Self::new(&CameraModel::from_frame_width(width))
    }

    /// Solve for head pose from the six landmark correspondences.
    ///
    /// A solver that does not converge, or throws on degenerate input, yields
    /// `Ok(None)`: a failed frame is a miss, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading the solver output fails
    pub fn estimate_pose(
        &self,
        model: &PoseModel,
        image_points: &[Point2f; NUM_POSE_POINTS],
    ) -> Result<Option<PoseEstimate>> {
        let object_points: Vector<Point3f> = model.points().iter().copied().collect();
        let image_points: Vector<Point2f> = image_points.iter().copied().collect();

        let mut rvec = Mat::default();
        let mut tvec = Mat::default();

        let solved = calib3d::solve_pnp(
            &object_points,
            &image_points,
            &self.camera_matrix,
            &self.dist_coeffs,
            &mut rvec,
            &mut tvec,
            false,
            calib3d::SOLVEPNP_ITERATIVE,
        );

        match solved {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("PnP solver did not converge");
                return Ok(None);
            }
            Err(e) => {
                log::debug!("PnP solver failed: {e}");
                return Ok(None);
            }
        }

        let rotation_vec = Vector3::new(
            *rvec.at_2d::<f64>(0, 0)?,
            *rvec.at_2d::<f64>(1, 0)?,
            *rvec.at_2d::<f64>(2, 0)?,
        );
        let translation_vec = Vector3::new(
            *tvec.at_2d::<f64>(0, 0)?,
            *tvec.at_2d::<f64>(1, 0)?,
            *tvec.at_2d::<f64>(2, 0)?,
        );

        if !rotation_vec.iter().chain(translation_vec.iter()).all(|v| v.is_finite()) {
            log::debug!("PnP solver returned non-finite pose");
            return Ok(None);
        }

        let rotation = align_to_viewer(&rotation_vector_to_matrix(&rotation_vec));

        Ok(Some(PoseEstimate {
            angles: rotation_matrix_to_euler(&rotation),
            rotation_vec,
            translation_vec,
            singular: is_singular(&rotation),
        }))
    }

    /// Project the nose tip and a point `length` model units in front of it,
    /// giving the endpoints of a facing-direction line for drawing.
    ///
    /// # Errors
    ///
    /// Returns an error if point projection fails
    pub fn project_nose_axis(&self, pose: &PoseEstimate, length: f32) -> Result<(Point2i, Point2i)> {
        let object_points: Vector<Point3f> = [Point3f::new(0.0, 0.0, 0.0), Point3f::new(0.0, 0.0, length)]
            .into_iter()
            .collect();
        let rvec = Vec3d::from([pose.rotation_vec.x, pose.rotation_vec.y, pose.rotation_vec.z]);
        let tvec = Vec3d::from([pose.translation_vec.x, pose.translation_vec.y, pose.translation_vec.z]);

        let mut projected: Vector<Point2f> = Vector::new();
        calib3d::project_points(
            &object_points,
            &rvec,
            &tvec,
            &self.camera_matrix,
            &self.dist_coeffs,
            &mut projected,
            &mut Mat::default(),
            0.0,
        )?;

        let start = projected.get(0)?;
        let end = projected.get(1)?;
        Ok((round_point(start), round_point(end)))
    }
}
