use crate::{
    camera_set::CameraSet,
    linalg,
    pointcloud::PointCloud,
    shapes::{Circle, Cylinder},
};

/// The world up direction the fitted basis is sign-corrected against.
pub const GLOBAL_UP: [f64; 3] = [0.0, 1.0, 0.0];

/// The world forward direction the fitted basis is sign-corrected against.
pub const GLOBAL_FORWARD: [f64; 3] = [0.0, 0.0, -1.0];

/// The world left direction the fitted basis is sign-corrected against.
pub const GLOBAL_LEFT: [f64; 3] = [-1.0, 0.0, 0.0];

/// Largest centroid norm accepted after centring, in centimetres.
pub const CENTRING_TOLERANCE: f64 = 0.001;

/// Error types for the fitting stages.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    /// The camera centroid is not at the origin after centring.
    #[error("Camera centroid not in world origin after centring (norm {0})")]
    CentringFailed(f64),

    /// The camera set has no cameras.
    #[error("Cannot fit a circle to an empty camera set")]
    EmptyCameraSet,

    /// The orientation basis can not be inverted.
    #[error("The orientation basis is singular")]
    SingularBasis,
}

/// How the orientation basis of the capture circle is estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrientationMode {
    /// Average the cameras' up vectors and complete the basis with cross products.
    AverageDirection,
    /// Use the plane normal of the camera centres from a singular value decomposition.
    #[default]
    Svd,
}

impl OrientationMode {
    /// Map the integer code used in configuration files to a mode.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::AverageDirection),
            1 => Some(Self::Svd),
            _ => None,
        }
    }
}

/// An orthonormal `{left, up, forward}` frame fitted to a camera set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationBasis {
    /// The left direction.
    pub left: [f64; 3],
    /// The up direction, the normal of the capture plane.
    pub up: [f64; 3],
    /// The forward direction.
    pub forward: [f64; 3],
    /// Singular values of the centred camera centres in descending order, zero for
    /// [`OrientationMode::AverageDirection`].
    pub singular_values: [f64; 3],
}

impl OrientationBasis {
    /// The basis as a matrix with columns `[left, up, forward]`.
    pub fn as_matrix(&self) -> [[f64; 3]; 3] {
        linalg::mat33_from_cols(&self.left, &self.up, &self.forward)
    }
}

/// Options of [`fit_camera_circle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// How the orientation basis is estimated.
    pub mode: OrientationMode,
    /// Re-express all cameras in the fitted basis and refit.
    pub change_basis: bool,
    /// Radius of the capture circle in centimetres.
    pub circle_radius: f64,
    /// Radius of the proxy cylinder in centimetres.
    pub cylinder_radius: f64,
    /// Height of the proxy cylinder in centimetres.
    pub cylinder_height: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            mode: OrientationMode::Svd,
            change_basis: true,
            circle_radius: 100.0,
            cylinder_radius: 500.0,
            cylinder_height: 10000.0,
        }
    }
}

/// Outcome of the full fitting sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct FitState {
    /// The fitted capture circle.
    pub circle: Circle,
    /// The proxy cylinder derived from the circle.
    pub cylinder: Cylinder,
    /// The last fitted orientation basis.
    pub basis: OrientationBasis,
    /// Every basis applied by [`change_basis`], in application order.
    pub applied_bases: Vec<[[f64; 3]; 3]>,
    /// The centroid subtracted by [`centre_at_origin`].
    pub removed_centroid: [f64; 3],
    /// Factor applied to all camera centres by [`rescale_cameras`].
    pub physical_scale: f64,
}

/// Move the camera set and its point cloud so the camera centroid is at the origin.
///
/// # Arguments
///
/// * `cameras` - The cameras to centre.
/// * `points` - An optional point cloud moved by the same offset.
///
/// # Returns
///
/// The centroid that was removed.
///
/// # Errors
///
/// Fails if the set is empty or if the centroid norm is still above
/// [`CENTRING_TOLERANCE`] afterwards.
pub fn centre_at_origin(
    cameras: &mut CameraSet,
    points: Option<&mut PointCloud>,
) -> Result<[f64; 3], FitError> {
    if cameras.is_empty() {
        return Err(FitError::EmptyCameraSet);
    }

    let centroid = cameras.centroid();
    log::info!("Camera centroid before centring: {:?}", centroid);

    for camera in cameras.iter_mut() {
        let centre = linalg::sub_vec3(camera.centre(), &centroid);
        camera.set_centre(centre);
    }

    match points {
        Some(points) => points.translate(&linalg::scale_vec3(&centroid, -1.0)),
        None => log::info!("No point cloud available, so no centring"),
    }

    let new_centroid = cameras.centroid();
    log::info!("Camera centroid after centring: {:?}", new_centroid);

    let norm = linalg::norm3(&new_centroid);
    if norm > CENTRING_TOLERANCE {
        return Err(FitError::CentringFailed(norm));
    }

    Ok(centroid)
}

/// Estimate the `{left, up, forward}` frame of a centred camera set.
///
/// In [`OrientationMode::Svd`] the normal is the right singular vector with the
/// smallest singular value of the stacked camera centres. The vectors are obtained
/// from the 3x3 scatter matrix, which shares the right singular vectors of the
/// centre matrix and has the squared singular values.
///
/// Degenerate inputs, such as collinear centres, are not detected and may produce
/// zero vectors.
pub fn fit_orientation_basis(
    cameras: &CameraSet,
    mode: OrientationMode,
) -> Result<OrientationBasis, FitError> {
    if cameras.is_empty() {
        return Err(FitError::EmptyCameraSet);
    }

    let basis = match mode {
        OrientationMode::AverageDirection => {
            let mut up = cameras.average_up();
            if linalg::dot_product3(&up, &GLOBAL_UP) < 0.0 {
                up = linalg::scale_vec3(&up, -1.0);
            }

            let mut left = linalg::cross_vec3(&up, &GLOBAL_FORWARD);
            if linalg::dot_product3(&left, &GLOBAL_LEFT) < 0.0 {
                left = linalg::scale_vec3(&left, -1.0);
            }

            let mut forward = linalg::cross_vec3(&up, &left);
            if linalg::dot_product3(&forward, &GLOBAL_FORWARD) < 0.0 {
                forward = linalg::scale_vec3(&forward, -1.0);
            }

            OrientationBasis {
                left: linalg::normalize_vec3(&left),
                up: linalg::normalize_vec3(&up),
                forward: linalg::normalize_vec3(&forward),
                singular_values: [0.0; 3],
            }
        }
        OrientationMode::Svd => {
            let (vectors, singular_values) = centre_singular_vectors(&cameras.centres());

            let mut normal = vectors[2];
            if linalg::dot_product3(&normal, &GLOBAL_UP) < 0.0 {
                normal = linalg::scale_vec3(&normal, -1.0);
            }

            let left = linalg::cross_vec3(&normal, &GLOBAL_FORWARD);
            let mut forward = linalg::cross_vec3(&left, &normal);
            if linalg::dot_product3(&forward, &GLOBAL_FORWARD) < 0.0 {
                forward = linalg::scale_vec3(&forward, -1.0);
            }
            let left = linalg::cross_vec3(&normal, &forward);

            OrientationBasis {
                left: linalg::normalize_vec3(&left),
                up: linalg::normalize_vec3(&normal),
                forward: linalg::normalize_vec3(&forward),
                singular_values,
            }
        }
    };

    log::info!(
        "Orientation basis (det={}): left {:?}, up {:?}, forward {:?}",
        linalg::det_mat33(&basis.as_matrix()),
        basis.left,
        basis.up,
        basis.forward
    );

    Ok(basis)
}

// right singular vectors of the Nx3 centre matrix, sorted by descending singular value
fn centre_singular_vectors(centres: &[[f64; 3]]) -> ([[f64; 3]; 3], [f64; 3]) {
    let scatter = faer::Mat::<f64>::from_fn(3, 3, |i, j| {
        centres.iter().map(|c| c[i] * c[j]).sum::<f64>()
    });

    let svd = scatter.svd();
    let s = svd.s_diagonal();
    let v = svd.v();

    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| s.read(b).total_cmp(&s.read(a)));

    let mut vectors = [[0.0; 3]; 3];
    let mut values = [0.0; 3];
    for (k, &col) in order.iter().enumerate() {
        vectors[k] = [v.read(0, col), v.read(1, col), v.read(2, col)];
        values[k] = s.read(col).max(0.0).sqrt();
    }

    (vectors, values)
}

/// Build the capture circle at the camera centroid with the orientation of `basis`.
pub fn fit_circle(cameras: &CameraSet, basis: &OrientationBasis, radius: f64) -> Circle {
    let circle = Circle::new(cameras.centroid(), basis.up, basis.forward, radius);
    log::info!("Up vector of fitted circle is {:?}", circle.normal());
    circle
}

/// Re-express every camera in the frame given by `basis`.
///
/// Each rotation becomes `R·B⁻¹` and each centre is recomputed from the unchanged
/// translation. Calling this twice with the same basis rotates the cameras twice.
pub fn change_basis(cameras: &mut CameraSet, basis: &OrientationBasis) -> Result<(), FitError> {
    let inverse = linalg::inverse_mat33(&basis.as_matrix()).ok_or(FitError::SingularBasis)?;

    for camera in cameras.iter_mut() {
        let translation = camera.translation();
        let rotation = linalg::mat33_mul(camera.rotation(), &inverse);
        let centre = linalg::scale_vec3(
            &linalg::mat33_mul_vec3(&linalg::transpose_mat33(&rotation), &translation),
            -1.0,
        );
        log::debug!("Determinant of new rotation: {}", linalg::det_mat33(&rotation));
        camera.set_extrinsics(rotation, centre);
    }

    Ok(())
}

/// Scale all camera centres so their mean distance to the origin equals `radius`.
///
/// # Returns
///
/// The applied scale factor, `1` if the cameras all sit at the origin.
pub fn rescale_cameras(cameras: &mut CameraSet, radius: f64) -> f64 {
    if cameras.is_empty() {
        return 1.0;
    }

    let mean_distance =
        cameras.iter().map(|c| linalg::norm3(c.centre())).sum::<f64>() / cameras.len() as f64;
    if mean_distance <= 0.0 {
        log::warn!("All cameras are at the origin, skipping rescaling");
        return 1.0;
    }

    let scale = radius / mean_distance;
    for camera in cameras.iter_mut() {
        let centre = linalg::scale_vec3(camera.centre(), scale);
        camera.set_centre(centre);
    }

    log::info!("Rescaled cameras by factor {}", scale);
    scale
}

/// Bring a centred point cloud into the final camera frame.
///
/// Every point becomes `scale · (B_n ⋯ B_1) · p` where `B_1` is the first basis applied.
pub fn transform_point_cloud(points: &mut PointCloud, scale: f64, bases: &[[[f64; 3]; 3]]) {
    log::info!("Rescaling point cloud by factor {}", scale);
    let rotation = bases
        .iter()
        .fold(linalg::IDENTITY_33, |acc, b| linalg::mat33_mul(b, &acc));
    let linear = rotation.map(|row| row.map(|v| v * scale));
    points.transform(&linear);
}

/// Run the full fitting sequence on a freshly loaded camera set.
///
/// The cameras are centred, the orientation basis and circle are fitted, optionally
/// the cameras are re-expressed in that basis and refitted, the cylinder is derived
/// and finally the centres are rescaled to the configured circle radius. The point
/// cloud, when given, ends up in the same frame and scale as the cameras.
///
/// Example:
///
/// ```no_run
/// use omniphotos_geometry::fitting::{fit_camera_circle, FitOptions};
/// use omniphotos_geometry::CameraSet;
///
/// let mut cameras = CameraSet::default();
/// let state = fit_camera_circle(&mut cameras, None, &FitOptions::default()).unwrap();
/// println!("circle radius: {}", state.circle.radius);
/// ```
pub fn fit_camera_circle(
    cameras: &mut CameraSet,
    mut points: Option<&mut PointCloud>,
    options: &FitOptions,
) -> Result<FitState, FitError> {
    let removed_centroid = centre_at_origin(cameras, points.as_deref_mut())?;

    let mut basis = fit_orientation_basis(cameras, options.mode)?;
    let mut circle = fit_circle(cameras, &basis, options.circle_radius);

    let centroid = cameras.centroid();
    log::info!("Centroid before basis change: {:?}", centroid);

    let mut applied_bases = Vec::new();
    if options.change_basis {
        change_basis(cameras, &basis)?;
        applied_bases.push(basis.as_matrix());
        basis = fit_orientation_basis(cameras, options.mode)?;
        circle = fit_circle(cameras, &basis, options.circle_radius);
    }

    let cylinder = Cylinder::from_circle(
        centroid,
        &circle,
        options.cylinder_radius,
        options.cylinder_height,
    );

    let physical_scale = rescale_cameras(cameras, options.circle_radius);

    if let Some(points) = points {
        transform_point_cloud(points, physical_scale, &applied_bases);
    }

    Ok(FitState {
        circle,
        cylinder,
        basis,
        applied_bases,
        removed_centroid,
        physical_scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use approx::assert_relative_eq;
    use rand::Rng;

    // cameras on a circle around `centre` in the plane spanned by x and z, looking inwards
    fn capture_circle(count: usize, radius: f64, centre: [f64; 3]) -> CameraSet {
        (0..count)
            .map(|k| {
                let theta = k as f64 * 2.0 * std::f64::consts::PI / count as f64;
                let (s, c) = theta.sin_cos();
                let position = [centre[0] + radius * c, centre[1], centre[2] + radius * s];
                // rows are left, up and forward, forward points at the centre
                let rotation = [[-s, 0.0, c], [0.0, 1.0, 0.0], [-c, 0.0, -s]];
                Camera::new(linalg::IDENTITY_33, rotation, position)
            })
            .collect()
    }

    fn assert_orthonormal(basis: &OrientationBasis) {
        for v in [basis.left, basis.up, basis.forward] {
            assert_relative_eq!(linalg::norm3(&v), 1.0, epsilon = 1e-5);
        }
        assert_relative_eq!(linalg::dot_product3(&basis.left, &basis.up), 0.0, epsilon = 1e-5);
        assert_relative_eq!(linalg::dot_product3(&basis.left, &basis.forward), 0.0, epsilon = 1e-5);
        assert_relative_eq!(linalg::dot_product3(&basis.up, &basis.forward), 0.0, epsilon = 1e-5);
        let cross = linalg::cross_vec3(&basis.left, &basis.up);
        for i in 0..3 {
            assert_relative_eq!(cross[i], basis.forward[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_centre_at_origin() -> Result<(), Box<dyn std::error::Error>> {
        let mut cameras = capture_circle(12, 3.0, [10.0, -4.0, 2.5]);
        let mut points = PointCloud::default();
        points.push(0, [10.0, -4.0, 2.5], [1.0; 3], -1.0);

        let removed = centre_at_origin(&mut cameras, Some(&mut points))?;
        assert_relative_eq!(removed[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(removed[1], -4.0, epsilon = 1e-9);
        assert!(linalg::norm3(&cameras.centroid()) < CENTRING_TOLERANCE);
        assert!(linalg::norm3(&points.points()[0]) < 1e-9);

        // a second pass is a no-op
        let before = cameras.centres();
        let removed = centre_at_origin(&mut cameras, None)?;
        assert!(linalg::norm3(&removed) < CENTRING_TOLERANCE);
        for (a, b) in before.iter().zip(cameras.centres()) {
            assert_relative_eq!(linalg::euclidean_distance(a, &b), 0.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_empty_set() {
        let mut cameras = CameraSet::default();
        assert!(matches!(
            centre_at_origin(&mut cameras, None),
            Err(FitError::EmptyCameraSet)
        ));
        assert!(matches!(
            fit_orientation_basis(&cameras, OrientationMode::Svd),
            Err(FitError::EmptyCameraSet)
        ));
    }

    #[test]
    fn test_basis_is_orthonormal() -> Result<(), Box<dyn std::error::Error>> {
        let cameras = capture_circle(8, 1.0, [0.0; 3]);

        for mode in [OrientationMode::AverageDirection, OrientationMode::Svd] {
            let basis = fit_orientation_basis(&cameras, mode)?;
            assert_orthonormal(&basis);
            assert_relative_eq!(basis.up[1], 1.0, epsilon = 1e-9);
            assert_relative_eq!(basis.forward[2], -1.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_svd_singular_values() -> Result<(), Box<dyn std::error::Error>> {
        let cameras = capture_circle(8, 100.0, [0.0; 3]);
        let basis = fit_orientation_basis(&cameras, OrientationMode::Svd)?;
        // a planar circle has two equal singular values and a vanishing third
        assert_relative_eq!(basis.singular_values[0], 200.0, epsilon = 1e-6);
        assert_relative_eq!(basis.singular_values[1], 200.0, epsilon = 1e-6);
        assert!(basis.singular_values[2] < 1e-3);
        Ok(())
    }

    #[test]
    fn test_tilted_circle() -> Result<(), Box<dyn std::error::Error>> {
        let mut cameras = capture_circle(36, 50.0, [0.0; 3]);
        // tilt the capture plane about the x axis
        let (s, c) = 0.3_f64.sin_cos();
        let tilt = [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]];
        let tilt_t = linalg::transpose_mat33(&tilt);
        for camera in cameras.iter_mut() {
            let centre = linalg::mat33_mul_vec3(&tilt, camera.centre());
            let rotation = linalg::mat33_mul(camera.rotation(), &tilt_t);
            camera.set_extrinsics(rotation, centre);
        }

        let basis = fit_orientation_basis(&cameras, OrientationMode::Svd)?;
        assert_orthonormal(&basis);
        assert_relative_eq!(basis.up[1], c, epsilon = 1e-9);
        assert_relative_eq!(basis.up[2], s, epsilon = 1e-9);

        change_basis(&mut cameras, &basis)?;
        let refit = fit_orientation_basis(&cameras, OrientationMode::Svd)?;
        assert_relative_eq!(refit.up[1], 1.0, epsilon = 1e-9);
        for camera in cameras.iter() {
            assert_relative_eq!(camera.centre()[1], 0.0, epsilon = 1e-9);
            assert_relative_eq!(linalg::det_mat33(camera.rotation()), 1.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_change_basis_keeps_translation() -> Result<(), Box<dyn std::error::Error>> {
        let mut cameras = capture_circle(4, 2.0, [0.0; 3]);
        let before = cameras.iter().map(|c| c.translation()).collect::<Vec<_>>();
        let basis = OrientationBasis {
            left: [0.0, 0.0, 1.0],
            up: [0.0, 1.0, 0.0],
            forward: [-1.0, 0.0, 0.0],
            singular_values: [0.0; 3],
        };
        change_basis(&mut cameras, &basis)?;
        for (camera, t) in cameras.iter().zip(before) {
            let after = camera.translation();
            for i in 0..3 {
                assert_relative_eq!(after[i], t[i], epsilon = 1e-12);
            }
        }

        let singular = OrientationBasis {
            left: [0.0; 3],
            ..basis
        };
        assert!(matches!(
            change_basis(&mut cameras, &singular),
            Err(FitError::SingularBasis)
        ));
        Ok(())
    }

    #[test]
    fn test_rescale_cameras() {
        let mut cameras = capture_circle(6, 2.0, [0.0; 3]);
        let scale = rescale_cameras(&mut cameras, 100.0);
        assert_relative_eq!(scale, 50.0, epsilon = 1e-12);
        for camera in cameras.iter() {
            assert_relative_eq!(linalg::norm3(camera.centre()), 100.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_transform_point_cloud() {
        let mut points = PointCloud::default();
        points.push(0, [1.0, 0.0, 0.0], [1.0; 3], -1.0);
        let quarter = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        transform_point_cloud(&mut points, 2.0, &[quarter, quarter]);
        let p = points.points()[0];
        assert_relative_eq!(p[0], -2.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_noisy_capture() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = rand::rng();
        let mut cameras = capture_circle(90, 0.8, [3.0, 1.5, -2.0]);
        for camera in cameras.iter_mut() {
            let mut centre = *camera.centre();
            for v in centre.iter_mut() {
                *v += rng.random_range(-0.01..0.01);
            }
            camera.set_centre(centre);
        }
        let mut points = PointCloud::default();
        points.push(0, cameras.centroid(), [1.0; 3], -1.0);

        let options = FitOptions::default();
        let state = fit_camera_circle(&mut cameras, Some(&mut points), &options)?;

        assert_eq!(state.applied_bases.len(), 1);
        assert_relative_eq!(state.circle.radius, 100.0);
        assert_relative_eq!(state.basis.up[1], 1.0, epsilon = 1e-3);
        assert_relative_eq!(state.physical_scale, 125.0, epsilon = 5.0);
        assert!(linalg::norm3(&state.circle.centre) < CENTRING_TOLERANCE);
        assert!(linalg::norm3(&cameras.centroid()) < 1e-6);
        // the point at the original centre follows the cameras
        assert!(linalg::norm3(&points.points()[0]) < 1e-6);

        let mean_radius = cameras.iter().map(|c| linalg::norm3(c.centre())).sum::<f64>()
            / cameras.len() as f64;
        assert_relative_eq!(mean_radius, 100.0, epsilon = 1e-9);
        assert_eq!(state.cylinder.height, options.cylinder_height);
        Ok(())
    }
}
