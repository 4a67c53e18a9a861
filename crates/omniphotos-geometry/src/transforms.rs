use crate::linalg;

/// Change of basis from the SfM tools' convention (x-right, y-down, z-forward) to the
/// engine's Y-up right-handed convention. The matrix is its own inverse.
pub const INV_YZ: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]];

/// Compute the rotation matrix of a quaternion.
///
/// # Arguments
///
/// * `quaternion` - The quaternion as `[qw, qx, qy, qz]`. It does not need to be normalized.
///
/// # Returns
///
/// The rotation matrix in row-major order.
///
/// Example:
///
/// ```no_run
/// use omniphotos_geometry::transforms::quaternion_to_rotation_matrix;
///
/// let rotation = quaternion_to_rotation_matrix(&[1.0, 0.0, 0.0, 0.0]);
/// assert_eq!(rotation, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
/// ```
pub fn quaternion_to_rotation_matrix(quaternion: &[f64; 4]) -> [[f64; 3]; 3] {
    let norm = quaternion.iter().map(|q| q * q).sum::<f64>().sqrt();
    if norm < 1e-12 {
        return linalg::IDENTITY_33;
    }
    let [w, x, y, z] = quaternion.map(|q| q / norm);

    [
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - w * z),
            2.0 * (x * z + w * y),
        ],
        [
            2.0 * (x * y + w * z),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - w * x),
        ],
        [
            2.0 * (x * z - w * y),
            2.0 * (y * z + w * x),
            1.0 - 2.0 * (x * x + y * y),
        ],
    ]
}

/// Re-express a camera pose in the engine's coordinate system.
///
/// # Arguments
///
/// * `rotation` - The world-to-camera rotation in the source convention.
/// * `centre` - The camera centre in source world coordinates.
///
/// # Returns
///
/// The pair `(R·F, F·C)` where `F` is [`INV_YZ`].
pub fn apply_coordinate_flip(
    rotation: &[[f64; 3]; 3],
    centre: &[f64; 3],
) -> ([[f64; 3]; 3], [f64; 3]) {
    (
        linalg::mat33_mul(rotation, &INV_YZ),
        linalg::mat33_mul_vec3(&INV_YZ, centre),
    )
}

/// Re-express a world point in the engine's coordinate system.
pub fn flip_point(point: &[f64; 3]) -> [f64; 3] {
    linalg::mat33_mul_vec3(&INV_YZ, point)
}
