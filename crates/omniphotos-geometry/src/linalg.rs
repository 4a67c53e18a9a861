/// The 3x3 identity matrix.
pub const IDENTITY_33: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Compute the dot product of two 3d vectors.
pub fn dot_product3(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Compute the cross product of two 3d vectors.
pub fn cross_vec3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Compute the Euclidean norm of a 3d vector.
pub fn norm3(a: &[f64; 3]) -> f64 {
    dot_product3(a, a).sqrt()
}

/// Normalize a 3d vector to unit length.
///
/// A zero vector is returned unchanged.
pub fn normalize_vec3(a: &[f64; 3]) -> [f64; 3] {
    let norm = norm3(a);
    if norm > 0.0 {
        scale_vec3(a, 1.0 / norm)
    } else {
        *a
    }
}

/// Add two 3d vectors.
pub fn add_vec3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Subtract the 3d vector `b` from `a`.
pub fn sub_vec3(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Multiply a 3d vector by a scalar.
pub fn scale_vec3(a: &[f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Compute the Euclidean distance between two points.
pub fn euclidean_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    norm3(&sub_vec3(a, b))
}

/// Multiply two 3x3 matrices.
pub fn mat33_mul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}

/// Multiply a 3x3 matrix with a 3d column vector.
pub fn mat33_mul_vec3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        dot_product3(&m[0], v),
        dot_product3(&m[1], v),
        dot_product3(&m[2], v),
    ]
}

/// Transpose a 3x3 matrix.
pub fn transpose_mat33(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Compute the determinant of a 3x3 matrix.
pub fn det_mat33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Invert a 3x3 matrix using its adjugate.
///
/// # Returns
///
/// The inverse, or `None` if the matrix is singular.
pub fn inverse_mat33(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = det_mat33(m);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

/// Build a 3x3 matrix from three column vectors.
pub fn mat33_from_cols(c0: &[f64; 3], c1: &[f64; 3], c2: &[f64; 3]) -> [[f64; 3]; 3] {
    [
        [c0[0], c1[0], c2[0]],
        [c0[1], c1[1], c2[1]],
        [c0[2], c1[2], c2[2]],
    ]
}

/// Extract a column of a 3x3 matrix.
pub fn mat33_col(m: &[[f64; 3]; 3], j: usize) -> [f64; 3] {
    [m[0][j], m[1][j], m[2][j]]
}

/// Transform a set of points in place with a linear map followed by a translation.
///
/// # Arguments
///
/// * `points` - The points to transform, overwritten with the result.
/// * `linear` - A 3x3 matrix applied to every point.
/// * `translation` - A translation added after the linear map.
///
/// Example:
///
/// ```no_run
/// use omniphotos_geometry::linalg::transform_points;
///
/// let mut points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
/// let linear = [[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]];
/// transform_points(&mut points, &linear, &[0.0, 0.0, 0.0]);
/// ```
pub fn transform_points(points: &mut [[f64; 3]], linear: &[[f64; 3]; 3], translation: &[f64; 3]) {
    if points.is_empty() {
        return;
    }

    let linear_mat = faer::Mat::<f64>::from_fn(3, 3, |i, j| linear[i][j]);

    // 3xN matrix where each column is a point
    let points_mat = faer::Mat::<f64>::from_fn(3, points.len(), |i, j| points[j][i]);

    let transformed = &linear_mat * &points_mat;

    for (j, point) in points.iter_mut().enumerate() {
        for (i, val) in point.iter_mut().enumerate() {
            *val = transformed.read(i, j) + translation[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cross_right_handed() {
        let x = [1.0, 0.0, 0.0];
        let y = [0.0, 1.0, 0.0];
        assert_eq!(cross_vec3(&x, &y), [0.0, 0.0, 1.0]);
        assert_eq!(cross_vec3(&y, &x), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize_vec3(&[0.0, 0.0, 0.0]), [0.0, 0.0, 0.0]);
        let n = normalize_vec3(&[3.0, 0.0, 4.0]);
        assert_relative_eq!(n[0], 0.6);
        assert_relative_eq!(n[2], 0.8);
    }

    #[test]
    fn test_inverse_mat33() -> Result<(), Box<dyn std::error::Error>> {
        let m = [[2.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 1.0]];
        let inv = inverse_mat33(&m).ok_or("singular")?;
        let prod = mat33_mul(&m, &inv);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(prod[i][j], IDENTITY_33[i][j], epsilon = 1e-12);
            }
        }
        assert!(inverse_mat33(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]]).is_none());
        Ok(())
    }

    #[test]
    fn test_transform_points() {
        let mut points = vec![[2.0, 2.0, 2.0], [3.0, 4.0, 5.0]];
        let rotation = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        transform_points(&mut points, &rotation, &[1.0, 2.0, 3.0]);
        assert_eq!(points, vec![[3.0, 0.0, 5.0], [4.0, -3.0, 7.0]]);
    }
}
