use crate::linalg;

/// A sparse point cloud with per-point ids, colours and reprojection errors.
///
/// Colours are RGB in `[0, 1]`. The error is `-1` when the source has no
/// reprojection error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The ids assigned by the reconstruction.
    ids: Vec<i64>,
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Vec<[f64; 3]>,
    // The reprojection errors of the points.
    errors: Vec<f64>,
}

impl PointCloud {
    /// Append a single point.
    pub fn push(&mut self, id: i64, point: [f64; 3], color: [f64; 3], error: f64) {
        self.ids.push(id);
        self.points.push(point);
        self.colors.push(color);
        self.errors.push(error);
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the ids of the points.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points.
    pub fn colors(&self) -> &[[f64; 3]] {
        &self.colors
    }

    /// Get as reference the reprojection errors of the points.
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Move every point by `offset`.
    pub fn translate(&mut self, offset: &[f64; 3]) {
        for p in self.points.iter_mut() {
            *p = linalg::add_vec3(p, offset);
        }
    }

    /// Apply a linear map to every point.
    pub fn transform(&mut self, linear: &[[f64; 3]; 3]) {
        linalg::transform_points(&mut self.points, linear, &[0.0; 3]);
    }
}
