use crate::linalg;

/// A circle in 3d described by its centre, radius and orientation.
///
/// The circle lies in the plane spanned by [`Circle::left`] and [`Circle::forward`];
/// [`Circle::normal`] is the up direction of the capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// The centre of the circle.
    pub centre: [f64; 3],
    /// The radius of the circle.
    pub radius: f64,
    normal: [f64; 3],
    forward: [f64; 3],
}

impl Circle {
    /// Create a new circle.
    ///
    /// # Arguments
    ///
    /// * `centre` - The centre of the circle.
    /// * `normal` - The plane normal, normalized on construction.
    /// * `forward` - An in-plane direction, normalized on construction.
    /// * `radius` - The radius of the circle.
    pub fn new(centre: [f64; 3], normal: [f64; 3], forward: [f64; 3], radius: f64) -> Self {
        Self {
            centre,
            radius,
            normal: linalg::normalize_vec3(&normal),
            forward: linalg::normalize_vec3(&forward),
        }
    }

    /// The up direction of the circle.
    pub fn normal(&self) -> &[f64; 3] {
        &self.normal
    }

    /// The forward direction of the circle.
    pub fn forward(&self) -> &[f64; 3] {
        &self.forward
    }

    /// The left direction of the circle, `normal × forward`.
    pub fn left(&self) -> [f64; 3] {
        linalg::cross_vec3(&self.normal, &self.forward)
    }

    /// The orientation of the circle with columns `[left, normal, forward]`.
    pub fn basis(&self) -> [[f64; 3]; 3] {
        linalg::mat33_from_cols(&self.left(), &self.normal, &self.forward)
    }

    /// The point on the circle at the angle `rad` measured from `left` towards `forward`.
    pub fn vertex_at(&self, rad: f64) -> [f64; 3] {
        let left = self.left();
        let along_left = linalg::scale_vec3(&left, self.radius * rad.cos());
        let along_forward = linalg::scale_vec3(&self.forward, self.radius * rad.sin());
        linalg::add_vec3(&linalg::add_vec3(&self.centre, &along_left), &along_forward)
    }
}

/// The proxy cylinder images are projected onto when rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cylinder {
    /// The centre of the cylinder.
    pub centre: [f64; 3],
    /// The axis of the cylinder.
    pub up: [f64; 3],
    /// The forward direction, orthogonal to the axis.
    pub forward: [f64; 3],
    /// The radius of the cylinder.
    pub radius: f64,
    /// The height of the cylinder along `up`.
    pub height: f64,
}

impl Cylinder {
    /// Create a new cylinder.
    pub fn new(centre: [f64; 3], up: [f64; 3], forward: [f64; 3], radius: f64, height: f64) -> Self {
        Self {
            centre,
            up,
            forward,
            radius,
            height,
        }
    }

    /// Build a cylinder sharing the orientation of `circle`.
    pub fn from_circle(centre: [f64; 3], circle: &Circle, radius: f64, height: f64) -> Self {
        Self::new(centre, circle.normal, circle.forward, radius, height)
    }
}
