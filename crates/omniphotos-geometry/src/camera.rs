use std::path::PathBuf;

use crate::linalg;

/// A pinhole camera with intrinsics `K`, world-to-camera rotation `R` and centre `C`.
///
/// The translation is always derived as `t = -R·C` and the projection matrix
/// `P = K·[R|t]` is refreshed by every setter. No check is made that `R` is a
/// rotation: callers are responsible for passing orthonormal matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    intrinsics: [[f64; 3]; 3],
    rotation: [[f64; 3]; 3],
    centre: [f64; 3],
    projection: [[f64; 4]; 3],

    /// Frame index in the input video or image sequence, `-1` if unknown.
    pub frame: i32,

    /// Path of the image captured by this camera.
    pub image_path: PathBuf,

    /// Optical flow from this camera to the next one.
    pub forward_flow: Option<PathBuf>,

    /// Optical flow from this camera to the previous one.
    pub backward_flow: Option<PathBuf>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(linalg::IDENTITY_33, linalg::IDENTITY_33, [0.0; 3])
    }
}

impl Camera {
    /// Create a new camera from its intrinsics, rotation and centre.
    pub fn new(intrinsics: [[f64; 3]; 3], rotation: [[f64; 3]; 3], centre: [f64; 3]) -> Self {
        let mut camera = Self {
            intrinsics,
            rotation,
            centre,
            projection: [[0.0; 4]; 3],
            frame: -1,
            image_path: PathBuf::new(),
            forward_flow: None,
            backward_flow: None,
        };
        camera.update_projection();
        camera
    }

    /// The intrinsic matrix `K`.
    pub fn intrinsics(&self) -> &[[f64; 3]; 3] {
        &self.intrinsics
    }

    /// The world-to-camera rotation `R`.
    pub fn rotation(&self) -> &[[f64; 3]; 3] {
        &self.rotation
    }

    /// The camera centre `C` in world coordinates.
    pub fn centre(&self) -> &[f64; 3] {
        &self.centre
    }

    /// The cached projection matrix `P = K·[R|t]`.
    pub fn projection(&self) -> &[[f64; 4]; 3] {
        &self.projection
    }

    /// Set the intrinsic matrix.
    pub fn set_intrinsics(&mut self, intrinsics: [[f64; 3]; 3]) {
        self.intrinsics = intrinsics;
        self.update_projection();
    }

    /// Set rotation and centre together.
    pub fn set_extrinsics(&mut self, rotation: [[f64; 3]; 3], centre: [f64; 3]) {
        self.rotation = rotation;
        self.centre = centre;
        self.update_projection();
    }

    /// Set the rotation, keeping the centre.
    pub fn set_rotation(&mut self, rotation: [[f64; 3]; 3]) {
        self.rotation = rotation;
        self.update_projection();
    }

    /// Set the centre, keeping the rotation.
    pub fn set_centre(&mut self, centre: [f64; 3]) {
        self.centre = centre;
        self.update_projection();
    }

    /// The translation `t = -R·C`.
    pub fn translation(&self) -> [f64; 3] {
        linalg::scale_vec3(&linalg::mat33_mul_vec3(&self.rotation, &self.centre), -1.0)
    }

    /// Azimuth of the camera centre around the world origin, in degrees.
    ///
    /// Computed as `180 + atan2(z, x)` of the normalized centre, so the value lies in
    /// `[0, 360]`. Only meaningful for ordering cameras that share a coordinate frame.
    pub fn phi(&self) -> f64 {
        let p = linalg::normalize_vec3(&self.centre);
        180.0 + p[2].atan2(p[0]).to_degrees()
    }

    /// The camera's left direction in world space (row 0 of `R`).
    pub fn left(&self) -> [f64; 3] {
        self.rotation[0]
    }

    /// The camera's up direction in world space (row 1 of `R`).
    pub fn up(&self) -> [f64; 3] {
        self.rotation[1]
    }

    /// The camera's viewing direction in world space (row 2 of `R`).
    pub fn forward(&self) -> [f64; 3] {
        self.rotation[2]
    }

    fn update_projection(&mut self) {
        let t = self.translation();
        for (i, row) in self.projection.iter_mut().enumerate() {
            for (j, val) in row.iter_mut().enumerate() {
                *val = (0..3)
                    .map(|k| {
                        let rt = if j < 3 { self.rotation[k][j] } else { t[k] };
                        self.intrinsics[i][k] * rt
                    })
                    .sum();
            }
        }
    }
}
