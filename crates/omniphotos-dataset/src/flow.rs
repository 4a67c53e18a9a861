use std::path::{Path, PathBuf};

use omniphotos_geometry::{Camera, CameraSet};
use serde::{Deserialize, Serialize};

/// Extension of the flow files written during preprocessing.
pub const FLOW_EXTENSION: &str = ".floss";

/// Error types for the optical flow stage.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Error reading or writing a flow file
    #[error("error reading or writing flow file")]
    IoError(#[from] std::io::Error),

    /// The estimator failed on a camera pair
    #[error("Optical flow failed between {0} and {1}: {2}")]
    EstimationFailed(PathBuf, PathBuf, String),
}

/// The optical flow algorithms a preprocessing run can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMethod {
    /// Brox et al. 2004, GPU implementation.
    BroxCuda,
    /// Dense inverse search.
    Dis,
    /// Farnebäck's polynomial expansion.
    Farneback,
}

impl FlowMethod {
    /// Map the integer code used in configuration files to a method.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::BroxCuda),
            1 => Some(Self::Dis),
            2 => Some(Self::Farneback),
            _ => None,
        }
    }
}

/// Parameters of the Brox optical flow, stored alongside the cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BroxFlowParameters {
    /// Flow smoothness weight.
    pub alpha: f64,
    /// Gradient constancy weight.
    pub gamma: f64,
    /// Pyramid scale factor.
    pub scale_factor: f64,
    /// Number of lagged non-linearity iterations.
    pub inner_iterations: u32,
    /// Number of warping iterations.
    pub outer_iterations: u32,
    /// Number of linear solver iterations.
    pub solver_iterations: u32,
}

impl Default for BroxFlowParameters {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            gamma: 50.0,
            scale_factor: 0.85,
            inner_iterations: 10,
            outer_iterations: 150,
            solver_iterations: 5,
        }
    }
}

/// Computes the optical flow between two neighbouring cameras.
pub trait FlowEstimator {
    /// Compute the flow from `left` to `right` and back, writing the two fields to
    /// `forward_path` and `backward_path`.
    fn estimate(
        &mut self,
        left: &Camera,
        right: &Camera,
        forward_path: &Path,
        backward_path: &Path,
    ) -> Result<(), FlowError>;
}

/// The file names of the flow fields between two images.
///
/// # Arguments
///
/// * `left_image` - The image the forward flow starts from.
/// * `right_image` - The image the backward flow starts from.
/// * `dir` - The folder the flows are written to.
/// * `extension` - The flow file extension, including the dot.
///
/// # Returns
///
/// `<dir>/<left stem>-FlowToNext<ext>` and `<dir>/<right stem>-FlowToPrevious<ext>`.
pub fn flow_paths(
    left_image: &Path,
    right_image: &Path,
    dir: &Path,
    extension: &str,
) -> (PathBuf, PathBuf) {
    let stem = |p: &Path| {
        p.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let forward = dir.join(format!("{}-FlowToNext{}", stem(left_image), extension));
    let backward = dir.join(format!("{}-FlowToPrevious{}", stem(right_image), extension));
    (forward, backward)
}

/// Compute the flows between all neighbouring cameras of a closed capture.
///
/// Pairs are `(i, i + 1 mod N)`. Once all pairs are done each camera holds the flow
/// to the next camera and the flow to the previous one.
///
/// # Errors
///
/// The first estimator failure is returned and no camera is modified.
pub fn compute_flows(
    cameras: &mut CameraSet,
    estimator: &mut dyn FlowEstimator,
    dir: &Path,
    extension: &str,
) -> Result<(), FlowError> {
    let size = cameras.len();
    let mut forward_flows = Vec::with_capacity(size);
    let mut backward_flows = Vec::with_capacity(size);

    for i in 0..size {
        log::info!("Computing optical flow ({} of {})", i + 1, size);
        let left = &cameras[i];
        let right = &cameras[(i + 1) % size];
        let (forward, backward) = flow_paths(&left.image_path, &right.image_path, dir, extension);
        estimator.estimate(left, right, &forward, &backward)?;
        forward_flows.push(forward);
        backward_flows.push(backward);
    }

    // backward flow i goes from camera i + 1 to camera i
    backward_flows.rotate_right(1);

    for ((camera, forward), backward) in cameras
        .iter_mut()
        .zip(forward_flows)
        .zip(backward_flows)
    {
        camera.forward_flow = Some(forward);
        camera.backward_flow = Some(backward);
    }

    log::info!("Computed {} flow fields", 2 * size);
    Ok(())
}
