use crate::{camera::Camera, camera_set::CameraSet, linalg, shapes::Circle};

/// Error types for the camera subsampler.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    /// No camera could be selected.
    #[error("No cameras were selected out of {0}")]
    NoCamerasSelected(usize),
}

/// Heuristic used to pick cameras close to evenly spaced azimuth angles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum SamplingStrategy {
    /// Take the first free camera past each target angle.
    #[default]
    NearestCrossing,
    /// Search around the crossing for the camera closest in height to the ideal
    /// circle point.
    LocalRefinement {
        /// Number of cameras inspected around the crossing.
        neighbourhood: usize,
        /// Largest accepted height difference in centimetres.
        max_distance: f64,
    },
    /// Search around the crossing for the camera that best continues the path of
    /// already selected cameras.
    GreedyPath {
        /// Number of cameras inspected around the crossing.
        neighbourhood: usize,
    },
}

impl SamplingStrategy {
    /// Map the integer code used in configuration files to a strategy with its
    /// default parameters.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::NearestCrossing),
            1 => Some(Self::LocalRefinement {
                neighbourhood: 25,
                max_distance: 50.0,
            }),
            2 => Some(Self::GreedyPath { neighbourhood: 20 }),
            _ => None,
        }
    }

    // tolerance in degrees around a target angle
    fn epsilon(&self) -> f64 {
        match self {
            Self::NearestCrossing => 0.1,
            _ => 0.001,
        }
    }
}

/// `count` evenly spaced azimuth angles in degrees, starting at zero.
pub fn target_phis(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| i as f64 * 360.0 / count as f64)
        .collect()
}

/// Select up to `count` cameras of an azimuth-sorted set.
///
/// PRECONDITION: `cameras` is sorted with [`CameraSet::sort_by_azimuth`].
///
/// # Arguments
///
/// * `cameras` - The sorted camera set.
/// * `circle` - The fitted capture circle.
/// * `count` - The requested number of cameras.
/// * `strategy` - The selection heuristic.
///
/// # Returns
///
/// Distinct indices into `cameras` in selection order. All indices are returned if
/// `count` is at least the number of cameras. Fewer than `count` indices are
/// returned when a target angle finds no acceptable camera.
pub fn select_cameras(
    cameras: &CameraSet,
    circle: &Circle,
    count: usize,
    strategy: SamplingStrategy,
) -> Vec<usize> {
    let num_cameras = cameras.len();
    if count >= num_cameras {
        return (0..num_cameras).collect();
    }

    let phis = cameras.iter().map(Camera::phi).collect::<Vec<_>>();
    let mut taken = vec![false; num_cameras];
    let mut selected = Vec::with_capacity(count);

    let avg_segment_length = circle.radius * 2.0 * std::f64::consts::PI / count as f64;
    let mut path = PathTracker::default();

    for target in target_phis(count) {
        let Some(crossing) = find_crossing(&phis, &taken, target, strategy.epsilon()) else {
            log::debug!("No camera crosses the target angle {}", target);
            continue;
        };

        let picked = match strategy {
            SamplingStrategy::NearestCrossing => Some(crossing),
            SamplingStrategy::LocalRefinement {
                neighbourhood,
                max_distance,
            } => {
                let ideal = circle.vertex_at(target.to_radians());
                let radius = (neighbourhood / 2) as isize;
                let mut best: Option<(usize, f64)> = None;
                for k in -radius..radius {
                    let l = wrap_index(crossing, k, num_cameras);
                    if taken[l] {
                        continue;
                    }
                    let distance = (ideal[1] - cameras[l].centre()[1]).abs();
                    if best.map_or(true, |(_, d)| distance < d) {
                        best = Some((l, distance));
                    }
                }
                match best {
                    Some((l, distance)) if distance < max_distance => Some(l),
                    _ => {
                        log::warn!("No camera close enough to the circle at angle {}", target);
                        None
                    }
                }
            }
            SamplingStrategy::GreedyPath { neighbourhood } => {
                let radius = (neighbourhood / 2) as isize;
                path.pick(cameras, &taken, crossing, radius, avg_segment_length)
            }
        };

        if let Some(index) = picked {
            taken[index] = true;
            selected.push(index);
        }
    }

    selected
}

/// Deep copy a subset of `cameras` chosen with [`select_cameras`].
///
/// The input is sorted by azimuth first and so is the result.
///
/// # Errors
///
/// Fails if no camera is selected. Selecting fewer cameras than requested is only
/// logged.
pub fn subsample(
    cameras: &CameraSet,
    circle: &Circle,
    count: usize,
    strategy: SamplingStrategy,
) -> Result<CameraSet, SamplingError> {
    let mut sorted = cameras.clone();
    sorted.sort_by_azimuth();

    let requested = count.min(sorted.len());
    let indices = select_cameras(&sorted, circle, count, strategy);
    if indices.is_empty() {
        return Err(SamplingError::NoCamerasSelected(sorted.len()));
    }
    if indices.len() != requested {
        log::warn!(
            "Number of sampled cameras ({}) does not match requested number ({})",
            indices.len(),
            requested
        );
    }

    let mut result = indices
        .into_iter()
        .map(|i| sorted[i].clone())
        .collect::<CameraSet>();
    result.sort_by_azimuth();

    Ok(result)
}

// first free camera at which (target - phi) turns negative
fn find_crossing(phis: &[f64], taken: &[bool], target: f64, eps: f64) -> Option<usize> {
    let mut sign = 1.0;
    for (i, phi) in phis.iter().enumerate() {
        if taken[i] {
            continue;
        }
        let last_sign = sign;
        sign = if target - phi < eps { -1.0 } else { 1.0 };
        if last_sign * sign < 0.0 {
            return Some(i);
        }
    }
    None
}

fn wrap_index(centre: usize, offset: isize, len: usize) -> usize {
    (centre as isize + offset).rem_euclid(len as isize) as usize
}

fn gaussian(x: f64, sigma: f64, mu: f64) -> f64 {
    (-((x - mu) * (x - mu)) / (2.0 * sigma * sigma)).exp()
}

// running state of the greedy path construction
struct PathTracker {
    last: Option<usize>,
    last_dir: [f64; 3],
}

impl Default for PathTracker {
    fn default() -> Self {
        Self {
            last: None,
            last_dir: [1.0, 0.0, 0.0],
        }
    }
}

impl PathTracker {
    fn pick(
        &mut self,
        cameras: &CameraSet,
        taken: &[bool],
        crossing: usize,
        radius: isize,
        avg_segment_length: f64,
    ) -> Option<usize> {
        let Some(last) = self.last else {
            self.last = Some(crossing);
            return Some(crossing);
        };

        let mut best_score = 0.0;
        let mut best = None;
        for k in -radius..=radius {
            let l = wrap_index(crossing, k, cameras.len());
            if taken[l] {
                continue;
            }
            let score = self.path_weight(&cameras[l], &cameras[last], avg_segment_length)
                * orientation_weight(&cameras[l], &cameras[last]);
            if score > best_score {
                best_score = score;
                best = Some(l);
            }
        }

        let Some(picked) = best else {
            log::warn!("No candidate scored above zero around camera {}", crossing);
            return None;
        };

        let step = linalg::sub_vec3(cameras[picked].centre(), cameras[last].centre());
        self.last_dir = linalg::normalize_vec3(&step);
        self.last = Some(picked);
        Some(picked)
    }

    // rewards steps that keep the direction and the expected length
    fn path_weight(&self, candidate: &Camera, last: &Camera, avg_segment_length: f64) -> f64 {
        let step = linalg::sub_vec3(candidate.centre(), last.centre());
        let dir = linalg::normalize_vec3(&step);

        let diff_dir = 1.0 - linalg::dot_product3(&dir, &self.last_dir);
        let weight_dir = gaussian(diff_dir, 10000.0, 0.0);

        let weight_len = gaussian(linalg::norm3(&step), 100000.0, avg_segment_length);

        weight_dir * weight_len
    }
}

// rewards cameras looking the same way as the last one
fn orientation_weight(candidate: &Camera, last: &Camera) -> f64 {
    let diff_forward = 1.0 - linalg::dot_product3(&candidate.forward(), &last.forward());
    let diff_up = 1.0 - linalg::dot_product3(&candidate.up(), &last.up());
    gaussian(diff_forward, 10000.0, 0.0) * gaussian(diff_up, 10000.0, 0.0)
}
