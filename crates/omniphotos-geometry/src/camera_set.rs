use std::ops::Index;

use crate::camera::Camera;
use crate::linalg;

/// An ordered collection of cameras describing one capture.
///
/// The set owns its cameras; cloning it performs a deep copy. The order is the load
/// order until [`CameraSet::sort_by_azimuth`] is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraSet {
    cameras: Vec<Camera>,
}

impl CameraSet {
    /// Create a new camera set from a vector of cameras.
    pub fn new(cameras: Vec<Camera>) -> Self {
        Self { cameras }
    }

    /// Get the number of cameras in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    /// Check if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Get as reference the cameras in the set.
    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    /// Get a camera by position.
    pub fn get(&self, index: usize) -> Option<&Camera> {
        self.cameras.get(index)
    }

    /// Append a camera.
    pub fn push(&mut self, camera: Camera) {
        self.cameras.push(camera);
    }

    /// Iterate over the cameras in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Camera> {
        self.cameras.iter()
    }

    /// Iterate mutably over the cameras in order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Camera> {
        self.cameras.iter_mut()
    }

    /// Consume the set and return its cameras.
    pub fn into_vec(self) -> Vec<Camera> {
        self.cameras
    }

    /// The camera centres in the current order.
    pub fn centres(&self) -> Vec<[f64; 3]> {
        self.cameras.iter().map(|c| *c.centre()).collect()
    }

    /// Arithmetic mean of all camera centres.
    ///
    /// PRECONDITION: the set is not empty. An empty set yields NaN components.
    pub fn centroid(&self) -> [f64; 3] {
        let sum = self
            .cameras
            .iter()
            .fold([0.0; 3], |acc, c| linalg::add_vec3(&acc, c.centre()));
        linalg::scale_vec3(&sum, 1.0 / self.cameras.len() as f64)
    }

    /// Normalized mean of the cameras' forward directions.
    pub fn average_forward(&self) -> [f64; 3] {
        self.average_direction(Camera::forward)
    }

    /// Normalized mean of the cameras' up directions.
    pub fn average_up(&self) -> [f64; 3] {
        self.average_direction(Camera::up)
    }

    /// Normalized mean of the cameras' left directions.
    pub fn average_left(&self) -> [f64; 3] {
        self.average_direction(Camera::left)
    }

    // directions that cancel out give a zero vector
    fn average_direction(&self, direction: fn(&Camera) -> [f64; 3]) -> [f64; 3] {
        let sum = self
            .cameras
            .iter()
            .fold([0.0; 3], |acc, c| linalg::add_vec3(&acc, &direction(c)));
        linalg::normalize_vec3(&sum)
    }

    /// Sum of the distances between consecutive camera centres in the current order.
    pub fn path_length(&self) -> f64 {
        self.cameras
            .windows(2)
            .map(|pair| linalg::euclidean_distance(pair[0].centre(), pair[1].centre()))
            .sum()
    }

    /// Stable sort of the cameras by ascending azimuth [`Camera::phi`].
    pub fn sort_by_azimuth(&mut self) {
        self.cameras.sort_by(|a, b| a.phi().total_cmp(&b.phi()));
    }

    /// Keep the cameras whose position in the current order lies in `[first, last]`.
    ///
    /// A negative `last` keeps everything from `first` to the end.
    pub fn clip_frames(&self, first: i64, last: i64) -> CameraSet {
        self.cameras
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                let i = *i as i64;
                i >= first && (last < 0 || i <= last)
            })
            .map(|(_, c)| c.clone())
            .collect()
    }
}

impl Index<usize> for CameraSet {
    type Output = Camera;

    fn index(&self, index: usize) -> &Self::Output {
        &self.cameras[index]
    }
}

impl From<Vec<Camera>> for CameraSet {
    fn from(cameras: Vec<Camera>) -> Self {
        Self::new(cameras)
    }
}

impl FromIterator<Camera> for CameraSet {
    fn from_iter<I: IntoIterator<Item = Camera>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CameraSet {
    type Item = &'a Camera;
    type IntoIter = std::slice::Iter<'a, Camera>;

    fn into_iter(self) -> Self::IntoIter {
        self.cameras.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera_at(centre: [f64; 3], frame: i32) -> Camera {
        let mut camera = Camera::new(linalg::IDENTITY_33, linalg::IDENTITY_33, centre);
        camera.frame = frame;
        camera
    }

    #[test]
    fn test_centroid_and_path_length() {
        let set = CameraSet::new(vec![
            camera_at([0.0, 0.0, 0.0], 0),
            camera_at([3.0, 0.0, 4.0], 1),
            camera_at([3.0, 2.0, 4.0], 2),
        ]);
        assert_eq!(set.len(), 3);
        assert_relative_eq!(set.centroid()[0], 2.0);
        assert_relative_eq!(set.centroid()[1], 2.0 / 3.0);
        assert_relative_eq!(set.centroid()[2], 8.0 / 3.0);
        assert_relative_eq!(set.path_length(), 7.0);
    }

    #[test]
    fn test_average_directions() {
        let flipped = [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]];
        let set = CameraSet::new(vec![
            Camera::new(linalg::IDENTITY_33, linalg::IDENTITY_33, [0.0; 3]),
            Camera::new(linalg::IDENTITY_33, flipped, [0.0; 3]),
        ]);
        assert_eq!(set.average_up(), [0.0, 1.0, 0.0]);
        // opposite directions cancel out silently
        assert_eq!(set.average_forward(), [0.0, 0.0, 0.0]);
        assert_eq!(set.average_left(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sort_by_azimuth() {
        let mut set = CameraSet::new(vec![
            camera_at([0.0, 0.0, 1.0], 0),  // 270
            camera_at([1.0, 0.0, 0.0], 1),  // 180
            camera_at([0.0, 0.0, -1.0], 2), // 90
            camera_at([0.0, 0.0, 2.0], 3),  // 270, after frame 0
        ]);
        set.sort_by_azimuth();
        let frames = set.iter().map(|c| c.frame).collect::<Vec<_>>();
        assert_eq!(frames, vec![2, 1, 0, 3]);

        for pair in set.cameras().windows(2) {
            assert!(pair[0].phi() <= pair[1].phi());
        }

        let sorted = set.clone();
        set.sort_by_azimuth();
        assert_eq!(set, sorted);
    }

    #[test]
    fn test_clip_frames() {
        let set = (0..6)
            .map(|i| camera_at([i as f64, 0.0, 0.0], 10 + i))
            .collect::<CameraSet>();
        let clipped = set.clip_frames(1, 3);
        assert_eq!(
            clipped.iter().map(|c| c.frame).collect::<Vec<_>>(),
            vec![11, 12, 13]
        );
        assert_eq!(set.clip_frames(4, -1).len(), 2);
    }

    #[test]
    fn test_clone_is_deep() {
        let set = CameraSet::new(vec![camera_at([1.0, 0.0, 0.0], 0)]);
        let mut copy = set.clone();
        copy.iter_mut().for_each(|c| c.set_centre([5.0, 5.0, 5.0]));
        assert_eq!(set[0].centre(), &[1.0, 0.0, 0.0]);
    }
}
