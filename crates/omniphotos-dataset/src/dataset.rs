use std::path::PathBuf;

use omniphotos_geometry::{
    shapes::{Circle, Cylinder},
    CameraSet, PointCloud,
};

use crate::{cache::sidecar, flow::BroxFlowParameters, settings::DatasetPaths};

/// The optical flow setup a dataset was preprocessed with.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowSetup {
    /// Parameters of the Brox flow.
    pub brox: BroxFlowParameters,
    /// The flow was computed on half resolution images.
    pub downsampled: bool,
}

/// A preprocessed dataset: the selected cameras in the canonical frame with the
/// fitted capture circle and proxy cylinder.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// The dataset name.
    pub name: String,
    /// The folders of the dataset on disk.
    pub paths: DatasetPaths,
    /// The cameras, sorted by azimuth.
    pub cameras: CameraSet,
    /// The reconstructed points in the same frame as the cameras.
    pub points: Option<PointCloud>,
    /// The fitted capture circle.
    pub circle: Circle,
    /// The proxy cylinder.
    pub cylinder: Cylinder,
    /// Ratio between the runtime image resolution and the reconstruction's.
    pub intrinsic_scale: f64,
    /// Scale from reconstruction units to centimetres.
    pub physical_scale: f64,
    /// The input images are equirectangular panoramas.
    pub equirectangular: bool,
    /// The optical flow setup.
    pub flow: FlowSetup,
}

impl Dataset {
    /// Create an empty dataset located at `paths`.
    pub fn new(paths: DatasetPaths) -> Self {
        let circle = Circle::new([0.0; 3], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0], 0.0);
        Self {
            name: paths.name(),
            paths,
            cameras: CameraSet::default(),
            points: None,
            cylinder: Cylinder::from_circle([0.0; 3], &circle, 0.0, 0.0),
            circle,
            intrinsic_scale: 1.0,
            physical_scale: 1.0,
            equirectangular: false,
            flow: FlowSetup::default(),
        }
    }

    /// Whether every camera has both of its optical flow files.
    pub fn has_flow(&self) -> bool {
        !self.cameras.is_empty()
            && self
                .cameras
                .iter()
                .all(|c| c.forward_flow.is_some() && c.backward_flow.is_some())
    }

    /// The sidecar file this dataset is saved to, named after its camera count.
    pub fn sidecar_path(&self) -> PathBuf {
        self.paths
            .cache_folder
            .join(sidecar::file_name(self.cameras.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omniphotos_geometry::Camera;

    #[test]
    fn test_dataset() {
        let paths = DatasetPaths::from_config(
            std::path::Path::new("/data/Shrine/Config/shrine-viewer.yaml"),
            "Cache-8",
        );
        let mut dataset = Dataset::new(paths);
        assert_eq!(dataset.name, "Shrine");
        assert!(!dataset.has_flow());

        dataset.cameras = (0..8).map(|_| Camera::default()).collect();
        assert_eq!(
            dataset.sidecar_path(),
            PathBuf::from("/data/Shrine/Cache/Cache-8/PreprocessingSetup-0008.json")
        );
        assert!(!dataset.has_flow());

        for camera in dataset.cameras.iter_mut() {
            camera.forward_flow = Some(PathBuf::from("a.floss"));
            camera.backward_flow = Some(PathBuf::from("b.floss"));
        }
        assert!(dataset.has_flow());
    }
}
