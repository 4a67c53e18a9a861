use std::path::{Path, PathBuf};

use crate::{
    camera_set::CameraSet,
    io::{colmap, openvslam, SfmError},
    pointcloud::PointCloud,
};

/// The reconstruction tools a manifest can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfmFormat {
    /// COLMAP text model, manifest extension `.txt`.
    Colmap,
    /// OpenVSLAM trajectory and map database, manifest extension `.openvslam`.
    OpenVslam,
    /// VisualSFM, manifest extension `.nvm`. Not supported.
    VisualSfm,
    /// Bundler, manifest extension `.out`. Not supported.
    Bundler,
}

impl SfmFormat {
    /// Detect the format from the manifest's extension.
    ///
    /// # Errors
    ///
    /// Fails if the extension is not one of the known formats.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SfmError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "txt" => Ok(Self::Colmap),
            "openvslam" => Ok(Self::OpenVslam),
            "nvm" => Ok(Self::VisualSfm),
            "out" => Ok(Self::Bundler),
            _ => Err(SfmError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Load the reconstruction listed in `manifest_path`.
    ///
    /// Example:
    ///
    /// ```no_run
    /// use omniphotos_geometry::sfm::{LoadOptions, SfmFormat};
    ///
    /// let manifest = "Config/colmap.txt";
    /// let format = SfmFormat::from_path(manifest).unwrap();
    /// let scene = format.load(manifest, &LoadOptions::default()).unwrap();
    /// println!("loaded {} cameras", scene.cameras.len());
    /// ```
    pub fn load(
        &self,
        manifest_path: impl AsRef<Path>,
        options: &LoadOptions,
    ) -> Result<SfmScene, SfmError> {
        match self {
            Self::Colmap => colmap::load(manifest_path, options),
            Self::OpenVslam => openvslam::load(manifest_path, options),
            Self::VisualSfm | Self::Bundler => {
                Err(SfmError::UnsupportedFormat(format!("{:?}", self)))
            }
        }
    }
}

/// Options shared by all loaders.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Folder image names are resolved against.
    pub input_folder: PathBuf,
    /// Factor applied to focal length and principal point.
    pub intrinsic_scale: f64,
    /// Load the 3d points.
    pub load_points: bool,
    /// Load the sparse points instead of the dense ones.
    pub load_sparse_only: bool,
    /// Number of digits of the frame number in image names.
    pub image_name_digits: usize,
    /// Keep one pose out of this many.
    pub frame_interval: usize,
    /// Maximum number of points, `0` or less means no limit.
    pub max_points: i64,
    /// Points with a reprojection error at or above this value are skipped.
    pub max_point_error: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::new(),
            intrinsic_scale: 1.0,
            load_points: false,
            load_sparse_only: true,
            image_name_digits: 4,
            frame_interval: 1,
            max_points: 0,
            max_point_error: f64::INFINITY,
        }
    }
}

impl LoadOptions {
    /// The point limit, `None` if unlimited.
    pub fn max_points(&self) -> Option<usize> {
        usize::try_from(self.max_points).ok().filter(|&n| n > 0)
    }
}

/// The output of a loader in the engine's coordinate system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SfmScene {
    /// The cameras in file order.
    pub cameras: CameraSet,
    /// The point cloud, if requested.
    pub points: Option<PointCloud>,
    /// Whether the images are equirectangular panoramas.
    pub equirectangular: bool,
}
