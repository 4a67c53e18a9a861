use std::path::{Path, PathBuf};

use omniphotos_geometry::{
    fitting::{FitOptions, OrientationMode},
    io::SfmError,
    sampling::SamplingStrategy,
    sfm::{LoadOptions, SfmFormat},
};
use serde::{Deserialize, Serialize};

use crate::flow::{BroxFlowParameters, FlowMethod};

/// Error types for the dataset configuration.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Error reading the configuration file
    #[error("error reading configuration file")]
    IoError(#[from] std::io::Error),

    /// The configuration file does not exist
    #[error("Settings file '{0}' does not exist")]
    FileDoesNotExist(PathBuf),

    /// The configuration is not valid YAML or has values of the wrong type
    #[error("Failed to parse settings: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A value is outside of its accepted range
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    /// The SfM manifest can not be used
    #[error(transparent)]
    SfmError(#[from] SfmError),
}

/// Integer flags (`0`/`1`) as written by older tools, or YAML booleans.
pub(crate) mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => b,
            Flag::Int(i) => i > 0,
        })
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(i32::from(*value))
    }
}

/// The `General` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GeneralSettings {
    /// Name of the cache variant folder below `Cache/`.
    pub cache_folder: String,
}

/// The `Camera` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CameraSettings {
    /// The input images are equirectangular panoramas.
    #[serde(with = "flag")]
    pub equirectangular: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            equirectangular: true,
        }
    }
}

/// The `Preprocessing` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PreprocessingSettings {
    /// printf-style pattern of the input image names, e.g. `image-%04d.jpg`.
    pub image_filenames: String,
    /// Number of cameras kept after subsampling.
    pub number_of_cameras: usize,
    /// Ratio between the image resolution at runtime and in the reconstruction.
    pub intrinsic_scale: f64,
    /// Subsampling strategy index, see [`SamplingStrategy::from_index`].
    pub shape_sampling: i32,
    /// Re-express the cameras in the fitted circle basis.
    #[serde(with = "flag")]
    pub change_basis: bool,
    /// Orientation fit index, see [`OrientationMode::from_index`].
    pub shape_fit: i32,
    /// Compute the flow on half resolution images.
    #[serde(with = "flag")]
    pub downsample_flow: bool,
    /// Compute optical flow between neighbouring cameras.
    #[serde(with = "flag")]
    pub compute_optical_flow: bool,
    /// Flow method index, see [`FlowMethod::from_index`].
    pub optical_flow_method: i32,
    /// Parameters of the Brox flow.
    #[serde(rename = "FlowOCVBrox2004Parameters")]
    pub brox_flow_parameters: BroxFlowParameters,
}

impl Default for PreprocessingSettings {
    fn default() -> Self {
        Self {
            image_filenames: String::new(),
            number_of_cameras: 0,
            intrinsic_scale: 1.0,
            shape_sampling: 0,
            change_basis: false,
            shape_fit: 0,
            downsample_flow: false,
            compute_optical_flow: false,
            optical_flow_method: 0,
            brox_flow_parameters: BroxFlowParameters::default(),
        }
    }
}

/// The `Geometry` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GeometrySettings {
    /// SfM manifest, relative to the config folder.
    #[serde(rename = "SFM")]
    pub sfm: String,
    /// Load the reconstructed 3d points.
    #[serde(rename = "Load3DPoints", with = "flag")]
    pub load_3d_points: bool,
    /// Load the sparse instead of the dense point cloud.
    #[serde(with = "flag")]
    pub load_sparse_point_cloud: bool,
    /// Point limit, `-1` for no limit.
    #[serde(rename = "MaxNumber3DPoints")]
    pub max_number_3d_points: i64,
    /// Largest accepted point reprojection error, non-positive for no limit.
    #[serde(rename = "Max3DPointError")]
    pub max_3d_point_error: f64,
    /// Radius of the capture circle in metres.
    pub circle_radius: f64,
    /// Radius of the proxy cylinder in metres.
    pub cylinder_radius: f64,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            sfm: String::new(),
            load_3d_points: false,
            load_sparse_point_cloud: true,
            max_number_3d_points: -1,
            max_3d_point_error: -1.0,
            circle_radius: 1.0,
            cylinder_radius: 5.0,
        }
    }
}

/// The `Video` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VideoSettings {
    /// First camera kept, in load order.
    pub first_frame: i64,
    /// Last camera kept, in load order. Negative keeps everything.
    pub last_frame: i64,
    /// Keep one pose out of this many.
    pub frame_interval: usize,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            first_frame: -1,
            last_frame: -1,
            frame_interval: 1,
        }
    }
}

/// The `Viewer` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ViewerSettings {
    /// Use the cached optical flow when blending.
    #[serde(with = "flag")]
    pub use_optical_flow: bool,
    /// Load the cached point cloud.
    #[serde(with = "flag")]
    pub use_point_cloud: bool,
    /// Initial viewing direction.
    pub look_at_direction: Option<[f64; 3]>,
    /// Initial viewing distance in metres.
    pub look_at_distance: Option<f64>,
}

/// The folders of one dataset on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetPaths {
    /// The dataset root, parent of the config folder.
    pub working_directory: PathBuf,
    /// The input images.
    pub input_folder: PathBuf,
    /// The configuration files.
    pub config_folder: PathBuf,
    /// The cache variant folder.
    pub cache_folder: PathBuf,
}

impl DatasetPaths {
    /// Derive the folders of a dataset from its configuration file.
    ///
    /// # Arguments
    ///
    /// * `config_path` - The configuration file inside the `Config/` folder.
    /// * `cache_folder` - The cache variant, leading slashes are ignored.
    pub fn from_config(config_path: &Path, cache_folder: &str) -> Self {
        let config_folder = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let working_directory = config_folder
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let variant = cache_folder.trim_start_matches(&['/', '\\'][..]);

        Self {
            input_folder: working_directory.join("Input"),
            cache_folder: working_directory.join("Cache").join(variant),
            config_folder,
            working_directory,
        }
    }

    /// The dataset name, the last component of the working directory.
    pub fn name(&self) -> String {
        self.working_directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The configuration of one dataset, shared by preprocessing and viewing.
///
/// Example:
///
/// ```no_run
/// use omniphotos_dataset::Settings;
///
/// let settings = Settings::from_file("Dataset/Config/dataset-preprocessing.yaml").unwrap();
/// println!("cache folder: {}", settings.paths().cache_folder.display());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    /// General options.
    pub general: GeneralSettings,
    /// Camera model options.
    pub camera: CameraSettings,
    /// Preprocessing pipeline options.
    pub preprocessing: PreprocessingSettings,
    /// Reconstruction and fitting options.
    pub geometry: GeometrySettings,
    /// Input frame selection.
    pub video: VideoSettings,
    /// Viewer options.
    pub viewer: ViewerSettings,

    /// The file the settings were read from.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Settings {
    /// Read the settings from a YAML file.
    ///
    /// Directive lines starting with `%`, such as `%YAML:1.0`, are ignored. The
    /// stored config path is made absolute so the dataset folders derived from it
    /// do not depend on the current directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileDoesNotExist(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::from_yaml(&content)?;
        settings.config_path = path.canonicalize()?;

        log::debug!("Read settings from {}", path.display());
        Ok(settings)
    }

    /// Parse the settings from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, SettingsError> {
        let stripped = content
            .lines()
            .filter(|line| !line.starts_with('%'))
            .collect::<Vec<_>>()
            .join("\n");

        if stripped.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&stripped)?)
    }

    /// The folders of the dataset.
    pub fn paths(&self) -> DatasetPaths {
        DatasetPaths::from_config(&self.config_path, &self.general.cache_folder)
    }

    /// The SfM manifest, resolved against the config folder.
    pub fn sfm_manifest_path(&self) -> PathBuf {
        self.paths().config_folder.join(&self.geometry.sfm)
    }

    /// The SfM format, from the manifest's extension.
    pub fn sfm_format(&self) -> Result<SfmFormat, SettingsError> {
        Ok(SfmFormat::from_path(self.sfm_manifest_path())?)
    }

    /// The number of digits of the frame number in image names.
    ///
    /// Read from the last three characters of the image name pattern's stem,
    /// e.g. `image-%04d.jpg` gives `4`.
    pub fn image_name_digits(&self) -> Result<usize, SettingsError> {
        let pattern = &self.preprocessing.image_filenames;
        let invalid = || SettingsError::InvalidValue("ImageFilenames", pattern.clone());

        let stem = Path::new(pattern)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(invalid)?;
        let start = stem.len().checked_sub(3).ok_or_else(invalid)?;
        let digits = stem.get(start..).ok_or_else(invalid)?;

        // `%04d` leaves `04d`, parse the leading number
        digits
            .trim_end_matches('d')
            .parse::<usize>()
            .map_err(|_| invalid())
    }

    /// The options passed to the SfM loaders.
    pub fn load_options(&self) -> Result<LoadOptions, SettingsError> {
        let max_point_error = if self.geometry.max_3d_point_error > 0.0 {
            self.geometry.max_3d_point_error
        } else {
            f64::INFINITY
        };

        Ok(LoadOptions {
            input_folder: self.paths().input_folder,
            intrinsic_scale: self.preprocessing.intrinsic_scale,
            load_points: self.geometry.load_3d_points,
            load_sparse_only: self.geometry.load_sparse_point_cloud,
            image_name_digits: self.image_name_digits()?,
            frame_interval: self.video.frame_interval,
            max_points: self.geometry.max_number_3d_points,
            max_point_error,
        })
    }

    /// The options of the circle fit. Radii are converted from metres to centimetres.
    pub fn fit_options(&self) -> Result<FitOptions, SettingsError> {
        let mode = OrientationMode::from_index(self.preprocessing.shape_fit).ok_or_else(|| {
            SettingsError::InvalidValue("ShapeFit", self.preprocessing.shape_fit.to_string())
        })?;

        Ok(FitOptions {
            mode,
            change_basis: self.preprocessing.change_basis,
            circle_radius: 100.0 * self.geometry.circle_radius,
            cylinder_radius: 100.0 * self.geometry.cylinder_radius,
            ..FitOptions::default()
        })
    }

    /// The camera subsampling strategy.
    pub fn sampling_strategy(&self) -> Result<SamplingStrategy, SettingsError> {
        let index = self.preprocessing.shape_sampling;
        SamplingStrategy::from_index(index)
            .ok_or_else(|| SettingsError::InvalidValue("ShapeSampling", index.to_string()))
    }

    /// The optical flow method.
    pub fn flow_method(&self) -> Result<FlowMethod, SettingsError> {
        let index = self.preprocessing.optical_flow_method;
        FlowMethod::from_index(index)
            .ok_or_else(|| SettingsError::InvalidValue("OpticalFlowMethod", index.to_string()))
    }

    /// The initial viewing distance in centimetres.
    pub fn look_at_distance_cm(&self) -> Option<f64> {
        self.viewer.look_at_distance.map(|d| 100.0 * d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PREPROCESSING_YAML: &str = r#"%YAML:1.0
---
General:
  CacheFolder: "/Cache-90"
Camera:
  Equirectangular: 0
Preprocessing:
  ImageFilenames: "image-%04d.png"
  NumberOfCameras: 90
  IntrinsicScale: 0.5
  ShapeSampling: 2
  ChangeBasis: 1
  ShapeFit: 1
  DownsampleFlow: true
  ComputeOpticalFlow: 1
  OpticalFlowMethod: 1
  FlowOCVBrox2004Parameters:
    Alpha: 0.2
    OuterIterations: 77
Geometry:
  SFM: "colmap/colmap.txt"
  Load3DPoints: 1
  LoadSparsePointCloud: 0
  MaxNumber3DPoints: 5000
  Max3DPointError: 0.1
  CircleRadius: 0.8
  CylinderRadius: 3
Video:
  FirstFrame: 10
  LastFrame: 200
  FrameInterval: 2
Viewer:
  UseOpticalFlow: 1
  UsePointCloud: 0
  LookAtDistance: 1.5
"#;

    #[test]
    fn test_parse_settings() -> Result<(), SettingsError> {
        let settings = Settings::from_yaml(PREPROCESSING_YAML)?;
        assert_eq!(settings.general.cache_folder, "/Cache-90");
        assert!(!settings.camera.equirectangular);
        assert_eq!(settings.preprocessing.number_of_cameras, 90);
        assert!(settings.preprocessing.change_basis);
        assert!(settings.preprocessing.downsample_flow);
        assert_eq!(settings.preprocessing.brox_flow_parameters.outer_iterations, 77);
        assert_eq!(settings.preprocessing.brox_flow_parameters.inner_iterations, 10);
        assert_relative_eq!(settings.preprocessing.brox_flow_parameters.alpha, 0.2);
        assert!(settings.geometry.load_3d_points);
        assert!(!settings.geometry.load_sparse_point_cloud);
        assert_relative_eq!(settings.geometry.cylinder_radius, 3.0);
        assert_eq!(settings.video.frame_interval, 2);
        assert!(settings.viewer.use_optical_flow);
        assert_eq!(settings.viewer.look_at_direction, None);
        assert_eq!(settings.look_at_distance_cm(), Some(150.0));
        Ok(())
    }

    #[test]
    fn test_derived_values() -> Result<(), SettingsError> {
        let mut settings = Settings::from_yaml(PREPROCESSING_YAML)?;
        settings.config_path = PathBuf::from("/data/Garden/Config/garden-preprocessing.yaml");

        let paths = settings.paths();
        assert_eq!(paths.working_directory, PathBuf::from("/data/Garden"));
        assert_eq!(paths.input_folder, PathBuf::from("/data/Garden/Input"));
        assert_eq!(paths.cache_folder, PathBuf::from("/data/Garden/Cache/Cache-90"));
        assert_eq!(paths.name(), "Garden");
        assert_eq!(
            settings.sfm_manifest_path(),
            PathBuf::from("/data/Garden/Config/colmap/colmap.txt")
        );
        assert_eq!(settings.sfm_format()?, SfmFormat::Colmap);
        assert_eq!(settings.image_name_digits()?, 4);

        let options = settings.load_options()?;
        assert_eq!(options.max_points(), Some(5000));
        assert_relative_eq!(options.max_point_error, 0.1);
        assert_eq!(options.frame_interval, 2);

        let fit = settings.fit_options()?;
        assert_eq!(fit.mode, OrientationMode::Svd);
        assert_relative_eq!(fit.circle_radius, 80.0);
        assert_relative_eq!(fit.cylinder_radius, 300.0);

        assert!(matches!(
            settings.sampling_strategy()?,
            SamplingStrategy::GreedyPath { neighbourhood: 20 }
        ));
        assert_eq!(settings.flow_method()?, FlowMethod::Dis);
        Ok(())
    }

    #[test]
    fn test_defaults_and_invalid_values() -> Result<(), SettingsError> {
        let mut settings = Settings::from_yaml("%YAML:1.0\n")?;
        assert!(settings.camera.equirectangular);
        assert_eq!(settings.video.last_frame, -1);
        assert!(matches!(
            settings.image_name_digits(),
            Err(SettingsError::InvalidValue("ImageFilenames", _))
        ));

        settings.preprocessing.shape_sampling = 7;
        assert!(settings.sampling_strategy().is_err());

        settings.preprocessing.image_filenames = "%04d.png".to_string();
        let options = settings.load_options()?;
        assert_eq!(options.max_points(), None);
        assert_eq!(options.max_point_error, f64::INFINITY);
        Ok(())
    }

    #[test]
    fn test_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let config = dir.path().join("Config");
        std::fs::create_dir_all(&config)?;
        let path = config.join("test-viewer.yaml");
        std::fs::write(&path, PREPROCESSING_YAML)?;

        let settings = Settings::from_file(&path)?;
        assert!(settings.config_path.is_absolute());
        assert_eq!(settings.config_path, path.canonicalize()?);
        assert_eq!(settings.paths().working_directory, dir.path().canonicalize()?);

        assert!(matches!(
            Settings::from_file(dir.path().join("missing.yaml")),
            Err(SettingsError::FileDoesNotExist(_))
        ));
        Ok(())
    }
}
