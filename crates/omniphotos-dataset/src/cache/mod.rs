/// The `Cameras.csv` camera table.
pub mod cameras;

/// The `PointCloud.csv` point table.
pub mod points;

/// Re-rooting of moved datasets.
pub mod relocate;

/// The `PreprocessingSetup-NNNN.json` sidecar.
pub mod sidecar;

use std::path::{Component, Path, PathBuf};

use omniphotos_geometry::shapes::{Circle, Cylinder};

use crate::{
    dataset::{Dataset, FlowSetup},
    prompt::Prompt,
    settings::Settings,
};

/// Height of the proxy cylinder rebuilt from a cache.
pub const LOADED_CYLINDER_HEIGHT: f64 = 100_000.0;

/// Error types for the cache folder.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// The cache folder does not exist
    #[error("Cache folder '{0}' not found")]
    CacheFolderNotFound(PathBuf),

    /// The cache folder is empty
    #[error("The cache folder '{0}' is empty")]
    EmptyCacheFolder(PathBuf),

    /// The cache folder has no sidecar
    #[error("Preprocessing*.json file not found in '{0}'")]
    SidecarNotFound(PathBuf),

    /// A required cache file does not exist
    #[error("File '{0}' could not be opened")]
    FileDoesNotExist(PathBuf),

    /// The camera table has no camera
    #[error("No cameras in '{0}'")]
    NoCameras(PathBuf),

    /// The sidecar is not valid JSON or misses required fields
    #[error("Failed to parse the preprocessing setup: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Parse error
    #[error("Parse error {0}")]
    ParseError(String),

    /// Flow columns were requested but a camera has no flow
    #[error("Camera {0} has no optical flow")]
    MissingFlow(PathBuf),

    /// The files of a moved dataset could not be found
    #[error("Could not locate {0} for the moved dataset")]
    RelocationFailed(PathBuf),
}

/// Utility function for parsing the tokens of cache tables.
pub(crate) fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, CacheError>
where
    T::Err: std::fmt::Display,
{
    s.trim()
        .parse::<T>()
        .map_err(|e| CacheError::ParseError(format!("{}: {}", s, e)))
}

/// Join `relative` onto `base` and resolve `.` and `..` components lexically.
pub(crate) fn join_normalized(base: &Path, relative: &str) -> PathBuf {
    let mut result = PathBuf::new();
    for component in base.join(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            c => result.push(c),
        }
    }
    result
}

/// `path` relative to the folder `base`, using `..` where needed.
///
/// Both paths are compared lexically, so two relative paths are taken to start
/// from the same folder. `path` is returned unchanged if only one of the two is
/// absolute or if they have different roots.
pub(crate) fn relative_to(path: &Path, base: &Path) -> String {
    let path_components = path.components().collect::<Vec<_>>();
    let base_components = base.components().collect::<Vec<_>>();

    let unrelated_roots = path.is_absolute() != base.is_absolute()
        || (path.is_absolute() && path_components.first() != base_components.first());
    if unrelated_roots {
        return path.to_string_lossy().into_owned();
    }

    let common = path_components
        .iter()
        .zip(&base_components)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_components.len() {
        relative.push("..");
    }
    for component in &path_components[common..] {
        relative.push(component);
    }

    // forward slashes keep the tables portable
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write a dataset into its cache folder.
///
/// Writes `Cameras.csv`, with flow columns if every camera has its flows,
/// `PointCloud.csv` if the dataset has points, and the sidecar named after the
/// number of cameras. The cache folder is created if needed.
///
/// Example:
///
/// ```no_run
/// use omniphotos_dataset::{cache, prompt::FixedAnswer, Settings};
///
/// let settings = Settings::from_file("Dataset/Config/dataset-viewer.yaml").unwrap();
/// let dataset = cache::load_from_cache(&settings, &mut FixedAnswer(false)).unwrap();
/// cache::save_dataset(&dataset).unwrap();
/// ```
pub fn save_dataset(dataset: &Dataset) -> Result<(), CacheError> {
    let cache_folder = &dataset.paths.cache_folder;
    std::fs::create_dir_all(cache_folder)?;

    let sidecar_path = dataset.sidecar_path();
    log::info!("Serialising dataset into file: {}", sidecar_path.display());

    cameras::write_cameras_csv(
        &cache_folder.join(cameras::CAMERAS_FILE),
        &dataset.cameras,
        cache_folder,
        dataset.has_flow(),
    )?;

    if let Some(points) = &dataset.points {
        points::write_point_cloud_csv(&cache_folder.join(points::POINT_CLOUD_FILE), points)?;
    }

    sidecar::Sidecar::from_dataset(dataset).write(&sidecar_path)
}

/// Load a preprocessed dataset from the cache folder named in `settings`.
///
/// Only reads the cache, unless the dataset was moved since it was created: then
/// the camera table is rewritten with the new paths, see
/// [`relocate::relocate_paths`]. Safe to call from a background thread.
///
/// # Errors
///
/// Fails if the cache folder is missing or empty, if it holds no sidecar or no
/// camera table, or if any of them can not be parsed.
pub fn load_from_cache<P: Prompt + ?Sized>(
    settings: &Settings,
    prompt: &mut P,
) -> Result<Dataset, CacheError> {
    let paths = settings.paths();
    let cache_folder = paths.cache_folder.clone();

    if !cache_folder.is_dir() {
        return Err(CacheError::CacheFolderNotFound(cache_folder));
    }
    if std::fs::read_dir(&cache_folder)?.next().is_none() {
        return Err(CacheError::EmptyCacheFolder(cache_folder));
    }

    let sidecar_path = sidecar::find(&cache_folder)?;
    log::info!("Read data from cache file: {}", sidecar_path.display());
    let num_cameras = sidecar::camera_count(&sidecar_path)?;
    let info = sidecar::Sidecar::read(&sidecar_path)?.dataset;

    let circle_json = &info.camera_circle;
    let circle = Circle::new(
        circle_json.centroid.into(),
        circle_json.up.into(),
        circle_json.forward.into(),
        circle_json.radius,
    );
    let cylinder_json = &info.projection_cylinder;
    let cylinder = Cylinder::new(
        cylinder_json.centroid.into(),
        cylinder_json.up.into(),
        *circle.forward(),
        cylinder_json.radius,
        LOADED_CYLINDER_HEIGHT,
    );

    let equirectangular = settings.camera.equirectangular;
    let table = cache_folder.join(cameras::CAMERAS_FILE);
    let mut camera_set = cameras::read_cameras_csv(&table, &cache_folder, equirectangular)?;
    if camera_set.is_empty() {
        return Err(CacheError::NoCameras(table));
    }

    if relocate::relocate_paths(&mut camera_set, &paths, prompt)? {
        camera_set = cameras::read_cameras_csv(&table, &cache_folder, equirectangular)?;
    }

    if camera_set.len() != num_cameras {
        log::warn!(
            "{} lists {} cameras but {} were read",
            sidecar_path.display(),
            num_cameras,
            camera_set.len()
        );
    }

    let points = if info.point_cloud.exists && settings.viewer.use_point_cloud {
        log::debug!("Setting up point cloud");
        Some(points::read_point_cloud_csv(
            &cache_folder.join(points::POINT_CLOUD_FILE),
        )?)
    } else {
        None
    };

    Ok(Dataset {
        name: paths.name(),
        paths,
        cameras: camera_set,
        points,
        circle,
        cylinder,
        intrinsic_scale: info.intrinsic_scale,
        physical_scale: info.scaling,
        equirectangular,
        flow: FlowSetup {
            brox: info.flow.brox,
            downsampled: info.flow.downsampled,
        },
    })
}
