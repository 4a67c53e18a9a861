use std::path::{Path, PathBuf};

use crate::settings::{Settings, SettingsError};

/// Extensions accepted as dataset thumbnails, compared case-insensitively.
pub const THUMBNAIL_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Error types for dataset discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// The path is not a directory
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// The dataset has no `Config/*-viewer*.yaml`
    #[error("No viewer configuration found in '{0}'")]
    NoViewerConfig(PathBuf),

    /// The cache folder is missing or empty
    #[error("Cache folder '{0}' is missing or empty")]
    NoCache(PathBuf),

    /// The viewer configuration could not be read
    #[error(transparent)]
    SettingsError(#[from] SettingsError),
}

/// A preprocessed dataset found on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    /// Name of the working directory.
    pub name: String,
    /// The dataset root, holding `Input/`, `Config/` and `Cache/`.
    pub working_directory: PathBuf,
    /// Folder of the input images.
    pub input_folder: PathBuf,
    /// Cache folder named in the configuration.
    pub cache_folder: PathBuf,
    /// Folder of the configuration file.
    pub config_folder: PathBuf,
    /// The viewer configuration file.
    pub config_path: PathBuf,
    /// First image of the input folder, by name.
    pub thumbnail: Option<PathBuf>,
}

fn is_non_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut entries = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

fn has_thumbnail_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy();
        THUMBNAIL_EXTENSIONS
            .iter()
            .any(|candidate| ext.eq_ignore_ascii_case(candidate))
    })
}

fn find_thumbnail(input_folder: &Path) -> Option<PathBuf> {
    sorted_entries(input_folder)
        .ok()?
        .into_iter()
        .find(|path| path.is_file() && has_thumbnail_extension(path))
}

/// Describe the dataset of a viewer configuration file.
///
/// The working directory is the parent of the configuration's folder.
///
/// # Errors
///
/// Fails if the configuration can not be read or its cache folder is missing or
/// empty.
pub fn scan_dataset_config(config_path: impl AsRef<Path>) -> Result<DatasetInfo, DiscoveryError> {
    let config_path = config_path.as_ref();
    let config_path = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    let settings = Settings::from_file(&config_path)?;
    let paths = settings.paths();

    if !is_non_empty_dir(&paths.cache_folder) {
        return Err(DiscoveryError::NoCache(paths.cache_folder));
    }

    let thumbnail = find_thumbnail(&paths.input_folder);
    if thumbnail.is_none() {
        log::debug!("No thumbnail in {}", paths.input_folder.display());
    }

    Ok(DatasetInfo {
        name: paths.name(),
        thumbnail,
        working_directory: paths.working_directory,
        input_folder: paths.input_folder,
        cache_folder: paths.cache_folder,
        config_folder: paths.config_folder,
        config_path,
    })
}

/// Describe the dataset rooted at `dir`.
///
/// The first `Config/*.yaml` whose name contains `-viewer` is used.
pub fn scan_dataset_directory(dir: impl AsRef<Path>) -> Result<DatasetInfo, DiscoveryError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(DiscoveryError::NotADirectory(dir.to_path_buf()));
    }

    let cache = dir.join("Cache");
    if !is_non_empty_dir(&cache) {
        return Err(DiscoveryError::NoCache(cache));
    }

    let config_folder = dir.join("Config");
    let config_path = if config_folder.is_dir() {
        sorted_entries(&config_folder)?.into_iter().find(|path| {
            let is_viewer = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().contains("-viewer"));
            let is_yaml = path.extension().is_some_and(|e| e == "yaml");
            is_viewer && is_yaml && path.is_file()
        })
    } else {
        None
    };

    match config_path {
        Some(config_path) => scan_dataset_config(config_path),
        None => Err(DiscoveryError::NoViewerConfig(dir.to_path_buf())),
    }
}

/// Find all preprocessed datasets directly below `root`, sorted by name.
///
/// Directories that are not valid datasets are skipped.
///
/// Example:
///
/// ```no_run
/// use omniphotos_dataset::discovery::scan_datasets;
///
/// for info in scan_datasets("/data/omniphotos").unwrap() {
///     println!("{} in {}", info.name, info.working_directory.display());
/// }
/// ```
pub fn scan_datasets(root: impl AsRef<Path>) -> Result<Vec<DatasetInfo>, DiscoveryError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(DiscoveryError::NotADirectory(root.to_path_buf()));
    }

    let mut datasets = sorted_entries(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .filter_map(|dir| match scan_dataset_directory(&dir) {
            Ok(info) => Some(info),
            Err(e) => {
                log::debug!("Skipping {}: {}", dir.display(), e);
                None
            }
        })
        .collect::<Vec<_>>();
    datasets.sort_by(|a, b| a.name.cmp(&b.name));

    log::info!("Found {} datasets in {}", datasets.len(), root.display());
    Ok(datasets)
}
