use std::path::{Path, PathBuf};

use omniphotos_geometry::{
    fitting::{self, FitError},
    io::SfmError,
    sampling::{self, SamplingError},
    Camera,
};

use crate::{
    cache::{self, CacheError},
    dataset::{Dataset, FlowSetup},
    flow::{self, FlowEstimator},
    prompt::Prompt,
    settings::{Settings, SettingsError},
};

/// Error types for the preprocessing pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// Invalid configuration
    #[error(transparent)]
    SettingsError(#[from] SettingsError),

    /// The reconstruction could not be loaded
    #[error("SfM loading failed: {0}")]
    SfmError(#[from] SfmError),

    /// The camera circle could not be fitted
    #[error(transparent)]
    FitError(#[from] FitError),

    /// No cameras could be selected
    #[error(transparent)]
    SamplingError(#[from] SamplingError),

    /// The cache could not be written
    #[error(transparent)]
    CacheError(#[from] CacheError),

    /// The cache folder exists and the user refused to overwrite it
    #[error("Not overwriting existing cache directory '{0}'. Choose a different name.")]
    CacheExists(PathBuf),

    /// Some input images could not be read
    #[error("Couldn't load all images: {0} of {1} failed")]
    ImagesMissing(usize, usize),
}

/// Checks that the image of a camera can be loaded.
pub trait ImageSource {
    /// Whether the image at `path` can be decoded.
    fn can_load(&mut self, path: &Path) -> bool;
}

/// An [`ImageSource`] that only checks that the image file exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFiles;

impl ImageSource for ImageFiles {
    fn can_load(&mut self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Turns the output of a reconstruction into a cache folder ready for viewing.
///
/// A run goes through a fixed sequence: load the reconstruction, fit the capture
/// circle, clip and subsample the cameras, check their images, compute optical
/// flow and save. Nothing is written to the cache folder before the flow stage.
pub struct Preprocessor {
    settings: Settings,
}

impl Preprocessor {
    /// Create a preprocessor for a dataset configuration.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// The dataset configuration.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the whole pipeline.
    ///
    /// # Arguments
    ///
    /// * `prompt` - Asked whether an existing cache folder may be overwritten.
    /// * `images` - Checks the images of the selected cameras.
    /// * `flow` - Computes optical flow, if the configuration asks for it.
    ///
    /// # Returns
    ///
    /// The dataset as written to the cache folder.
    pub fn run(
        &self,
        prompt: &mut dyn Prompt,
        images: &mut dyn ImageSource,
        flow: Option<&mut dyn FlowEstimator>,
    ) -> Result<Dataset, PreprocessError> {
        let settings = &self.settings;
        let paths = settings.paths();

        let format = settings.sfm_format()?;
        let options = settings.load_options()?;
        let fit_options = settings.fit_options()?;
        let strategy = settings.sampling_strategy()?;

        log::info!("Loading multi-view geometry data in {:?} format", format);
        let mut scene = format.load(settings.sfm_manifest_path(), &options)?;
        log::info!("Loaded {} cameras", scene.cameras.len());

        self.clear_cache_folder(&paths.cache_folder, prompt)?;

        let state = fitting::fit_camera_circle(&mut scene.cameras, scene.points.as_mut(), &fit_options)?;

        let clipped = scene
            .cameras
            .clip_frames(settings.video.first_frame, settings.video.last_frame);
        let cameras = sampling::subsample(
            &clipped,
            &state.circle,
            settings.preprocessing.number_of_cameras,
            strategy,
        )?;
        log::info!("Selected {} of {} cameras", cameras.len(), clipped.len());

        check_images(cameras.iter(), images)?;

        let mut dataset = Dataset {
            name: paths.name(),
            cameras,
            points: scene.points,
            circle: state.circle,
            cylinder: state.cylinder,
            intrinsic_scale: settings.preprocessing.intrinsic_scale,
            physical_scale: state.physical_scale,
            equirectangular: scene.equirectangular || settings.camera.equirectangular,
            flow: FlowSetup {
                brox: settings.preprocessing.brox_flow_parameters,
                downsampled: settings.preprocessing.downsample_flow,
            },
            paths,
        };

        self.compute_optical_flow(&mut dataset, flow)?;

        cache::save_dataset(&dataset)?;
        Ok(dataset)
    }

    fn clear_cache_folder(&self, cache_folder: &Path, prompt: &mut dyn Prompt) -> Result<(), PreprocessError> {
        if !cache_folder.exists() {
            return Ok(());
        }

        let question = format!(
            "The following cache folder already exists:\n{}\n\nDo you want to overwrite it?",
            cache_folder.display()
        );
        if !prompt.confirm(&question) {
            return Err(PreprocessError::CacheExists(cache_folder.to_path_buf()));
        }

        log::info!("Deleting cache directory: {}", cache_folder.display());
        std::fs::remove_dir_all(cache_folder)?;
        Ok(())
    }

    fn compute_optical_flow(
        &self,
        dataset: &mut Dataset,
        estimator: Option<&mut dyn FlowEstimator>,
    ) -> Result<(), PreprocessError> {
        if !self.settings.preprocessing.compute_optical_flow {
            log::info!("Skipping optical flow computation");
            return Ok(());
        }
        let Some(estimator) = estimator else {
            log::warn!("Optical flow requested but no flow estimator is available");
            return Ok(());
        };

        log::info!("Computing optical flow with {:?}", self.settings.flow_method()?);
        std::fs::create_dir_all(&dataset.paths.cache_folder)?;

        if let Err(e) = flow::compute_flows(
            &mut dataset.cameras,
            estimator,
            &dataset.paths.cache_folder,
            flow::FLOW_EXTENSION,
        ) {
            log::warn!("Optical flow crashed: {}", e);
        }
        Ok(())
    }
}

fn check_images<'a>(
    cameras: impl Iterator<Item = &'a Camera>,
    images: &mut dyn ImageSource,
) -> Result<(), PreprocessError> {
    let mut total = 0;
    let mut failed = 0;
    for camera in cameras {
        total += 1;
        if !images.can_load(&camera.image_path) {
            log::warn!("Failed to load image {}", camera.image_path.display());
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(PreprocessError::ImagesMissing(failed, total));
    }
    log::info!("Checked {} images", total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::FixedAnswer;

    struct NoImages;

    impl ImageSource for NoImages {
        fn can_load(&mut self, _path: &Path) -> bool {
            false
        }
    }

    #[test]
    fn test_check_images() {
        let cameras = vec![Camera::default(), Camera::default()];
        assert!(matches!(
            check_images(cameras.iter(), &mut NoImages),
            Err(PreprocessError::ImagesMissing(2, 2))
        ));
        assert!(check_images(std::iter::empty(), &mut NoImages).is_ok());
    }

    #[test]
    fn test_refuse_overwrite() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let cache = dir.path().join("Cache");
        std::fs::create_dir_all(&cache)?;
        std::fs::write(cache.join("Cameras.csv"), "")?;

        let preprocessor = Preprocessor::new(Settings::default());
        assert!(matches!(
            preprocessor.clear_cache_folder(&cache, &mut FixedAnswer(false)),
            Err(PreprocessError::CacheExists(_))
        ));
        assert!(cache.exists());

        preprocessor.clear_cache_folder(&cache, &mut FixedAnswer(true))?;
        assert!(!cache.exists());
        Ok(())
    }
}
