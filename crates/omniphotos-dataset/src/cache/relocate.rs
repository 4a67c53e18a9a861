use std::path::{Path, PathBuf};

use omniphotos_geometry::CameraSet;

use super::{
    cameras::{write_cameras_csv, CAMERAS_FILE},
    CacheError,
};
use crate::{prompt::Prompt, settings::DatasetPaths};

fn file_name(path: &Path) -> Result<PathBuf, CacheError> {
    path.file_name()
        .map(PathBuf::from)
        .ok_or_else(|| CacheError::RelocationFailed(path.to_path_buf()))
}

// `default` if it holds `file`, otherwise ask until a folder holding it is given
fn locate<P: Prompt + ?Sized>(
    default: &Path,
    file: &Path,
    prompt: &mut P,
    title: &str,
) -> Result<PathBuf, CacheError> {
    if default.join(file).exists() {
        log::info!("Found new location at: {}", default.display());
        return Ok(default.to_path_buf());
    }

    log::info!("Couldn't find {} in {}", file.display(), default.display());
    loop {
        let Some(folder) = prompt.choose_folder(title) else {
            return Err(CacheError::RelocationFailed(file.to_path_buf()));
        };
        if folder.join(file).exists() {
            log::info!("Found new location at: {}", folder.display());
            return Ok(folder);
        }
        log::warn!("{} does not contain {}", folder.display(), file.display());
    }
}

/// Re-root the image and flow paths of a dataset that was moved since it was created.
///
/// Nothing happens if the first camera's image lies inside the working directory.
/// Otherwise images are looked up in the `Input/` folder and flows in the cache
/// folder, asking `prompt` for a folder when they are not there. The user may
/// back up `Cameras.csv` to `Cameras-origin.csv` before it is rewritten with the
/// new paths.
///
/// # Returns
///
/// Whether the paths changed, in which case the camera table on disk was rewritten.
///
/// # Errors
///
/// Fails if the user gives up on a folder request or if the table can not be written.
pub fn relocate_paths<P: Prompt + ?Sized>(
    cameras: &mut CameraSet,
    paths: &DatasetPaths,
    prompt: &mut P,
) -> Result<bool, CacheError> {
    let Some(first) = cameras.get(0) else {
        return Ok(false);
    };
    if first.image_path.starts_with(&paths.working_directory) {
        return Ok(false);
    }

    let created_in = first
        .image_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    log::info!(
        "Dataset was created in {}, relocating to {}",
        created_in.display(),
        paths.working_directory.display()
    );

    let input_folder = locate(
        &paths.input_folder,
        &file_name(&first.image_path)?,
        prompt,
        "Where are the input images located for this dataset?",
    )?;

    let flow_folder = match &first.forward_flow {
        Some(flow) if !flow.starts_with(&paths.cache_folder) => locate(
            &paths.cache_folder,
            &file_name(flow)?,
            prompt,
            "Where are the optical flow files located for this dataset?",
        )?,
        _ => paths.cache_folder.clone(),
    };

    let table = paths.cache_folder.join(CAMERAS_FILE);
    let question = format!(
        "Dataset was created here: {}.\nThe dataset files will be updated for the new location.\nDo you wish to back up the original files?",
        created_in.display()
    );
    if prompt.confirm(&question) {
        let backup = paths.cache_folder.join("Cameras-origin.csv");
        log::info!("Backing up {} to {}", table.display(), backup.display());
        std::fs::copy(&table, &backup)?;
    }

    for camera in cameras.iter_mut() {
        camera.image_path = input_folder.join(file_name(&camera.image_path)?);
        if let Some(flow) = camera.forward_flow.take() {
            camera.forward_flow = Some(flow_folder.join(file_name(&flow)?));
        }
        if let Some(flow) = camera.backward_flow.take() {
            camera.backward_flow = Some(flow_folder.join(file_name(&flow)?));
        }
    }

    let with_flow = cameras
        .iter()
        .all(|c| c.forward_flow.is_some() && c.backward_flow.is_some());
    write_cameras_csv(&table, cameras, &paths.cache_folder, with_flow)?;

    Ok(true)
}
