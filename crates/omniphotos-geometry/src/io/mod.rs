/// COLMAP text model reader.
pub mod colmap;

/// OpenVSLAM trajectory and map database reader.
pub mod openvslam;

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

/// Error types for the SfM loaders.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SfmError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// A file listed in the manifest does not exist
    #[error("File does not exist: {0}")]
    FileDoesNotExist(PathBuf),

    /// The manifest does not list a required file
    #[error("The manifest does not list the {0} file")]
    MissingManifestEntry(&'static str),

    /// Parse error
    #[error("Parse error {0}")]
    ParseError(String),

    /// The image name does not end in a supported extension
    #[error("Only jpg and png are supported as input images: {0}")]
    UnsupportedImageName(String),

    /// The camera model is not supported by the loader
    #[error("Camera type {0} is not implemented")]
    UnsupportedCameraModel(String),

    /// No usable camera model was found
    #[error("No supported camera model in {0}")]
    NoCameraModel(PathBuf),

    /// The SfM format is recognised but not supported
    #[error("Unsupported SfM format: {0}")]
    UnsupportedFormat(String),

    /// Failed to decode the MessagePack map database
    #[error("Failed to decode the map database")]
    MsgpackError(#[from] rmp_serde::decode::Error),
}

/// Utility function for parsing the tokens of SfM text files.
pub(crate) fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, SfmError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| SfmError::ParseError(format!("{}: {}", s, e)))
}

/// Parse a slice of tokens into a fixed size array.
pub(crate) fn parse_array<T: std::str::FromStr, const N: usize>(
    parts: &[&str],
) -> Result<[T; N], SfmError>
where
    T::Err: std::fmt::Display,
{
    parts
        .iter()
        .map(|s| parse_part(s))
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| SfmError::ParseError(format!("Expected {} values", N)))
}

/// The three files produced by a reconstruction tool, listed in a small manifest.
///
/// The manifest has one path per line: camera intrinsics, camera poses and 3d points.
/// Paths are relative to the manifest's folder and an empty line means the file is
/// not provided.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfmManifest {
    /// The camera intrinsics file.
    pub cameras: Option<PathBuf>,
    /// The camera poses file.
    pub poses: Option<PathBuf>,
    /// The 3d points file.
    pub points: Option<PathBuf>,
}

impl SfmManifest {
    /// Read a manifest and resolve its paths.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the manifest file.
    ///
    /// # Errors
    ///
    /// Fails if the manifest can not be read or if a listed file does not exist.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, SfmError> {
        let path = path.as_ref();
        log::info!("Reading SfM model files from {}", path.display());

        if !path.exists() {
            return Err(SfmError::FileDoesNotExist(path.to_path_buf()));
        }

        let folder = path.parent().unwrap_or_else(|| Path::new(""));
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let mut next_entry = || -> Result<Option<PathBuf>, SfmError> {
            let Some(line) = lines.next().transpose()? else {
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                return Ok(None);
            }
            let entry = folder.join(line);
            std::fs::canonicalize(&entry)
                .map(Some)
                .map_err(|_| SfmError::FileDoesNotExist(entry))
        };

        Ok(Self {
            cameras: next_entry()?,
            poses: next_entry()?,
            points: next_entry()?,
        })
    }

    /// The camera intrinsics file, which every loader needs.
    pub fn cameras_path(&self) -> Result<&Path, SfmError> {
        self.cameras
            .as_deref()
            .ok_or(SfmError::MissingManifestEntry("cameras"))
    }

    /// The camera poses file, which every loader needs.
    pub fn poses_path(&self) -> Result<&Path, SfmError> {
        self.poses
            .as_deref()
            .ok_or(SfmError::MissingManifestEntry("poses"))
    }

    /// The 3d points file, needed only when points are loaded.
    pub fn points_path(&self) -> Result<&Path, SfmError> {
        self.points
            .as_deref()
            .ok_or(SfmError::MissingManifestEntry("points"))
    }
}

/// Extract the frame number from an image name.
///
/// The frame number is made of the `digits` characters right before the first
/// `.jpg`, or `.png` if there is no `.jpg`.
///
/// # Errors
///
/// Fails if the name has neither extension or if the characters are not a number.
pub fn frame_from_image_name(name: &str, digits: usize) -> Result<i32, SfmError> {
    let pos = name
        .find(".jpg")
        .or_else(|| name.find(".png"))
        .ok_or_else(|| SfmError::UnsupportedImageName(name.to_string()))?;

    let frame = pos
        .checked_sub(digits)
        .and_then(|start| name.get(start..pos))
        .ok_or_else(|| SfmError::ParseError(format!("No frame number in {}", name)))?;

    parse_part(frame)
}

/// Resolve an image name from a reconstruction against the input image folder.
///
/// Everything up to and including the first `/` is dropped from the name.
pub fn resolve_image_path(name: &str, input_folder: &Path) -> PathBuf {
    let stripped = name.split_once('/').map_or(name, |(_, rest)| rest);
    input_folder.join(stripped)
}

/// Read the non-empty lines of a text file that are not `#` comments.
pub(crate) fn read_data_lines(path: &Path) -> Result<Vec<String>, SfmError> {
    if !path.exists() {
        return Err(SfmError::FileDoesNotExist(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        lines.push(line);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_frame_from_image_name() -> Result<(), SfmError> {
        assert_eq!(frame_from_image_name("images/0042.jpg", 4)?, 42);
        assert_eq!(frame_from_image_name("frame-00017.png", 5)?, 17);
        // a jpg takes precedence over a png
        assert_eq!(frame_from_image_name("0001.png.0002.jpg", 4)?, 2);
        assert!(matches!(
            frame_from_image_name("0001.bmp", 4),
            Err(SfmError::UnsupportedImageName(_))
        ));
        assert!(matches!(
            frame_from_image_name("1.jpg", 4),
            Err(SfmError::ParseError(_))
        ));
        Ok(())
    }

    #[test]
    fn test_resolve_image_path() {
        let input = Path::new("/data/Input");
        assert_eq!(
            resolve_image_path("images/0001.jpg", input),
            PathBuf::from("/data/Input/0001.jpg")
        );
        assert_eq!(
            resolve_image_path("0001.jpg", input),
            PathBuf::from("/data/Input/0001.jpg")
        );
    }

    #[test]
    fn test_read_manifest() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let sfm_dir = tmp_dir.path().join("sfm");
        std::fs::create_dir(&sfm_dir)?;
        std::fs::write(sfm_dir.join("cameras.txt"), "")?;
        std::fs::write(sfm_dir.join("images.txt"), "")?;

        let manifest_path = tmp_dir.path().join("colmap.txt");
        let mut file = File::create(&manifest_path)?;
        writeln!(file, "sfm/cameras.txt")?;
        writeln!(file, "sfm/images.txt")?;
        writeln!(file)?;

        let manifest = SfmManifest::read(&manifest_path)?;
        assert_eq!(
            manifest.cameras,
            Some(std::fs::canonicalize(sfm_dir.join("cameras.txt"))?)
        );
        assert!(manifest.poses.is_some());
        assert_eq!(manifest.points, None);
        assert!(matches!(
            manifest.points_path(),
            Err(SfmError::MissingManifestEntry("points"))
        ));

        std::fs::write(&manifest_path, "sfm/cameras.txt\nsfm/missing.txt\n")?;
        assert!(matches!(
            SfmManifest::read(&manifest_path),
            Err(SfmError::FileDoesNotExist(_))
        ));

        assert!(matches!(
            SfmManifest::read(tmp_dir.path().join("nothing.txt")),
            Err(SfmError::FileDoesNotExist(_))
        ));
        Ok(())
    }
}
