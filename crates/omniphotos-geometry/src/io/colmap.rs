use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use super::{parse_array, parse_part, read_data_lines, SfmError, SfmManifest};
use crate::{
    camera::Camera,
    camera_set::CameraSet,
    linalg,
    pointcloud::PointCloud,
    sfm::{LoadOptions, SfmScene},
    transforms,
};

/// The only COLMAP camera model the loader understands.
pub const SIMPLE_PINHOLE: &str = "SIMPLE_PINHOLE";

/// Represents a camera in the COLMAP system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapCamera {
    /// Camera id
    pub camera_id: u32,
    /// Camera model name
    pub model: String,
    /// Image width
    pub width: usize,
    /// Image height
    pub height: usize,
    /// Camera parameters
    pub params: Vec<f64>,
}

impl ColmapCamera {
    /// The intrinsic matrix of a `SIMPLE_PINHOLE` camera scaled by `scale`.
    ///
    /// # Errors
    ///
    /// Fails for any other model or if fewer than three parameters are present.
    pub fn intrinsics(&self, scale: f64) -> Result<[[f64; 3]; 3], SfmError> {
        if self.model != SIMPLE_PINHOLE {
            return Err(SfmError::UnsupportedCameraModel(self.model.clone()));
        }
        let [f, cx, cy] = match self.params[..] {
            [f, cx, cy, ..] => [f, cx, cy],
            _ => {
                return Err(SfmError::ParseError(format!(
                    "Invalid number of camera parameters: {}",
                    self.params.len()
                )))
            }
        };
        Ok([
            [scale * f, 0.0, scale * cx],
            [0.0, scale * f, scale * cy],
            [0.0, 0.0, 1.0],
        ])
    }
}

/// Represents the pose of an image in the COLMAP system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapImage {
    /// Image id
    pub image_id: u32,
    /// Rotation
    pub rotation: [f64; 4], // qw, qx, qy, qz
    /// Translation
    pub translation: [f64; 3], // x, y, z
    /// Camera id
    pub camera_id: u32,
    /// Image name
    pub name: String,
}

/// Represents a 3D point in the COLMAP system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapPoint3d {
    /// Point3d id
    pub point3d_id: i64,
    /// x, y, z coordinates
    pub xyz: [f64; 3],
    /// rgb color in 0..255
    pub rgb: [f64; 3],
    /// Reprojection error
    pub error: f64,
}

/// Read the cameras.txt file and return all cameras regardless of their model.
///
/// # Arguments
///
/// * `path` - The path to the cameras.txt file.
pub fn read_cameras_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapCamera>, SfmError> {
    log::info!("Reading cameras from COLMAP ...");
    read_data_lines(path.as_ref())?
        .iter()
        .map(|line| parse_camera_line(line))
        .collect()
}

/// Read the images.txt file and return the pose of every `frame_interval`-th image.
///
/// Lines starting with `#` are skipped. The remaining lines come in pairs, a pose
/// line followed by a line of 2d points which is ignored.
///
/// # Arguments
///
/// * `path` - The path to the images.txt file.
/// * `frame_interval` - Keep one pose out of this many, `0` keeps all.
pub fn read_images_txt(
    path: impl AsRef<Path>,
    frame_interval: usize,
) -> Result<Vec<ColmapImage>, SfmError> {
    let path = path.as_ref();
    log::info!("Loading COLMAP images from {}", path.display());
    if !path.exists() {
        return Err(SfmError::FileDoesNotExist(path.to_path_buf()));
    }

    let frame_interval = frame_interval.max(1);
    let reader = BufReader::new(File::open(path)?);

    let mut images = Vec::new();
    let mut line_count = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }

        // even lines hold the pose, odd lines the 2d points
        if line_count % 2 == 0 {
            let entry = line_count / 2;
            if entry % frame_interval == 0 {
                images.push(parse_image_line(&line)?);
            }
        }
        line_count += 1;
    }

    Ok(images)
}

/// Read the points3D.txt file.
///
/// # Arguments
///
/// * `path` - The path to the points3D.txt file.
/// * `max_points` - Stop after this many points, `None` reads all.
/// * `max_error` - Points with a reprojection error at or above this value are skipped.
pub fn read_points3d_txt(
    path: impl AsRef<Path>,
    max_points: Option<usize>,
    max_error: f64,
) -> Result<Vec<ColmapPoint3d>, SfmError> {
    let path = path.as_ref();
    log::info!("Reading 3D points from {}", path.display());

    let mut points = Vec::new();
    for line in read_data_lines(path)? {
        if max_points.is_some_and(|max| points.len() >= max) {
            break;
        }
        let point = parse_point3d_line(&line)?;
        if point.error >= max_error {
            continue;
        }
        points.push(point);
    }

    Ok(points)
}

/// Load a COLMAP reconstruction listed in a manifest.
///
/// Camera poses and points are converted into the engine's coordinate system. The
/// intrinsics of the first `SIMPLE_PINHOLE` camera are shared by all images; other
/// camera models are logged and skipped.
///
/// # Arguments
///
/// * `manifest_path` - The manifest listing cameras.txt, images.txt and points3D.txt.
/// * `options` - The load options.
pub fn load(manifest_path: impl AsRef<Path>, options: &LoadOptions) -> Result<SfmScene, SfmError> {
    let manifest = SfmManifest::read(manifest_path.as_ref())?;
    let cameras_path = manifest.cameras_path()?;

    let colmap_cameras = read_cameras_txt(cameras_path)?;
    let mut supported = Vec::new();
    for camera in colmap_cameras.iter() {
        match camera.intrinsics(options.intrinsic_scale) {
            Ok(intrinsics) => supported.push(intrinsics),
            Err(SfmError::UnsupportedCameraModel(model)) => log::error!(
                "Camera type {} is not implemented (only {} at the moment)",
                model,
                SIMPLE_PINHOLE
            ),
            Err(e) => return Err(e),
        }
    }
    if supported.len() > 1 {
        log::error!(
            "There are {} camera models in {}, using the first one",
            supported.len(),
            cameras_path.display()
        );
    }
    let intrinsics = *supported
        .first()
        .ok_or_else(|| SfmError::NoCameraModel(cameras_path.to_path_buf()))?;

    log::info!("Mapping COLMAP to internal data structures");
    let mut cameras = CameraSet::default();
    for image in read_images_txt(manifest.poses_path()?, options.frame_interval)? {
        // COLMAP camera orientation: x-right, y-down, z-forward
        let rotation = transforms::quaternion_to_rotation_matrix(&image.rotation);
        let centre = linalg::scale_vec3(
            &linalg::mat33_mul_vec3(&linalg::transpose_mat33(&rotation), &image.translation),
            -1.0,
        );
        let (rotation, centre) = transforms::apply_coordinate_flip(&rotation, &centre);

        let mut camera = Camera::new(intrinsics, rotation, centre);
        camera.frame = super::frame_from_image_name(&image.name, options.image_name_digits)?;
        camera.image_path = super::resolve_image_path(&image.name, &options.input_folder);
        cameras.push(camera);
    }

    let points = if options.load_points {
        let mut points_path = manifest.points_path()?.to_path_buf();
        if !options.load_sparse_only {
            points_path = dense_points_path(&points_path);
        }
        let mut pointcloud = PointCloud::default();
        for point in read_points3d_txt(&points_path, options.max_points(), options.max_point_error)? {
            pointcloud.push(
                point.point3d_id,
                transforms::flip_point(&point.xyz),
                point.rgb.map(|c| c / 255.0),
                point.error,
            );
        }
        log::info!("Loaded {} points from COLMAP", pointcloud.len());
        Some(pointcloud)
    } else {
        None
    };

    log::info!("Loading COLMAP files finished, {} cameras", cameras.len());

    Ok(SfmScene {
        cameras,
        points,
        equirectangular: false,
    })
}

/// The dense point file next to a sparse one, `<stem>-dense.txt`.
pub fn dense_points_path(sparse: &Path) -> PathBuf {
    let stem = sparse
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    sparse.with_file_name(format!("{}-dense.txt", stem))
}

/// Parse a camera line and return a ColmapCamera struct.
/// NOTE: The number of parameters depends on the camera model.
///       CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[0], PARAMS[1], ...
fn parse_camera_line(line: &str) -> Result<ColmapCamera, SfmError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 4 {
        return Err(SfmError::ParseError(format!(
            "Invalid number of parts: {}",
            parts.len()
        )));
    }

    Ok(ColmapCamera {
        camera_id: parse_part(parts[0])?,
        model: parts[1].to_string(),
        width: parse_part(parts[2])?,
        height: parse_part(parts[3])?,
        params: parts[4..]
            .iter()
            .map(|s| parse_part(s))
            .collect::<Result<Vec<_>, _>>()?,
    })
}

/// Parse an image line and return a ColmapImage struct.
/// #   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
fn parse_image_line(line: &str) -> Result<ColmapImage, SfmError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 10 {
        return Err(SfmError::ParseError(format!(
            "Invalid number of parts in image line: {}",
            parts.len()
        )));
    }

    Ok(ColmapImage {
        image_id: parse_part(parts[0])?,
        rotation: parse_array(&parts[1..5])?,
        translation: parse_array(&parts[5..8])?,
        camera_id: parse_part(parts[8])?,
        name: parts[9].to_string(),
    })
}

/// Parse a point3d line and return a ColmapPoint3d struct.
///       POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[0], TRACK[1], ...
fn parse_point3d_line(line: &str) -> Result<ColmapPoint3d, SfmError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 8 {
        return Err(SfmError::ParseError(format!(
            "Invalid number of parts: {}",
            parts.len()
        )));
    }

    Ok(ColmapPoint3d {
        point3d_id: parse_part(parts[0])?,
        xyz: parse_array(&parts[1..4])?,
        rgb: parse_array(&parts[4..7])?,
        error: parse_part(parts[7])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CAMERAS_TXT: &str = "# Camera list with one line of data per camera:
#   CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]
# Number of cameras: 2
1 SIMPLE_PINHOLE 1920 1080 1000.0 960.0 540.0
2 OPENCV 1920 1080 1000.0 1000.0 960.0 540.0 0.1 0.0 0.0 0.0
";

    const IMAGES_TXT: &str = "# Image list with two lines of data per image:
#   IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
#   POINTS2D[] as (X, Y, POINT3D_ID)
1 1.0 0.0 0.0 0.0 0.0 0.0 -2.0 1 images/0000.jpg
10.0 20.0 -1
2 1.0 0.0 0.0 0.0 1.0 0.0 -2.0 1 images/0001.jpg

3 1.0 0.0 0.0 0.0 2.0 0.0 -2.0 1 images/0002.jpg
30.0 40.0 7
";

    const POINTS_TXT: &str = "# 3D point list with one line of data per point:
#   POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)
7 1.0 2.0 3.0 255 0 51 0.5 1 0
8 4.0 5.0 6.0 0 255 0 3.0 2 0
9 7.0 8.0 9.0 0 0 255 0.1
";

    fn write_model(dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
        std::fs::write(dir.join("cameras.txt"), CAMERAS_TXT)?;
        std::fs::write(dir.join("images.txt"), IMAGES_TXT)?;
        std::fs::write(dir.join("points3D.txt"), POINTS_TXT)?;
        std::fs::write(dir.join("points3D-dense.txt"), "1 0.0 0.0 1.0 255 255 255 0.0\n")?;
        let manifest = dir.join("colmap.txt");
        std::fs::write(&manifest, "cameras.txt\nimages.txt\npoints3D.txt\n")?;
        Ok(manifest)
    }

    #[test]
    fn test_read_cameras_txt() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_model(tmp_dir.path())?;
        let cameras = read_cameras_txt(tmp_dir.path().join("cameras.txt"))?;
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].model, SIMPLE_PINHOLE);
        assert_eq!(cameras[0].width, 1920);
        assert_eq!(cameras[1].params.len(), 8);

        let k = cameras[0].intrinsics(0.5)?;
        assert_eq!(k, [[500.0, 0.0, 480.0], [0.0, 500.0, 270.0], [0.0, 0.0, 1.0]]);
        assert!(matches!(
            cameras[1].intrinsics(1.0),
            Err(SfmError::UnsupportedCameraModel(_))
        ));
        Ok(())
    }

    #[test]
    fn test_read_images_txt() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_model(tmp_dir.path())?;
        let path = tmp_dir.path().join("images.txt");

        let images = read_images_txt(&path, 1)?;
        assert_eq!(images.len(), 3);
        assert_eq!(images[1].image_id, 2);
        assert_eq!(images[2].translation, [2.0, 0.0, -2.0]);
        assert_eq!(images[0].name, "images/0000.jpg");

        let every_other = read_images_txt(&path, 2)?;
        assert_eq!(
            every_other.iter().map(|i| i.image_id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        Ok(())
    }

    #[test]
    fn test_read_points3d_txt() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_model(tmp_dir.path())?;
        let path = tmp_dir.path().join("points3D.txt");

        let points = read_points3d_txt(&path, None, 1.0)?;
        assert_eq!(
            points.iter().map(|p| p.point3d_id).collect::<Vec<_>>(),
            vec![7, 9]
        );
        assert_eq!(points[0].rgb, [255.0, 0.0, 51.0]);

        let capped = read_points3d_txt(&path, Some(1), f64::INFINITY)?;
        assert_eq!(capped.len(), 1);
        Ok(())
    }

    #[test]
    fn test_load() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let manifest = write_model(tmp_dir.path())?;

        let options = LoadOptions {
            input_folder: PathBuf::from("/data/Input"),
            load_points: true,
            max_point_error: 1.0,
            ..Default::default()
        };
        let scene = load(&manifest, &options)?;

        assert!(!scene.equirectangular);
        assert_eq!(scene.cameras.len(), 3);

        let camera = &scene.cameras[1];
        assert_eq!(camera.frame, 1);
        assert_eq!(camera.image_path, PathBuf::from("/data/Input/0001.jpg"));
        assert_eq!(camera.intrinsics()[0][0], 1000.0);
        // C = -R^T t = (-1, 0, 2) before flipping y and z
        assert_relative_eq!(camera.centre()[0], -1.0);
        assert_relative_eq!(camera.centre()[2], -2.0);
        assert_eq!(camera.rotation(), &transforms::INV_YZ);

        let points = scene.points.ok_or("missing points")?;
        assert_eq!(points.len(), 2);
        assert_eq!(points.points()[0], [1.0, -2.0, -3.0]);
        assert_relative_eq!(points.colors()[0][2], 0.2);

        let dense = load(
            &manifest,
            &LoadOptions {
                load_sparse_only: false,
                ..options
            },
        )?;
        assert_eq!(dense.points.map(|p| p.len()), Some(1));
        Ok(())
    }

    #[test]
    fn test_load_without_pinhole_camera() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let manifest = write_model(tmp_dir.path())?;
        std::fs::write(
            tmp_dir.path().join("cameras.txt"),
            "1 PINHOLE 640 480 500.0 500.0 320.0 240.0\n",
        )?;
        assert!(matches!(
            load(&manifest, &LoadOptions::default()),
            Err(SfmError::NoCameraModel(_))
        ));
        Ok(())
    }

    #[test]
    fn test_dense_points_path() {
        assert_eq!(
            dense_points_path(Path::new("/a/b/points3D.txt")),
            PathBuf::from("/a/b/points3D-dense.txt")
        );
    }
}
