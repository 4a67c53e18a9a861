use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use super::{parse_array, parse_part, read_data_lines, SfmError, SfmManifest};
use crate::{
    camera::Camera,
    camera_set::CameraSet,
    linalg,
    pointcloud::PointCloud,
    sfm::{LoadOptions, SfmScene},
    transforms,
};

/// Camera models written by OpenVSLAM that the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenVslamCameraModel {
    /// A pinhole camera with a single focal length.
    SimplePinhole,
    /// A 360° camera storing equirectangular images.
    Equirectangular,
}

/// Represents a camera in the OpenVSLAM camera list.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenVslamCamera {
    /// Camera model
    pub model: OpenVslamCameraModel,
    /// Image width
    pub width: usize,
    /// Image height
    pub height: usize,
    /// Focal length in pixels
    pub focal: f64,
    /// Principal point
    pub principal_point: [f64; 2],
}

impl OpenVslamCamera {
    /// The intrinsic matrix scaled by `scale`, identity for equirectangular cameras.
    pub fn intrinsics(&self, scale: f64) -> [[f64; 3]; 3] {
        match self.model {
            OpenVslamCameraModel::Equirectangular => linalg::IDENTITY_33,
            OpenVslamCameraModel::SimplePinhole => {
                let f = scale * self.focal;
                let [cx, cy] = self.principal_point.map(|p| scale * p);
                [[f, 0.0, cx], [0.0, f, cy], [0.0, 0.0, 1.0]]
            }
        }
    }
}

/// One pose of the TUM-style trajectory export.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryEntry {
    /// Keyframe id
    pub id: i64,
    /// Image name
    pub name: String,
    /// Camera centre in world coordinates
    pub translation: [f64; 3],
    /// Camera-to-world rotation as qw, qx, qy, qz
    pub rotation: [f64; 4],
}

#[derive(Debug, Deserialize)]
struct MapDatabase {
    landmarks: BTreeMap<String, Landmark>,
}

#[derive(Debug, Deserialize)]
struct Landmark {
    pos_w: [f64; 3],
}

/// Read the camera list.
///
/// Each data line is `ID TYPE WIDTH HEIGHT FOCAL PX PY`.
///
/// # Errors
///
/// Fails on a camera type other than `SIMPLE_PINHOLE` or `EQUIRECTANGULAR`.
pub fn read_cameras(path: impl AsRef<Path>) -> Result<Vec<OpenVslamCamera>, SfmError> {
    let path = path.as_ref();
    log::info!("Reading OpenVSLAM cameras from {}", path.display());

    read_data_lines(path)?
        .iter()
        .map(|line| {
            let parts = line.split_whitespace().collect::<Vec<_>>();
            if parts.len() < 2 {
                return Err(SfmError::ParseError(format!(
                    "Invalid number of parts: {}",
                    parts.len()
                )));
            }
            let model = match parts[1] {
                "SIMPLE_PINHOLE" => OpenVslamCameraModel::SimplePinhole,
                "EQUIRECTANGULAR" => OpenVslamCameraModel::Equirectangular,
                other => return Err(SfmError::UnsupportedCameraModel(other.to_string())),
            };
            if parts.len() < 7 {
                return Err(SfmError::ParseError(format!(
                    "Invalid number of parts: {}",
                    parts.len()
                )));
            }
            log::debug!("Camera type is {:?}", model);
            Ok(OpenVslamCamera {
                model,
                width: parse_part(parts[2])?,
                height: parse_part(parts[3])?,
                focal: parse_part(parts[4])?,
                principal_point: parse_array(&parts[5..7])?,
            })
        })
        .collect()
}

/// Read the trajectory in TUM format, `ID NAME TX TY TZ QX QY QZ QW` per line.
///
/// Entries with a negative id are skipped.
pub fn read_trajectory(path: impl AsRef<Path>) -> Result<Vec<TrajectoryEntry>, SfmError> {
    let path = path.as_ref();
    log::info!("Reading OpenVSLAM trajectory from {}", path.display());

    let mut entries = Vec::new();
    for line in read_data_lines(path)? {
        let parts = line.split_whitespace().collect::<Vec<_>>();
        if parts.len() < 9 {
            return Err(SfmError::ParseError(format!(
                "Invalid number of parts in trajectory line: {}",
                parts.len()
            )));
        }

        let id: i64 = parse_part(parts[0])?;
        if id < 0 {
            continue;
        }

        let [qx, qy, qz, qw]: [f64; 4] = parse_array(&parts[5..9])?;
        entries.push(TrajectoryEntry {
            id,
            name: parts[1].to_string(),
            translation: parse_array(&parts[2..5])?,
            rotation: [qw, qx, qy, qz],
        });
    }

    Ok(entries)
}

/// Read the landmarks of a MessagePack map database.
///
/// # Arguments
///
/// * `path` - The path to the map database.
/// * `max_points` - Stop after this many landmarks, `None` reads all.
///
/// # Returns
///
/// The landmark ids with their world positions, ordered by the id's string key.
pub fn read_landmarks(
    path: impl AsRef<Path>,
    max_points: Option<usize>,
) -> Result<Vec<(i64, [f64; 3])>, SfmError> {
    let path = path.as_ref();
    log::info!("Reading OpenVSLAM points from {}", path.display());
    if !path.exists() {
        return Err(SfmError::FileDoesNotExist(path.to_path_buf()));
    }

    let reader = BufReader::new(File::open(path)?);
    let database: MapDatabase = rmp_serde::from_read(reader)?;

    database
        .landmarks
        .iter()
        .take(max_points.unwrap_or(usize::MAX))
        .map(|(id, landmark)| Ok((parse_part(id)?, landmark.pos_w)))
        .collect()
}

/// Load an OpenVSLAM reconstruction listed in a manifest.
///
/// The trajectory stores camera-to-world poses, so the rotation is the transposed
/// quaternion rotation and the centre is the translation. Landmarks are only loaded
/// for sparse point clouds; they are white and carry no reprojection error.
pub fn load(manifest_path: impl AsRef<Path>, options: &LoadOptions) -> Result<SfmScene, SfmError> {
    let manifest = SfmManifest::read(manifest_path.as_ref())?;
    let cameras_path = manifest.cameras_path()?;

    let models = read_cameras(cameras_path)?;
    if models.len() != 1 {
        log::error!(
            "There are {} camera intrinsic parameters in {}",
            models.len(),
            cameras_path.display()
        );
    }
    let model = models
        .last()
        .ok_or_else(|| SfmError::NoCameraModel(cameras_path.to_path_buf()))?;
    let equirectangular = model.model == OpenVslamCameraModel::Equirectangular;
    let intrinsics = model.intrinsics(options.intrinsic_scale);

    let mut cameras = CameraSet::default();
    for entry in read_trajectory(manifest.poses_path()?)? {
        let rotation =
            linalg::transpose_mat33(&transforms::quaternion_to_rotation_matrix(&entry.rotation));
        let (rotation, centre) = transforms::apply_coordinate_flip(&rotation, &entry.translation);

        let mut camera = Camera::new(intrinsics, rotation, centre);
        camera.frame = super::frame_from_image_name(&entry.name, options.image_name_digits)?;
        camera.image_path = super::resolve_image_path(&entry.name, &options.input_folder);
        cameras.push(camera);
    }

    let points = if options.load_points && options.load_sparse_only {
        let mut pointcloud = PointCloud::default();
        for (id, position) in read_landmarks(manifest.points_path()?, options.max_points())? {
            pointcloud.push(id, transforms::flip_point(&position), [1.0; 3], -1.0);
        }
        log::info!("Loaded {} landmarks", pointcloud.len());
        Some(pointcloud)
    } else {
        None
    };

    log::info!("Loading OpenVSLAM files finished, {} cameras", cameras.len());

    Ok(SfmScene {
        cameras,
        points,
        equirectangular,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    #[derive(serde::Serialize)]
    struct TestLandmark {
        pos_w: [f64; 3],
        n_vis: u32,
    }

    #[derive(serde::Serialize)]
    struct TestDatabase {
        cameras: BTreeMap<String, u32>,
        landmarks: BTreeMap<String, TestLandmark>,
    }

    fn write_model(dir: &Path, camera_type: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
        std::fs::write(
            dir.join("cameras.txt"),
            format!("# ID TYPE WIDTH HEIGHT FOCAL PX PY\n0 {camera_type} 3840 1920 1000 1920 960\n"),
        )?;
        // a quarter turn about y, stored as camera-to-world
        let h = std::f64::consts::FRAC_1_SQRT_2;
        std::fs::write(
            dir.join("trajectory.txt"),
            format!(
                "-1 frames/0000.png 0 0 0 0 0 0 1\n\
                 3 frames/0003.png 1 2 3 0 {h} 0 {h}\n\
                 4 frames/0004.png 0 0 0 0 0 0 1\n"
            ),
        )?;

        let landmarks = [("12", [1.0, 2.0, 3.0]), ("5", [0.0, 0.0, 1.0]), ("7", [4.0, 5.0, 6.0])]
            .into_iter()
            .map(|(id, pos_w)| (id.to_string(), TestLandmark { pos_w, n_vis: 3 }))
            .collect();
        let database = TestDatabase {
            cameras: BTreeMap::new(),
            landmarks,
        };
        std::fs::write(dir.join("map.msg"), rmp_serde::to_vec_named(&database)?)?;

        let manifest = dir.join("slam.openvslam");
        std::fs::write(&manifest, "cameras.txt\ntrajectory.txt\nmap.msg\n")?;
        Ok(manifest)
    }

    #[test]
    fn test_read_cameras() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_model(tmp_dir.path(), "SIMPLE_PINHOLE")?;
        let cameras = read_cameras(tmp_dir.path().join("cameras.txt"))?;
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].intrinsics(2.0)[0], [2000.0, 0.0, 3840.0]);

        write_model(tmp_dir.path(), "FISHEYE")?;
        assert!(matches!(
            read_cameras(tmp_dir.path().join("cameras.txt")),
            Err(SfmError::UnsupportedCameraModel(_))
        ));
        Ok(())
    }

    #[test]
    fn test_read_trajectory() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_model(tmp_dir.path(), "SIMPLE_PINHOLE")?;
        let entries = read_trajectory(tmp_dir.path().join("trajectory.txt"))?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 3);
        assert_eq!(entries[0].translation, [1.0, 2.0, 3.0]);
        assert_relative_eq!(entries[0].rotation[0], std::f64::consts::FRAC_1_SQRT_2);
        Ok(())
    }

    #[test]
    fn test_read_landmarks() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        write_model(tmp_dir.path(), "SIMPLE_PINHOLE")?;
        let path = tmp_dir.path().join("map.msg");

        let landmarks = read_landmarks(&path, None)?;
        // keys are ordered as strings
        assert_eq!(
            landmarks.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![12, 5, 7]
        );
        assert_eq!(landmarks[1].1, [0.0, 0.0, 1.0]);
        assert_eq!(read_landmarks(&path, Some(2))?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_load_equirectangular() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let manifest = write_model(tmp_dir.path(), "EQUIRECTANGULAR")?;
        let options = LoadOptions {
            input_folder: PathBuf::from("/data/Input"),
            load_points: true,
            ..Default::default()
        };
        let scene = load(&manifest, &options)?;

        assert!(scene.equirectangular);
        assert_eq!(scene.cameras.len(), 2);

        let camera = &scene.cameras[0];
        assert_eq!(camera.intrinsics(), &linalg::IDENTITY_33);
        assert_eq!(camera.frame, 3);
        assert_eq!(camera.image_path, PathBuf::from("/data/Input/0003.png"));
        assert_eq!(camera.centre(), &[1.0, -2.0, -3.0]);
        // the stored rotation is camera-to-world, R = Q^T then flipped
        let expected = [[0.0, 0.0, 1.0], [0.0, -1.0, 0.0], [1.0, 0.0, 0.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(camera.rotation()[i][j], expected[i][j], epsilon = 1e-12);
            }
        }

        let points = scene.points.ok_or("missing points")?;
        assert_eq!(points.len(), 3);
        assert_eq!(points.points()[0], [1.0, -2.0, -3.0]);
        assert_eq!(points.colors()[0], [1.0, 1.0, 1.0]);
        assert_eq!(points.errors()[0], -1.0);

        let dense = load(
            &manifest,
            &LoadOptions {
                load_sparse_only: false,
                ..options
            },
        )?;
        assert!(dense.points.is_none());
        Ok(())
    }
}
