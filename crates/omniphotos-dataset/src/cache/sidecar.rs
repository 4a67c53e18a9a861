use std::{
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use super::CacheError;
use crate::{dataset::Dataset, flow::BroxFlowParameters, settings::flag};

/// Every sidecar file name starts with this prefix.
pub const PREFIX: &str = "Preprocessing";

/// The sidecar file name for a dataset of `num_cameras` cameras.
pub fn file_name(num_cameras: usize) -> String {
    format!("{}Setup-{:04}.json", PREFIX, num_cameras)
}

/// The camera count encoded in the last four characters of the sidecar's stem.
pub fn camera_count(path: &Path) -> Result<usize, CacheError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let count = stem
        .len()
        .checked_sub(4)
        .and_then(|start| stem.get(start..))
        .ok_or_else(|| CacheError::ParseError(format!("No camera count in {}", stem)))?;
    super::parse_part(count)
}

/// Find the first `Preprocessing*.json` file of a cache folder, by name.
pub fn find(cache_folder: &Path) -> Result<PathBuf, CacheError> {
    let mut candidates = std::fs::read_dir(cache_folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let is_sidecar = path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(PREFIX));
            let is_json = path.extension().is_some_and(|e| e == "json");
            is_sidecar && is_json && path.is_file()
        })
        .collect::<Vec<_>>();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| CacheError::SidecarNotFound(cache_folder.to_path_buf()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Position {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Up {
    #[serde(rename = "Ux")]
    pub x: f64,
    #[serde(rename = "Uy")]
    pub y: f64,
    #[serde(rename = "Uz")]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Forward {
    #[serde(rename = "Fx")]
    pub x: f64,
    #[serde(rename = "Fy")]
    pub y: f64,
    #[serde(rename = "Fz")]
    pub z: f64,
}

macro_rules! impl_vec3 {
    ($($t:ty),*) => {$(
        impl From<[f64; 3]> for $t {
            fn from(v: [f64; 3]) -> Self {
                Self { x: v[0], y: v[1], z: v[2] }
            }
        }

        impl From<$t> for [f64; 3] {
            fn from(v: $t) -> Self {
                [v.x, v.y, v.z]
            }
        }
    )*};
}

impl_vec3!(Position, Up, Forward);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CameraCircle {
    pub centroid: Position,
    pub up: Up,
    pub radius: f64,
    pub forward: Forward,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ProjectionCylinder {
    pub centroid: Position,
    pub up: Up,
    pub radius: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct Flow {
    pub brox: BroxFlowParameters,
    #[serde(with = "flag")]
    pub downsampled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct PointCloudInfo {
    #[serde(with = "flag")]
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DatasetInfo {
    pub camera_circle: CameraCircle,
    pub projection_cylinder: ProjectionCylinder,
    #[serde(default)]
    pub flow: Flow,
    #[serde(default)]
    pub point_cloud: PointCloudInfo,
    #[serde(default = "unit")]
    pub intrinsic_scale: f64,
    #[serde(default = "unit")]
    pub scaling: f64,
}

fn unit() -> f64 {
    1.0
}

/// The JSON document stored next to `Cameras.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Sidecar {
    pub dataset: DatasetInfo,
}

impl Sidecar {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let circle = &dataset.circle;
        let cylinder = &dataset.cylinder;
        Self {
            dataset: DatasetInfo {
                camera_circle: CameraCircle {
                    centroid: circle.centre.into(),
                    up: (*circle.normal()).into(),
                    radius: circle.radius,
                    forward: (*circle.forward()).into(),
                },
                projection_cylinder: ProjectionCylinder {
                    centroid: cylinder.centre.into(),
                    up: cylinder.up.into(),
                    radius: cylinder.radius,
                    height: cylinder.height,
                },
                flow: Flow {
                    brox: dataset.flow.brox,
                    downsampled: dataset.flow.downsampled,
                },
                point_cloud: PointCloudInfo {
                    exists: dataset.points.is_some(),
                    size: dataset.points.as_ref().map(|p| p.len()),
                },
                intrinsic_scale: dataset.intrinsic_scale,
                scaling: dataset.physical_scale,
            },
        }
    }

    pub fn read(path: &Path) -> Result<Self, CacheError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            log::warn!("Reading from JSON file '{}' failed: {}", path.display(), e);
            CacheError::JsonError(e)
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), CacheError> {
        let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_SIDECAR: &str = r#"{
        "Dataset": {
            "CameraCircle": {
                "Centroid": {"X": 0.0, "Y": 1.5, "Z": 0.0},
                "Up": {"Ux": 0.0, "Uy": 1.0, "Uz": 0.0},
                "Radius": 100.0,
                "Forward": {"Fx": 0.0, "Fy": 0.0, "Fz": -1.0}
            },
            "ProjectionCylinder": {
                "Centroid": {"X": 0.0, "Y": 0.0, "Z": 0.0},
                "Up": {"Ux": 0.0, "Uy": 1.0, "Uz": 0.0},
                "Radius": 500.0,
                "Height": 10000.0
            },
            "Flow": {"Downsampled": 1},
            "PointCloud": {"Exists": 0}
        }
    }"#;

    #[test]
    fn test_file_name() -> Result<(), CacheError> {
        assert_eq!(file_name(90), "PreprocessingSetup-0090.json");
        assert_eq!(camera_count(Path::new("/c/PreprocessingSetup-0090.json"))?, 90);
        assert!(camera_count(Path::new("/c/P.json")).is_err());
        Ok(())
    }

    #[test]
    fn test_parse_legacy_sidecar() -> Result<(), serde_json::Error> {
        let sidecar: Sidecar = serde_json::from_str(LEGACY_SIDECAR)?;
        let info = &sidecar.dataset;
        assert_eq!(<[f64; 3]>::from(info.camera_circle.centroid), [0.0, 1.5, 0.0]);
        assert_eq!(<[f64; 3]>::from(info.camera_circle.forward), [0.0, 0.0, -1.0]);
        assert!(info.flow.downsampled);
        assert_eq!(info.flow.brox, BroxFlowParameters::default());
        assert!(!info.point_cloud.exists);
        assert_eq!(info.intrinsic_scale, 1.0);
        Ok(())
    }

    #[test]
    fn test_find() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(find(dir.path()), Err(CacheError::SidecarNotFound(_))));

        std::fs::write(dir.path().join("Cameras.csv"), "")?;
        std::fs::write(dir.path().join("PreprocessingSetup-0012.json"), "{}")?;
        std::fs::write(dir.path().join("PreprocessingSetup-0008.json"), "{}")?;
        assert_eq!(find(dir.path())?, dir.path().join("PreprocessingSetup-0008.json"));
        Ok(())
    }
}
