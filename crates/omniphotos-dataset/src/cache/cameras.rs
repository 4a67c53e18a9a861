use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use omniphotos_geometry::{linalg, Camera, CameraSet};

use super::{join_normalized, parse_part, relative_to, CacheError};

/// Name of the camera table in a cache folder.
pub const CAMERAS_FILE: &str = "Cameras.csv";

// layout of one row: where the frame, K and the image name start and whether the
// two flow columns follow the image name
struct RowLayout {
    frame: Option<usize>,
    first_value: usize,
    has_flow: bool,
}

impl RowLayout {
    fn from_columns(num_columns: usize) -> Option<Self> {
        match num_columns {
            // frame, K, R, C, image
            23 => Some(Self {
                frame: Some(0),
                first_value: 1,
                has_flow: false,
            }),
            // K, R, C, image, forward flow, backward flow
            24 => Some(Self {
                frame: None,
                first_value: 0,
                has_flow: true,
            }),
            // frame, K, R, C, image, forward flow, backward flow
            25 => Some(Self {
                frame: Some(0),
                first_value: 1,
                has_flow: true,
            }),
            _ => None,
        }
    }
}

fn parse_mat33(tokens: &[&str]) -> Result<[[f64; 3]; 3], CacheError> {
    let mut m = [[0.0; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = parse_part(tokens[3 * i + j])?;
        }
    }
    Ok(m)
}

fn parse_row(tokens: &[&str], layout: &RowLayout, cache_folder: &Path) -> Result<Camera, CacheError> {
    let v = layout.first_value;
    let intrinsics = parse_mat33(&tokens[v..v + 9])?;
    let rotation = parse_mat33(&tokens[v + 9..v + 18])?;
    let centre = [
        parse_part(tokens[v + 18])?,
        parse_part(tokens[v + 19])?,
        parse_part(tokens[v + 20])?,
    ];

    let mut camera = Camera::new(intrinsics, rotation, centre);
    camera.frame = match layout.frame {
        Some(i) => parse_part(tokens[i])?,
        None => 0,
    };
    camera.image_path = join_normalized(cache_folder, tokens[v + 21]);
    if layout.has_flow {
        camera.forward_flow = Some(join_normalized(cache_folder, tokens[v + 22]));
        camera.backward_flow = Some(join_normalized(cache_folder, tokens[v + 23]));
    }
    Ok(camera)
}

/// Read a camera table.
///
/// The schema of each row is detected from its number of columns: 23 columns
/// without flow, 24 columns with flow but without frame number (the frame is set
/// to `0`) and 25 columns with both. Rows with any other number of columns are
/// skipped with a warning.
///
/// # Arguments
///
/// * `path` - The path to the `Cameras.csv` file.
/// * `cache_folder` - The folder relative image and flow paths are resolved against.
/// * `equirectangular` - Replace the stored intrinsics with the identity.
pub fn read_cameras_csv(
    path: &Path,
    cache_folder: &Path,
    equirectangular: bool,
) -> Result<CameraSet, CacheError> {
    if !path.exists() {
        return Err(CacheError::FileDoesNotExist(path.to_path_buf()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut cameras = CameraSet::default();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let tokens = line.split(',').collect::<Vec<_>>();
        let Some(layout) = RowLayout::from_columns(tokens.len()) else {
            log::warn!(
                "Skipping line {} of {}: unexpected number of columns {}",
                line_number + 1,
                path.display(),
                tokens.len()
            );
            continue;
        };

        let mut camera = parse_row(&tokens, &layout, cache_folder)?;
        if equirectangular {
            camera.set_intrinsics(linalg::IDENTITY_33);
        }
        cameras.push(camera);
    }

    log::debug!("Read {} cameras from {}", cameras.len(), path.display());
    Ok(cameras)
}

/// Write a camera table, one row per camera.
///
/// Paths are stored relative to `cache_folder`. Floats are written in their
/// shortest form that reads back to the same value.
///
/// # Arguments
///
/// * `path` - The path to the `Cameras.csv` file, replaced if it exists.
/// * `cameras` - The cameras to write.
/// * `cache_folder` - The folder paths are made relative to.
/// * `with_flow` - Append the forward and backward flow columns.
pub fn write_cameras_csv(
    path: &Path,
    cameras: &CameraSet,
    cache_folder: &Path,
    with_flow: bool,
) -> Result<(), CacheError> {
    let mut writer = BufWriter::new(File::create(path)?);

    for camera in cameras.iter() {
        let mut fields = Vec::with_capacity(25);
        fields.push(camera.frame.to_string());
        for m in [camera.intrinsics(), camera.rotation()] {
            fields.extend(m.iter().flatten().map(|v| v.to_string()));
        }
        fields.extend(camera.centre().iter().map(|v| v.to_string()));
        fields.push(relative_to(&camera.image_path, cache_folder));

        if with_flow {
            let (Some(forward), Some(backward)) = (&camera.forward_flow, &camera.backward_flow)
            else {
                return Err(CacheError::MissingFlow(camera.image_path.clone()));
            };
            fields.push(relative_to(forward, cache_folder));
            fields.push(relative_to(backward, cache_folder));
        }

        writeln!(writer, "{}", fields.join(","))?;
    }

    writer.flush()?;
    Ok(())
}
