use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use omniphotos_geometry::PointCloud;

use super::{parse_part, CacheError};

/// Name of the point table in a cache folder.
pub const POINT_CLOUD_FILE: &str = "PointCloud.csv";

/// Read a point table with rows `id, x, y, z, r, g, b, error`.
pub fn read_point_cloud_csv(path: &Path) -> Result<PointCloud, CacheError> {
    if !path.exists() {
        return Err(CacheError::FileDoesNotExist(path.to_path_buf()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut points = PointCloud::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let parts = line.split(',').collect::<Vec<_>>();
        if parts.len() != 8 {
            return Err(CacheError::ParseError(format!(
                "Expected 8 values per point, got {}: {}",
                parts.len(),
                line
            )));
        }

        points.push(
            parse_part(parts[0])?,
            [parse_part(parts[1])?, parse_part(parts[2])?, parse_part(parts[3])?],
            [parse_part(parts[4])?, parse_part(parts[5])?, parse_part(parts[6])?],
            parse_part(parts[7])?,
        );
    }

    log::debug!("Read {} points from {}", points.len(), path.display());
    Ok(points)
}

/// Write a point table, replacing the file if it exists.
pub fn write_point_cloud_csv(path: &Path, points: &PointCloud) -> Result<(), CacheError> {
    let mut writer = BufWriter::new(File::create(path)?);

    let rows = points
        .ids()
        .iter()
        .zip(points.points())
        .zip(points.colors())
        .zip(points.errors());
    for (((id, p), c), error) in rows {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            id, p[0], p[1], p[2], c[0], c[1], c[2], error
        )?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_cloud_csv() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(POINT_CLOUD_FILE);

        let mut points = PointCloud::default();
        points.push(3, [0.5, -1.25, 1e6], [1.0, 0.5, 0.0], 0.25);
        points.push(17, [1.0 / 3.0, 0.0, -0.1], [1.0, 1.0, 1.0], -1.0);
        write_point_cloud_csv(&path, &points)?;

        let content = std::fs::read_to_string(&path)?;
        assert!(content.starts_with("3,0.5,-1.25,1000000,1,0.5,0,0.25\n"));

        let loaded = read_point_cloud_csv(&path)?;
        assert_eq!(loaded, points);
        Ok(())
    }

    #[test]
    fn test_malformed_row() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(POINT_CLOUD_FILE);
        std::fs::write(&path, "1,2,3\n")?;
        assert!(matches!(
            read_point_cloud_csv(&path),
            Err(CacheError::ParseError(_))
        ));
        Ok(())
    }
}
