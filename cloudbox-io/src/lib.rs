//! Decoders for raw sensor point cloud files
//!
//! This crate turns on-disk sensor captures into `cloudbox_core::PointCloud`
//! values. Two formats are supported: a flat fixed-stride binary layout for
//! lidar sweeps (`.bin`) and a self-describing header plus binary payload
//! for radar scans (`.pcd`).

pub mod bin;
pub mod pcd;

use cloudbox_core::{Error, PointCloud, Result};
use std::path::Path;

/// Trait for reading point clouds from files
pub trait PointCloudReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud>;
}

/// Reader for flat binary lidar sweeps
pub struct BinReader;

impl PointCloudReader for BinReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
        let buffer = std::fs::read(path)?;
        PointCloud::new(bin::decode(&buffer)?)
    }
}

/// Reader for self-describing radar scans
pub struct PcdReader;

impl PointCloudReader for PcdReader {
    fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
        let buffer = std::fs::read(path)?;
        PointCloud::new(pcd::decode(&buffer)?)
    }
}

/// Auto-detect the format from the file extension and read a point cloud
pub fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("bin") => BinReader::read_point_cloud(path),
        Some("pcd") => PcdReader::read_point_cloud(path),
        _ => Err(Error::MalformedInput(format!(
            "unsupported point cloud format: {:?}",
            path.extension()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::fs;

    #[test]
    fn test_read_lidar_sweep_from_file() {
        let temp_file = "test_sweep.bin";

        let mut buffer = Vec::new();
        for value in [1.0_f32, 2.0, 3.0, 0.5, 9.0, 4.0, 5.0, 6.0, 0.75, 17.0] {
            buffer.write_f32::<LittleEndian>(value).unwrap();
        }
        fs::write(temp_file, &buffer).unwrap();

        let cloud = read_point_cloud(temp_file).unwrap();
        assert_eq!(cloud.points.nrows(), 4);
        assert_eq!(cloud.len(), 2);
        assert_relative_eq!(cloud.points[(0, 1)], 4.0);
        assert_relative_eq!(cloud.points[(3, 1)], 0.75);

        let _ = fs::remove_file(temp_file);
    }

    #[test]
    fn test_read_radar_scan_from_file() {
        let temp_file = "test_scan.pcd";

        let header = "# .PCD v0.7 - Point Cloud Data file format\n\
                      VERSION 0.7\n\
                      FIELDS x y z rcs\n\
                      SIZE 4 4 4 4\n\
                      TYPE F F F F\n\
                      COUNT 1 1 1 1\n\
                      WIDTH 2\n\
                      HEIGHT 1\n\
                      VIEWPOINT 0 0 0 1 0 0 0\n\
                      POINTS 2\n\
                      DATA binary\n";
        let mut buffer = header.as_bytes().to_vec();
        for value in [1.0_f32, 2.0, 3.0, -10.0, 4.0, 5.0, 6.0, -20.0] {
            buffer.write_f32::<LittleEndian>(value).unwrap();
        }
        fs::write(temp_file, &buffer).unwrap();

        let cloud = read_point_cloud(temp_file).unwrap();
        assert_eq!(cloud.points.nrows(), 4);
        assert_eq!(cloud.len(), 2);
        assert_relative_eq!(cloud.points[(2, 1)], 6.0);
        assert_relative_eq!(cloud.points[(3, 0)], -10.0);

        let _ = fs::remove_file(temp_file);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = read_point_cloud("test.xyz");
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = read_point_cloud("does_not_exist.bin");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
