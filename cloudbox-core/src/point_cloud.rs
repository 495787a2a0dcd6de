//! Point cloud storage and in-place geometric operations

use crate::error::{Error, Result};
use nalgebra::{DMatrix, Dyn, Matrix3, Matrix4, OMatrix, Vector3, U4};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Smallest channel count a cloud can carry: x, y, z and one measurement.
const MIN_CHANNELS: usize = 4;

/// A sensor point cloud stored as a dense `channels x points` matrix.
///
/// The first three rows are the x, y and z coordinates; the remaining rows
/// are format-specific measurement channels (intensity for lidar sweeps,
/// the radar feature list for radar scans). The channel count is fixed at
/// construction; filtering operations only change the number of columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloud {
    pub points: DMatrix<f32>,
}

impl PointCloud {
    /// Wrap a decoded matrix, rejecting layouts with too few channels.
    pub fn new(points: DMatrix<f32>) -> Result<Self> {
        if points.nrows() < MIN_CHANNELS {
            return Err(Error::InvalidConstruction(format!(
                "point matrix has {} rows, expected at least {} (x, y, z and one measurement channel)",
                points.nrows(),
                MIN_CHANNELS
            )));
        }
        Ok(Self { points })
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.ncols()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.ncols() == 0
    }

    /// Keep `floor(len * ratio)` points drawn uniformly at random.
    ///
    /// Sampling is done with replacement, so the result can contain
    /// duplicate points.
    pub fn subsample(&mut self, ratio: f64) {
        let kept = (self.len() as f64 * ratio) as usize;
        let mut rng = rand::thread_rng();
        let selected: Vec<usize> = (0..kept).map(|_| rng.gen_range(0..self.len())).collect();
        self.points = self.points.select_columns(&selected);
    }

    /// Remove points whose x and y coordinates are both within `radius` of
    /// the origin.
    ///
    /// The gate is an axis-aligned square in the ground plane, not a disc,
    /// and z plays no part in it.
    pub fn remove_close(&mut self, radius: f32) {
        let kept: Vec<usize> = (0..self.len())
            .filter(|&i| {
                !(self.points[(0, i)].abs() < radius && self.points[(1, i)].abs() < radius)
            })
            .collect();
        self.points = self.points.select_columns(&kept);
    }

    /// Applies a translation to the coordinate rows of every point.
    pub fn translate(&mut self, translation: &Vector3<f32>) {
        for i in 0..3 {
            self.points.row_mut(i).add_scalar_mut(translation[i]);
        }
    }

    /// Applies a rotation to the coordinate rows of every point.
    ///
    /// Measurement channels beyond the first three rows are untouched.
    pub fn rotate(&mut self, rotation: &Matrix3<f32>) {
        let rotated = rotation * self.points.fixed_rows::<3>(0);
        self.points.fixed_rows_mut::<3>(0).copy_from(&rotated);
    }

    /// Applies a homogeneous transform to the coordinate rows of every point.
    ///
    /// The coordinates are augmented with a row of ones, multiplied by the
    /// 4x4 matrix and the first three rows of the product are written back.
    pub fn transform(&mut self, matrix: &Matrix4<f32>) {
        let mut homogeneous = OMatrix::<f32, U4, Dyn>::from_element(self.len(), 1.0);
        homogeneous
            .fixed_rows_mut::<3>(0)
            .copy_from(&self.points.fixed_rows::<3>(0));
        let mapped = matrix * homogeneous;
        self.points
            .fixed_rows_mut::<3>(0)
            .copy_from(&mapped.fixed_rows::<3>(0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn sample_cloud() -> PointCloud {
        // Three points with distinct coordinates and intensities.
        let points = DMatrix::from_row_slice(
            4,
            3,
            &[
                1.0, 4.0, 7.0, //
                2.0, 5.0, 8.0, //
                3.0, 6.0, 9.0, //
                0.1, 0.2, 0.3,
            ],
        );
        PointCloud::new(points).unwrap()
    }

    #[test]
    fn test_new_rejects_thin_matrices() {
        let points = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(matches!(
            PointCloud::new(points),
            Err(Error::InvalidConstruction(_))
        ));
    }

    #[test]
    fn test_len_and_is_empty() {
        let cloud = sample_cloud();
        assert_eq!(cloud.len(), 3);
        assert!(!cloud.is_empty());

        let empty = PointCloud::new(DMatrix::zeros(4, 0)).unwrap();
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_translate_moves_coordinates_only() {
        let mut cloud = sample_cloud();
        cloud.translate(&Vector3::new(1.0, -2.0, 0.5));

        assert_relative_eq!(cloud.points[(0, 0)], 2.0);
        assert_relative_eq!(cloud.points[(1, 0)], 0.0);
        assert_relative_eq!(cloud.points[(2, 0)], 3.5);
        // Intensity row is untouched.
        assert_relative_eq!(cloud.points[(3, 0)], 0.1);
    }

    #[test]
    fn test_transform_identity_is_noop() {
        let mut cloud = sample_cloud();
        let original = cloud.points.clone();
        cloud.transform(&Matrix4::identity());
        assert_relative_eq!(cloud.points, original, epsilon = 1e-6);
    }

    #[test]
    fn test_transform_applies_rotation_and_translation() {
        let mut transformed = sample_cloud();
        let rotation =
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2);
        let mut matrix = rotation.to_homogeneous();
        matrix[(0, 3)] = 10.0;
        matrix[(1, 3)] = -5.0;
        transformed.transform(&matrix);

        let mut expected = sample_cloud();
        expected.rotate(rotation.to_rotation_matrix().matrix());
        expected.translate(&Vector3::new(10.0, -5.0, 0.0));

        assert_relative_eq!(transformed.points, expected.points, epsilon = 1e-5);
    }

    #[test]
    fn test_rotations_compose_by_left_multiplication() {
        let r1 = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3_f32)
            .to_rotation_matrix()
            .into_inner();
        let r2 = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -1.1_f32)
            .to_rotation_matrix()
            .into_inner();

        let mut stepwise = sample_cloud();
        stepwise.rotate(&r1);
        stepwise.rotate(&r2);

        let mut combined = sample_cloud();
        combined.rotate(&(r2 * r1));

        assert_relative_eq!(stepwise.points, combined.points, epsilon = 1e-5);
    }

    #[test]
    fn test_remove_close_gates_on_x_and_y_only() {
        let points = DMatrix::from_row_slice(
            4,
            3,
            &[
                1.0, 4.0, 0.0, //
                1.0, 0.0, 0.0, //
                1000.0, 0.0, 0.0, //
                0.0, 0.0, 0.0,
            ],
        );
        let mut cloud = PointCloud::new(points).unwrap();
        cloud.remove_close(2.0);

        // The point at (1, 1, 1000) is dropped despite its large z; the
        // point at (4, 0, 0) survives because only |y| is inside the gate.
        assert_eq!(cloud.len(), 1);
        assert_relative_eq!(cloud.points[(0, 0)], 4.0);
    }

    #[test]
    fn test_subsample_keeps_copies_of_existing_points() {
        let mut cloud = sample_cloud();
        cloud.subsample(0.7);
        assert_eq!(cloud.len(), 2);

        let source = sample_cloud();
        for column in cloud.points.column_iter() {
            let found = source
                .points
                .column_iter()
                .any(|candidate| candidate == column);
            assert!(found, "subsampled column is not a copy of a source point");
        }
    }

    #[test]
    fn test_subsample_of_empty_cloud_stays_empty() {
        let mut cloud = PointCloud::new(DMatrix::zeros(4, 0)).unwrap();
        cloud.subsample(0.5);
        assert!(cloud.is_empty());
    }
}
