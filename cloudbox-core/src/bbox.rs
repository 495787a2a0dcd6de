//! Oriented 3D bounding boxes for object annotations

use crate::error::{Error, Result};
use approx::relative_eq;
use nalgebra::{Matrix3, Matrix3xX, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute tolerance for approximate equality of box fields.
const EQ_EPSILON: f64 = 1e-8;
/// Relative tolerance for approximate equality of box fields.
const EQ_MAX_RELATIVE: f64 = 1e-5;

/// Corner sign layout, columns 0..8. Corners 0..4 are the forward face,
/// 4..8 the rear face; downstream edge and face drawing depends on this
/// exact ordering.
const X_SIGNS: [f64; 8] = [1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
const Y_SIGNS: [f64; 8] = [1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0];
const Z_SIGNS: [f64; 8] = [1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0, -1.0];

/// Columns of `corners()` forming the bottom face as a closed quad walk.
const BOTTOM_CORNERS: [usize; 4] = [2, 3, 7, 6];

/// An oriented 3D bounding box with optional label, score and velocity.
///
/// The local frame has x pointing forward along the box length, y to the
/// left along the width and z up along the height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrientedBox {
    /// Box center as x, y, z.
    pub center: Vector3<f64>,
    /// Box size as width, length, height.
    pub size: Vector3<f64>,
    /// Box orientation.
    pub orientation: UnitQuaternion<f64>,
    /// Integer category label, if annotated.
    pub label: Option<i32>,
    /// Classification score, if annotated.
    pub score: Option<f64>,
    /// Velocity in x, y, z. Each component may be independently absent.
    pub velocity: [Option<f64>; 3],
    /// Category name, if annotated.
    pub name: Option<String>,
}

impl OrientedBox {
    /// Create a box from its required fields. Optional fields start absent
    /// and are set with the `with_*` builders.
    pub fn new(
        center: Vector3<f64>,
        size: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
    ) -> Result<Self> {
        if !center.iter().all(|c| c.is_finite()) {
            return Err(Error::InvalidConstruction(format!(
                "box center must be finite, got [{}, {}, {}]",
                center.x, center.y, center.z
            )));
        }
        if !size.iter().all(|s| s.is_finite()) {
            return Err(Error::InvalidConstruction(format!(
                "box size must be finite, got [{}, {}, {}]",
                size.x, size.y, size.z
            )));
        }
        Ok(Self {
            center,
            size,
            orientation,
            label: None,
            score: None,
            velocity: [None; 3],
            name: None,
        })
    }

    /// Set the category label
    pub fn with_label(mut self, label: i32) -> Self {
        self.label = Some(label);
        self
    }

    /// Set the classification score
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Set the velocity; components may be individually absent
    pub fn with_velocity(mut self, velocity: [Option<f64>; 3]) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the category name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The box's rotation matrix, derived from its orientation.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.orientation.to_rotation_matrix().into_inner()
    }

    /// The velocity as a vector with NaN standing in for absent components.
    pub fn velocity_vector(&self) -> Vector3<f64> {
        Vector3::new(
            self.velocity[0].unwrap_or(f64::NAN),
            self.velocity[1].unwrap_or(f64::NAN),
            self.velocity[2].unwrap_or(f64::NAN),
        )
    }

    /// Applies a translation to the box center.
    pub fn translate(&mut self, translation: &Vector3<f64>) {
        self.center += translation;
    }

    /// Rotates the box around the origin.
    ///
    /// The center and velocity are rotated and the rotation is composed
    /// onto the orientation from the left. Absent velocity components stay
    /// absent: they pass through the multiplication as NaN and are mapped
    /// back afterwards.
    pub fn rotate(&mut self, rotation: &UnitQuaternion<f64>) {
        let matrix = rotation.to_rotation_matrix();
        self.center = matrix * self.center;
        self.orientation = rotation * self.orientation;
        self.orientation.renormalize();
        let velocity = matrix * self.velocity_vector();
        self.velocity = [
            present(velocity.x),
            present(velocity.y),
            present(velocity.z),
        ];
    }

    /// The eight box corners as a `3 x 8` column matrix.
    ///
    /// Columns 0..4 are the forward-facing face and 4..8 the rear face;
    /// the local layout is scaled by `size_factor`, rotated by the box
    /// orientation and translated to the box center.
    pub fn corners(&self, size_factor: f64) -> Matrix3xX<f64> {
        let half = self.size * size_factor / 2.0;
        let (width, length, height) = (half.x, half.y, half.z);

        let mut corners = Matrix3xX::from_fn(8, |row, col| match row {
            0 => length * X_SIGNS[col],
            1 => width * Y_SIGNS[col],
            _ => height * Z_SIGNS[col],
        });

        corners = self.rotation_matrix() * corners;
        for mut corner in corners.column_iter_mut() {
            corner += self.center;
        }
        corners
    }

    /// The four bottom corners as a `3 x 4` column matrix.
    ///
    /// The columns walk the bottom face as a closed quad: two forward
    /// corners first, then the matching rear pair.
    pub fn bottom_corners(&self) -> Matrix3xX<f64> {
        self.corners(1.0).select_columns(&BOTTOM_CORNERS)
    }
}

/// NaN marks an absent component.
fn present(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

impl PartialEq for OrientedBox {
    /// Boxes are equal when their numeric fields are close within tolerance
    /// and their optional fields agree, with absent matching only absent.
    /// The category name does not participate.
    fn eq(&self, other: &Self) -> bool {
        let geometry = relative_eq!(
            self.center,
            other.center,
            epsilon = EQ_EPSILON,
            max_relative = EQ_MAX_RELATIVE
        ) && relative_eq!(
            self.size,
            other.size,
            epsilon = EQ_EPSILON,
            max_relative = EQ_MAX_RELATIVE
        ) && relative_eq!(
            self.orientation.coords,
            other.orientation.coords,
            epsilon = EQ_EPSILON,
            max_relative = EQ_MAX_RELATIVE
        );

        let velocity = self
            .velocity
            .iter()
            .zip(&other.velocity)
            .all(|(a, b)| match (a, b) {
                (Some(a), Some(b)) => {
                    relative_eq!(*a, *b, epsilon = EQ_EPSILON, max_relative = EQ_MAX_RELATIVE)
                }
                (None, None) => true,
                _ => false,
            });

        geometry && self.label == other.label && self.score == other.score && velocity
    }
}

impl fmt::Display for OrientedBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (axis, angle) = match self.orientation.axis_angle() {
            Some((axis, angle)) => (axis.into_inner(), angle),
            None => (Vector3::zeros(), 0.0),
        };
        write!(
            f,
            "label: {:?}, score: {:?}, xyz: [{:.2}, {:.2}, {:.2}], wlh: [{:.2}, {:.2}, {:.2}], \
             rot axis: [{:.2}, {:.2}, {:.2}], ang(rad): {:.2}, vel: {:?}, name: {:?}",
            self.label,
            self.score,
            self.center.x,
            self.center.y,
            self.center.z,
            self.size.x,
            self.size.y,
            self.size.z,
            axis.x,
            axis.y,
            axis.z,
            angle,
            self.velocity,
            self.name
        )
    }
}
