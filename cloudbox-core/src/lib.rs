//! Core data structures for cloudbox
//!
//! This crate provides the in-memory representation of sensor point clouds
//! and the oriented 3D bounding boxes derived from perception annotations,
//! including their transform and corner geometry.

pub mod bbox;
pub mod error;
pub mod point_cloud;

pub use bbox::*;
pub use error::*;
pub use point_cloud::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{DMatrix, Matrix3, Matrix4, UnitQuaternion, Vector3};
