#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// I/O utilities for reading and writing point clouds.
pub mod io;

/// Linear algebra utilities.
pub mod linalg;

/// Operations on point clouds.
pub mod ops;

/// Colored point cloud container.
pub mod pointcloud;

/// Rigid transforms and rotation helpers.
pub mod transforms;

/// Conversions between fixed-size arrays and faer matrices.
pub mod utils;

pub use pointcloud::{Point, PointCloud, PointCloudError};
pub use transforms::RigidTransform;
