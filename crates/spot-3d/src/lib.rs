#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Linear algebra utilities on fixed-size arrays.
pub mod linalg;

/// Point cloud container and storage precision.
pub mod pointcloud;

/// Rigid and similarity transforms.
pub mod rigid;

/// 3D transforms algorithms.
pub mod transforms;
