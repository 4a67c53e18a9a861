#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera model.
pub mod camera;

/// Ordered collections of cameras.
pub mod camera_set;

/// Circle, cylinder and orientation fitting of camera sets.
pub mod fitting;

/// Readers for the output of reconstruction tools.
pub mod io;

/// Small fixed-size linear algebra utilities.
pub mod linalg;

/// Sparse point clouds.
pub mod pointcloud;

/// Camera subsampling around the capture circle.
pub mod sampling;

/// Reconstruction format dispatch.
pub mod sfm;

/// Circle and cylinder shapes.
pub mod shapes;

/// Coordinate system conversions.
pub mod transforms;

pub use camera::Camera;
pub use camera_set::CameraSet;
pub use pointcloud::PointCloud;
