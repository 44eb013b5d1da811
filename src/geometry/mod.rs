//! Geometry utilities: rigid transforms, camera model, homography estimation.

pub mod camera;
pub mod homography;
pub mod rigid;

pub use camera::CameraIntrinsics;
pub use homography::{estimate_homography, find_homography_ransac, Homography, RansacParams};
pub use rigid::RigidTransform;
