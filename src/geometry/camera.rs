//! Pinhole camera model.
//!
//! Input frames are assumed pre-rectified: zero distortion, known focal
//! lengths and principal point.

use nalgebra::{Matrix3, Point2, Point3};

/// Pinhole intrinsics for the live camera.
#[derive(Debug, Clone, Copy)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// Frame resolution the intrinsics are calibrated for.
    pub width: u32,
    pub height: u32,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn inverse_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            1.0 / self.fx,
            0.0,
            -self.cx / self.fx,
            0.0,
            1.0 / self.fy,
            -self.cy / self.fy,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Project a camera-frame point to pixel coordinates. `None` behind the camera.
    pub fn project(&self, p_cam: &Point3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= 0.0 {
            return None;
        }
        Some(Point2::new(
            self.fx * p_cam.x / p_cam.z + self.cx,
            self.fy * p_cam.y / p_cam.z + self.cy,
        ))
    }

    /// Frustum test for an anchor of half-extent `half_extent_m` centered at
    /// `p_cam`. The extent is projected to a pixel margin so a target whose
    /// center has just slipped past the frame edge still counts as visible.
    pub fn target_in_view(&self, p_cam: &Point3<f64>, half_extent_m: f64) -> bool {
        let px = match self.project(p_cam) {
            Some(px) => px,
            None => return false,
        };
        let margin = (half_extent_m * self.fx / p_cam.z).abs();
        px.x >= -margin
            && px.x <= self.width as f64 + margin
            && px.y >= -margin
            && px.y <= self.height as f64 + margin
    }
}
