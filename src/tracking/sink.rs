//! Outbound anchor updates.

use nalgebra::{Point3, UnitQuaternion};

/// Receiver for per-target anchor updates emitted while processing a frame.
///
/// The tracker never stores engine objects itself; each frame it pushes
/// pose, visibility and stabilization events through this trait and the
/// host applies them to whatever scene representation it owns.
pub trait AnchorSink {
    /// Update the world-space pose and uniform scale of a target's anchor.
    fn set_pose(
        &mut self,
        id: &str,
        position: Point3<f64>,
        orientation: UnitQuaternion<f64>,
        scale: f64,
    );

    /// Show or hide a target's anchor.
    fn set_visible(&mut self, id: &str, visible: bool);

    /// Fired once per stabilization when a static-mode target locks.
    fn on_stabilized(&mut self, _id: &str) {}
}
