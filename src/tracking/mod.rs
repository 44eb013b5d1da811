//! Temporal tracking: per-target state, smoothing, stabilization and the
//! top-level tracker.

pub mod sink;
pub mod smoothing;
pub mod stability;
pub mod state;
pub mod target;
pub mod tracker;

pub use sink::AnchorSink;
pub use smoothing::filter_pose;
pub use stability::{average_poses, poses_similar};
pub use state::{TargetPhase, TrackingMode};
pub use target::{TargetStore, TrackedTarget};
pub use tracker::{FrameResult, PatternTracker, TargetStatus};
