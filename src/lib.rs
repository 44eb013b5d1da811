pub mod config;
pub mod detect;
pub mod error;
pub mod features;
pub mod geometry;
pub mod img;
pub mod matching;
pub mod pattern;
pub mod pose;
pub mod tracking;

pub use config::TrackerConfig;
pub use error::TrackError;
pub use geometry::{CameraIntrinsics, RigidTransform};
pub use tracking::{AnchorSink, FrameResult, PatternTracker, TargetPhase, TrackingMode};
