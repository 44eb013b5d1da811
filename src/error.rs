//! Error taxonomy for the tracking core.
//!
//! Only registration-time and configuration problems surface as errors.
//! A pattern that is simply not found in a frame is not an error; it is
//! absent from the detection set and fully recoverable next frame.

/// Errors reported by the tracking core.
#[derive(thiserror::Error, Debug)]
pub enum TrackError {
    /// The reference image did not yield enough keypoints to build a pattern.
    #[error("insufficient keypoints in reference image")]
    InsufficientKeypoints,
    /// Feature extraction found no usable keypoints in a raster.
    #[error("no features detected")]
    NoFeatures,
    /// An input raster had zero width or height.
    #[error("empty raster")]
    EmptyRaster,
    /// `add_target` was called with an identifier that is already registered.
    #[error("target `{0}` is already registered")]
    DuplicateTarget(String),
    /// `remove_target` or a reset was called with an unknown identifier.
    #[error("target `{0}` is not registered")]
    UnknownTarget(String),
    /// A configuration value is out of its documented range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
