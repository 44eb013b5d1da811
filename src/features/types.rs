//! Keypoint and descriptor containers shared by pattern building and
//! live-frame processing.

/// A detected corner with orientation and pyramid provenance.
///
/// Coordinates are in the source image's pixel space, already scaled back
/// from the pyramid level the corner was found on.
#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Detector response, used to keep the strongest corners under the budget.
    pub response: f32,
    /// Dominant orientation in radians (intensity centroid).
    pub angle: f32,
    /// Pyramid level the corner was detected on.
    pub octave: u8,
    /// Cumulative scale of that level relative to the original image.
    pub scale: f32,
}

/// 256-bit steered BRIEF descriptor.
pub type Descriptor = [u8; 32];

/// Keypoints plus one descriptor row per keypoint.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}
