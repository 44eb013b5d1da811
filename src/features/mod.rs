//! Feature extraction: FAST corners with steered BRIEF descriptors.

pub mod extractor;
pub mod pattern_table;
pub mod types;

pub use extractor::OrbExtractor;
pub use types::{Descriptor, FeatureSet, Keypoint};
