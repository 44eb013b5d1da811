//! Descriptor matching: brute-force Hamming matcher and the per-pattern
//! registry that owns one trained matcher per target.

pub mod hamming;
pub mod registry;

pub use hamming::{descriptor_distance, passes_ratio, DMatch, HammingMatcher, Knn2, NN_RATIO};
pub use registry::{DetectScratch, PatternEntry, PatternRegistry};
