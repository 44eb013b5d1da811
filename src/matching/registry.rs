//! Per-pattern matcher registry.
//!
//! Owns one trained matcher per registered pattern plus the scratch buffers
//! the detector reuses across frames for that pattern.

use std::collections::HashMap;

use image::GrayImage;
use tracing::{info, warn};

use crate::matching::hamming::{DMatch, HammingMatcher, Knn2};
use crate::pattern::Pattern;

/// Reusable per-pattern working memory. Allocation happens at registration
/// and on size changes only, not per frame.
#[derive(Debug, Default)]
pub struct DetectScratch {
    /// Frame patch warped back into pattern canonical size for refinement.
    pub warped: GrayImage,
    pub matches: Vec<DMatch>,
    pub knn: Vec<Knn2>,
}

/// Registry resources for one pattern identifier.
#[derive(Debug)]
pub struct PatternEntry {
    pub pattern: Pattern,
    pub matcher: HammingMatcher,
    pub scratch: DetectScratch,
}

/// Map of pattern id to trained resources.
///
/// An identifier maps to at most one entry; re-registering under the same
/// id replaces and releases the prior resources.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    entries: HashMap<String, PatternEntry>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Train a matcher over the pattern's descriptors and store it under `id`.
    pub fn register(&mut self, id: &str, pattern: Pattern) {
        let matcher = HammingMatcher::train(&pattern.features.descriptors);
        let entry = PatternEntry {
            pattern,
            matcher,
            scratch: DetectScratch::default(),
        };
        if self.entries.insert(id.to_string(), entry).is_some() {
            warn!(id, "replacing previously registered pattern");
        } else {
            info!(id, "pattern registered");
        }
    }

    /// Release and remove the entry for `id`. Returns false (with a warning)
    /// when no such entry exists.
    pub fn unregister(&mut self, id: &str) -> bool {
        if self.entries.remove(id).is_some() {
            info!(id, "pattern unregistered");
            true
        } else {
            warn!(id, "unregister: pattern not found");
            false
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PatternEntry> {
        self.entries.get(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut PatternEntry)> {
        self.entries.iter_mut()
    }
}
