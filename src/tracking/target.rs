//! Per-target tracking state and the target store.

use std::collections::HashMap;

use crate::geometry::RigidTransform;
use crate::tracking::state::TargetPhase;

/// Mutable tracking state for one registered target.
#[derive(Debug)]
pub struct TrackedTarget {
    pub id: String,
    /// Real-world edge length of the pattern, in meters.
    pub physical_size: f64,
    /// Whether the pattern was found in the most recent processed frame.
    pub detected: bool,
    /// Last pose delivered to the sink, used as the smoothing anchor.
    pub prev_pose: Option<RigidTransform>,
    /// Consistent-pose run collected while accumulating in static mode.
    pub history: Vec<RigidTransform>,
    /// Length of the current consistent run.
    pub similar_count: usize,
    pub phase: TargetPhase,
}

impl TrackedTarget {
    pub fn new(id: String, physical_size: f64) -> Self {
        Self {
            id,
            physical_size,
            detected: false,
            prev_pose: None,
            history: Vec::new(),
            similar_count: 0,
            phase: TargetPhase::Accumulating,
        }
    }

    /// Drop all stabilization progress and return to accumulation.
    pub fn reset_stability(&mut self) {
        self.history.clear();
        self.similar_count = 0;
        self.phase = TargetPhase::Accumulating;
    }
}

/// Arena of tracked targets with id lookup.
///
/// Targets live in a dense vector so per-frame iteration stays cheap; the
/// map only resolves ids to slots.
#[derive(Debug, Default)]
pub struct TargetStore {
    targets: Vec<TrackedTarget>,
    index: HashMap<String, usize>,
}

impl TargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Insert a new target. Returns false when the id is already taken.
    pub fn insert(&mut self, target: TrackedTarget) -> bool {
        if self.index.contains_key(&target.id) {
            return false;
        }
        self.index.insert(target.id.clone(), self.targets.len());
        self.targets.push(target);
        true
    }

    /// Remove a target by id. The last slot is swapped into the hole.
    pub fn remove(&mut self, id: &str) -> Option<TrackedTarget> {
        let slot = self.index.remove(id)?;
        let removed = self.targets.swap_remove(slot);
        if let Some(moved) = self.targets.get(slot) {
            self.index.insert(moved.id.clone(), slot);
        }
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&TrackedTarget> {
        self.index.get(id).map(|&i| &self.targets[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TrackedTarget> {
        let slot = *self.index.get(id)?;
        Some(&mut self.targets[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedTarget> {
        self.targets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedTarget> {
        self.targets.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_duplicate_ids() {
        let mut store = TargetStore::new();
        assert!(store.insert(TrackedTarget::new("a".into(), 0.1)));
        assert!(!store.insert(TrackedTarget::new("a".into(), 0.2)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().physical_size, 0.1);
    }

    #[test]
    fn remove_keeps_remaining_lookups_valid() {
        let mut store = TargetStore::new();
        store.insert(TrackedTarget::new("a".into(), 0.1));
        store.insert(TrackedTarget::new("b".into(), 0.2));
        store.insert(TrackedTarget::new("c".into(), 0.3));

        assert!(store.remove("a").is_some());
        // "c" was swapped into "a"'s slot; both survivors must resolve.
        assert_eq!(store.get("b").unwrap().physical_size, 0.2);
        assert_eq!(store.get("c").unwrap().physical_size, 0.3);
        assert!(store.get("a").is_none());
        assert!(store.remove("a").is_none());
    }

    #[test]
    fn reset_stability_clears_progress() {
        let mut t = TrackedTarget::new("a".into(), 0.1);
        t.history.push(crate::geometry::RigidTransform::identity());
        t.similar_count = 3;
        t.phase = TargetPhase::Stabilized;
        t.reset_stability();
        assert!(t.history.is_empty());
        assert_eq!(t.similar_count, 0);
        assert_eq!(t.phase, TargetPhase::Accumulating);
    }
}
