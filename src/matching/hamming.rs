//! Brute-force Hamming matching over binary descriptors.

use crate::features::Descriptor;

/// Lowe ratio threshold: a match is kept only when the best distance is
/// decisively smaller than the runner-up, `best / second < 1/1.5`.
pub const NN_RATIO: f64 = 1.0 / 1.5;

/// A query-to-train correspondence.
#[derive(Debug, Clone, Copy)]
pub struct DMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: u32,
}

/// Nearest and second-nearest distances for one query descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Knn2 {
    pub query_idx: usize,
    pub train_idx: usize,
    pub best: u32,
    pub second: u32,
}

/// Number of differing bits between two 256-bit descriptors.
#[inline]
pub fn descriptor_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Ratio-test acceptance. Strict `<`; a zero runner-up distance means the
/// best candidate has an exact twin and is rejected as ambiguous.
#[inline]
pub fn passes_ratio(best: u32, second: u32) -> bool {
    second > 0 && (best as f64 / second as f64) < NN_RATIO
}

/// A matcher trained once over one pattern's descriptors.
///
/// Matchers are never shared across patterns; each registry entry trains its
/// own so that registering or unregistering one pattern cannot perturb the
/// matching behavior of another.
#[derive(Debug, Clone)]
pub struct HammingMatcher {
    train: Vec<Descriptor>,
}

impl HammingMatcher {
    pub fn train(descriptors: &[Descriptor]) -> Self {
        Self {
            train: descriptors.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.train.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty()
    }

    /// Plain nearest-neighbor matching, one match per query descriptor.
    pub fn match_nn(&self, query: &[Descriptor], out: &mut Vec<DMatch>) {
        out.clear();
        if self.train.is_empty() {
            return;
        }
        for (qi, q) in query.iter().enumerate() {
            let mut best = u32::MAX;
            let mut best_ti = 0usize;
            for (ti, t) in self.train.iter().enumerate() {
                let d = descriptor_distance(q, t);
                if d < best {
                    best = d;
                    best_ti = ti;
                }
            }
            out.push(DMatch {
                query_idx: qi,
                train_idx: best_ti,
                distance: best,
            });
        }
    }

    /// 2-nearest-neighbor matching for ratio-test filtering.
    pub fn match_knn2(&self, query: &[Descriptor], out: &mut Vec<Knn2>) {
        out.clear();
        if self.train.len() < 2 {
            return;
        }
        for (qi, q) in query.iter().enumerate() {
            let mut best = u32::MAX;
            let mut second = u32::MAX;
            let mut best_ti = 0usize;
            for (ti, t) in self.train.iter().enumerate() {
                let d = descriptor_distance(q, t);
                if d < best {
                    second = best;
                    best = d;
                    best_ti = ti;
                } else if d < second {
                    second = d;
                }
            }
            out.push(Knn2 {
                query_idx: qi,
                train_idx: best_ti,
                best,
                second,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(byte: u8) -> Descriptor {
        [byte; 32]
    }

    #[test]
    fn distance_counts_differing_bits() {
        assert_eq!(descriptor_distance(&desc(0x00), &desc(0x00)), 0);
        assert_eq!(descriptor_distance(&desc(0x00), &desc(0xFF)), 256);
        assert_eq!(descriptor_distance(&desc(0b0000_0001), &desc(0b0000_0011)), 32);
    }

    #[test]
    fn nn_finds_closest_row() {
        let matcher = HammingMatcher::train(&[desc(0x00), desc(0xFF), desc(0x0F)]);
        let mut out = Vec::new();
        matcher.match_nn(&[desc(0xFE)], &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].train_idx, 1);
        assert_eq!(out[0].distance, 32);
    }

    #[test]
    fn knn2_reports_best_and_second() {
        let matcher = HammingMatcher::train(&[desc(0x00), desc(0x01), desc(0xFF)]);
        let mut out = Vec::new();
        matcher.match_knn2(&[desc(0x00)], &mut out);
        assert_eq!(out[0].best, 0);
        assert_eq!(out[0].second, 32);
        assert_eq!(out[0].train_idx, 0);
    }

    #[test]
    fn ratio_boundary_is_strict() {
        // best/second exactly 1/1.5 must be rejected.
        assert!(!passes_ratio(2, 3));
        assert!(passes_ratio(2, 4));
        assert!(!passes_ratio(3, 3));
        // Exact twin in the train set: ambiguous, rejected.
        assert!(!passes_ratio(0, 0));
        // Unique zero-distance hit against a nonzero runner-up is kept.
        assert!(passes_ratio(0, 1));
    }
}
