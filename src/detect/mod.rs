//! Multi-pattern detection pipeline.
//!
//! Per frame: one grayscale conversion, one feature extraction, then for
//! every registered pattern a match / RANSAC-verify / optional warp-refine
//! cascade. Patterns that fail any step are simply absent from the result
//! set for that frame.

use image::{GrayImage, RgbaImage};
use nalgebra::Point2;
use tracing::debug;

use crate::features::{FeatureSet, Keypoint, OrbExtractor};
use crate::geometry::{find_homography_ransac, Homography, RansacParams};
use crate::img;
use crate::matching::{passes_ratio, HammingMatcher, PatternEntry, PatternRegistry};
use crate::pattern::Pattern;

/// Minimum raw matches and minimum RANSAC inliers for a verified detection.
pub const MIN_MATCHES: usize = 8;

/// One verified pattern occurrence in a frame.
#[derive(Debug, Clone)]
pub struct Detection {
    pub id: String,
    /// Pattern corners in frame pixel space, TL, TR, BR, BL.
    pub contour: [Point2<f64>; 4],
    /// Pattern pixel space to frame pixel space.
    pub homography: Homography,
}

/// Detection-stage options, derived from the tracker configuration.
#[derive(Debug, Clone)]
pub struct DetectorParams {
    pub enable_ratio_test: bool,
    pub enable_refinement: bool,
    pub ransac: RansacParams,
    /// Frame shrink factor applied before extraction (0.1..=1.0).
    pub downsample_factor: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            enable_ratio_test: true,
            enable_refinement: true,
            ransac: RansacParams::default(),
            downsample_factor: 1.0,
        }
    }
}

/// Detects every registered pattern in each incoming frame.
///
/// Owns the registry and all intermediate buffers; nothing is allocated per
/// frame once the working-set sizes settle.
pub struct MultiPatternDetector {
    extractor: OrbExtractor,
    registry: PatternRegistry,
    params: DetectorParams,
    gray: GrayImage,
    small: GrayImage,
}

impl MultiPatternDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            extractor: OrbExtractor::default(),
            registry: PatternRegistry::new(),
            params,
            gray: GrayImage::new(1, 1),
            small: GrayImage::new(1, 1),
        }
    }

    pub fn extractor(&self) -> &OrbExtractor {
        &self.extractor
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn register(&mut self, id: &str, pattern: Pattern) {
        self.registry.register(id, pattern);
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        self.registry.unregister(id)
    }

    /// Detect all registered patterns in an RGBA frame.
    ///
    /// The grayscale conversion lands in a buffer owned by the detector and
    /// reused across frames.
    pub fn detect(&mut self, frame: &RgbaImage) -> Vec<Detection> {
        let mut gray = std::mem::replace(&mut self.gray, GrayImage::new(0, 0));
        img::gray_from_rgba_into(frame, &mut gray);
        let detections = self.detect_gray(&gray);
        self.gray = gray;
        detections
    }

    /// Detect all registered patterns in a frame that is already grayscale.
    pub fn detect_gray(&mut self, gray: &GrayImage) -> Vec<Detection> {
        if self.registry.is_empty() {
            return Vec::new();
        }

        let factor = self.params.downsample_factor;
        let work: &GrayImage = if factor < 1.0 {
            img::downsample_into(gray, factor, &mut self.small);
            &self.small
        } else {
            gray
        };

        let frame_feats = match self.extractor.extract(work) {
            Ok(f) => f,
            Err(e) => {
                debug!(error = %e, "frame yielded no features, skipping detection");
                return Vec::new();
            }
        };

        let extractor = &self.extractor;
        let params = &self.params;
        let mut detections = Vec::new();

        for (id, entry) in self.registry.iter_mut() {
            let h_work = match detect_one(extractor, params, &frame_feats, work, entry) {
                Some(h) => h,
                None => continue,
            };
            // Map back to full frame resolution when detection ran downsampled.
            let h = if factor < 1.0 {
                h_work.scaled_output(1.0 / factor)
            } else {
                h_work
            };
            let contour = [
                h.apply(entry.pattern.corner_px(0)),
                h.apply(entry.pattern.corner_px(1)),
                h.apply(entry.pattern.corner_px(2)),
                h.apply(entry.pattern.corner_px(3)),
            ];
            detections.push(Detection {
                id: id.clone(),
                contour,
                homography: h,
            });
        }

        debug!(
            features = frame_feats.len(),
            patterns = self.registry.len(),
            detected = detections.len(),
            "frame processed"
        );
        detections
    }
}

/// Run the match / verify / refine cascade for one pattern. Returns the
/// final pattern-to-frame homography in the working (possibly downsampled)
/// frame's pixel space.
fn detect_one(
    extractor: &OrbExtractor,
    params: &DetectorParams,
    frame_feats: &FeatureSet,
    frame_gray: &GrayImage,
    entry: &mut PatternEntry,
) -> Option<Homography> {
    let (src, dst) = collect_matches(
        params.enable_ratio_test,
        frame_feats,
        &entry.pattern.features.keypoints,
        &entry.matcher,
        &mut entry.scratch.matches,
        &mut entry.scratch.knn,
    );
    if src.len() < MIN_MATCHES {
        return None;
    }

    let (rough, mask) = find_homography_ransac(&src, &dst, &params.ransac)?;
    let inliers = mask.iter().filter(|&&m| m).count();
    if inliers < MIN_MATCHES {
        return None;
    }

    if !params.enable_refinement {
        return Some(rough);
    }

    // Warp the frame backward into pattern canonical size and run the whole
    // match/verify pass again on the rectified patch. All-or-nothing: any
    // failure here drops the detection rather than falling back to the
    // rough estimate.
    let (pat_w, pat_h) = (entry.pattern.width, entry.pattern.height);
    img::warp_perspective_into(frame_gray, &rough, pat_w, pat_h, &mut entry.scratch.warped);

    let warped_feats = extractor.extract(&entry.scratch.warped).ok()?;
    let (rsrc, rdst) = collect_matches(
        params.enable_ratio_test,
        &warped_feats,
        &entry.pattern.features.keypoints,
        &entry.matcher,
        &mut entry.scratch.matches,
        &mut entry.scratch.knn,
    );
    if rsrc.len() < MIN_MATCHES {
        return None;
    }
    let (refined, rmask) = find_homography_ransac(&rsrc, &rdst, &params.ransac)?;
    if rmask.iter().filter(|&&m| m).count() < MIN_MATCHES {
        return None;
    }

    Some(rough.compose(&refined))
}

/// Match frame descriptors against one trained matcher and gather point
/// correspondences: pattern keypoints as source, frame keypoints as
/// destination.
fn collect_matches(
    ratio_test: bool,
    query: &FeatureSet,
    train_kps: &[Keypoint],
    matcher: &HammingMatcher,
    matches: &mut Vec<crate::matching::DMatch>,
    knn: &mut Vec<crate::matching::Knn2>,
) -> (Vec<Point2<f64>>, Vec<Point2<f64>>) {
    let mut src = Vec::new();
    let mut dst = Vec::new();

    if ratio_test {
        matcher.match_knn2(&query.descriptors, knn);
        for m in knn.iter() {
            if passes_ratio(m.best, m.second) {
                let t = &train_kps[m.train_idx];
                let q = &query.keypoints[m.query_idx];
                src.push(Point2::new(t.x as f64, t.y as f64));
                dst.push(Point2::new(q.x as f64, q.y as f64));
            }
        }
    } else {
        matcher.match_nn(&query.descriptors, matches);
        for m in matches.iter() {
            let t = &train_kps[m.train_idx];
            let q = &query.keypoints[m.query_idx];
            src.push(Point2::new(t.x as f64, t.y as f64));
            dst.push(Point2::new(q.x as f64, q.y as f64));
        }
    }
    (src, dst)
}
