//! Fixed-budget ORB-style feature extractor.
//!
//! FAST-9 corners with a cardinal-point pre-check and grid non-max
//! suppression, intensity-centroid orientation, and steered 256-bit BRIEF
//! descriptors computed over an image pyramid. Purely functional per call:
//! nothing is cached between invocations.

use std::cmp::Ordering;
use std::collections::HashSet;

use image::{imageops, GrayImage};

use crate::error::TrackError;
use crate::features::pattern_table::BRIEF_PATTERN;
use crate::features::types::{Descriptor, FeatureSet, Keypoint};

/// Circle offsets for FAST-9 (radius 3, 16 pixels).
const FAST_CIRCLE: [(i32, i32); 16] = [
    (0, -3), (1, -3), (2, -2), (3, -1), (3, 0), (3, 1), (2, 2), (1, 3),
    (0, 3), (-1, 3), (-2, 2), (-3, 1), (-3, 0), (-3, -1), (-2, -2), (-1, -3),
];

/// Minimum pyramid level edge before the cascade stops.
const MIN_LEVEL_SIZE: u32 = 40;

/// Grid cell size for non-max suppression.
const NMS_RADIUS: f32 = 5.0;

#[derive(Debug, Clone)]
pub struct OrbExtractor {
    pub fast_threshold: u8,
    /// Hard budget on returned keypoints.
    pub max_keypoints: usize,
    pub pyramid_levels: u8,
    pub scale_factor: f32,
}

impl Default for OrbExtractor {
    fn default() -> Self {
        Self {
            fast_threshold: 20,
            max_keypoints: 1000,
            pyramid_levels: 8,
            scale_factor: 1.2,
        }
    }
}

impl OrbExtractor {
    /// Detect keypoints and compute descriptors for a grayscale raster.
    ///
    /// Fails with [`TrackError::EmptyRaster`] on a zero-sized input and
    /// [`TrackError::NoFeatures`] when no keypoint survives detection and
    /// description.
    pub fn extract(&self, img: &GrayImage) -> Result<FeatureSet, TrackError> {
        if img.width() == 0 || img.height() == 0 {
            return Err(TrackError::EmptyRaster);
        }

        let mut all: Vec<(Keypoint, Descriptor)> = Vec::new();
        let mut level_img = img.clone();
        let mut scale = 1.0f32;

        for octave in 0..self.pyramid_levels {
            if octave > 0 {
                let w = (level_img.width() as f32 / self.scale_factor) as u32;
                let h = (level_img.height() as f32 / self.scale_factor) as u32;
                if w < MIN_LEVEL_SIZE || h < MIN_LEVEL_SIZE {
                    break;
                }
                level_img = imageops::resize(&level_img, w, h, imageops::FilterType::Gaussian);
                scale *= self.scale_factor;
            }

            let corners = self.detect_level(&level_img, octave, scale);
            for mut kp in corners {
                kp.angle = orientation(&level_img, kp.x as i32, kp.y as i32);
                let desc = describe(&level_img, kp.x as i32, kp.y as i32, kp.angle);
                // Scale coordinates back to original image space.
                kp.x *= scale;
                kp.y *= scale;
                all.push((kp, desc));
            }
        }

        if all.is_empty() {
            return Err(TrackError::NoFeatures);
        }

        // Keep the strongest corners within the budget.
        all.sort_by(|a, b| {
            b.0.response
                .partial_cmp(&a.0.response)
                .unwrap_or(Ordering::Equal)
        });
        all.truncate(self.max_keypoints);

        let mut set = FeatureSet {
            keypoints: Vec::with_capacity(all.len()),
            descriptors: Vec::with_capacity(all.len()),
        };
        for (kp, desc) in all {
            set.keypoints.push(kp);
            set.descriptors.push(desc);
        }
        Ok(set)
    }

    fn detect_level(&self, img: &GrayImage, octave: u8, scale: f32) -> Vec<Keypoint> {
        let (w, h) = (img.width(), img.height());
        if w < 7 || h < 7 {
            return Vec::new();
        }

        let mut corners = Vec::new();
        for y in 3..h - 3 {
            for x in 3..w - 3 {
                let center = img.get_pixel(x, y).0[0];
                if !self.pre_check(img, x, y, center) {
                    continue;
                }
                if self.is_corner(img, x, y, center) {
                    corners.push(Keypoint {
                        x: x as f32,
                        y: y as f32,
                        response: response(img, x, y),
                        angle: 0.0,
                        octave,
                        scale,
                    });
                }
            }
        }
        self.suppress(corners)
    }

    /// Quick rejection: at least 3 of the 4 cardinal circle pixels must be
    /// uniformly brighter or darker than the center.
    fn pre_check(&self, img: &GrayImage, x: u32, y: u32, center: u8) -> bool {
        let bright = center.saturating_add(self.fast_threshold);
        let dark = center.saturating_sub(self.fast_threshold);
        let px = [
            img.get_pixel(x, y - 3).0[0],
            img.get_pixel(x + 3, y).0[0],
            img.get_pixel(x, y + 3).0[0],
            img.get_pixel(x - 3, y).0[0],
        ];
        let n_bright = px.iter().filter(|&&p| p > bright).count();
        let n_dark = px.iter().filter(|&&p| p < dark).count();
        n_bright >= 3 || n_dark >= 3
    }

    /// FAST-9: a run of at least 9 contiguous circle pixels all brighter or
    /// all darker than the center by the threshold.
    fn is_corner(&self, img: &GrayImage, x: u32, y: u32, center: u8) -> bool {
        let bright = center.saturating_add(self.fast_threshold);
        let dark = center.saturating_sub(self.fast_threshold);

        let mut run_bright = 0u32;
        let mut run_dark = 0u32;
        let mut max_bright = 0u32;
        let mut max_dark = 0u32;

        // Walk the circle twice to handle wraparound runs.
        for i in 0..FAST_CIRCLE.len() * 2 {
            let (dx, dy) = FAST_CIRCLE[i % FAST_CIRCLE.len()];
            let p = img.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32).0[0];
            if p > bright {
                run_bright += 1;
                run_dark = 0;
                max_bright = max_bright.max(run_bright);
            } else if p < dark {
                run_dark += 1;
                run_bright = 0;
                max_dark = max_dark.max(run_dark);
            } else {
                run_bright = 0;
                run_dark = 0;
            }
        }
        max_bright >= 9 || max_dark >= 9
    }

    /// Grid non-max suppression keyed on response order.
    fn suppress(&self, mut corners: Vec<Keypoint>) -> Vec<Keypoint> {
        if corners.is_empty() {
            return corners;
        }
        corners.sort_by(|a, b| b.response.partial_cmp(&a.response).unwrap_or(Ordering::Equal));

        let mut taken: HashSet<(i32, i32)> = HashSet::new();
        let mut selected = Vec::new();
        for kp in corners {
            let gx = (kp.x / NMS_RADIUS) as i32;
            let gy = (kp.y / NMS_RADIUS) as i32;
            let mut free = true;
            'grid: for dy in -1..=1 {
                for dx in -1..=1 {
                    if taken.contains(&(gx + dx, gy + dy)) {
                        free = false;
                        break 'grid;
                    }
                }
            }
            if free {
                taken.insert((gx, gy));
                selected.push(kp);
                if selected.len() >= self.max_keypoints {
                    break;
                }
            }
        }
        selected
    }
}

/// Local intensity standard deviation, used as corner strength.
fn response(img: &GrayImage, x: u32, y: u32) -> f32 {
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut count = 0u32;
    for dy in -2i32..=2 {
        for dx in -2i32..=2 {
            let px = x as i32 + dx;
            let py = y as i32 + dy;
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                let v = img.get_pixel(px as u32, py as u32).0[0] as f32;
                sum += v;
                sum_sq += v * v;
                count += 1;
            }
        }
    }
    let mean = sum / count as f32;
    (sum_sq / count as f32 - mean * mean).max(0.0).sqrt()
}

/// Intensity-centroid orientation over a radius-15 disc.
fn orientation(img: &GrayImage, x: i32, y: i32) -> f32 {
    const R: i32 = 15;
    let mut m01 = 0.0f32;
    let mut m10 = 0.0f32;
    for dy in -R..=R {
        for dx in -R..=R {
            if dx * dx + dy * dy > R * R {
                continue;
            }
            let px = x + dx;
            let py = y + dy;
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                let v = img.get_pixel(px as u32, py as u32).0[0] as f32;
                m01 += v * dy as f32;
                m10 += v * dx as f32;
            }
        }
    }
    m01.atan2(m10)
}

#[inline]
fn sample_clamped(img: &GrayImage, x: i32, y: i32) -> u8 {
    let xc = x.clamp(0, img.width() as i32 - 1) as u32;
    let yc = y.clamp(0, img.height() as i32 - 1) as u32;
    img.get_pixel(xc, yc).0[0]
}

/// Steered BRIEF: pattern offsets rotated by the keypoint orientation.
fn describe(img: &GrayImage, x: i32, y: i32, angle: f32) -> Descriptor {
    let (sin_a, cos_a) = angle.sin_cos();
    let mut desc = [0u8; 32];

    for (byte_idx, tests) in BRIEF_PATTERN.chunks(8).enumerate() {
        let mut byte = 0u8;
        for (bit, &(x1, y1, x2, y2)) in tests.iter().enumerate() {
            let r1x = (x1 as f32 * cos_a - y1 as f32 * sin_a) as i32;
            let r1y = (x1 as f32 * sin_a + y1 as f32 * cos_a) as i32;
            let r2x = (x2 as f32 * cos_a - y2 as f32 * sin_a) as i32;
            let r2y = (x2 as f32 * sin_a + y2 as f32 * cos_a) as i32;

            let a = sample_clamped(img, x + r1x, y + r1y);
            let b = sample_clamped(img, x + r2x, y + r2y);
            if a < b {
                byte |= 1 << bit;
            }
        }
        desc[byte_idx] = byte;
    }
    desc
}
