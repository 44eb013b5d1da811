//! Planar homography estimation.
//!
//! Direct linear transform with Hartley normalization, plus a RANSAC
//! wrapper with deterministic sampling so detection results are
//! reproducible frame to frame.

use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

/// 3x3 projective transform mapping one plane's coordinates to another's.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0] / v[2], v[1] / v[2])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Composition `self ∘ other`: apply `other` first.
    pub fn compose(&self, other: &Self) -> Self {
        Self::new(self.h * other.h)
    }

    /// Scale the output plane: `p -> s * p`.
    pub fn scaled_output(&self, s: f64) -> Self {
        let scale = Matrix3::new(s, 0.0, 0.0, 0.0, s, 0.0, 0.0, 0.0, 1.0);
        Self::new(scale * self.h)
    }
}

/// RANSAC controls for [`find_homography_ransac`].
#[derive(Debug, Clone, Copy)]
pub struct RansacParams {
    /// Inlier reprojection threshold in pixels.
    pub reproj_threshold: f64,
    pub max_iters: usize,
    /// Early-exit confidence for the adaptive iteration bound.
    pub confidence: f64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            reproj_threshold: 3.0,
            max_iters: 2000,
            confidence: 0.955,
        }
    }
}

fn hartley_transform(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Hartley normalization: translate to centroid, scale mean distance to sqrt(2).
fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in pts {
        let dx = p.x - cx;
        let dy = p.y - cy;
        mean_dist += (dx * dx + dy * dy).sqrt();
    }
    mean_dist /= n;

    let t = hartley_transform(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

fn normalize_scale(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Exact homography from 4 correspondences: `dst ~ H * src`.
///
/// Unknowns `[h11..h32]` with `h33 = 1`; degenerate (collinear) samples fail
/// the LU solve and return `None`.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;
    let hn = Matrix3::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );
    let h = denormalize(hn, t_src, t_dst)?;
    normalize_scale(h).map(Homography::new)
}

/// DLT homography over N >= 4 correspondences: `dst ~ H * src`.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if src.len() == 4 {
        let s: &[Point2<f64>; 4] = src.try_into().ok()?;
        let d: &[Point2<f64>; 4] = dst.try_into().ok()?;
        return homography_from_4pt(s, d);
    }

    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Null-space vector of A: right singular vector of the smallest singular value.
    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let h = vt.row(vt.nrows() - 1);
    let hn = Matrix3::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    let h = denormalize(hn, ts, td)?;
    normalize_scale(h).map(Homography::new)
}

/// Deterministic unique index sampler (splitmix-style), seeded per iteration.
fn sample_unique_indices(n: usize, k: usize, seed: u64) -> Vec<usize> {
    let mut out = Vec::with_capacity(k);
    let mut used = vec![false; n];
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
    while out.len() < k {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let idx = (state >> 16) as usize % n;
        if !used[idx] {
            used[idx] = true;
            out.push(idx);
        }
    }
    out
}

fn reproj_error_sq(h: &Homography, src: &Point2<f64>, dst: &Point2<f64>) -> f64 {
    let p = h.apply(*src);
    let dx = p.x - dst.x;
    let dy = p.y - dst.y;
    dx * dx + dy * dy
}

/// Robust homography estimation: `dst ~ H * src`.
///
/// Returns the model re-fit on all inliers plus the final inlier mask, or
/// `None` when fewer than 4 correspondences are given or no model reaches
/// 4 inliers. Iterations adapt to the observed inlier ratio up to
/// `params.max_iters`.
pub fn find_homography_ransac(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    params: &RansacParams,
) -> Option<(Homography, Vec<bool>)> {
    let n = src.len();
    if n != dst.len() || n < 4 {
        return None;
    }

    let thresh2 = params.reproj_threshold * params.reproj_threshold;
    let mut best_count = 0usize;
    let mut best_mask = vec![false; n];
    let mut best_h: Option<Homography> = None;
    let mut required = params.max_iters;

    let mut iter = 0usize;
    while iter < params.max_iters && iter < required {
        let idx = sample_unique_indices(n, 4, iter as u64 + 1);
        let s = [src[idx[0]], src[idx[1]], src[idx[2]], src[idx[3]]];
        let d = [dst[idx[0]], dst[idx[1]], dst[idx[2]], dst[idx[3]]];
        iter += 1;

        let h = match homography_from_4pt(&s, &d) {
            Some(h) => h,
            None => continue,
        };

        let mut mask = vec![false; n];
        let mut count = 0usize;
        for j in 0..n {
            if reproj_error_sq(&h, &src[j], &dst[j]) <= thresh2 {
                mask[j] = true;
                count += 1;
            }
        }

        if count > best_count {
            best_count = count;
            best_mask = mask;
            best_h = Some(h);

            // Standard adaptive bound: stop once the chance of having missed
            // an all-inlier sample drops below 1 - confidence.
            let w = count as f64 / n as f64;
            let p_outlier_free = w.powi(4);
            if p_outlier_free > 1e-12 {
                let denom = (1.0 - p_outlier_free).max(1e-12).ln();
                let needed = ((1.0 - params.confidence).ln() / denom).ceil();
                if needed.is_finite() && needed >= 0.0 {
                    required = required.min(needed as usize + 1);
                }
            }
        }
    }

    let rough = best_h?;
    if best_count < 4 {
        return None;
    }

    // Re-fit on all inliers and recompute the mask against the refined model.
    let in_src: Vec<Point2<f64>> = src
        .iter()
        .zip(&best_mask)
        .filter_map(|(p, &m)| m.then_some(*p))
        .collect();
    let in_dst: Vec<Point2<f64>> = dst
        .iter()
        .zip(&best_mask)
        .filter_map(|(p, &m)| m.then_some(*p))
        .collect();

    let refined = estimate_homography(&in_src, &in_dst).unwrap_or(rough);
    let mut mask = vec![false; n];
    for j in 0..n {
        mask[j] = reproj_error_sq(&refined, &src[j], &dst[j]) <= thresh2;
    }
    Some((refined, mask))
}
