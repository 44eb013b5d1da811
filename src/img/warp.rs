//! Inverse-map perspective warping with bilinear and bicubic sampling.

use image::{GrayImage, Luma};

use crate::geometry::Homography;

#[inline]
fn get_clamped(src: &GrayImage, x: i32, y: i32) -> f32 {
    let xc = x.clamp(0, src.width() as i32 - 1) as u32;
    let yc = y.clamp(0, src.height() as i32 - 1) as u32;
    src.get_pixel(xc, yc).0[0] as f32
}

/// Bilinear sample at fractional coordinates, clamped at the borders.
pub fn sample_bilinear(src: &GrayImage, x: f32, y: f32) -> u8 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_clamped(src, x0, y0);
    let p10 = get_clamped(src, x0 + 1, y0);
    let p01 = get_clamped(src, x0, y0 + 1);
    let p11 = get_clamped(src, x0 + 1, y0 + 1);

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    (a + fy * (b - a)).clamp(0.0, 255.0) as u8
}

#[inline]
fn cubic_weights(t: f32) -> [f32; 4] {
    // Catmull-Rom kernel.
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t3 + 2.0 * t2 - t),
        0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
        0.5 * (-3.0 * t3 + 4.0 * t2 + t),
        0.5 * (t3 - t2),
    ]
}

/// Bicubic (Catmull-Rom) sample at fractional coordinates.
pub fn sample_bicubic(src: &GrayImage, x: f32, y: f32) -> u8 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let wx = cubic_weights(x - x0 as f32);
    let wy = cubic_weights(y - y0 as f32);

    let mut acc = 0.0f32;
    for (j, wyj) in wy.iter().enumerate() {
        let mut row = 0.0f32;
        for (i, wxi) in wx.iter().enumerate() {
            row += wxi * get_clamped(src, x0 + i as i32 - 1, y0 + j as i32 - 1);
        }
        acc += wyj * row;
    }
    acc.clamp(0.0, 255.0) as u8
}

/// Warp `src` into an `out_w` x `out_h` patch: each destination pixel is
/// mapped through `h_src_from_dst` and sampled bicubically from `src`.
pub fn warp_perspective_into(
    src: &GrayImage,
    h_src_from_dst: &Homography,
    out_w: u32,
    out_h: u32,
    out: &mut GrayImage,
) {
    super::ensure_size(out, out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let p = h_src_from_dst.apply(nalgebra::Point2::new(x as f64, y as f64));
            let v = sample_bicubic(src, p.x as f32, p.y as f32);
            out.put_pixel(x, y, Luma([v]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    fn gradient(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 3 + y * 5) % 256) as u8]))
    }

    #[test]
    fn sampling_at_integer_coords_is_exact() {
        let img = gradient(16, 16);
        for &(x, y) in &[(0u32, 0u32), (5, 7), (15, 15)] {
            let expected = img.get_pixel(x, y).0[0];
            assert_eq!(sample_bilinear(&img, x as f32, y as f32), expected);
            assert_eq!(sample_bicubic(&img, x as f32, y as f32), expected);
        }
    }

    #[test]
    fn identity_warp_copies_source() {
        let img = gradient(12, 10);
        let mut out = GrayImage::new(1, 1);
        warp_perspective_into(&img, &Homography::identity(), 12, 10, &mut out);
        assert_eq!(img.as_raw(), out.as_raw());
    }

    #[test]
    fn translation_warp_shifts_content() {
        let img = gradient(20, 20);
        // dst (x, y) samples src (x + 4, y + 2).
        let h = Homography::new(Matrix3::new(
            1.0, 0.0, 4.0, //
            0.0, 1.0, 2.0, //
            0.0, 0.0, 1.0,
        ));
        let mut out = GrayImage::new(1, 1);
        warp_perspective_into(&img, &h, 10, 10, &mut out);
        assert_eq!(out.get_pixel(3, 3).0[0], img.get_pixel(7, 5).0[0]);
    }
}
