//! Raster helpers: grayscale conversion, downsampling, perspective warping.

pub mod warp;

pub use warp::{sample_bicubic, sample_bilinear, warp_perspective_into};

use image::{GrayImage, Luma, RgbaImage};

/// Rec.601 integer luma, matching the usual camera-feed conversion.
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Convert an RGBA frame to grayscale.
pub fn gray_from_rgba(frame: &RgbaImage) -> GrayImage {
    let mut out = GrayImage::new(frame.width(), frame.height());
    gray_from_rgba_into(frame, &mut out);
    out
}

/// Convert an RGBA frame to grayscale into a reused buffer.
pub fn gray_from_rgba_into(frame: &RgbaImage, out: &mut GrayImage) {
    ensure_size(out, frame.width(), frame.height());
    for (dst, src) in out.pixels_mut().zip(frame.pixels()) {
        let [r, g, b, _] = src.0;
        *dst = Luma([luma(r, g, b)]);
    }
}

/// Reallocate `buf` only when the requested size changed.
pub fn ensure_size(buf: &mut GrayImage, width: u32, height: u32) {
    if buf.width() != width || buf.height() != height {
        *buf = GrayImage::new(width, height);
    }
}

/// Bilinear downsample by `factor` (0 < factor <= 1) into a reused buffer.
pub fn downsample_into(src: &GrayImage, factor: f64, out: &mut GrayImage) {
    let w = ((src.width() as f64 * factor).round() as u32).max(1);
    let h = ((src.height() as f64 * factor).round() as u32).max(1);
    ensure_size(out, w, h);
    let sx = src.width() as f32 / w as f32;
    let sy = src.height() as f32 / h as f32;
    for y in 0..h {
        for x in 0..w {
            let v = sample_bilinear(src, x as f32 * sx, y as f32 * sy);
            out.put_pixel(x, y, Luma([v]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn luma_of_gray_pixel_is_identity() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([200, 200, 200, 255]));
        rgba.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let gray = gray_from_rgba(&rgba);
        assert_eq!(gray.get_pixel(0, 0).0[0], 200);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
    }

    #[test]
    fn conversion_into_matching_buffer_keeps_allocation() {
        let mut rgba = RgbaImage::from_pixel(8, 6, Rgba([10, 10, 10, 255]));
        let mut out = GrayImage::new(8, 6);
        let before = out.as_raw().as_ptr();

        gray_from_rgba_into(&rgba, &mut out);
        assert_eq!(out.as_raw().as_ptr(), before);
        assert_eq!(out.get_pixel(3, 3).0[0], 10);

        // A changed value lands in the same backing storage on the next call.
        rgba.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        gray_from_rgba_into(&rgba, &mut out);
        assert_eq!(out.as_raw().as_ptr(), before);
        assert_eq!(out.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn conversion_into_resizes_mismatched_buffer() {
        let rgba = RgbaImage::from_pixel(5, 4, Rgba([77, 77, 77, 255]));
        let mut out = GrayImage::new(1, 1);
        gray_from_rgba_into(&rgba, &mut out);
        assert_eq!((out.width(), out.height()), (5, 4));
        assert_eq!(out.get_pixel(4, 3).0[0], 77);
    }

    #[test]
    fn downsample_halves_dimensions() {
        let src = GrayImage::from_pixel(64, 48, Luma([90]));
        let mut out = GrayImage::new(1, 1);
        downsample_into(&src, 0.5, &mut out);
        assert_eq!((out.width(), out.height()), (32, 24));
        assert_eq!(out.get_pixel(10, 10).0[0], 90);
    }
}
