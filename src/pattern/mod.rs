//! Immutable descriptor-searchable representation of one planar reference
//! image.

use image::{GrayImage, RgbaImage};
use nalgebra::{Point2, Point3};

use crate::error::TrackError;
use crate::features::{FeatureSet, OrbExtractor};
use crate::img;

/// Canonical 3D corners of any pattern: a unit square on the Z=0 plane,
/// centered at the origin, ordered top-left, top-right, bottom-right,
/// bottom-left to mirror the 2D corner order.
pub const CORNERS_3D: [Point3<f64>; 4] = [
    Point3::new(-0.5, -0.5, 0.0),
    Point3::new(0.5, -0.5, 0.0),
    Point3::new(0.5, 0.5, 0.0),
    Point3::new(-0.5, 0.5, 0.0),
];

/// One trained planar pattern. Built once from a reference raster and never
/// mutated; replacing a target rebuilds its pattern from scratch.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub width: u32,
    pub height: u32,
    pub gray: GrayImage,
    pub features: FeatureSet,
    /// Corners in normalized image space (0..1), TL, TR, BR, BL.
    pub corners2d: [Point2<f64>; 4],
    /// Matching corners on the normalized Z=0 plane, spanning ±0.5.
    pub corners3d: [Point3<f64>; 4],
}

impl Pattern {
    /// Build a pattern from an RGBA reference raster.
    ///
    /// Fails with [`TrackError::InsufficientKeypoints`] when the reference
    /// image is too plain for feature extraction.
    pub fn build(raster: &RgbaImage, extractor: &OrbExtractor) -> Result<Self, TrackError> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(TrackError::EmptyRaster);
        }
        let gray = img::gray_from_rgba(raster);
        Self::build_gray(gray, extractor)
    }

    /// Build directly from a grayscale raster.
    pub fn build_gray(gray: GrayImage, extractor: &OrbExtractor) -> Result<Self, TrackError> {
        let features = extractor.extract(&gray).map_err(|e| match e {
            TrackError::NoFeatures => TrackError::InsufficientKeypoints,
            other => other,
        })?;

        Ok(Self {
            width: gray.width(),
            height: gray.height(),
            corners2d: [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ],
            corners3d: CORNERS_3D,
            gray,
            features,
        })
    }

    /// Corner `i` in pattern pixel coordinates.
    pub fn corner_px(&self, i: usize) -> Point2<f64> {
        Point2::new(
            self.corners2d[i].x * self.width as f64,
            self.corners2d[i].y * self.height as f64,
        )
    }
}
