use anyhow::Result;
use image::{Rgba, RgbaImage};
use nalgebra::{Point3, UnitQuaternion};
use tracing::info;
use tracing_subscriber::EnvFilter;

use planar_ar::tracking::AnchorSink;
use planar_ar::{CameraIntrinsics, PatternTracker, RigidTransform, TrackerConfig};

/// Prints every anchor update the tracker emits.
#[derive(Default)]
struct LoggingSink;

impl AnchorSink for LoggingSink {
    fn set_pose(
        &mut self,
        id: &str,
        position: Point3<f64>,
        orientation: UnitQuaternion<f64>,
        scale: f64,
    ) {
        let (roll, pitch, yaw) = orientation.euler_angles();
        info!(
            id,
            x = position.x,
            y = position.y,
            z = position.z,
            roll,
            pitch,
            yaw,
            scale,
            "anchor pose"
        );
    }

    fn set_visible(&mut self, id: &str, visible: bool) {
        info!(id, visible, "anchor visibility");
    }

    fn on_stabilized(&mut self, id: &str) {
        info!(id, "anchor stabilized");
    }
}

/// Deterministic high-contrast test card.
fn synthetic_card(size: u32) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(size, size, Rgba([128, 128, 128, 255]));
    let mut state = 0x5ca1ab1eu64;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };
    for _ in 0..60 {
        let bx = next() % size.saturating_sub(20);
        let by = next() % size.saturating_sub(20);
        let extent = 6 + next() % 12;
        let v = if next() % 2 == 0 { 20 } else { 235 };
        for y in by..(by + extent).min(size) {
            for x in bx..(bx + extent).min(size) {
                img.put_pixel(x, y, Rgba([v, v, v, 255]));
            }
        }
    }
    img
}

/// Paste the card into a camera frame at the given offset.
fn synthetic_frame(card: &RgbaImage, width: u32, height: u32, ox: u32, oy: u32) -> RgbaImage {
    let mut frame = RgbaImage::from_fn(width, height, |x, y| {
        let v = (90 + (x + 2 * y) % 40) as u8;
        Rgba([v, v, v, 255])
    });
    for y in 0..card.height() {
        for x in 0..card.width() {
            frame.put_pixel(x + ox, y + oy, *card.get_pixel(x, y));
        }
    }
    frame
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let intrinsics = CameraIntrinsics::new(300.0, 300.0, 160.0, 120.0, 320, 240);
    let mut tracker = PatternTracker::new(TrackerConfig::default(), intrinsics)?;
    let mut sink = LoggingSink;

    let card = synthetic_card(160);
    tracker.add_target("card", &card, 0.15)?;
    info!("tracking a synthetic card target over a generated feed");

    let camera = RigidTransform::identity();
    for i in 0..10u32 {
        // Slide the card a few pixels per frame.
        let frame = synthetic_frame(&card, 320, 240, 40 + 4 * i, 40);
        let result = tracker.process_frame(&frame, &camera, &mut sink);
        info!(
            frame = result.frame,
            detections = result.detections.len(),
            "frame done"
        );
    }

    Ok(())
}
