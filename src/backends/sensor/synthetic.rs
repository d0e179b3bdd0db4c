// SPDX-License-Identifier: GPL-3.0-only

//! Generated color + depth streams
//!
//! The scene is a textured back wall with a sphere swinging in front of it.
//! Both streams are ray-cast from their own camera using the same
//! [`SensorCalibration`], so aligning them with a [`PinholeResolver`] built
//! from that calibration lines the sphere up in both grids.
//!
//! [`PinholeResolver`]: super::PinholeResolver

use super::calibration::{Intrinsics, SensorCalibration};
use super::types::{Bgra, ColorFrame, DepthFrame, FrameSize};
use super::FrameSource;
use crate::errors::SensorError;
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::debug;

/// Distance of the back wall from the depth camera (mm)
const WALL_DISTANCE_MM: f32 = 3000.0;
const SPHERE_RADIUS_MM: f32 = 250.0;
const SPHERE_DISTANCE_MM: f32 = 1500.0;
const SPHERE_SWING_MM: f32 = 600.0;
/// Phase advance of the sphere per frame (radians)
const SPHERE_STEP: f32 = 0.05;
/// Edge length of one checkerboard tile on the wall (mm)
const TILE_MM: f32 = 200.0;

/// Ray hit on the scene
#[derive(Debug, Clone, Copy)]
struct Hit {
    /// Distance along the ray in units of its direction
    t: f32,
    point: Vector3<f32>,
    /// Outward normal when the sphere was hit
    sphere_normal: Option<Vector3<f32>>,
}

/// Scene geometry at one instant, in depth camera coordinates
#[derive(Debug, Clone, Copy)]
struct Scene {
    sphere_center: Vector3<f32>,
}

impl Scene {
    fn at(sequence: u64) -> Self {
        let phase = sequence as f32 * SPHERE_STEP;
        Self {
            sphere_center: Vector3::new(SPHERE_SWING_MM * phase.sin(), 0.0, SPHERE_DISTANCE_MM),
        }
    }

    fn intersect(&self, origin: &Vector3<f32>, dir: &Vector3<f32>) -> Option<Hit> {
        let mut best: Option<Hit> = None;

        if dir.z > 0.0 {
            let t = (WALL_DISTANCE_MM - origin.z) / dir.z;
            if t > 0.0 {
                best = Some(Hit {
                    t,
                    point: origin + dir * t,
                    sphere_normal: None,
                });
            }
        }

        // |o + t d - c|^2 = r^2
        let oc = origin - self.sphere_center;
        let a = dir.dot(dir);
        let b = oc.dot(dir);
        let c = oc.dot(&oc) - SPHERE_RADIUS_MM * SPHERE_RADIUS_MM;
        let disc = b * b - a * c;
        if disc >= 0.0 {
            let t = (-b - disc.sqrt()) / a;
            if t > 0.0 && best.is_none_or(|hit| t < hit.t) {
                let point = origin + dir * t;
                best = Some(Hit {
                    t,
                    point,
                    sphere_normal: Some((point - self.sphere_center) / SPHERE_RADIUS_MM),
                });
            }
        }

        best
    }
}

/// Shade a hit as seen along `dir`
fn shade(hit: &Hit, dir: &Vector3<f32>) -> Bgra {
    match hit.sphere_normal {
        Some(normal) => {
            let facing = (-normal.dot(&dir.normalize())).clamp(0.0, 1.0);
            let red = (60.0 + 195.0 * facing) as u8;
            let green = (20.0 + 60.0 * facing) as u8;
            [20, green, red, 255]
        }
        None => {
            let tile_x = (hit.point.x / TILE_MM).floor() as i64;
            let tile_y = (hit.point.y / TILE_MM).floor() as i64;
            if (tile_x + tile_y).rem_euclid(2) == 0 {
                [200, 200, 200, 255]
            } else {
                [90, 60, 40, 255]
            }
        }
    }
}

/// Frame source that renders a moving test scene
pub struct SyntheticSource {
    color_size: FrameSize,
    depth_size: FrameSize,
    calibration: SensorCalibration,
    period: Duration,
    color_sequence: u64,
    depth_sequence: u64,
    last_color: Option<Instant>,
    last_depth: Option<Instant>,
}

impl SyntheticSource {
    /// Create a source with the given stream sizes
    ///
    /// `framerate` paces delivery; `0` delivers a new frame on every call.
    pub fn new(
        color_size: FrameSize,
        depth_size: FrameSize,
        calibration: &SensorCalibration,
        framerate: u32,
    ) -> Result<Self, SensorError> {
        for size in [color_size, depth_size] {
            if size.is_empty() {
                return Err(SensorError::InvalidResolution(size));
            }
        }

        let period = if framerate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / framerate
        };

        debug!(
            color = %color_size,
            depth = %depth_size,
            framerate,
            "Synthetic source ready"
        );

        Ok(Self {
            color_size,
            depth_size,
            calibration: calibration.scaled_to(depth_size, color_size),
            period,
            color_sequence: 0,
            depth_sequence: 0,
            last_color: None,
            last_depth: None,
        })
    }

    /// Calibration the scene is rendered with (scaled to the stream sizes)
    pub fn calibration(&self) -> &SensorCalibration {
        &self.calibration
    }

    fn due(last: Option<Instant>, period: Duration) -> bool {
        period.is_zero() || last.is_none_or(|at| at.elapsed() >= period)
    }

    /// Render the depth stream for frame `sequence`
    pub fn render_depth(&self, sequence: u64) -> DepthFrame {
        let scene = Scene::at(sequence);
        let intrinsics = self.calibration.depth;
        let origin = Vector3::zeros();
        let width = self.depth_size.width as usize;

        let mut pixels = vec![0u16; self.depth_size.pixel_count()];
        pixels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(v, row)| {
                for (u, px) in row.iter_mut().enumerate() {
                    let dir = intrinsics.ray(u as f32, v as f32);
                    if let Some(hit) = scene.intersect(&origin, &dir) {
                        // Ray has unit z, so t is the distance along the optical axis
                        *px = hit.t.round().clamp(0.0, u16::MAX as f32) as u16;
                    }
                }
            });

        DepthFrame::from_pixels(self.depth_size, pixels)
    }

    /// Render the color stream for frame `sequence`
    pub fn render_color(&self, sequence: u64) -> ColorFrame {
        let scene = Scene::at(sequence);
        let intrinsics: Intrinsics = self.calibration.color;
        let rotation: Matrix3<f32> = self.calibration.extrinsics.rotation_matrix();
        let back = rotation.transpose();
        // Color camera center and axes expressed in the depth frame
        let origin = -(back * self.calibration.extrinsics.translation());
        let width = self.color_size.width as usize;

        let mut pixels: Vec<Bgra> = vec![[0, 0, 0, 255]; self.color_size.pixel_count()];
        pixels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(v, row)| {
                for (u, px) in row.iter_mut().enumerate() {
                    let dir = back * intrinsics.ray(u as f32, v as f32);
                    if let Some(hit) = scene.intersect(&origin, &dir) {
                        *px = shade(&hit, &dir);
                    }
                }
            });

        ColorFrame::from_pixels(self.color_size, pixels)
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn color_size(&self) -> FrameSize {
        self.color_size
    }

    fn depth_size(&self) -> FrameSize {
        self.depth_size
    }

    fn try_acquire_color(&mut self) -> Option<ColorFrame> {
        if !Self::due(self.last_color, self.period) {
            return None;
        }
        self.last_color = Some(Instant::now());
        let frame = self.render_color(self.color_sequence);
        self.color_sequence += 1;
        Some(frame)
    }

    fn try_acquire_depth(&mut self) -> Option<DepthFrame> {
        if !Self::due(self.last_depth, self.period) {
            return None;
        }
        self.last_depth = Some(Instant::now());
        let frame = self.render_depth(self.depth_sequence);
        self.depth_sequence += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sensor::{PinholeResolver, SpatialResolver};

    fn small_source(framerate: u32) -> SyntheticSource {
        SyntheticSource::new(
            FrameSize::new(192, 108),
            FrameSize::new(64, 53),
            &SensorCalibration::default(),
            framerate,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_resolution() {
        let result = SyntheticSource::new(
            FrameSize::new(0, 108),
            FrameSize::new(64, 53),
            &SensorCalibration::default(),
            30,
        );
        assert!(matches!(result, Err(SensorError::InvalidResolution(_))));
    }

    #[test]
    fn test_unpaced_source_always_delivers() {
        let mut source = small_source(0);
        for _ in 0..3 {
            assert!(source.try_acquire_color().is_some());
            assert!(source.try_acquire_depth().is_some());
        }
    }

    #[test]
    fn test_paced_source_holds_back_frames() {
        let mut source = small_source(1);
        assert!(source.try_acquire_depth().is_some());
        assert!(source.try_acquire_depth().is_none());
    }

    #[test]
    fn test_depth_sees_sphere_in_front_of_wall() {
        let source = small_source(0);
        let depth = source.render_depth(0);
        let center = depth.pixel(32, 26);
        let corner = depth.pixel(0, 0);
        assert!(center > 1000 && center < 1500, "center {center}");
        assert!(corner >= 3000, "corner {corner}");
    }

    #[test]
    fn test_streams_agree_through_resolver() {
        let source = small_source(0);
        let calibration = source.calibration().clone();
        let resolver = PinholeResolver::new(&calibration);
        let depth = source.render_depth(0);
        let color = source.render_color(0);

        let map = resolver
            .map_depth_to_color(&depth, source.color_size())
            .unwrap();
        // Depth pixel on the sphere lands on a red color pixel
        let (x, y) = map
            .get(32, 26)
            .unwrap()
            .round_to_pixel(source.color_size())
            .unwrap();
        let [b, g, r, _] = color.pixel(x, y);
        assert!(r > g && r > b, "pixel {:?}", [b, g, r]);
    }
}
