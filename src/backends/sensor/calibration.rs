// SPDX-License-Identifier: GPL-3.0-only

//! Pinhole calibration model and the resolver built on it
//!
//! Depth pixels are unprojected with the depth camera intrinsics, moved into
//! the color camera frame with a rigid transform and projected with the
//! color intrinsics:
//!
//! ```text
//! p_depth = ((u - cx) * z / fx, (v - cy) * z / fy, z)
//! p_color = R * p_depth + t
//! (x, y)  = (p_color.x / p_color.z * fx' + cx', p_color.y / p_color.z * fy' + cy')
//! ```
//!
//! Default values approximate a Kinect v2 (512x424 depth, 1920x1080 color).
//! All distances are millimetres.

use super::types::{CoordinateMap, DepthFrame, FrameSize, MappedPoint};
use super::{ResolveResult, SpatialResolver};
use crate::constants::sensor::{COLOR_SIZE, DEPTH_INVALID_MM, DEPTH_SIZE};
use crate::errors::ResolveError;
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Largest on-screen footprint (color pixels per side) a single depth pixel
/// may cover when splatting into the color grid
const MAX_SPLAT_EXTENT: f32 = 16.0;

/// Pinhole camera intrinsics in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Focal length X (pixels)
    pub fx: f32,
    /// Focal length Y (pixels)
    pub fy: f32,
    /// Principal point X (pixels)
    pub cx: f32,
    /// Principal point Y (pixels)
    pub cy: f32,
}

impl Intrinsics {
    /// Kinect v2 IR/depth camera at 512x424
    pub const KINECT_V2_DEPTH: Intrinsics = Intrinsics {
        fx: 365.46,
        fy: 365.46,
        cx: 255.5,
        cy: 211.5,
    };

    /// Kinect v2 color camera at 1920x1080
    pub const KINECT_V2_COLOR: Intrinsics = Intrinsics {
        fx: 1081.37,
        fy: 1081.37,
        cx: 959.5,
        cy: 539.5,
    };

    /// Unproject pixel `(u, v)` at distance `z` into camera space
    pub fn deproject(&self, u: f32, v: f32, z: f32) -> Vector3<f32> {
        Vector3::new((u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z)
    }

    /// Viewing ray through pixel `(u, v)` with unit depth
    pub fn ray(&self, u: f32, v: f32) -> Vector3<f32> {
        self.deproject(u, v, 1.0)
    }

    /// Project a camera-space point; `None` for points at or behind the camera
    pub fn project(&self, point: &Vector3<f32>) -> Option<(f32, f32)> {
        if point.z <= 0.0 {
            return None;
        }
        Some((
            point.x / point.z * self.fx + self.cx,
            point.y / point.z * self.fy + self.cy,
        ))
    }

    /// Intrinsics for the same lens at a scaled resolution
    pub fn scaled(&self, scale_x: f32, scale_y: f32) -> Self {
        // Scale around pixel edges, not pixel centers
        Self {
            fx: self.fx * scale_x,
            fy: self.fy * scale_y,
            cx: (self.cx + 0.5) * scale_x - 0.5,
            cy: (self.cy + 0.5) * scale_y - 0.5,
        }
    }
}

/// Rigid transform from the depth camera frame into the color camera frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    /// Row-major rotation matrix
    pub rotation: [[f32; 3]; 3],
    /// Translation in millimetres
    pub translation_mm: [f32; 3],
}

impl Extrinsics {
    /// Identity transform (both cameras share an optical center)
    pub const IDENTITY: Extrinsics = Extrinsics {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation_mm: [0.0, 0.0, 0.0],
    };

    pub fn rotation_matrix(&self) -> Matrix3<f32> {
        let r = &self.rotation;
        Matrix3::new(
            r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1], r[2][2],
        )
    }

    pub fn translation(&self) -> Vector3<f32> {
        Vector3::from(self.translation_mm)
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        // Color camera sits ~52 mm beside the IR camera on a Kinect v2
        Self {
            translation_mm: [52.0, 0.0, 0.0],
            ..Self::IDENTITY
        }
    }
}

/// Complete calibration of a color + depth sensor pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorCalibration {
    /// Resolution the depth intrinsics were measured at
    pub depth_size: FrameSize,
    /// Resolution the color intrinsics were measured at
    pub color_size: FrameSize,
    pub depth: Intrinsics,
    pub color: Intrinsics,
    pub extrinsics: Extrinsics,
}

impl Default for SensorCalibration {
    fn default() -> Self {
        Self {
            depth_size: DEPTH_SIZE,
            color_size: COLOR_SIZE,
            depth: Intrinsics::KINECT_V2_DEPTH,
            color: Intrinsics::KINECT_V2_COLOR,
            extrinsics: Extrinsics::default(),
        }
    }
}

impl SensorCalibration {
    /// Rescale both intrinsics to the given stream resolutions
    pub fn scaled_to(&self, depth_size: FrameSize, color_size: FrameSize) -> Self {
        let scale = |to: FrameSize, from: FrameSize| {
            (
                to.width as f32 / from.width.max(1) as f32,
                to.height as f32 / from.height.max(1) as f32,
            )
        };
        let (dsx, dsy) = scale(depth_size, self.depth_size);
        let (csx, csy) = scale(color_size, self.color_size);
        Self {
            depth_size,
            color_size,
            depth: self.depth.scaled(dsx, dsy),
            color: self.color.scaled(csx, csy),
            extrinsics: self.extrinsics,
        }
    }
}

/// Axis-aligned box a depth pixel covers in the color grid
#[derive(Debug, Clone, Copy)]
struct Footprint {
    min_x: f32,
    max_x: f32,
    min_y: f32,
    max_y: f32,
    z: f32,
}

/// Spatial resolver backed by a [`SensorCalibration`]
#[derive(Debug, Clone)]
pub struct PinholeResolver {
    depth_size: FrameSize,
    color_size: FrameSize,
    depth: Intrinsics,
    color: Intrinsics,
    rotation: Matrix3<f32>,
    translation: Vector3<f32>,
}

impl PinholeResolver {
    pub fn new(calibration: &SensorCalibration) -> Self {
        Self {
            depth_size: calibration.depth_size,
            color_size: calibration.color_size,
            depth: calibration.depth,
            color: calibration.color,
            rotation: calibration.extrinsics.rotation_matrix(),
            translation: calibration.extrinsics.translation(),
        }
    }

    /// Resolver for streams whose resolution differs from the calibration's
    pub fn for_sizes(
        calibration: &SensorCalibration,
        depth_size: FrameSize,
        color_size: FrameSize,
    ) -> Self {
        Self::new(&calibration.scaled_to(depth_size, color_size))
    }

    pub fn depth_size(&self) -> FrameSize {
        self.depth_size
    }

    pub fn color_size(&self) -> FrameSize {
        self.color_size
    }

    /// Color-grid position and color-camera distance of a depth-grid point
    ///
    /// Returns `None` for invalid depth samples and for points that land at
    /// or behind the color camera.
    pub fn project_depth_pixel(&self, u: f32, v: f32, depth_mm: u16) -> Option<(f32, f32, f32)> {
        if depth_mm == DEPTH_INVALID_MM {
            return None;
        }
        let in_depth = self.depth.deproject(u, v, depth_mm as f32);
        let in_color = self.rotation * in_depth + self.translation;
        let (x, y) = self.color.project(&in_color)?;
        Some((x, y, in_color.z))
    }

    fn footprint(&self, u: u32, v: u32, depth_mm: u16) -> Option<Footprint> {
        let (u, v) = (u as f32, v as f32);
        let (_, _, z) = self.project_depth_pixel(u, v, depth_mm)?;
        let mut fp = Footprint {
            min_x: f32::INFINITY,
            max_x: f32::NEG_INFINITY,
            min_y: f32::INFINITY,
            max_y: f32::NEG_INFINITY,
            z,
        };
        for (du, dv) in [(-0.5, -0.5), (0.5, -0.5), (-0.5, 0.5), (0.5, 0.5)] {
            let (x, y, _) = self.project_depth_pixel(u + du, v + dv, depth_mm)?;
            fp.min_x = fp.min_x.min(x);
            fp.max_x = fp.max_x.max(x);
            fp.min_y = fp.min_y.min(y);
            fp.max_y = fp.max_y.max(y);
        }
        let extent_ok =
            fp.max_x - fp.min_x <= MAX_SPLAT_EXTENT && fp.max_y - fp.min_y <= MAX_SPLAT_EXTENT;
        extent_ok.then_some(fp)
    }

    fn check_sizes(&self, depth: &DepthFrame, color_size: FrameSize) -> ResolveResult<()> {
        if depth.size() != self.depth_size {
            return Err(ResolveError::DepthSize {
                expected: self.depth_size,
                actual: depth.size(),
            });
        }
        if color_size != self.color_size {
            return Err(ResolveError::ColorSize {
                expected: self.color_size,
                actual: color_size,
            });
        }
        Ok(())
    }
}

impl SpatialResolver for PinholeResolver {
    fn map_depth_to_color(
        &self,
        depth: &DepthFrame,
        color_size: FrameSize,
    ) -> ResolveResult<CoordinateMap> {
        self.check_sizes(depth, color_size)?;

        let width = self.depth_size.width as usize;
        let mut points = vec![MappedPoint::INVALID; self.depth_size.pixel_count()];
        if width > 0 {
            points
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(v, row)| {
                    let samples = depth.row(v as u32);
                    for (u, (dst, &depth_mm)) in row.iter_mut().zip(samples).enumerate() {
                        if let Some((x, y, _)) =
                            self.project_depth_pixel(u as f32, v as f32, depth_mm)
                        {
                            *dst = MappedPoint::new(x, y);
                        }
                    }
                });
        }

        CoordinateMap::new(self.depth_size, color_size, points)
    }

    fn map_color_to_depth(
        &self,
        depth: &DepthFrame,
        color_size: FrameSize,
    ) -> ResolveResult<CoordinateMap> {
        self.check_sizes(depth, color_size)?;

        // Splat every depth pixel over the color pixels it covers, keeping
        // the nearest surface where footprints overlap
        let mut map = CoordinateMap::unmapped(color_size, self.depth_size);
        let mut nearest = vec![f32::INFINITY; color_size.pixel_count()];
        let color_width = color_size.width as usize;

        for v in 0..self.depth_size.height {
            for (u, &depth_mm) in depth.row(v).iter().enumerate() {
                let Some(fp) = self.footprint(u as u32, v, depth_mm) else {
                    continue;
                };

                let x_start = fp.min_x.ceil().max(0.0) as u32;
                let x_end = fp.max_x.ceil().clamp(0.0, color_size.width as f32) as u32;
                let y_start = fp.min_y.ceil().max(0.0) as u32;
                let y_end = fp.max_y.ceil().clamp(0.0, color_size.height as f32) as u32;

                let span_x = fp.max_x - fp.min_x;
                let span_y = fp.max_y - fp.min_y;

                for cy in y_start..y_end {
                    for cx in x_start..x_end {
                        let idx = cy as usize * color_width + cx as usize;
                        if fp.z >= nearest[idx] {
                            continue;
                        }
                        nearest[idx] = fp.z;
                        let frac_x = (cx as f32 - fp.min_x) / span_x;
                        let frac_y = (cy as f32 - fp.min_y) / span_y;
                        map.points_mut()[idx] =
                            MappedPoint::new(u as f32 - 0.5 + frac_x, v as f32 - 0.5 + frac_y);
                    }
                }
            }
        }

        Ok(map)
    }
}
