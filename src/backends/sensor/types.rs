// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the sensor abstraction

//! Frame and coordinate-map containers shared by sources, resolvers and the
//! alignment pipeline

use crate::errors::{ResolveError, SensorError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// One color pixel as delivered by the sensor: B, G, R, A
pub type Bgra = [u8; 4];

/// Width and height of a pixel grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in the grid
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A dense row-major pixel grid
///
/// Pixel data is shared behind an `Arc` so that a frame can be handed to the
/// display and the recorder in the same tick without copying. Frames are never
/// mutated after construction; a new acquisition replaces the whole frame.
#[derive(Clone)]
pub struct Frame<P> {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[P]>,
    /// Timestamp when the frame was acquired or composed
    pub captured_at: Instant,
}

/// Raw color frame (BGRA, 8 bits per channel)
pub type ColorFrame = Frame<Bgra>;

/// Raw depth frame (millimetres)
pub type DepthFrame = Frame<u16>;

impl<P: Copy + Default> Frame<P> {
    /// Build a frame from row-major pixels, checking the length against `size`
    pub fn from_vec(size: FrameSize, pixels: Vec<P>) -> Result<Self, SensorError> {
        if pixels.len() != size.pixel_count() {
            return Err(SensorError::BufferSize {
                expected: size.pixel_count(),
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width: size.width,
            height: size.height,
            data: Arc::from(pixels),
            captured_at: Instant::now(),
        })
    }

    /// Build a frame from a buffer the caller sized from `size`
    pub(crate) fn from_pixels(size: FrameSize, pixels: Vec<P>) -> Self {
        debug_assert_eq!(pixels.len(), size.pixel_count());
        Self {
            width: size.width,
            height: size.height,
            data: Arc::from(pixels),
            captured_at: Instant::now(),
        }
    }

    /// Frame with every pixel set to `value`
    pub fn filled(size: FrameSize, value: P) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: Arc::from(vec![value; size.pixel_count()]),
            captured_at: Instant::now(),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Pixel at `(x, y)`; callers bounds-check against [`Frame::size`]
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> P {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Pixel at `(x, y)` or `None` when outside the grid
    pub fn get(&self, x: u32, y: u32) -> Option<P> {
        (x < self.width && y < self.height).then(|| self.pixel(x, y))
    }

    pub fn as_slice(&self) -> &[P] {
        &self.data
    }

    /// One row of pixels
    pub fn row(&self, y: u32) -> &[P] {
        let width = self.width as usize;
        let start = y as usize * width;
        &self.data[start..start + width]
    }
}

impl<P> std::fmt::Debug for Frame<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frame({}x{}, {} pixels)",
            self.width,
            self.height,
            self.data.len()
        )
    }
}

/// A floating-point position in another grid's pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MappedPoint {
    pub x: f32,
    pub y: f32,
}

impl MappedPoint {
    /// Marker for positions the resolver could not map
    pub const INVALID: MappedPoint = MappedPoint {
        x: f32::NAN,
        y: f32::NAN,
    };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Round to the nearest pixel (add 0.5, then truncate) and bounds-check
    ///
    /// Returns `None` for coordinates outside `[0, width) x [0, height)` and
    /// for NaN or infinite coordinates. Truncation goes toward zero, so
    /// coordinates in `(-1.5, -0.5]` still land on row or column 0.
    #[inline]
    pub fn round_to_pixel(&self, bounds: FrameSize) -> Option<(u32, u32)> {
        let x = (self.x + 0.5).trunc();
        let y = (self.y + 0.5).trunc();
        // NaN fails every comparison and is rejected here
        if x >= 0.0 && x < bounds.width as f32 && y >= 0.0 && y < bounds.height as f32 {
            Some((x as u32, y as u32))
        } else {
            None
        }
    }
}

/// Per-pixel mapping from a domain grid into a target grid
///
/// `points[y * domain.width + x]` is the position in the target grid that
/// corresponds to domain pixel `(x, y)`.
#[derive(Debug, Clone)]
pub struct CoordinateMap {
    domain: FrameSize,
    target: FrameSize,
    points: Vec<MappedPoint>,
}

impl CoordinateMap {
    pub fn new(
        domain: FrameSize,
        target: FrameSize,
        points: Vec<MappedPoint>,
    ) -> Result<Self, ResolveError> {
        if points.len() != domain.pixel_count() {
            return Err(ResolveError::MapLength {
                expected: domain.pixel_count(),
                actual: points.len(),
            });
        }
        Ok(Self {
            domain,
            target,
            points,
        })
    }

    /// Map where every entry is [`MappedPoint::INVALID`]
    pub fn unmapped(domain: FrameSize, target: FrameSize) -> Self {
        Self {
            domain,
            target,
            points: vec![MappedPoint::INVALID; domain.pixel_count()],
        }
    }

    /// Grid the map is defined over (shape of the aligned output)
    pub fn domain(&self) -> FrameSize {
        self.domain
    }

    /// Grid the mapped coordinates live in
    pub fn target(&self) -> FrameSize {
        self.target
    }

    pub fn points(&self) -> &[MappedPoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [MappedPoint] {
        &mut self.points
    }

    pub fn get(&self, x: u32, y: u32) -> Option<MappedPoint> {
        if x >= self.domain.width || y >= self.domain.height {
            return None;
        }
        Some(self.points[y as usize * self.domain.width as usize + x as usize])
    }

    pub fn set(&mut self, x: u32, y: u32, point: MappedPoint) {
        if x < self.domain.width && y < self.domain.height {
            self.points[y as usize * self.domain.width as usize + x as usize] = point;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        let bounds = FrameSize::new(20, 20);
        assert_eq!(MappedPoint::new(10.4, 7.5).round_to_pixel(bounds), Some((10, 8)));
        assert_eq!(MappedPoint::new(0.0, 0.49).round_to_pixel(bounds), Some((0, 0)));
    }

    #[test]
    fn test_round_rejects_out_of_bounds() {
        let bounds = FrameSize::new(20, 10);
        assert_eq!(MappedPoint::new(-3.2, 5.0).round_to_pixel(bounds), None);
        assert_eq!(MappedPoint::new(-1.6, 5.0).round_to_pixel(bounds), None);
        assert_eq!(MappedPoint::new(5.0, -1.5).round_to_pixel(bounds), None);
        assert_eq!(MappedPoint::new(19.5, 5.0).round_to_pixel(bounds), None);
        assert_eq!(MappedPoint::new(5.0, 9.6).round_to_pixel(bounds), None);
        assert_eq!(MappedPoint::new(19.4, 9.4).round_to_pixel(bounds), Some((19, 9)));
    }

    #[test]
    fn test_round_truncates_toward_zero_at_edges() {
        let bounds = FrameSize::new(1920, 1080);
        assert_eq!(MappedPoint::new(-0.7, 50.0).round_to_pixel(bounds), Some((0, 50)));
        assert_eq!(MappedPoint::new(10.0, -1.4).round_to_pixel(bounds), Some((10, 0)));
        assert_eq!(MappedPoint::new(-1.49, -1.49).round_to_pixel(bounds), Some((0, 0)));
    }

    #[test]
    fn test_round_rejects_non_finite() {
        let bounds = FrameSize::new(20, 10);
        assert_eq!(MappedPoint::INVALID.round_to_pixel(bounds), None);
        assert_eq!(
            MappedPoint::new(f32::INFINITY, 1.0).round_to_pixel(bounds),
            None
        );
        assert_eq!(
            MappedPoint::new(1.0, f32::NEG_INFINITY).round_to_pixel(bounds),
            None
        );
    }

    #[test]
    fn test_frame_length_checked() {
        let size = FrameSize::new(4, 2);
        assert!(DepthFrame::from_vec(size, vec![0u16; 8]).is_ok());
        assert!(matches!(
            DepthFrame::from_vec(size, vec![0u16; 7]),
            Err(SensorError::BufferSize {
                expected: 8,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_frame_pixel_access() {
        let size = FrameSize::new(3, 2);
        let frame = DepthFrame::from_vec(size, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(frame.pixel(2, 1), 6);
        assert_eq!(frame.get(3, 0), None);
        assert_eq!(frame.row(1), &[4, 5, 6]);
    }

    #[test]
    fn test_map_length_checked() {
        let domain = FrameSize::new(2, 2);
        let target = FrameSize::new(8, 8);
        assert!(CoordinateMap::new(domain, target, vec![MappedPoint::default(); 3]).is_err());
        let mut map = CoordinateMap::unmapped(domain, target);
        map.set(1, 1, MappedPoint::new(4.0, 4.0));
        assert_eq!(map.get(1, 1), Some(MappedPoint::new(4.0, 4.0)));
        assert!(!map.get(0, 0).unwrap().is_finite());
    }
}
