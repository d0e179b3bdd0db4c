// SPDX-License-Identifier: GPL-3.0-only

//! Color/depth alignment
//!
//! Re-expresses one stream on the other stream's pixel grid using a
//! [`CoordinateMap`] from the [`SpatialResolver`]. For every position of the
//! map's domain grid the target coordinate is rounded to the nearest pixel;
//! in-bounds positions copy the sampled pixel, everything else stays at the
//! default value (a coverage hole).
//!
//! The remap runs one rayon task per output row. Rows are written by exactly
//! one task and inputs are read-only, so no locking is involved.

use crate::backends::sensor::{
    ColorFrame, CoordinateMap, DepthFrame, Frame, FrameSize, ResolveResult, SpatialResolver,
};
use crate::errors::{ResolveError, SensorError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which stream is re-expressed on which grid
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentDirection {
    /// Color re-expressed on the depth grid
    #[default]
    ColorToDepth,
    /// Depth re-expressed on the color grid
    DepthToColor,
}

impl std::fmt::Display for AlignmentDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignmentDirection::ColorToDepth => write!(f, "color-to-depth"),
            AlignmentDirection::DepthToColor => write!(f, "depth-to-color"),
        }
    }
}

/// Result of one alignment
#[derive(Debug, Clone)]
pub enum AlignedFrame {
    /// Color pixels on the depth grid
    Color(ColorFrame),
    /// Depth samples on the color grid
    Depth(DepthFrame),
}

impl AlignedFrame {
    pub fn size(&self) -> FrameSize {
        match self {
            AlignedFrame::Color(frame) => frame.size(),
            AlignedFrame::Depth(frame) => frame.size(),
        }
    }
}

/// Copy pixels of `sampled` onto the map's domain grid
///
/// Map entries that round outside `sampled` (or are not finite) leave the
/// output pixel at `P::default()`.
pub fn remap<P>(map: &CoordinateMap, sampled: &Frame<P>) -> Frame<P>
where
    P: Copy + Default + Send + Sync,
{
    let domain = map.domain();
    let bounds = sampled.size();
    let width = domain.width as usize;

    let mut pixels = vec![P::default(); domain.pixel_count()];
    if width > 0 {
        pixels
            .par_chunks_mut(width)
            .zip(map.points().par_chunks(width))
            .for_each(|(out_row, map_row)| {
                for (dst, point) in out_row.iter_mut().zip(map_row) {
                    if let Some((x, y)) = point.round_to_pixel(bounds) {
                        *dst = sampled.pixel(x, y);
                    }
                }
            });
    }

    Frame::from_pixels(domain, pixels)
}

/// Align one color/depth pair
///
/// Calls the resolver exactly once. Raw buffers are never modified.
pub fn align<R>(
    color: &ColorFrame,
    depth: &DepthFrame,
    resolver: &R,
    direction: AlignmentDirection,
) -> ResolveResult<AlignedFrame>
where
    R: SpatialResolver + ?Sized,
{
    match direction {
        AlignmentDirection::ColorToDepth => {
            let map = resolver.map_depth_to_color(depth, color.size())?;
            check_target(&map, color.size())?;
            Ok(AlignedFrame::Color(remap(&map, color)))
        }
        AlignmentDirection::DepthToColor => {
            let map = resolver.map_color_to_depth(depth, color.size())?;
            check_target(&map, depth.size())?;
            Ok(AlignedFrame::Depth(remap(&map, depth)))
        }
    }
}

fn check_target(map: &CoordinateMap, sampled: FrameSize) -> ResolveResult<()> {
    if map.target() == sampled {
        Ok(())
    } else {
        Err(ResolveError::TargetSize {
            expected: sampled,
            actual: map.target(),
        })
    }
}

/// Everything the display and the recorder consume from one alignment
#[derive(Debug, Clone)]
pub struct AlignedOutput {
    /// Engine tick that produced this output
    pub tick: u64,
    pub direction: AlignmentDirection,
    /// Aligned color (color-to-depth) or raw color (depth-to-color)
    pub color: ColorFrame,
    /// Raw color frame
    pub color_unmapped: ColorFrame,
    /// Raw depth (color-to-depth) or aligned depth (depth-to-color)
    pub depth: DepthFrame,
}

/// Stateful per-tick alignment
///
/// Keeps the last good frame of each stream, so a tick where one stream has
/// nothing new still aligns against the previous frame. Output only exists
/// once both streams delivered at least once.
pub struct AlignmentEngine<R> {
    resolver: R,
    direction: AlignmentDirection,
    color_size: FrameSize,
    depth_size: FrameSize,
    color: Option<ColorFrame>,
    depth: Option<DepthFrame>,
    /// New input (or a direction change) since the last successful alignment
    dirty: bool,
    ticks: u64,
    output: Option<AlignedOutput>,
}

impl<R: SpatialResolver> AlignmentEngine<R> {
    pub fn new(
        resolver: R,
        direction: AlignmentDirection,
        color_size: FrameSize,
        depth_size: FrameSize,
    ) -> Self {
        Self {
            resolver,
            direction,
            color_size,
            depth_size,
            color: None,
            depth: None,
            dirty: false,
            ticks: 0,
            output: None,
        }
    }

    pub fn direction(&self) -> AlignmentDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: AlignmentDirection) {
        if direction != self.direction {
            debug!(%direction, "Alignment direction changed");
            self.direction = direction;
            self.dirty = true;
        }
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Accept a new color frame; frames of the wrong size are rejected
    pub fn ingest_color(&mut self, frame: ColorFrame) -> bool {
        if !Self::size_ok("color", self.color_size, frame.size()) {
            return false;
        }
        self.color = Some(frame);
        self.dirty = true;
        true
    }

    /// Accept a new depth frame; frames of the wrong size are rejected
    pub fn ingest_depth(&mut self, frame: DepthFrame) -> bool {
        if !Self::size_ok("depth", self.depth_size, frame.size()) {
            return false;
        }
        self.depth = Some(frame);
        self.dirty = true;
        true
    }

    fn size_ok(stream: &str, expected: FrameSize, actual: FrameSize) -> bool {
        if expected == actual {
            return true;
        }
        warn!(
            stream,
            error = %SensorError::SizeMismatch { expected, actual },
            "Rejecting frame"
        );
        false
    }

    /// Run one tick and return the current output
    ///
    /// Alignment is recomputed only when something changed since the last
    /// success; the same inputs always give the same output. A resolver
    /// failure keeps the previous output and retries on the next tick.
    pub fn tick(&mut self) -> Option<&AlignedOutput> {
        let tick = self.ticks;
        self.ticks += 1;

        if self.dirty
            && let (Some(color), Some(depth)) = (&self.color, &self.depth)
        {
            match align(color, depth, &self.resolver, self.direction) {
                Ok(aligned) => {
                    self.output = Some(Self::compose(tick, self.direction, color, depth, aligned));
                    self.dirty = false;
                }
                Err(e) => debug!(tick, error = %e, "Alignment skipped"),
            }
        }

        self.output.as_ref()
    }

    fn compose(
        tick: u64,
        direction: AlignmentDirection,
        color: &ColorFrame,
        depth: &DepthFrame,
        aligned: AlignedFrame,
    ) -> AlignedOutput {
        match aligned {
            AlignedFrame::Color(aligned_color) => AlignedOutput {
                tick,
                direction,
                color: aligned_color,
                color_unmapped: color.clone(),
                depth: depth.clone(),
            },
            AlignedFrame::Depth(aligned_depth) => AlignedOutput {
                tick,
                direction,
                color: color.clone(),
                color_unmapped: color.clone(),
                depth: aligned_depth,
            },
        }
    }

    /// Output of the most recent successful alignment
    pub fn output(&self) -> Option<&AlignedOutput> {
        self.output.as_ref()
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}
