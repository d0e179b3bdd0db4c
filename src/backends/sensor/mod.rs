// SPDX-License-Identifier: MPL-2.0

//! Depth sensor abstraction
//!
//! The alignment pipeline only talks to a sensor through two capabilities:
//!
//! ```text
//! ┌──────────────────────┐     raw color / depth      ┌──────────────────┐
//! │  FrameSource         │ ─────────────────────────▶ │ AlignmentEngine  │
//! │  (non-blocking)      │                            │                  │
//! └──────────────────────┘                            │                  │
//! ┌──────────────────────┐     CoordinateMap          │                  │
//! │  SpatialResolver     │ ─────────────────────────▶ │                  │
//! │  (calibration)       │                            └──────────────────┘
//! └──────────────────────┘
//! ```
//!
//! Concrete implementations:
//! - [`synthetic::SyntheticSource`]: generated scene, no hardware required
//! - [`replay::ReplaySource`]: replays a recorded session directory
//! - [`calibration::PinholeResolver`]: pinhole + rigid transform resolver

pub mod calibration;
pub mod replay;
pub mod synthetic;
pub mod types;

pub use calibration::{Extrinsics, Intrinsics, PinholeResolver, SensorCalibration};
pub use replay::ReplaySource;
pub use synthetic::SyntheticSource;
pub use types::*;

use crate::errors::ResolveError;

/// Result type for resolver operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Live provider of the most recent raw color and depth buffers
///
/// Both acquisitions are non-blocking: `None` means "no new frame since the
/// last call", never an error. Stream sizes are fixed for the lifetime of
/// the source.
pub trait FrameSource {
    /// Human readable source name for logging
    fn name(&self) -> &str;

    /// Resolution of the color stream
    fn color_size(&self) -> FrameSize;

    /// Resolution of the depth stream
    fn depth_size(&self) -> FrameSize;

    /// Latest color frame, if a new one is ready
    fn try_acquire_color(&mut self) -> Option<ColorFrame>;

    /// Latest depth frame, if a new one is ready
    fn try_acquire_depth(&mut self) -> Option<DepthFrame>;
}

/// Calibration-backed mapping between the depth and color grids
///
/// Both directions are driven by depth samples because distance is needed
/// to resolve the projection.
pub trait SpatialResolver: Send + Sync {
    /// For every depth pixel, its position in the color grid
    ///
    /// The returned map's domain is the depth grid.
    fn map_depth_to_color(
        &self,
        depth: &DepthFrame,
        color_size: FrameSize,
    ) -> ResolveResult<CoordinateMap>;

    /// For every color pixel, its position in the depth grid
    ///
    /// The returned map's domain is the color grid.
    fn map_color_to_depth(
        &self,
        depth: &DepthFrame,
        color_size: FrameSize,
    ) -> ResolveResult<CoordinateMap>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn color_size(&self) -> FrameSize {
        (**self).color_size()
    }

    fn depth_size(&self) -> FrameSize {
        (**self).depth_size()
    }

    fn try_acquire_color(&mut self) -> Option<ColorFrame> {
        (**self).try_acquire_color()
    }

    fn try_acquire_depth(&mut self) -> Option<DepthFrame> {
        (**self).try_acquire_depth()
    }
}

impl<R: SpatialResolver + ?Sized> SpatialResolver for Box<R> {
    fn map_depth_to_color(
        &self,
        depth: &DepthFrame,
        color_size: FrameSize,
    ) -> ResolveResult<CoordinateMap> {
        (**self).map_depth_to_color(depth, color_size)
    }

    fn map_color_to_depth(
        &self,
        depth: &DepthFrame,
        color_size: FrameSize,
    ) -> ResolveResult<CoordinateMap> {
        (**self).map_color_to_depth(depth, color_size)
    }
}
