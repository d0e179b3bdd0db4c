// SPDX-License-Identifier: MPL-2.0

//! Depth Align - live color/depth alignment for depth cameras
//!
//! This library re-expresses one sensor stream on the other stream's pixel
//! grid every tick, shows both streams and optionally records throttled
//! snapshots of aligned and raw frames.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame sources and spatial resolvers
//! - [`pipelines`]: Alignment engine and recorder
//! - [`display`]: Display sinks and 8-bit conversions
//! - [`control`]: The fixed-rate control loop and key handling
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use depth_align::backends::sensor::{FrameSource, PinholeResolver, SensorCalibration, SyntheticSource};
//! use depth_align::pipelines::{AlignmentDirection, AlignmentEngine};
//!
//! let calibration = SensorCalibration::default();
//! let mut source = SyntheticSource::new(
//!     calibration.color_size,
//!     calibration.depth_size,
//!     &calibration,
//!     0,
//! )?;
//! let resolver = PinholeResolver::new(&calibration);
//! let mut engine = AlignmentEngine::new(
//!     resolver,
//!     AlignmentDirection::ColorToDepth,
//!     source.color_size(),
//!     source.depth_size(),
//! );
//! engine.ingest_color(source.try_acquire_color().unwrap());
//! engine.ingest_depth(source.try_acquire_depth().unwrap());
//! let output = engine.tick().unwrap();
//! assert_eq!(output.color.size(), source.depth_size());
//! # Ok::<(), depth_align::errors::SensorError>(())
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod control;
pub mod display;
pub mod errors;
pub mod pipelines;

// Re-export commonly used types
pub use config::Config;
pub use control::{ControlKey, ControlLoop, KeySource, LoopReport, LoopSettings};
pub use errors::{AppError, AppResult};
pub use pipelines::{AlignedOutput, AlignmentDirection, AlignmentEngine, Recorder, RecorderConfig};
