// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for aligned depth capture
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────────┐
//! │ Color frame  │ ──▶ │ Alignment engine  │ ──▶ │ Display sink     │
//! │ Depth frame  │     │  - resolver map   │     │                  │
//! │              │     │  - row-parallel   │     ├──────────────────┤
//! │              │     │    remap          │ ──▶ │ Recorder         │
//! └──────────────┘     └───────────────────┘     │  - decimation    │
//!                                                │  - PNG/TIFF      │
//!                                                └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`alignment`]: direction, remap and the stateful per-tick engine
//! - [`recorder`]: session state machine and artifact persistence

pub mod alignment;
pub mod recorder;

pub use alignment::{AlignedFrame, AlignedOutput, AlignmentDirection, AlignmentEngine};
pub use recorder::{Recorder, RecorderConfig};
