// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for depth sensors
//!
//! # Architecture
//!
//! The backend layer abstracts hardware access, so the alignment pipeline
//! sees the same API whether frames come from a device, a generated scene
//! or a recorded session:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           Control loop / pipelines           │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │ FrameSource │    │ SpatialResolver  │   │
//! │  │ synthetic / │    │    (pinhole)     │   │
//! │  │   replay    │    │                  │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`sensor`]: frame types, source and resolver traits, implementations

pub mod sensor;
