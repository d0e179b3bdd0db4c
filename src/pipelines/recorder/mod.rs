// SPDX-License-Identifier: GPL-3.0-only

//! Throttled recording of aligned and raw frames
//!
//! The recorder counts every control-loop tick. While a session is open,
//! each tick where the counter wraps to zero is sampled and persisted as
//! three artifacts (see [`artifacts`]). Stopping a session writes its
//! [`SessionSummary`].
//!
//! Writes are synchronous on the calling thread. A failed write is logged
//! and never interrupts the live path; the frame index still advances so
//! indices are never reused within a session.

pub mod artifacts;
pub mod session;

pub use artifacts::{ArtifactKind, EncodingFormat};
pub use session::{RecordingSession, SessionId, SessionSummary};

use crate::constants::{recording::DEFAULT_OUTPUT_ROOT, timing::RECORD_DECIMATION};
use crate::errors::RecordingError;
use crate::pipelines::alignment::AlignedOutput;
use artifacts::{artifact_file_name, write_color_artifact, write_depth_artifact};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Recorder settings
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// Directory receiving one sub-directory per session
    pub output_root: PathBuf,
    pub format: EncodingFormat,
    /// Sample every Nth tick
    pub decimation: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            format: EncodingFormat::default(),
            decimation: RECORD_DECIMATION,
        }
    }
}

/// What a toggle did
#[derive(Debug, Clone)]
pub enum Toggled {
    /// A session opened in this directory
    Started(PathBuf),
    /// The open session was closed
    Stopped(SessionSummary),
}

/// Idle/Recording state machine plus the decimation counter
#[derive(Debug)]
pub struct Recorder {
    config: RecorderConfig,
    session: Option<RecordingSession>,
    /// Tick counter modulo `decimation`, runs whether or not recording
    increment: u32,
}

impl Recorder {
    pub fn new(mut config: RecorderConfig) -> Self {
        config.decimation = config.decimation.max(1);
        Self {
            config,
            session: None,
            increment: 0,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Open a session named after the current local time
    pub fn start(&mut self) -> Result<&RecordingSession, RecordingError> {
        self.start_with_id(SessionId::now())
    }

    pub fn start_with_id(&mut self, id: SessionId) -> Result<&RecordingSession, RecordingError> {
        if self.session.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }
        let session = RecordingSession::open(&self.config.output_root, id);
        Ok(&*self.session.insert(session))
    }

    /// Close the open session and write its summary
    pub fn stop(&mut self) -> Result<SessionSummary, RecordingError> {
        let session = self
            .session
            .take()
            .ok_or(RecordingError::NoRecordingInProgress)?;
        let summary = session.summary();

        if let Err(e) = summary.write_to(session.dir()) {
            warn!(error = %e, "Failed to write session summary");
        }
        info!(
            session = %session.id(),
            frames = summary.frames_taken,
            seconds = summary.recorded_seconds,
            "Recording stopped"
        );
        Ok(summary)
    }

    /// Start when idle, stop when recording
    pub fn toggle(&mut self) -> Result<Toggled, RecordingError> {
        if self.is_recording() {
            self.stop().map(Toggled::Stopped)
        } else {
            self.start()
                .map(|session| Toggled::Started(session.dir().to_path_buf()))
        }
    }

    /// Count one tick and persist it if it is sampled
    ///
    /// Returns the frame index written. A sampled tick without output (the
    /// engine has not aligned anything yet) is skipped.
    pub fn on_tick(&mut self, output: Option<&AlignedOutput>) -> Option<u32> {
        self.increment = (self.increment + 1) % self.config.decimation;
        if self.increment != 0 {
            return None;
        }
        let output = output?;
        let format = self.config.format;
        let session = self.session.as_mut()?;
        Some(write_frame(session, output, format))
    }

    /// Persist `output` immediately, ignoring decimation
    pub fn capture(&mut self, output: &AlignedOutput) -> Result<u32, RecordingError> {
        let format = self.config.format;
        let session = self
            .session
            .as_mut()
            .ok_or(RecordingError::NoRecordingInProgress)?;
        Ok(write_frame(session, output, format))
    }
}

/// Write the three artifacts of one frame
fn write_frame(session: &mut RecordingSession, output: &AlignedOutput, format: EncodingFormat) -> u32 {
    let index = session.next_index();
    let dir = session.dir();

    ArtifactKind::ALL.par_iter().for_each(|&kind| {
        let path = dir.join(artifact_file_name(kind, index, format));
        let result = match kind {
            ArtifactKind::Color => write_color_artifact(&path, &output.color, format),
            ArtifactKind::ColorUnmapped => {
                write_color_artifact(&path, &output.color_unmapped, format)
            }
            ArtifactKind::Depth => write_depth_artifact(&path, &output.depth, format),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to write artifact");
        }
    });

    debug!(index, tick = output.tick, "Frame recorded");
    index
}
