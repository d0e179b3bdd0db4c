// SPDX-License-Identifier: GPL-3.0-only

//! Replay a recorded session directory as a live source
//!
//! Uses the `color_unmapped_NNN` and `depth_NNN` artifacts of a session
//! recorded in color-to-depth mode, where both are raw sensor frames. Frames
//! are delivered in index order at the configured rate and the sequence
//! loops when it reaches the end.

use super::types::{ColorFrame, DepthFrame, Frame, FrameSize};
use super::FrameSource;
use crate::errors::SensorError;
use crate::pipelines::recorder::artifacts::{
    artifact_size, parse_artifact_name, read_color_artifact, read_depth_artifact, ArtifactKind,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One recorded frame pair
#[derive(Debug, Clone)]
struct ReplayFrame {
    index: u32,
    color: PathBuf,
    depth: PathBuf,
}

/// Playback cursor for one stream
#[derive(Debug, Default)]
struct Cursor {
    position: usize,
    last: Option<Instant>,
}

impl Cursor {
    /// Claim the next position if the stream is due
    fn advance(&mut self, period: Duration, len: usize) -> Option<usize> {
        if !period.is_zero() && self.last.is_some_and(|at| at.elapsed() < period) {
            return None;
        }
        self.last = Some(Instant::now());
        let position = self.position;
        self.position = (self.position + 1) % len;
        Some(position)
    }
}

/// Frame source backed by a recorded session directory
pub struct ReplaySource {
    name: String,
    frames: Vec<ReplayFrame>,
    color_size: FrameSize,
    depth_size: FrameSize,
    period: Duration,
    color_cursor: Cursor,
    depth_cursor: Cursor,
}

impl ReplaySource {
    /// Open a session directory
    ///
    /// Fails when the directory cannot be read or holds no complete
    /// `color_unmapped` + `depth` pair.
    pub fn open(dir: &Path, framerate: u32) -> Result<Self, SensorError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| SensorError::OpenFailed(format!("{}: {}", dir.display(), e)))?;

        let mut pairs: BTreeMap<u32, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some((kind, index, _)) = file_name.to_str().and_then(parse_artifact_name) else {
                continue;
            };
            let slot = pairs.entry(index).or_default();
            match kind {
                ArtifactKind::ColorUnmapped => slot.0 = Some(entry.path()),
                ArtifactKind::Depth => slot.1 = Some(entry.path()),
                ArtifactKind::Color => {}
            }
        }

        let frames: Vec<ReplayFrame> = pairs
            .into_iter()
            .filter_map(|(index, pair)| match pair {
                (Some(color), Some(depth)) => Some(ReplayFrame {
                    index,
                    color,
                    depth,
                }),
                _ => None,
            })
            .collect();

        let Some(first) = frames.first() else {
            return Err(SensorError::OpenFailed(format!(
                "{}: no recorded frame pairs",
                dir.display()
            )));
        };

        let color_size = artifact_size(&first.color)?;
        let depth_size = artifact_size(&first.depth)?;
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

        info!(
            dir = %dir.display(),
            frames = frames.len(),
            color = %color_size,
            depth = %depth_size,
            "Opened replay session"
        );

        Ok(Self {
            name: format!("replay:{}", dir.display()),
            frames,
            color_size,
            depth_size,
            period,
            color_cursor: Cursor::default(),
            depth_cursor: Cursor::default(),
        })
    }

    /// Number of frame pairs in the session
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop frames that fail to decode or disagree with the stream size
    fn checked<P: Copy + Default>(
        result: Result<Frame<P>, SensorError>,
        expected: FrameSize,
        index: u32,
    ) -> Option<Frame<P>> {
        match result {
            Ok(frame) if frame.size() == expected => Some(frame),
            Ok(frame) => {
                warn!(
                    index,
                    error = %SensorError::SizeMismatch { expected, actual: frame.size() },
                    "Skipping replay frame"
                );
                None
            }
            Err(e) => {
                warn!(index, error = %e, "Skipping replay frame");
                None
            }
        }
    }
}

impl FrameSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn color_size(&self) -> FrameSize {
        self.color_size
    }

    fn depth_size(&self) -> FrameSize {
        self.depth_size
    }

    fn try_acquire_color(&mut self) -> Option<ColorFrame> {
        let position = self.color_cursor.advance(self.period, self.frames.len())?;
        let frame = &self.frames[position];
        Self::checked(read_color_artifact(&frame.color), self.color_size, frame.index)
    }

    fn try_acquire_depth(&mut self) -> Option<DepthFrame> {
        let position = self.depth_cursor.advance(self.period, self.frames.len())?;
        let frame = &self.frames[position];
        Self::checked(read_depth_artifact(&frame.depth), self.depth_size, frame.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::recorder::artifacts::{
        artifact_file_name, write_color_artifact, write_depth_artifact, EncodingFormat,
    };

    fn write_pair(dir: &Path, index: u32, depth_mm: u16) {
        let color = ColorFrame::filled(FrameSize::new(8, 6), [1, 2, 3, 255]);
        let depth = DepthFrame::filled(FrameSize::new(4, 3), depth_mm);
        let format = EncodingFormat::Png;
        write_color_artifact(
            &dir.join(artifact_file_name(ArtifactKind::ColorUnmapped, index, format)),
            &color,
            format,
        )
        .unwrap();
        write_depth_artifact(
            &dir.join(artifact_file_name(ArtifactKind::Depth, index, format)),
            &depth,
            format,
        )
        .unwrap();
    }

    #[test]
    fn test_empty_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReplaySource::open(dir.path(), 0),
            Err(SensorError::OpenFailed(_))
        ));
    }

    #[test]
    fn test_replays_in_order_and_loops() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), 1, 1100);
        write_pair(dir.path(), 0, 1000);
        // Unpaired depth is ignored
        let lone = DepthFrame::filled(FrameSize::new(4, 3), 9999);
        write_depth_artifact(
            &dir.path().join("depth_002.png"),
            &lone,
            EncodingFormat::Png,
        )
        .unwrap();

        let mut source = ReplaySource::open(dir.path(), 0).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.color_size(), FrameSize::new(8, 6));
        assert_eq!(source.depth_size(), FrameSize::new(4, 3));

        let values: Vec<u16> = (0..3)
            .map(|_| source.try_acquire_depth().unwrap().pixel(0, 0))
            .collect();
        assert_eq!(values, vec![1000, 1100, 1000]);
        assert_eq!(source.try_acquire_color().unwrap().pixel(0, 0), [1, 2, 3, 255]);
    }
}
