// SPDX-License-Identifier: GPL-3.0-only

//! Recording sessions and their summary record

use crate::constants::recording::{SESSION_ID_FORMAT, SUMMARY_FILE_NAME};
use crate::errors::RecordingError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Filesystem-safe session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Id from the current local time
    pub fn now() -> Self {
        Self(chrono::Local::now().format(SESSION_ID_FORMAT).to_string())
    }

    /// Id from an arbitrary string; path separators and characters that are
    /// illegal on common filesystems become `-`
    pub fn new(id: impl AsRef<str>) -> Self {
        let cleaned: String = id
            .as_ref()
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
                c if c.is_control() => '-',
                c => c,
            })
            .collect();
        if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
            Self("session".to_string())
        } else {
            Self(cleaned)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session record written when recording stops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    #[serde(rename = "RecordSeconds")]
    pub recorded_seconds: f64,
    #[serde(rename = "FramesTaken")]
    pub frames_taken: u32,
    /// Reserved, always empty
    #[serde(rename = "Range", default)]
    pub range: String,
}

impl SessionSummary {
    /// Average sampled frames per second over the session
    pub fn frames_per_second(&self) -> f64 {
        if self.recorded_seconds > 0.0 {
            self.frames_taken as f64 / self.recorded_seconds
        } else {
            0.0
        }
    }

    /// Write `recordLog.json` into `dir`
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, RecordingError> {
        let path = dir.join(SUMMARY_FILE_NAME);
        let summary_error = |reason: String| RecordingError::Summary {
            path: path.clone(),
            reason,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| summary_error(e.to_string()))?;
        fs::write(&path, json).map_err(|e| summary_error(e.to_string()))?;
        Ok(path)
    }

    /// Read `recordLog.json` from `dir`
    pub fn read_from(dir: &Path) -> Result<Self, RecordingError> {
        let path = dir.join(SUMMARY_FILE_NAME);
        let summary_error = |reason: String| RecordingError::Summary {
            path: path.clone(),
            reason,
        };
        let json = fs::read_to_string(&path).map_err(|e| summary_error(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| summary_error(e.to_string()))
    }
}

/// Claim `<root>/<id>`, or `<root>/<id>-N` when that already exists
fn create_session_dir(root: &Path, id: &SessionId) -> io::Result<PathBuf> {
    fs::create_dir_all(root)?;
    for attempt in 0u32..1000 {
        let name = match attempt {
            0 => id.to_string(),
            n => format!("{}-{}", id, n),
        };
        let dir = root.join(name);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::other(format!(
        "no free directory name for session {}",
        id
    )))
}

/// One open recording session
#[derive(Debug)]
pub struct RecordingSession {
    id: SessionId,
    dir: PathBuf,
    frames_taken: u32,
    started: Instant,
}

impl RecordingSession {
    /// Open a session under `output_root`
    ///
    /// A directory that cannot be created is logged and the session opens
    /// anyway; its artifact writes then fail individually.
    pub fn open(output_root: &Path, id: SessionId) -> Self {
        let dir = match create_session_dir(output_root, &id) {
            Ok(dir) => dir,
            Err(e) => {
                let dir = output_root.join(id.as_str());
                warn!(dir = %dir.display(), error = %e, "Failed to create session directory");
                dir
            }
        };
        info!(session = %id, dir = %dir.display(), "Recording started");
        Self {
            id,
            dir,
            frames_taken: 0,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames_taken(&self) -> u32 {
        self.frames_taken
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Claim the next frame index
    pub(crate) fn next_index(&mut self) -> u32 {
        let index = self.frames_taken;
        self.frames_taken += 1;
        index
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            recorded_seconds: self.elapsed().as_secs_f64(),
            frames_taken: self.frames_taken,
            range: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_filesystem_safe() {
        assert_eq!(SessionId::new("2024-05-01 12:30:00").as_str(), "2024-05-01 12-30-00");
        assert_eq!(SessionId::new("../x").as_str(), "..-x");
        assert_eq!(SessionId::new("  ").as_str(), "session");
        assert_eq!(SessionId::new("..").as_str(), "session");
        assert!(!SessionId::now().as_str().contains(':'));
    }

    #[test]
    fn test_summary_keys() {
        let summary = SessionSummary {
            recorded_seconds: 1.5,
            frames_taken: 15,
            range: String::new(),
        };
        let json: serde_json::Value = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["RecordSeconds"], 1.5);
        assert_eq!(json["FramesTaken"], 15);
        assert_eq!(json["Range"], "");
        assert!((summary.frames_per_second() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_session_gets_suffix() {
        let root = tempfile::tempdir().unwrap();
        let id = SessionId::new("2024-01-01-000000");
        let first = RecordingSession::open(root.path(), id.clone());
        let second = RecordingSession::open(root.path(), id);
        assert_eq!(first.dir(), root.path().join("2024-01-01-000000"));
        assert_eq!(second.dir(), root.path().join("2024-01-01-000000-1"));
        assert!(second.dir().is_dir());
    }

    #[test]
    fn test_indices_are_monotonic() {
        let root = tempfile::tempdir().unwrap();
        let mut session = RecordingSession::open(root.path(), SessionId::new("s"));
        assert_eq!(session.next_index(), 0);
        assert_eq!(session.next_index(), 1);
        assert_eq!(session.summary().frames_taken, 2);
    }
}
