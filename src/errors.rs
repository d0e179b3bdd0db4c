// SPDX-License-Identifier: MPL-2.0

//! Error types for the alignment viewer
//!
//! Errors fall into three groups that are handled at different layers:
//!
//! - [`SensorError`]: device-fatal, aborts startup before the main loop
//! - [`ResolveError`]: tick-transient, the tick reuses the previous output
//! - [`RecordingError`]: persistence-soft writes are logged by the recorder,
//!   state errors are returned to the control loop

use crate::backends::sensor::FrameSize;
use std::fmt;
use std::path::PathBuf;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Sensor/device errors
    Sensor(SensorError),
    /// Recording errors
    Recording(RecordingError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Terminal/display errors
    Display(String),
}

/// Frame source errors
#[derive(Debug, Clone)]
pub enum SensorError {
    /// Device could not be opened or reported not ready
    OpenFailed(String),
    /// Configured resolution is unusable
    InvalidResolution(FrameSize),
    /// Buffer length does not match the declared frame size
    BufferSize { expected: usize, actual: usize },
    /// Frame delivered with a different size than the stream was opened with
    SizeMismatch { expected: FrameSize, actual: FrameSize },
    /// Recorded frame could not be decoded
    Decode { path: PathBuf, reason: String },
}

/// Spatial resolver errors (whole-tick failures)
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// Depth frame does not match the calibration's depth grid
    DepthSize { expected: FrameSize, actual: FrameSize },
    /// Requested color grid does not match the calibration's color grid
    ColorSize { expected: FrameSize, actual: FrameSize },
    /// Map has the wrong number of points for its domain
    MapLength { expected: usize, actual: usize },
    /// Map points into a grid other than the frame being sampled
    TargetSize { expected: FrameSize, actual: FrameSize },
    /// Resolver has no mapping available this tick
    Unavailable(String),
}

/// Recording errors
#[derive(Debug, Clone)]
pub enum RecordingError {
    /// A session is already open
    AlreadyRecording,
    /// No session is open
    NoRecordingInProgress,
    /// Writing one artifact failed
    Write { path: PathBuf, reason: String },
    /// Writing the session summary failed
    Summary { path: PathBuf, reason: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Sensor(e) => write!(f, "Sensor error: {}", e),
            AppError::Recording(e) => write!(f, "Recording error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Display(msg) => write!(f, "Display error: {}", msg),
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::OpenFailed(msg) => write!(f, "Failed to open sensor: {}", msg),
            SensorError::InvalidResolution(size) => write!(f, "Invalid resolution: {}", size),
            SensorError::BufferSize { expected, actual } => write!(
                f,
                "Buffer holds {} pixels, frame needs {}",
                actual, expected
            ),
            SensorError::SizeMismatch { expected, actual } => {
                write!(f, "Frame is {}, stream is {}", actual, expected)
            }
            SensorError::Decode { path, reason } => {
                write!(f, "Failed to decode {}: {}", path.display(), reason)
            }
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::DepthSize { expected, actual } => {
                write!(f, "Depth frame is {}, calibration expects {}", actual, expected)
            }
            ResolveError::ColorSize { expected, actual } => {
                write!(f, "Color grid is {}, calibration expects {}", actual, expected)
            }
            ResolveError::MapLength { expected, actual } => {
                write!(f, "Coordinate map has {} points, expected {}", actual, expected)
            }
            ResolveError::TargetSize { expected, actual } => {
                write!(f, "Coordinate map targets {}, sampled frame is {}", actual, expected)
            }
            ResolveError::Unavailable(msg) => write!(f, "No mapping available: {}", msg),
        }
    }
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::AlreadyRecording => write!(f, "Recording already in progress"),
            RecordingError::NoRecordingInProgress => write!(f, "No recording in progress"),
            RecordingError::Write { path, reason } => {
                write!(f, "Failed to write {}: {}", path.display(), reason)
            }
            RecordingError::Summary { path, reason } => {
                write!(f, "Failed to write summary {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for SensorError {}
impl std::error::Error for ResolveError {}
impl std::error::Error for RecordingError {}

// Conversions from sub-errors to AppError
impl From<SensorError> for AppError {
    fn from(err: SensorError) -> Self {
        AppError::Sensor(err)
    }
}

impl From<RecordingError> for AppError {
    fn from(err: RecordingError) -> Self {
        AppError::Recording(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_error_wraps_into_app_error() {
        let err: AppError = SensorError::InvalidResolution(FrameSize::new(0, 424)).into();
        assert_eq!(err.to_string(), "Sensor error: Invalid resolution: 0x424");
    }

    #[test]
    fn test_write_error_names_path() {
        let err = RecordingError::Write {
            path: PathBuf::from("Recorder/x/depth_000.png"),
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("depth_000.png"));
        assert!(err.to_string().contains("disk full"));
    }
}
