// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::sensor::{FrameSize, SensorCalibration};
use crate::constants::{app_info, display, recording, sensor, timing};
use crate::control::LoopSettings;
use crate::errors::{AppError, AppResult};
use crate::pipelines::alignment::AlignmentDirection;
use crate::pipelines::recorder::{EncodingFormat, RecorderConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Config file name inside the per-user config directory
const CONFIG_FILE_NAME: &str = "config.json";

/// Stream geometry for the built-in sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Color stream resolution
    pub color_size: FrameSize,
    /// Depth stream resolution
    pub depth_size: FrameSize,
    /// Delivery rate; 0 delivers a frame on every poll
    pub framerate: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            color_size: sensor::COLOR_SIZE,
            depth_size: sensor::DEPTH_SIZE,
            framerate: sensor::FRAMERATE,
        }
    }
}

/// Application configuration, stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which stream is re-expressed on which grid
    pub direction: AlignmentDirection,
    /// Directory receiving one sub-directory per recording session
    pub output_root: PathBuf,
    /// Artifact encoding (PNG or TIFF)
    pub image_format: EncodingFormat,
    /// Record every Nth tick
    pub record_decimation: u32,
    /// Control loop tick in milliseconds
    pub tick_interval_ms: u64,
    /// Depth rendered as black in the depth window
    pub depth_display_max_mm: u16,
    /// Settle time after opening the source
    pub warmup_ms: u64,
    /// Built-in source geometry
    pub source: SourceSettings,
    /// Camera model used by the resolver
    pub calibration: SensorCalibration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            direction: AlignmentDirection::default(),
            output_root: PathBuf::from(recording::DEFAULT_OUTPUT_ROOT),
            image_format: EncodingFormat::default(),
            record_decimation: timing::RECORD_DECIMATION,
            tick_interval_ms: timing::TICK_INTERVAL.as_millis() as u64,
            depth_display_max_mm: display::DEPTH_DISPLAY_MAX_MM,
            // Generated and replayed sources need no settle time
            warmup_ms: 0,
            source: SourceSettings::default(),
            calibration: SensorCalibration::default(),
        }
    }
}

impl Config {
    /// `<config dir>/depth-align/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load and validate a config file; a missing or invalid file is an error
    pub fn load(path: &Path) -> AppResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&json)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load the per-user config file, falling back to defaults when absent
    pub fn load_default() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> AppResult<()> {
        for (name, size) in [
            ("source.color_size", self.source.color_size),
            ("source.depth_size", self.source.depth_size),
            ("calibration.color_size", self.calibration.color_size),
            ("calibration.depth_size", self.calibration.depth_size),
        ] {
            if size.is_empty() {
                return Err(AppError::Config(format!("{} must not be empty ({})", name, size)));
            }
        }
        if self.depth_display_max_mm == 0 {
            return Err(AppError::Config(
                "depth_display_max_mm must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            output_root: self.output_root.clone(),
            format: self.image_format,
            decimation: self.record_decimation,
        }
    }

    pub fn loop_settings(&self, max_ticks: Option<u64>) -> LoopSettings {
        LoopSettings {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            max_ticks,
            depth_display_max_mm: self.depth_display_max_mm,
        }
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{ "record_decimation": 5 }"#).unwrap();
        assert_eq!(config.record_decimation, 5);
        assert_eq!(config.direction, AlignmentDirection::ColorToDepth);
        assert_eq!(config.source, SourceSettings::default());
    }

    #[test]
    fn test_direction_uses_kebab_case() {
        let config: Config = serde_json::from_str(r#"{ "direction": "depth-to-color" }"#).unwrap();
        assert_eq!(config.direction, AlignmentDirection::DepthToColor);
    }

    #[test]
    fn test_empty_size_is_rejected() {
        let mut config = Config::default();
        config.source.depth_size = FrameSize::new(0, 424);
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
