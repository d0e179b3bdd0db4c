// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::sensor::FrameSize;
use std::time::Duration;

/// Default sensor geometry (Kinect v2 class device)
pub mod sensor {
    use super::FrameSize;

    /// Color stream resolution (BGRA, 4 bytes per pixel)
    pub const COLOR_SIZE: FrameSize = FrameSize::new(1920, 1080);

    /// Depth stream resolution (16-bit millimetres)
    pub const DEPTH_SIZE: FrameSize = FrameSize::new(512, 424);

    /// Nominal delivery rate of both streams
    pub const FRAMERATE: u32 = 30;

    /// Depth value reported for pixels without a measurement
    pub const DEPTH_INVALID_MM: u16 = 0;
}

/// Control loop timing
pub mod timing {
    use super::Duration;

    /// Nominal tick of the poll loop (input wait per iteration)
    pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

    /// Every Nth tick is sampled while recording (10 x 10 ms = 10 fps nominal)
    pub const RECORD_DECIMATION: u32 = 10;

    /// Tick counter modulo for periodic logging
    pub const TICK_LOG_INTERVAL: u64 = 500;
}

/// Recording layout
pub mod recording {
    /// Directory that receives one sub-directory per session
    pub const DEFAULT_OUTPUT_ROOT: &str = "Recorder";

    /// strftime pattern for session ids (no colons, safe on every filesystem)
    pub const SESSION_ID_FORMAT: &str = "%Y-%m-%d-%H%M%S";

    /// Session summary record written on stop
    pub const SUMMARY_FILE_NAME: &str = "recordLog.json";

    /// Minimum digits of the frame index in artifact names
    pub const FRAME_INDEX_WIDTH: usize = 3;

    /// Log file used while the terminal viewer owns the screen
    pub const LOG_FILE_NAME: &str = "depth-align.log";
}

/// Display scaling
pub mod display {
    /// Depth mapped to black (0 mm maps to white)
    pub const DEPTH_DISPLAY_MAX_MM: u16 = 8000;

    /// Window showing the color stream
    pub const COLOR_WINDOW: &str = "Color";

    /// Window showing the depth stream
    pub const DEPTH_WINDOW: &str = "Depth";
}

/// Application information utilities
pub mod app_info {
    /// Application name used for the config directory and logs
    pub const APP_NAME: &str = "depth-align";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_grid_smaller_than_color() {
        assert!(sensor::DEPTH_SIZE.pixel_count() < sensor::COLOR_SIZE.pixel_count());
    }

    #[test]
    fn test_decimation_matches_nominal_rate() {
        let sample_period = timing::TICK_INTERVAL * timing::RECORD_DECIMATION;
        assert_eq!(sample_period, Duration::from_millis(100));
    }
}
