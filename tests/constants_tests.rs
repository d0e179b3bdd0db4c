// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use depth_align::constants::{display, recording, sensor, timing};

#[test]
fn test_sensor_geometry() {
    assert_eq!(sensor::COLOR_SIZE.pixel_count(), 1920 * 1080);
    assert_eq!(sensor::DEPTH_SIZE.pixel_count(), 512 * 424);
}

#[test]
fn test_window_names_differ() {
    assert_ne!(display::COLOR_WINDOW, display::DEPTH_WINDOW);
}

#[test]
fn test_session_ids_have_no_colons() {
    // Session ids become directory names on every platform
    assert!(!recording::SESSION_ID_FORMAT.contains(':'));
}

#[test]
fn test_sampling_interval() {
    assert_eq!(timing::RECORD_DECIMATION, 10);
    assert!(timing::TICK_LOG_INTERVAL > timing::RECORD_DECIMATION as u64);
}
