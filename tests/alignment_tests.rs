// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the alignment engine

use depth_align::backends::sensor::{
    Bgra, ColorFrame, CoordinateMap, DepthFrame, FrameSize, FrameSource, MappedPoint,
    PinholeResolver, ResolveResult, SensorCalibration, SpatialResolver, SyntheticSource,
};
use depth_align::constants::sensor::{COLOR_SIZE, DEPTH_SIZE};
use depth_align::errors::ResolveError;
use depth_align::pipelines::alignment::{AlignedFrame, AlignmentDirection, AlignmentEngine, align};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Resolver returning a fixed map, optionally failing on demand
struct FixedResolver {
    depth_to_color: CoordinateMap,
    color_to_depth: CoordinateMap,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FixedResolver {
    fn new(depth_to_color: CoordinateMap, color_to_depth: CoordinateMap) -> Self {
        Self {
            depth_to_color,
            color_to_depth,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    fn result(&self, map: &CoordinateMap) -> ResolveResult<CoordinateMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ResolveError::Unavailable("scripted failure".to_string()));
        }
        Ok(map.clone())
    }
}

impl SpatialResolver for FixedResolver {
    fn map_depth_to_color(&self, _: &DepthFrame, _: FrameSize) -> ResolveResult<CoordinateMap> {
        self.result(&self.depth_to_color)
    }

    fn map_color_to_depth(&self, _: &DepthFrame, _: FrameSize) -> ResolveResult<CoordinateMap> {
        self.result(&self.color_to_depth)
    }
}

/// Color pixel encoding its own coordinates
fn coded(x: u32, y: u32) -> Bgra {
    [(x & 0xff) as u8, (y & 0xff) as u8, ((x >> 8) | ((y >> 8) << 4)) as u8, 255]
}

fn coded_color(size: FrameSize) -> ColorFrame {
    let pixels = (0..size.height)
        .flat_map(|y| (0..size.width).map(move |x| coded(x, y)))
        .collect();
    ColorFrame::from_vec(size, pixels).unwrap()
}

fn kinect_scenario() -> (ColorFrame, DepthFrame, FixedResolver) {
    let color = coded_color(COLOR_SIZE);
    let depth = DepthFrame::filled(DEPTH_SIZE, 1200);

    let mut forward = CoordinateMap::unmapped(DEPTH_SIZE, COLOR_SIZE);
    forward.set(0, 0, MappedPoint::new(100.4, 50.6));
    forward.set(1, 0, MappedPoint::new(-3.2, 50.0));
    forward.set(2, 0, MappedPoint::new(1919.4, 1079.4));
    forward.set(3, 0, MappedPoint::new(1919.5, 10.0));
    forward.set(4, 0, MappedPoint::new(10.4, 7.5));

    let mut backward = CoordinateMap::unmapped(COLOR_SIZE, DEPTH_SIZE);
    backward.set(0, 0, MappedPoint::new(3.0, 4.0));

    (color, depth, FixedResolver::new(forward, backward))
}

#[test]
fn test_color_to_depth_copies_rounded_pixels() {
    let (color, depth, resolver) = kinect_scenario();

    let AlignedFrame::Color(aligned) =
        align(&color, &depth, &resolver, AlignmentDirection::ColorToDepth).unwrap()
    else {
        panic!("color-to-depth must produce color");
    };

    assert_eq!(aligned.size(), DEPTH_SIZE);
    assert_eq!(aligned.pixel(0, 0), color.pixel(100, 51));
    assert_eq!(aligned.pixel(1, 0), [0, 0, 0, 0], "negative x is a hole");
    assert_eq!(aligned.pixel(2, 0), color.pixel(1919, 1079));
    assert_eq!(aligned.pixel(3, 0), [0, 0, 0, 0], "rounds to x = 1920");
    assert_eq!(aligned.pixel(4, 0), color.pixel(10, 8));
    assert_eq!(aligned.pixel(5, 0), [0, 0, 0, 0], "unmapped is a hole");
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_depth_to_color_copies_depth_samples() {
    let (color, _, resolver) = kinect_scenario();
    let depth = DepthFrame::from_vec(
        DEPTH_SIZE,
        (0..DEPTH_SIZE.pixel_count()).map(|i| (i % 5000) as u16).collect(),
    )
    .unwrap();

    let AlignedFrame::Depth(aligned) =
        align(&color, &depth, &resolver, AlignmentDirection::DepthToColor).unwrap()
    else {
        panic!("depth-to-color must produce depth");
    };

    assert_eq!(aligned.size(), COLOR_SIZE);
    assert_eq!(aligned.pixel(0, 0), depth.pixel(3, 4));
    assert_eq!(aligned.pixel(1, 0), 0);
}

#[test]
fn test_alignment_is_idempotent() {
    let (color, depth, resolver) = kinect_scenario();

    let first = align(&color, &depth, &resolver, AlignmentDirection::ColorToDepth).unwrap();
    let second = align(&color, &depth, &resolver, AlignmentDirection::ColorToDepth).unwrap();
    match (first, second) {
        (AlignedFrame::Color(a), AlignedFrame::Color(b)) => assert_eq!(a.as_slice(), b.as_slice()),
        _ => panic!("unexpected frame kinds"),
    }
}

#[test]
fn test_engine_needs_both_streams() {
    let (color, depth, resolver) = kinect_scenario();
    let mut engine = AlignmentEngine::new(
        resolver,
        AlignmentDirection::ColorToDepth,
        COLOR_SIZE,
        DEPTH_SIZE,
    );

    assert!(engine.tick().is_none());
    assert!(engine.ingest_color(color));
    assert!(engine.tick().is_none());
    assert!(engine.ingest_depth(depth));

    let output = engine.tick().unwrap();
    assert_eq!(output.tick, 2);
    assert_eq!(output.color.size(), DEPTH_SIZE);
    assert_eq!(output.color_unmapped.size(), COLOR_SIZE);
    assert_eq!(output.depth.size(), DEPTH_SIZE);
}

#[test]
fn test_engine_keeps_previous_output_on_resolver_failure() {
    let (color, depth, resolver) = kinect_scenario();
    let mut engine = AlignmentEngine::new(
        resolver,
        AlignmentDirection::ColorToDepth,
        COLOR_SIZE,
        DEPTH_SIZE,
    );
    engine.ingest_color(color.clone());
    engine.ingest_depth(depth.clone());
    let first_tick = engine.tick().unwrap().tick;

    engine.resolver().fail.store(true, Ordering::SeqCst);
    engine.ingest_depth(depth);
    let output = engine.tick().unwrap();
    assert_eq!(output.tick, first_tick, "previous output is served");

    engine.resolver().fail.store(false, Ordering::SeqCst);
    let output = engine.tick().unwrap();
    assert_eq!(output.tick, first_tick + 2, "failed tick is retried");
}

#[test]
fn test_engine_recomputes_only_on_change() {
    let (color, depth, resolver) = kinect_scenario();
    let mut engine = AlignmentEngine::new(
        resolver,
        AlignmentDirection::ColorToDepth,
        COLOR_SIZE,
        DEPTH_SIZE,
    );
    engine.ingest_color(color);
    engine.ingest_depth(depth);
    engine.tick();
    engine.tick();
    assert_eq!(engine.resolver().calls.load(Ordering::SeqCst), 1);

    engine.set_direction(AlignmentDirection::DepthToColor);
    let output = engine.tick().unwrap();
    assert_eq!(output.direction, AlignmentDirection::DepthToColor);
    assert_eq!(output.depth.size(), COLOR_SIZE);
    assert_eq!(engine.resolver().calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_engine_rejects_wrong_sizes() {
    let (_, _, resolver) = kinect_scenario();
    let mut engine = AlignmentEngine::new(
        resolver,
        AlignmentDirection::ColorToDepth,
        COLOR_SIZE,
        DEPTH_SIZE,
    );

    assert!(!engine.ingest_color(ColorFrame::filled(FrameSize::new(640, 480), [0; 4])));
    assert!(!engine.ingest_depth(DepthFrame::filled(FrameSize::new(320, 240), 1)));
    assert!(engine.tick().is_none());
}

#[test]
fn test_synthetic_scene_aligns_both_ways() {
    let calibration = SensorCalibration::default();
    let color_size = FrameSize::new(480, 270);
    let depth_size = FrameSize::new(128, 106);
    let mut source = SyntheticSource::new(color_size, depth_size, &calibration, 0).unwrap();
    let resolver = PinholeResolver::for_sizes(&calibration, depth_size, color_size);
    let color = source.try_acquire_color().unwrap();
    let depth = source.try_acquire_depth().unwrap();

    let AlignedFrame::Color(on_depth) =
        align(&color, &depth, &resolver, AlignmentDirection::ColorToDepth).unwrap()
    else {
        panic!("expected color");
    };
    // The depth camera sees further up and down than the color camera, so
    // only the top and bottom bands stay uncovered
    let covered = on_depth.as_slice().iter().filter(|px| px[3] == 255).count();
    assert!(covered * 4 > depth_size.pixel_count() * 3, "covered {covered}");
    assert_eq!(on_depth.pixel(0, 0), [0, 0, 0, 0]);

    let AlignedFrame::Depth(on_color) =
        align(&color, &depth, &resolver, AlignmentDirection::DepthToColor).unwrap()
    else {
        panic!("expected depth");
    };
    // Center of the color image looks at the sphere
    let center = on_color.pixel(color_size.width / 2, color_size.height / 2);
    assert!(center > 1000 && center < 1500, "center {center}");
}

#[test]
fn test_left_of_grid_leaves_first_depth_pixel_empty() {
    let color = coded_color(COLOR_SIZE);
    let depth = DepthFrame::filled(DEPTH_SIZE, 1200);
    let mut forward = CoordinateMap::unmapped(DEPTH_SIZE, COLOR_SIZE);
    forward.set(0, 0, MappedPoint::new(-3.2, 50.0));
    forward.set(1, 0, MappedPoint::new(-0.7, 50.0));
    let resolver = FixedResolver::new(forward, CoordinateMap::unmapped(COLOR_SIZE, DEPTH_SIZE));
    let mut engine = AlignmentEngine::new(
        resolver,
        AlignmentDirection::ColorToDepth,
        COLOR_SIZE,
        DEPTH_SIZE,
    );
    engine.ingest_color(color.clone());
    engine.ingest_depth(depth);

    let output = engine.tick().unwrap();
    assert_eq!(output.color.size(), DEPTH_SIZE);
    assert_eq!(output.color.pixel(0, 0), [0, 0, 0, 0]);
    // -0.7 + 0.5 truncates to column 0
    assert_eq!(output.color.pixel(1, 0), color.pixel(0, 50));
}

#[test]
fn test_map_for_wrong_grid_is_rejected() {
    let (color, depth, _) = kinect_scenario();
    let small = FrameSize::new(640, 480);
    let resolver = FixedResolver::new(
        CoordinateMap::unmapped(DEPTH_SIZE, small),
        CoordinateMap::unmapped(COLOR_SIZE, small),
    );

    assert!(matches!(
        align(&color, &depth, &resolver, AlignmentDirection::ColorToDepth),
        Err(ResolveError::TargetSize { expected, actual }) if expected == COLOR_SIZE && actual == small
    ));
    assert!(matches!(
        align(&color, &depth, &resolver, AlignmentDirection::DepthToColor),
        Err(ResolveError::TargetSize { expected, .. }) if expected == DEPTH_SIZE
    ));
}
