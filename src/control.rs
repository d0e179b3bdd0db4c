// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-rate control loop
//!
//! Each tick acquires whatever the source has ready, runs the alignment
//! engine, shows the result, lets the recorder sample it and then waits up
//! to one tick for a key.

use crate::backends::sensor::{FrameSource, SpatialResolver};
use crate::constants::{
    display::{COLOR_WINDOW, DEPTH_DISPLAY_MAX_MM, DEPTH_WINDOW},
    timing::{TICK_INTERVAL, TICK_LOG_INTERVAL},
};
use crate::display::{DisplayImage, DisplaySink, depth_to_gray8};
use crate::errors::{AppError, AppResult};
use crate::pipelines::alignment::{AlignedOutput, AlignmentEngine};
use crate::pipelines::recorder::{Recorder, SessionSummary, Toggled, artifacts::format_frame_index};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// User commands the loop understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    Exit,
    ToggleRecording,
}

/// Source of user commands
pub trait KeySource {
    /// Wait up to `timeout` for a command
    fn poll(&mut self, timeout: Duration) -> Option<ControlKey>;
}

impl<K: KeySource + ?Sized> KeySource for Box<K> {
    fn poll(&mut self, timeout: Duration) -> Option<ControlKey> {
        (**self).poll(timeout)
    }
}

/// No keyboard; just paces the loop
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll(&mut self, timeout: Duration) -> Option<ControlKey> {
        std::thread::sleep(timeout);
        None
    }
}

/// Terminal keyboard via crossterm events
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermKeys;

impl CrosstermKeys {
    /// Esc, `q` and Ctrl+C exit; `c` toggles recording
    pub fn map_key(key: KeyEvent) -> Option<ControlKey> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(ControlKey::Exit)
            }
            KeyCode::Esc | KeyCode::Char('q') => Some(ControlKey::Exit),
            KeyCode::Char('c') => Some(ControlKey::ToggleRecording),
            _ => None,
        }
    }
}

impl KeySource for CrosstermKeys {
    fn poll(&mut self, timeout: Duration) -> Option<ControlKey> {
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => Self::map_key(key),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "Failed to read terminal event");
                    None
                }
            },
            Ok(false) => None,
            Err(e) => {
                warn!(error = %e, "Failed to poll terminal events");
                std::thread::sleep(timeout);
                None
            }
        }
    }
}

/// Loop pacing and display settings
#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    /// Maximum wait for input per tick
    pub tick_interval: Duration,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
    /// Depth shown as black
    pub depth_display_max_mm: u16,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tick_interval: TICK_INTERVAL,
            max_ticks: None,
            depth_display_max_mm: DEPTH_DISPLAY_MAX_MM,
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone, Default)]
pub struct LoopReport {
    pub ticks: u64,
    /// Summaries of every session closed during the run, in order
    pub sessions: Vec<SessionSummary>,
}

/// Single-threaded driver tying source, engine, display and recorder
pub struct ControlLoop<S, R, D> {
    source: S,
    engine: AlignmentEngine<R>,
    sink: D,
    recorder: Recorder,
    settings: LoopSettings,
    sessions: Vec<SessionSummary>,
    ticks: u64,
}

impl<S, R, D> ControlLoop<S, R, D>
where
    S: FrameSource,
    R: SpatialResolver,
    D: DisplaySink,
{
    pub fn new(
        source: S,
        engine: AlignmentEngine<R>,
        sink: D,
        recorder: Recorder,
        settings: LoopSettings,
    ) -> Self {
        Self {
            source,
            engine,
            sink,
            recorder,
            settings,
            sessions: Vec::new(),
            ticks: 0,
        }
    }

    pub fn engine(&self) -> &AlignmentEngine<R> {
        &self.engine
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick without waiting for input
    ///
    /// Returns the frame index when the tick was recorded.
    pub fn step(&mut self) -> AppResult<Option<u32>> {
        if let Some(color) = self.source.try_acquire_color() {
            self.engine.ingest_color(color);
        }
        if let Some(depth) = self.source.try_acquire_depth() {
            self.engine.ingest_depth(depth);
        }

        let output = self.engine.tick();
        if let Some(output) = output {
            Self::present(&mut self.sink, output, self.settings.depth_display_max_mm);
        }
        let recorded = self.recorder.on_tick(output);

        self.sink.set_status(&self.status_line());
        self.sink
            .flush()
            .map_err(|e| AppError::Display(e.to_string()))?;

        self.ticks += 1;
        if self.ticks % TICK_LOG_INTERVAL == 0 {
            debug!(
                ticks = self.ticks,
                recording = self.recorder.is_recording(),
                "Control loop alive"
            );
        }
        Ok(recorded)
    }

    fn present(sink: &mut D, output: &AlignedOutput, max_mm: u16) {
        sink.show(
            COLOR_WINDOW,
            DisplayImage::Bgra8 {
                size: output.color.size(),
                pixels: output.color.as_slice(),
            },
        );
        let gray = depth_to_gray8(output.depth.as_slice(), max_mm);
        sink.show(
            DEPTH_WINDOW,
            DisplayImage::Gray8 {
                size: output.depth.size(),
                pixels: &gray,
            },
        );
    }

    fn status_line(&self) -> String {
        let state = match self.recorder.session() {
            Some(session) => format!("REC {}", format_frame_index(session.frames_taken())),
            None => "idle".to_string(),
        };
        format!(
            "{} | {} | c: record | q/Esc: quit",
            state,
            self.engine.direction()
        )
    }

    /// Apply a key; returns `false` when the loop should end
    pub fn handle_key(&mut self, key: ControlKey) -> bool {
        match key {
            ControlKey::Exit => {
                info!("Exit requested");
                false
            }
            ControlKey::ToggleRecording => {
                match self.recorder.toggle() {
                    Ok(Toggled::Started(dir)) => {
                        info!(dir = %dir.display(), "Recording toggled on");
                    }
                    Ok(Toggled::Stopped(summary)) => {
                        info!(frames = summary.frames_taken, "Recording toggled off");
                        self.sessions.push(summary);
                    }
                    Err(e) => warn!(error = %e, "Failed to toggle recording"),
                }
                true
            }
        }
    }

    /// Tick until exit, shutdown or the tick limit
    ///
    /// A session still open when the loop ends is stopped and its summary
    /// written, also when the loop ends with an error.
    pub fn run<K: KeySource + ?Sized>(
        &mut self,
        keys: &mut K,
        shutdown: &AtomicBool,
    ) -> AppResult<LoopReport> {
        info!(source = self.source.name(), direction = %self.engine.direction(), "Control loop started");

        let result = self.run_ticks(keys, shutdown);

        if self.recorder.is_recording() {
            match self.recorder.stop() {
                Ok(summary) => self.sessions.push(summary),
                Err(e) => warn!(error = %e, "Failed to finalize recording"),
            }
        }

        info!(ticks = self.ticks, "Control loop stopped");
        result.map(|()| LoopReport {
            ticks: self.ticks,
            sessions: std::mem::take(&mut self.sessions),
        })
    }

    fn run_ticks<K: KeySource + ?Sized>(
        &mut self,
        keys: &mut K,
        shutdown: &AtomicBool,
    ) -> AppResult<()> {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested");
                return Ok(());
            }
            if self.settings.max_ticks.is_some_and(|max| self.ticks >= max) {
                return Ok(());
            }

            self.step()?;

            if let Some(key) = keys.poll(self.settings.tick_interval)
                && !self.handle_key(key)
            {
                return Ok(());
            }
        }
    }
}
