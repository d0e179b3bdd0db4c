// SPDX-License-Identifier: GPL-3.0-only

//! Display sinks for the live color and depth windows
//!
//! Sinks only accept 8-bit images ([`DisplayImage`]); depth is converted with
//! [`visualization::depth_to_gray8`] before it is shown.

pub mod terminal;
pub mod visualization;

pub use terminal::TerminalSink;
pub use visualization::{DisplayImage, Thumbnail, bgra_to_rgba, depth_to_gray8};

use std::io;
use tracing::trace;

/// Receiver of named 8-bit images
pub trait DisplaySink {
    /// Replace the contents of window `name`
    fn show(&mut self, name: &str, image: DisplayImage<'_>);

    /// One-line status text, if the sink has somewhere to put it
    fn set_status(&mut self, _status: &str) {}

    /// Present everything shown since the last flush
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn show(&mut self, name: &str, image: DisplayImage<'_>) {
        (**self).show(name, image)
    }

    fn set_status(&mut self, status: &str) {
        (**self).set_status(status)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Headless sink that only counts what it was shown
#[derive(Debug, Default)]
pub struct NullSink {
    shown: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images received so far
    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl DisplaySink for NullSink {
    fn show(&mut self, name: &str, image: DisplayImage<'_>) {
        self.shown += 1;
        trace!(window = name, size = %image.size(), "Frame shown");
    }
}
