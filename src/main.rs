// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;
use depth_align::backends::sensor::{FrameSource, PinholeResolver, ReplaySource, SyntheticSource};
use depth_align::config::Config;
use depth_align::constants::{
    app_info,
    display::{COLOR_WINDOW, DEPTH_WINDOW},
    recording::LOG_FILE_NAME,
};
use depth_align::control::{ControlLoop, CrosstermKeys, LoopReport, NoKeys};
use depth_align::display::{NullSink, TerminalSink};
use depth_align::pipelines::recorder::EncodingFormat;
use depth_align::pipelines::{AlignmentDirection, AlignmentEngine, Recorder};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

#[derive(Parser)]
#[command(name = "depth-align")]
#[command(about = "Live color/depth alignment viewer and frame recorder")]
#[command(version = app_info::version())]
struct Cli {
    /// Which stream is re-expressed on which grid
    #[arg(short, long, value_enum)]
    direction: Option<AlignmentDirection>,

    /// Directory receiving one sub-directory per recording session
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Image format for recorded frames
    #[arg(short, long, value_enum)]
    format: Option<EncodingFormat>,

    /// Replay a recorded session directory instead of the generated scene
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Run without the terminal viewer (logs go to stderr)
    #[arg(long)]
    headless: bool,

    /// Start recording immediately
    #[arg(long)]
    record: bool,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Config file (default: ~/.config/depth-align/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Command line flags override the config file
    fn apply(&self, config: &mut Config) {
        if let Some(direction) = self.direction {
            config.direction = direction;
        }
        if let Some(output) = &self.output {
            config.output_root = output.clone();
        }
        if let Some(format) = self.format {
            config.image_format = format;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    cli.apply(&mut config);
    config.validate()?;

    init_logging(&config, cli.headless)?;
    info!(version = app_info::version(), "Starting depth-align");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))?;
    }

    let source: Box<dyn FrameSource> = match &cli.replay {
        Some(dir) => Box::new(ReplaySource::open(dir, config.source.framerate)?),
        None => Box::new(SyntheticSource::new(
            config.source.color_size,
            config.source.depth_size,
            &config.calibration,
            config.source.framerate,
        )?),
    };
    info!(
        source = source.name(),
        color = %source.color_size(),
        depth = %source.depth_size(),
        "Source opened"
    );

    let resolver =
        PinholeResolver::for_sizes(&config.calibration, source.depth_size(), source.color_size());
    let engine = AlignmentEngine::new(
        resolver,
        config.direction,
        source.color_size(),
        source.depth_size(),
    );

    let warmup = config.warmup();
    if !warmup.is_zero() {
        info!(ms = warmup.as_millis() as u64, "Waiting for the sensor to settle");
        std::thread::sleep(warmup);
    }

    let mut recorder = Recorder::new(config.recorder_config());
    if cli.record {
        recorder.start()?;
    }
    let settings = config.loop_settings(cli.max_ticks);

    let report = if cli.headless {
        let mut control = ControlLoop::new(source, engine, NullSink::new(), recorder, settings);
        control.run(&mut NoKeys, &shutdown)?
    } else {
        let sink = TerminalSink::new(&[COLOR_WINDOW, DEPTH_WINDOW])?;
        let mut control = ControlLoop::new(source, engine, sink, recorder, settings);
        let report = control.run(&mut CrosstermKeys, &shutdown);
        // Restore the terminal before printing anything
        drop(control);
        report?
    };

    print_report(&report);
    Ok(())
}

/// Initialize logging
///
/// Set RUST_LOG environment variable to control log level
/// Examples: RUST_LOG=debug, RUST_LOG=depth_align=debug, RUST_LOG=info
///
/// The terminal viewer owns the screen, so in that mode logs are appended
/// to a file under the output root instead of stderr.
fn init_logging(config: &Config, headless: bool) -> std::io::Result<()> {
    let writer = if headless {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        std::fs::create_dir_all(&config.output_root)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.output_root.join(LOG_FILE_NAME))?;
        BoxMakeWriter::new(std::sync::Mutex::new(file))
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_ansi(headless)
        .with_writer(writer)
        .init();
    Ok(())
}

fn print_report(report: &LoopReport) {
    println!("Ran {} ticks", report.ticks);
    for (i, session) in report.sessions.iter().enumerate() {
        println!(
            "Session {}: {} frames in {:.2} s ({:.1} fps)",
            i + 1,
            session.frames_taken,
            session.recorded_seconds,
            session.frames_per_second()
        );
    }
}
