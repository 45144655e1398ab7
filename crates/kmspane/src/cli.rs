//! Command-line front end.
//!
//! `kmspane run` takes over the display and rotates panes until SIGINT or
//! SIGTERM. `kmspane render` rasterizes onto an in-memory canvas and writes
//! a raw RGBA dump, which needs no display at all.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use kmspane_backend::{DisplayBackend, FrameLog, HeadlessBackend, ModeInfo};
use kmspane_drm::{DrmBackend, DrmOptions};
use kmspane_render::raster::{draw_shape, fill};
use kmspane_render::{Canvas, Circle, Color, Rect, Shape, dump_rgba_file};
use kmspane_runtime::command::parse_number;
use kmspane_runtime::{
    CommandReader, HeadlessConfig, Lifecycle, LifecycleReport, PaneStore, RuntimeConfig, TerminationSignal,
};

use crate::error::{AppError, Result};
use crate::logging;

#[derive(Debug, Parser)]
#[command(name = "kmspane", about = "Rotate named panes on a kernel mode-setting display", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Take over the display and cycle through panes.
    Run(RunArgs),

    /// Draw shapes on an in-memory canvas and write an RGBA dump.
    Render(RenderArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct LogArgs {
    /// Tracing filter directives (overrides RUST_LOG).
    #[arg(long, value_name = "DIRECTIVES")]
    pub log_filter: Option<String>,

    /// Emit diagnostics as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// TOML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory searched for the first `card*` device.
    #[arg(long, value_name = "DIR")]
    pub device_dir: Option<PathBuf>,

    /// Milliseconds each pane stays on screen.
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Render into memory at the given size instead of using a display.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub headless: Option<(u16, u16)>,

    /// Do not read drawing commands from stdin.
    #[arg(long)]
    pub no_stdin: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    #[arg(long)]
    pub width: u16,

    #[arg(long)]
    pub height: u16,

    /// Background color.
    #[arg(long, default_value = "#000000")]
    pub fill: Color,

    /// Rectangle as `#RRGGBB,x,y,w,h`. Repeatable; drawn in order.
    #[arg(long = "rect", value_name = "SPEC", value_parser = parse_rect_spec)]
    pub rects: Vec<ShapeSpec>,

    /// Circle as `#RRGGBB,x,y,r`. Repeatable; drawn after every rectangle.
    #[arg(long = "circle", value_name = "SPEC", value_parser = parse_circle_spec)]
    pub circles: Vec<ShapeSpec>,

    /// Output file for the raw RGBA bytes.
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    #[command(flatten)]
    pub log: LogArgs,
}

/// A colored shape given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeSpec {
    pub color: Color,
    pub shape: Shape,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => {
            logging::init(args.log.log_filter.as_deref(), args.log.log_json)?;
            run_display(&args).map(|_| ())
        }
        Commands::Render(args) => {
            logging::init(args.log.log_filter.as_deref(), args.log.log_json)?;
            run_render(&args).map(|_| ())
        }
    }
}

// ── run ──────────────────────────────────────────────────────────────────

impl RunArgs {
    /// Configuration file (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => RuntimeConfig::from_toml_file(path)?,
            None => RuntimeConfig::default(),
        };
        if let Some(dir) = &self.device_dir {
            config.device_dir = dir.clone();
        }
        if let Some(ms) = self.interval_ms {
            config.rotation_interval_ms = ms;
        }
        if let Some((width, height)) = self.headless {
            let frame_log = config.headless.map(|h| h.frame_log);
            let mut headless = HeadlessConfig::new(width, height);
            if let Some(frame_log) = frame_log {
                headless.frame_log = frame_log;
            }
            config.headless = Some(headless);
        }
        if self.no_stdin {
            config.commands = false;
        }
        config.check()?;
        Ok(config)
    }
}

/// Run the pane server until a termination signal arrives.
pub fn run_display(args: &RunArgs) -> Result<LifecycleReport> {
    let config = args.resolve_config()?;
    // Registered before the display is touched so a signal during setup
    // still goes through teardown.
    let mut termination = TerminationSignal::register().map_err(AppError::Signals)?;

    match config.headless {
        Some(headless) => {
            tracing::info!(width = headless.width, height = headless.height, "running headless");
            let mode = ModeInfo::new(headless.width, headless.height, headless.refresh);
            let backend = HeadlessBackend::with_log(mode, FrameLog::bounded(headless.frame_log));
            serve(backend, &config, &mut termination)
        }
        None => {
            let backend = DrmBackend::open(&DrmOptions {
                device_dir: config.device_dir.clone(),
                max_busy_retries: config.max_busy_retries,
            })?;
            serve(backend, &config, &mut termination)
        }
    }
}

fn serve<B: DisplayBackend + 'static>(
    backend: B,
    config: &RuntimeConfig,
    termination: &mut TerminationSignal,
) -> Result<LifecycleReport> {
    let store = Arc::new(PaneStore::with_root(
        backend.canvas_layout(),
        config.max_panes,
        config.root_fill,
    )?);

    let mut lifecycle = Lifecycle::new(backend, store, config.rotation_interval());
    if config.commands {
        lifecycle = lifecycle.with_commands(CommandReader::stdio());
    }
    let report = lifecycle.run(|stop| termination.wait(stop).map(|_| ()))?;

    tracing::info!(
        ticks = report.rotation.ticks,
        shown = report.rotation.shown,
        commands = report.commands,
        "kmspane stopped"
    );
    Ok(report)
}

// ── render ───────────────────────────────────────────────────────────────

/// Rasterize `args` and write the dump. Returns the finished canvas.
pub fn run_render(args: &RenderArgs) -> Result<Canvas> {
    if args.width == 0 || args.height == 0 {
        return Err(AppError::invalid(format!(
            "canvas size must be non-zero, got {}x{}",
            args.width, args.height
        )));
    }

    let mut canvas = Canvas::new_bgra(args.width, args.height);
    fill(&mut canvas, args.fill);
    for spec in args.rects.iter().chain(&args.circles) {
        draw_shape(&mut canvas, &spec.shape, spec.color);
    }
    dump_rgba_file(&canvas, &args.out)?;

    tracing::info!(
        out = %args.out.display(),
        width = args.width,
        height = args.height,
        shapes = args.rects.len() + args.circles.len(),
        "wrote RGBA dump"
    );
    Ok(canvas)
}

// ── Value parsers ────────────────────────────────────────────────────────

/// `WxH`, both non-zero.
pub fn parse_size(text: &str) -> std::result::Result<(u16, u16), String> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {text:?}"))?;
    let width: u16 = w.parse().map_err(|_| format!("invalid width {w:?}"))?;
    let height: u16 = h.parse().map_err(|_| format!("invalid height {h:?}"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got {width}x{height}"));
    }
    Ok((width, height))
}

fn split_spec<const N: usize>(text: &str, names: [&str; N]) -> std::result::Result<(Color, [u16; N]), String> {
    let mut parts = text.split(',').map(str::trim);
    let color = parts
        .next()
        .unwrap_or_default()
        .parse::<Color>()
        .map_err(|err| err.to_string())?;

    let mut values = [0u16; N];
    for (slot, name) in values.iter_mut().zip(names) {
        let part = parts.next().ok_or_else(|| format!("missing {name}"))?;
        *slot = parse_number(part).ok_or_else(|| format!("invalid {name} {part:?}"))?;
    }
    if parts.next().is_some() {
        return Err(format!("too many fields, expected color,{}", names.join(",")));
    }
    Ok((color, values))
}

pub fn parse_rect_spec(text: &str) -> std::result::Result<ShapeSpec, String> {
    let (color, [x, y, w, h]) = split_spec(text, ["x", "y", "w", "h"])?;
    Ok(ShapeSpec {
        color,
        shape: Shape::Rect(Rect::new(x, y, w, h)),
    })
}

pub fn parse_circle_spec(text: &str) -> std::result::Result<ShapeSpec, String> {
    let (color, [x, y, r]) = split_spec(text, ["x", "y", "r"])?;
    Ok(ShapeSpec {
        color,
        shape: Shape::Circle(Circle::new(x, y, r)),
    })
}
