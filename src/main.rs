//! # Daily Agenda Application Entry Point
//!
//! This binary wires configuration, content sources, the screen compositor
//! and the output device together for one render cycle, then exits. It is
//! meant to run from a timer (cron, systemd) on a device that sleeps between
//! updates.
//!
//! Modes:
//! - default: write the image to the display (the e-paper panel when built
//!   with `--features hardware` on Linux, an image file otherwise)
//! - `--stdout`: print an ASCII preview and leave the display alone
//!
//! The exit status is 0 for a clean render and 3 when a content source
//! failed and a placeholder was drawn, unless `no_shutdown_on_error` is set.

#[cfg(test)]
mod tests;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Local;

use daily_agenda_lib::{
    canvas::{Canvas, FontSet},
    color::{ColorMap, ColorMode, Palette, ThemeColors},
    compositor::{BatteryState, ScreenCompositor},
    config::{Config, DisplayMode},
    display::Display,
    error::RenderStatus,
    layout::LayoutSettings,
    provider::ContentProvider,
    renderer::draw_ascii,
};

/// Log filter used when RUST_LOG is not set
const DEFAULT_FILTER: &str = "daily_agenda=info,daily_agenda_lib=info";

/// Command line options
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    /// Print an ASCII preview instead of driving the display
    stdout: bool,
    config: Option<PathBuf>,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--stdout" => parsed.stdout = true,
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                other => anyhow::bail!("unknown argument '{}'", other),
            }
        }
        Ok(parsed)
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Pixel model for the configured display mode
fn color_mode(mode: DisplayMode) -> ColorMode {
    match mode {
        DisplayMode::Auto if cfg!(all(target_os = "linux", feature = "hardware")) => {
            ColorMode::Palette(Palette::ThreeColor)
        }
        DisplayMode::Auto | DisplayMode::Rgb => ColorMode::Rgb,
        DisplayMode::ThreeColor => ColorMode::Palette(Palette::ThreeColor),
        DisplayMode::SevenColor => ColorMode::Palette(Palette::SevenColor),
    }
}

/// Process exit status for a finished render
fn exit_code(status: RenderStatus, config: &Config) -> u8 {
    if config.runtime.no_shutdown_on_error && !status.is_ok() {
        tracing::warn!(status = ?status, "degraded render, exiting 0 as configured");
        return 0;
    }
    status.exit_code()
}

/// Output device for this build
fn open_display(config: &Config, color_map: &ColorMap) -> anyhow::Result<Box<dyn Display>> {
    #[cfg(all(target_os = "linux", feature = "hardware"))]
    {
        let _ = color_map;
        let panel = daily_agenda_lib::hardware::open_panel(&config.hardware)
            .context("opening e-paper panel")?;
        Ok(Box::new(panel))
    }

    #[cfg(not(all(target_os = "linux", feature = "hardware")))]
    {
        use daily_agenda_lib::display::SimulatedDisplay;
        use embedded_graphics::prelude::Size;

        let size = Size::new(config.display.width, config.display.height);
        Ok(Box::new(SimulatedDisplay::new(
            config.runtime.output.clone(),
            size,
            color_map.clone(),
        )))
    }
}

/// Compose one frame with the configured provider.
fn render(config: &Config, color_map: &ColorMap) -> anyhow::Result<(Canvas, RenderStatus)> {
    let colors = ThemeColors::resolve(&config.colors, color_map);
    let fonts = FontSet::resolve(&config.fonts);
    let settings = LayoutSettings::from_config(config);
    let provider = ContentProvider::from_config(config, color_map)?;
    let battery = config.battery.as_ref().and_then(BatteryState::read);

    tracing::info!(
        provider = ?provider.kind(),
        width = settings.width,
        height = settings.height,
        mode = ?color_map.mode(),
        "rendering"
    );

    // Single-threaded run to completion; fetches are awaited one by one.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let compositor = ScreenCompositor::new(&settings, &colors, color_map, &fonts);
    Ok(runtime.block_on(compositor.render(&provider, Local::now(), battery)))
}

fn run(args: Args) -> anyhow::Result<u8> {
    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let color_map = ColorMap::new(color_mode(config.display.mode));
    let (canvas, status) = render(&config, &color_map)?;

    if args.stdout {
        let background = color_map.resolve(&config.colors.background);
        draw_ascii(&canvas, &color_map, background);
    } else {
        let mut display = open_display(&config, &color_map)?;
        display.set_border(color_map.resolve(&config.display.border))?;
        display.show(&canvas).context("showing image")?;
    }

    Ok(exit_code(status, &config))
}

/// Main application entry point.
fn main() -> anyhow::Result<ExitCode> {
    init_logging();
    let args = Args::parse(env::args().skip(1))?;
    let code = run(args)?;
    Ok(ExitCode::from(code))
}
