//! Shared layout state and drawing primitives.
//!
//! One [`LayoutContext`] exists per render cycle. It owns the canvas and the
//! vertical [`LayoutCursor`]; the compositor draws the screen chrome through
//! it and then lends it, by exclusive borrow, to exactly one content provider.
//! Nothing else can move the cursor while a provider holds the context.

use std::fs;
use std::path::{Path, PathBuf};

use embedded_graphics::{
    mono_font::{MonoFont, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{renderer::TextRenderer, Baseline, Text},
};
use tinybmp::Bmp;

use crate::canvas::{Canvas, FontSet};
use crate::color::{ColorMap, ColorValue, ThemeColors};
use crate::config::Config;
use crate::error::{ContentError, RenderStatus};

/// The next free vertical pixel.
///
/// Only ever moves down, and never past `limit` (the top of the status line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutCursor {
    y: u32,
    limit: u32,
}

impl LayoutCursor {
    pub fn new(limit: u32) -> Self {
        LayoutCursor { y: 0, limit }
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Free rows between the cursor and the status line
    pub fn remaining(&self) -> u32 {
        self.limit - self.y
    }

    /// Move down by `dy`, saturating at the limit. Returns the new position.
    pub fn advance(&mut self, dy: u32) -> u32 {
        self.y = self.y.saturating_add(dy).min(self.limit);
        self.y
    }

    /// Move down to `y`. Positions above the cursor are ignored.
    pub fn advance_to(&mut self, y: u32) -> u32 {
        if y > self.y {
            self.y = y.min(self.limit);
        }
        self.y
    }
}

/// Static images drawn in place of a content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// The data source could not be reached
    NoConnection,
    /// The source answered but had nothing for today
    NoEvents,
}

/// Geometry and asset paths the layout needs from the configuration.
#[derive(Debug, Clone)]
pub struct LayoutSettings {
    pub width: u32,
    pub height: u32,
    pub entry_height: u32,
    pub status_height: u32,
    /// (top, bottom, left, right)
    pub margins: (u32, u32, u32, u32),
    pub title: String,
    pub placeholder_height: u32,
    pub no_connect: PathBuf,
    pub no_events: PathBuf,
}

impl LayoutSettings {
    pub fn from_config(config: &Config) -> Self {
        let display = &config.display;
        LayoutSettings {
            width: display.width,
            height: display.height,
            entry_height: display.entry_height.max(1),
            status_height: display.status_height.min(display.height),
            margins: display.margins,
            title: display.title.clone(),
            placeholder_height: display.placeholder_height,
            no_connect: config.placeholders.no_connect.clone(),
            no_events: config.placeholders.no_events.clone(),
        }
    }

    /// Top of the status line
    pub fn status_y(&self) -> u32 {
        self.height - self.status_height
    }

    pub fn margin_left(&self) -> u32 {
        self.margins.2
    }

    fn placeholder_path(&self, placeholder: Placeholder) -> &Path {
        match placeholder {
            Placeholder::NoConnection => &self.no_connect,
            Placeholder::NoEvents => &self.no_events,
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        LayoutSettings::from_config(&Config::default())
    }
}

/// Canvas, cursor and resolved styling for one render cycle.
pub struct LayoutContext<'a> {
    canvas: Canvas,
    cursor: LayoutCursor,
    status: RenderStatus,
    pub colors: &'a ThemeColors,
    pub color_map: &'a ColorMap,
    pub fonts: &'a FontSet,
    pub settings: &'a LayoutSettings,
}

impl<'a> LayoutContext<'a> {
    pub fn new(
        settings: &'a LayoutSettings,
        colors: &'a ThemeColors,
        color_map: &'a ColorMap,
        fonts: &'a FontSet,
    ) -> Self {
        LayoutContext {
            canvas: Canvas::new(settings.width, settings.height, colors.background),
            cursor: LayoutCursor::new(settings.status_y()),
            status: RenderStatus::Ok,
            colors,
            color_map,
            fonts,
            settings,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn cursor(&self) -> &LayoutCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut LayoutCursor {
        &mut self.cursor
    }

    /// Current top of the free canvas area
    pub fn y_off(&self) -> u32 {
        self.cursor.y()
    }

    pub fn status(&self) -> RenderStatus {
        self.status
    }

    /// Record a caught provider failure for the caller.
    pub fn report_failure(&mut self, error: &ContentError) {
        match error {
            ContentError::SourceUnavailable { .. } => {
                tracing::error!(error = %error, "content source failed");
                self.status = RenderStatus::SourceUnavailable;
            }
            ContentError::NoData | ContentError::AssetMissing(_) => {
                tracing::warn!(error = %error, "content degraded");
            }
        }
    }

    /// Hand back the finished image and status.
    pub fn finish(self) -> (Canvas, RenderStatus) {
        (self.canvas, self.status)
    }

    /// Full-width horizontal rule
    pub fn hline(&mut self, y: u32) {
        let color = self.colors.line;
        Line::new(
            Point::new(0, y as i32),
            Point::new(self.settings.width as i32, y as i32),
        )
        .into_styled(PrimitiveStyle::with_stroke(color, 1))
        .draw(&mut self.canvas)
        .ok();
    }

    /// Vertical rule from `y0` to `y1`
    pub fn vline(&mut self, x: u32, y0: u32, y1: u32) {
        let color = self.colors.line;
        Line::new(Point::new(x as i32, y0 as i32), Point::new(x as i32, y1 as i32))
            .into_styled(PrimitiveStyle::with_stroke(color, 1))
            .draw(&mut self.canvas)
            .ok();
    }

    pub fn fill_rect(&mut self, top_left: Point, size: Size, color: ColorValue) {
        Rectangle::new(top_left, size)
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(&mut self.canvas)
            .ok();
    }

    /// Size of `text` when rendered in `font`
    pub fn text_size(&self, text: &str, font: &MonoFont<'_>) -> Size {
        MonoTextStyle::new(font, self.colors.text)
            .measure_string(text, Point::zero(), Baseline::Top)
            .bounding_box
            .size
    }

    /// Draw `text` with its top-left corner at `top_left`. Returns its size.
    pub fn text(
        &mut self,
        top_left: Point,
        text: &str,
        font: &MonoFont<'_>,
        color: ColorValue,
    ) -> Size {
        let style = MonoTextStyle::new(font, color);
        Text::with_baseline(text, top_left, style, Baseline::Top)
            .draw(&mut self.canvas)
            .ok();
        self.text_size(text, font)
    }

    /// Draw `text` centered in the column `x_off..x_off + width`.
    pub fn text_centered(
        &mut self,
        x_off: u32,
        width: u32,
        y: u32,
        text: &str,
        font: &MonoFont<'_>,
        color: ColorValue,
    ) -> Size {
        let size = self.text_size(text, font);
        let x_plus = width.saturating_sub(size.width) / 2;
        self.text(
            Point::new((x_off + x_plus) as i32, y as i32),
            text,
            font,
            color,
        )
    }

    /// Draw a placeholder image below the cursor and advance past its
    /// reserved band. A missing or unreadable bitmap is logged and skipped;
    /// the band is reserved either way.
    pub fn draw_placeholder(&mut self, placeholder: Placeholder) {
        let reserved = self.settings.placeholder_height.min(self.cursor.remaining());
        let top = self.cursor.y();
        if let Err(error) = self.paste_bitmap(placeholder, top, reserved) {
            self.report_failure(&error);
        }
        self.cursor.advance(reserved);
    }

    fn paste_bitmap(
        &mut self,
        placeholder: Placeholder,
        top: u32,
        reserved: u32,
    ) -> Result<(), ContentError> {
        let path = self.settings.placeholder_path(placeholder);
        let missing = || ContentError::AssetMissing(path.to_path_buf());
        let data = fs::read(path).map_err(|_| missing())?;
        let bmp = Bmp::<Rgb888>::from_slice(&data).map_err(|_| missing())?;

        let size = bmp.size();
        let offset = Point::new(
            (self.settings.width.saturating_sub(size.width) / 2) as i32,
            (top + reserved.saturating_sub(size.height) / 2) as i32,
        );
        let bottom = (top + reserved) as i32;
        let map = self.color_map;
        self.canvas
            .draw_iter(
                bmp.pixels()
                    .map(|Pixel(p, c)| Pixel(p + offset, map.nearest(c)))
                    .filter(|Pixel(p, _)| p.y < bottom),
            )
            .ok();
        tracing::debug!(placeholder = ?placeholder, path = %path.display(), "placeholder drawn");
        Ok(())
    }
}
