//! Weather content block: two rows of forecast tiles.
//!
//! The first row shows current conditions followed by three hours chosen by
//! [`HourPlan`]; the second row shows the next four days.

use chrono::Timelike;
use embedded_graphics::prelude::*;

use crate::error::ContentError;
use crate::glyphs::{draw_glyph, draw_wind_arrow, TileGrid, WeatherGlyph};
use crate::layout::{LayoutContext, Placeholder};
use crate::weather::{pick_days, CompassPoint, HourPlan, WeatherSource};
use crate::{Forecast, WeatherSample};

const COLUMNS: u32 = 4;
const PAD: u32 = 2;

/// Draws the forecast tiles below the cursor.
pub struct WeatherContentProvider {
    source: Box<dyn WeatherSource>,
}

impl WeatherContentProvider {
    pub fn new(source: Box<dyn WeatherSource>) -> Self {
        WeatherContentProvider { source }
    }

    pub async fn draw_content(&self, ctx: &mut LayoutContext<'_>) {
        let result = self
            .source
            .forecast()
            .await
            .map_err(|err| ContentError::unavailable(self.source.id(), err));
        self.draw_block(ctx, result);
    }

    pub fn draw_block(&self, ctx: &mut LayoutContext<'_>, result: Result<Forecast, ContentError>) {
        match result {
            Ok(forecast) => draw_forecast(ctx, &forecast),
            Err(error) => {
                ctx.report_failure(&error);
                ctx.draw_placeholder(Placeholder::NoConnection);
            }
        }
    }
}

fn draw_forecast(ctx: &mut LayoutContext<'_>, forecast: &Forecast) {
    let grid = TileGrid::new(
        ctx.settings.width,
        ctx.y_off(),
        ctx.cursor().limit(),
        COLUMNS,
    );
    if grid.row_height == 0 {
        tracing::warn!(y = grid.top, "no room left for forecast tiles");
        return;
    }

    let plan = HourPlan::for_hour(forecast.current.time.hour());
    tracing::debug!(hours = ?plan.hours, next_day = plan.next_day, "forecast plan");

    current_tile(ctx, &grid, &forecast.current);
    for (column, sample) in (1..COLUMNS).zip(plan.pick(forecast)) {
        let label = sample.time.format("%H:%M").to_string();
        let temp = format!("{:.1}°", sample.temp);
        forecast_tile(ctx, &grid, 0, column, &label, &temp, sample.condition);
    }
    for (column, sample) in (0..COLUMNS).zip(pick_days(forecast, &plan, COLUMNS as usize)) {
        let label = sample.time.format("%a %d.%m.").to_string();
        let temp = format!(
            "{}°/{}°",
            sample.temp_min.round() as i64,
            sample.temp_max.round() as i64
        );
        forecast_tile(ctx, &grid, 1, column, &label, &temp, sample.condition);
    }

    for column in 1..COLUMNS {
        ctx.vline(grid.x(column), grid.top, grid.bottom());
    }
    ctx.hline(grid.y(1));
    ctx.cursor_mut().advance_to(grid.bottom());
}

/// Big current temperature with the wind underneath
fn current_tile(ctx: &mut LayoutContext<'_>, grid: &TileGrid, sample: &WeatherSample) {
    let fonts = ctx.fonts;
    let colors = ctx.colors;
    let (x, y) = (grid.x(0), grid.y(0));
    let width = grid.tile_width;

    let label = sample.time.format("%H:%M").to_string();
    let label_size = ctx.text_centered(x, width, y + PAD, &label, fonts.text, colors.text);

    let big = format!("{:.1}°", sample.temp);
    let big_height = fonts.big.character_size.height;
    let big_y = y + grid.row_height.saturating_sub(big_height) / 2;
    ctx.text_centered(x, width, big_y.max(y + label_size.height + PAD), &big, fonts.big, colors.big);

    let direction = CompassPoint::from_degrees(sample.wind_deg);
    let wind = format!("{} {:.1}", direction.label(), sample.wind_speed);
    let text_height = fonts.text.character_size.height;
    let wind_y = (y + grid.row_height).saturating_sub(text_height + PAD);
    let wind_size = ctx.text_size(&wind, fonts.text);
    let arrow = text_height;
    let total = arrow + PAD * 2 + wind_size.width;
    let left = x + width.saturating_sub(total) / 2;
    draw_wind_arrow(
        ctx.canvas_mut(),
        direction,
        Point::new((left + arrow / 2) as i32, (wind_y + text_height / 2) as i32),
        arrow,
        colors.glyph,
    );
    ctx.text(
        Point::new((left + arrow + PAD * 2) as i32, wind_y as i32),
        &wind,
        fonts.text,
        colors.text,
    );
}

/// Label, temperature and condition glyph, stacked and centered
fn forecast_tile(
    ctx: &mut LayoutContext<'_>,
    grid: &TileGrid,
    row: u32,
    column: u32,
    label: &str,
    temp: &str,
    condition: u32,
) {
    let fonts = ctx.fonts;
    let colors = ctx.colors;
    let (x, y) = (grid.x(column), grid.y(row));
    let width = grid.tile_width;

    let label_size = ctx.text_centered(x, width, y + PAD, label, fonts.text, colors.text);
    let temp_y = y + PAD * 2 + label_size.height;
    let temp_size = ctx.text_centered(x, width, temp_y, temp, fonts.text, colors.text);

    let glyph_top = temp_y + temp_size.height + PAD;
    let glyph_bottom = y + grid.row_height;
    let size = glyph_bottom
        .saturating_sub(glyph_top)
        .min(width)
        .saturating_sub(PAD * 2);
    if size < 8 {
        return;
    }
    let center = Point::new(
        (x + width / 2) as i32,
        ((glyph_top + glyph_bottom) / 2) as i32,
    );
    let background = ctx.colors.background;
    draw_glyph(
        ctx.canvas_mut(),
        WeatherGlyph::for_condition(condition),
        center,
        size,
        colors.glyph,
        background,
    );
}
