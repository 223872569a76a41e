//! Weather glyphs and forecast tile geometry.
//!
//! Condition codes are OpenWeatherMap ids (2xx thunderstorm, 3xx drizzle,
//! 5xx rain, 6xx snow, 7xx atmosphere, 80x clouds). Icons are drawn from
//! embedded-graphics primitives so they scale with the tile and work with
//! every color mode.

use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{Circle, Line, Polyline, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use crate::canvas::Canvas;
use crate::color::ColorValue;
use crate::weather::CompassPoint;

/// Icon shown for a weather condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherGlyph {
    Sun,
    SunCloud,
    Cloud,
    Rain,
    HardRain,
    Thunder,
    ThunderRain,
    ThunderHardRain,
    Snow,
    Unknown,
}

impl WeatherGlyph {
    /// Glyph for any condition code: an exact match first, then the code's
    /// category (leading digit), then [`WeatherGlyph::Unknown`].
    pub fn for_condition(code: u32) -> Self {
        Self::exact(code)
            .or_else(|| Self::category(code))
            .unwrap_or(WeatherGlyph::Unknown)
    }

    fn exact(code: u32) -> Option<Self> {
        let glyph = match code {
            201 => WeatherGlyph::ThunderRain,
            202 => WeatherGlyph::ThunderHardRain,
            502 | 503 | 504 | 522 => WeatherGlyph::HardRain,
            800 => WeatherGlyph::Sun,
            801..=803 => WeatherGlyph::SunCloud,
            804 => WeatherGlyph::Cloud,
            _ => return None,
        };
        Some(glyph)
    }

    fn category(code: u32) -> Option<Self> {
        let mut leading = code;
        while leading >= 10 {
            leading /= 10;
        }
        match leading {
            2 => Some(WeatherGlyph::Thunder),
            3 | 5 => Some(WeatherGlyph::Rain),
            6 => Some(WeatherGlyph::Snow),
            _ => None,
        }
    }
}

/// Two equal rows of equal-width tiles between `top` and `bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub top: u32,
    pub columns: u32,
    pub tile_width: u32,
    pub row_height: u32,
}

impl TileGrid {
    pub const ROWS: u32 = 2;

    pub fn new(width: u32, top: u32, bottom: u32, columns: u32) -> Self {
        let columns = columns.max(1);
        TileGrid {
            top,
            columns,
            tile_width: width / columns,
            row_height: bottom.saturating_sub(top) / Self::ROWS,
        }
    }

    /// Left edge of a column
    pub fn x(&self, column: u32) -> u32 {
        column * self.tile_width
    }

    /// Top edge of a row
    pub fn y(&self, row: u32) -> u32 {
        self.top + row * self.row_height
    }

    pub fn tile(&self, row: u32, column: u32) -> Rectangle {
        Rectangle::new(
            Point::new(self.x(column) as i32, self.y(row) as i32),
            Size::new(self.tile_width, self.row_height),
        )
    }

    /// First free row below both tile rows
    pub fn bottom(&self) -> u32 {
        self.y(Self::ROWS)
    }
}

/// Draw `glyph` inside a square of `size` pixels centered at `center`.
pub fn draw_glyph(
    canvas: &mut Canvas,
    glyph: WeatherGlyph,
    center: Point,
    size: u32,
    color: ColorValue,
    background: ColorValue,
) {
    let s = size as i32;
    let icon = Icon {
        color,
        background,
        s,
    };
    let cloud_center = center - Point::new(0, s / 6);
    match glyph {
        WeatherGlyph::Sun => icon.sun(canvas, center, s),
        WeatherGlyph::SunCloud => {
            icon.sun(canvas, center + Point::new(s / 6, -s / 6), s * 2 / 3);
            icon.cloud(canvas, center + Point::new(-s / 10, s / 8), s * 4 / 5);
        }
        WeatherGlyph::Cloud => icon.cloud(canvas, center, s),
        WeatherGlyph::Rain => {
            icon.cloud(canvas, cloud_center, s * 4 / 5);
            icon.drops(canvas, center, 3);
        }
        WeatherGlyph::HardRain => {
            icon.cloud(canvas, cloud_center, s * 4 / 5);
            icon.drops(canvas, center, 5);
        }
        WeatherGlyph::Thunder => {
            icon.cloud(canvas, cloud_center, s * 4 / 5);
            icon.bolt(canvas, center);
        }
        WeatherGlyph::ThunderRain => {
            icon.cloud(canvas, cloud_center, s * 4 / 5);
            icon.drops(canvas, center, 2);
            icon.bolt(canvas, center);
        }
        WeatherGlyph::ThunderHardRain => {
            icon.cloud(canvas, cloud_center, s * 4 / 5);
            icon.drops(canvas, center, 4);
            icon.bolt(canvas, center);
        }
        WeatherGlyph::Snow => {
            icon.cloud(canvas, cloud_center, s * 4 / 5);
            icon.flakes(canvas, center);
        }
        WeatherGlyph::Unknown => icon.unknown(canvas, center),
    }
}

/// Arrow of `length` pixels centered at `center`, pointing where the wind blows.
pub fn draw_wind_arrow(
    canvas: &mut Canvas,
    direction: CompassPoint,
    center: Point,
    length: u32,
    color: ColorValue,
) {
    let (dx, dy) = direction.downwind();
    let half = length as f64 / 2.0;
    let tip = center + Point::new((dx * half).round() as i32, (dy * half).round() as i32);
    let tail = center - Point::new((dx * half).round() as i32, (dy * half).round() as i32);
    let style = PrimitiveStyle::with_stroke(color, 2);
    Line::new(tail, tip).into_styled(style).draw(canvas).ok();

    // Barbs at ±135° from the shaft
    let barb = half * 0.6;
    for turn in [135.0_f64, -135.0] {
        let (sin, cos) = turn.to_radians().sin_cos();
        let bx = dx * cos - dy * sin;
        let by = dx * sin + dy * cos;
        let end = tip + Point::new((bx * barb).round() as i32, (by * barb).round() as i32);
        Line::new(tip, end).into_styled(style).draw(canvas).ok();
    }
}

struct Icon {
    color: ColorValue,
    background: ColorValue,
    s: i32,
}

impl Icon {
    fn sun(&self, canvas: &mut Canvas, center: Point, s: i32) {
        Circle::with_center(center, (s / 2).max(1) as u32)
            .into_styled(PrimitiveStyle::with_fill(self.color))
            .draw(canvas)
            .ok();
        let inner = s as f64 * 0.33;
        let outer = s as f64 * 0.48;
        let style = PrimitiveStyle::with_stroke(self.color, 2);
        for ray in 0..8 {
            let (sin, cos) = (ray as f64 * 45.0).to_radians().sin_cos();
            let from = center + Point::new((cos * inner) as i32, (sin * inner) as i32);
            let to = center + Point::new((cos * outer) as i32, (sin * outer) as i32);
            Line::new(from, to).into_styled(style).draw(canvas).ok();
        }
    }

    fn cloud(&self, canvas: &mut Canvas, center: Point, s: i32) {
        let style = PrimitiveStyleBuilder::new()
            .fill_color(self.color)
            .stroke_color(self.background)
            .stroke_width(1)
            .build();
        Circle::with_center(center + Point::new(-s / 5, 0), (s * 2 / 5) as u32)
            .into_styled(style)
            .draw(canvas)
            .ok();
        Circle::with_center(center + Point::new(s / 10, -s / 20), (s / 2) as u32)
            .into_styled(style)
            .draw(canvas)
            .ok();
        Rectangle::new(
            center + Point::new(-s * 2 / 5, 0),
            Size::new((s * 4 / 5) as u32, (s / 5).max(1) as u32),
        )
        .into_styled(PrimitiveStyle::with_fill(self.color))
        .draw(canvas)
        .ok();
    }

    fn drops(&self, canvas: &mut Canvas, center: Point, count: i32) {
        let style = PrimitiveStyle::with_stroke(self.color, 2);
        let spacing = self.s / 6;
        let top = center.y + self.s / 8;
        let length = self.s / 4;
        let left = center.x - spacing * (count - 1) / 2;
        for i in 0..count {
            let x = left + i * spacing;
            Line::new(Point::new(x, top), Point::new(x - length / 3, top + length))
                .into_styled(style)
                .draw(canvas)
                .ok();
        }
    }

    fn bolt(&self, canvas: &mut Canvas, center: Point) {
        let s = self.s;
        let points = [
            center + Point::new(s / 12, s / 12),
            center + Point::new(-s / 12, s / 4),
            center + Point::new(s / 12, s / 4),
            center + Point::new(-s / 12, s * 5 / 12),
        ];
        Polyline::new(&points)
            .into_styled(PrimitiveStyle::with_stroke(self.color, 3))
            .draw(canvas)
            .ok();
    }

    fn flakes(&self, canvas: &mut Canvas, center: Point) {
        let style = PrimitiveStyle::with_stroke(self.color, 1);
        let arm = (self.s / 12).max(1);
        let y = center.y + self.s / 4;
        for x in [center.x - self.s / 5, center.x, center.x + self.s / 5] {
            let c = Point::new(x, y);
            for (dx, dy) in [(arm, 0), (0, arm), (arm, arm), (arm, -arm)] {
                Line::new(c - Point::new(dx, dy), c + Point::new(dx, dy))
                    .into_styled(style)
                    .draw(canvas)
                    .ok();
            }
        }
    }

    fn unknown(&self, canvas: &mut Canvas, center: Point) {
        Circle::with_center(center, (self.s * 3 / 4).max(1) as u32)
            .into_styled(PrimitiveStyle::with_stroke(self.color, 2))
            .draw(canvas)
            .ok();
        let style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Middle)
            .build();
        Text::with_text_style(
            "?",
            center,
            MonoTextStyle::new(&FONT_10X20, self.color),
            style,
        )
        .draw(canvas)
        .ok();
    }
}
