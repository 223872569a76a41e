//! # Terminal Preview
//!
//! Development mode (`--stdout`) prints the finished canvas as a block of
//! characters instead of driving a panel, so layouts can be checked over SSH
//! or in CI logs.

use crate::canvas::Canvas;
use crate::color::{ColorMap, ColorValue};

/// Terminal columns used for the preview
pub const ASCII_COLUMNS: u32 = 100;

/// Print the canvas to stdout.
pub fn draw_ascii(canvas: &Canvas, color_map: &ColorMap, background: ColorValue) {
    for line in ascii_lines(canvas, color_map, background, ASCII_COLUMNS) {
        println!("{}", line);
    }
}

/// Downsample the canvas into `columns` characters per line.
///
/// Terminal cells are roughly twice as tall as wide, so each character covers
/// a cell twice as high as it is wide. Empty cells are blank; otherwise the
/// most common non-background color of the cell picks the character.
pub fn ascii_lines(
    canvas: &Canvas,
    color_map: &ColorMap,
    background: ColorValue,
    columns: u32,
) -> Vec<String> {
    let cell_w = canvas.width().div_ceil(columns.max(1)).max(1);
    let cell_h = cell_w * 2;
    let rows = canvas.height().div_ceil(cell_h);
    let cols = canvas.width().div_ceil(cell_w);

    let mut lines = Vec::with_capacity(rows as usize);
    for row in 0..rows {
        let mut line = String::with_capacity(cols as usize);
        for col in 0..cols {
            let mut ink: Vec<(ColorValue, u32)> = Vec::new();
            for y in row * cell_h..((row + 1) * cell_h).min(canvas.height()) {
                for x in col * cell_w..((col + 1) * cell_w).min(canvas.width()) {
                    match canvas.pixel(x, y) {
                        Some(c) if c != background => match ink.iter_mut().find(|(v, _)| *v == c) {
                            Some((_, n)) => *n += 1,
                            None => ink.push((c, 1)),
                        },
                        _ => {}
                    }
                }
            }
            let dominant = ink.iter().max_by_key(|(_, n)| *n).map(|(c, _)| *c);
            line.push(dominant.map_or(' ', |c| shade(color_map.to_rgb(c))));
        }
        lines.push(line.trim_end().to_string());
    }
    lines
}

/// Character for an ink color: `*` for red-ish accents, otherwise by darkness
fn shade([r, g, b]: [u8; 3]) -> char {
    if r > 160 && g < 120 && b < 120 {
        return '*';
    }
    let luma = (2126 * r as u32 + 7152 * g as u32 + 722 * b as u32) / 10_000;
    match luma {
        0..=63 => '#',
        64..=127 => '+',
        128..=191 => ':',
        _ => '.',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorMode;
    use embedded_graphics::{
        prelude::*,
        primitives::{PrimitiveStyle, Rectangle},
    };

    const WHITE: ColorValue = ColorValue::Rgb(255, 255, 255);
    const BLACK: ColorValue = ColorValue::Rgb(0, 0, 0);
    const RED: ColorValue = ColorValue::Rgb(255, 0, 0);

    #[test]
    fn blank_canvas_prints_blank_lines() {
        let canvas = Canvas::new(400, 300, WHITE);
        let lines = ascii_lines(&canvas, &ColorMap::new(ColorMode::Rgb), WHITE, 100);
        // 4px wide, 8px tall cells
        assert_eq!(lines.len(), 38);
        assert!(lines.iter().all(|l| l.is_empty()));
    }

    #[test]
    fn ink_is_shaded_by_color() {
        let mut canvas = Canvas::new(40, 16, WHITE);
        Rectangle::new(Point::new(0, 0), Size::new(4, 8))
            .into_styled(PrimitiveStyle::with_fill(BLACK))
            .draw(&mut canvas)
            .unwrap();
        Rectangle::new(Point::new(8, 8), Size::new(4, 8))
            .into_styled(PrimitiveStyle::with_fill(RED))
            .draw(&mut canvas)
            .unwrap();

        let lines = ascii_lines(&canvas, &ColorMap::new(ColorMode::Rgb), WHITE, 10);
        assert_eq!(lines, ["#", "  *"]);
    }

    #[test]
    fn preview_prints_without_panicking() {
        let canvas = Canvas::new(8, 8, BLACK);
        draw_ascii(&canvas, &ColorMap::new(ColorMode::Rgb), WHITE);
    }
}
