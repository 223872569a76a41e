//! In-memory drawing surface and font lookup.
//!
//! [`Canvas`] stores one [`ColorValue`] per pixel and implements the
//! embedded-graphics `DrawTarget`, so every primitive, text style and bitmap
//! from that ecosystem draws onto it unchanged, whether the active color map
//! is paletted or RGB.

use core::convert::Infallible;

use embedded_graphics::{
    mono_font::{iso_8859_1, MonoFont},
    prelude::*,
    primitives::Rectangle,
};

use crate::color::ColorValue;
use crate::config::FontConfig;

/// Full-screen image buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<ColorValue>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: ColorValue) -> Self {
        Canvas {
            width,
            height,
            pixels: vec![background; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel data
    pub fn pixels(&self) -> &[ColorValue] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<ColorValue> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// Number of pixels in `color` inside the rows `y0..y1`
    pub fn count_in_rows(&self, color: ColorValue, y0: u32, y1: u32) -> usize {
        let y1 = y1.min(self.height);
        if y0 >= y1 {
            return 0;
        }
        let start = (y0 * self.width) as usize;
        let end = (y1 * self.width) as usize;
        self.pixels[start..end].iter().filter(|&&c| c == color).count()
    }

    fn index(&self, point: Point) -> Option<usize> {
        if point.x < 0 || point.y < 0 {
            return None;
        }
        let (x, y) = (point.x as u32, point.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Canvas {
    type Color = ColorValue;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let Some(index) = self.index(point) {
                self.pixels[index] = color;
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };
        for y in area.top_left.y..=bottom_right.y {
            let row = (y as u32 * self.width) as usize;
            let start = row + area.top_left.x as usize;
            let end = row + bottom_right.x as usize + 1;
            self.pixels[start..end].fill(color);
        }
        Ok(())
    }
}

/// Mono font by name. Names follow the X11 cell size, `b` marks bold.
pub fn font_by_name(name: &str) -> Option<&'static MonoFont<'static>> {
    let font = match name.trim().to_ascii_lowercase().as_str() {
        "5x8" => &iso_8859_1::FONT_5X8,
        "6x10" => &iso_8859_1::FONT_6X10,
        "6x12" => &iso_8859_1::FONT_6X12,
        "6x13" => &iso_8859_1::FONT_6X13,
        "6x13b" => &iso_8859_1::FONT_6X13_BOLD,
        "7x13" => &iso_8859_1::FONT_7X13,
        "7x13b" => &iso_8859_1::FONT_7X13_BOLD,
        "7x14" => &iso_8859_1::FONT_7X14,
        "7x14b" => &iso_8859_1::FONT_7X14_BOLD,
        "8x13" => &iso_8859_1::FONT_8X13,
        "8x13b" => &iso_8859_1::FONT_8X13_BOLD,
        "9x15" => &iso_8859_1::FONT_9X15,
        "9x15b" => &iso_8859_1::FONT_9X15_BOLD,
        "9x18" => &iso_8859_1::FONT_9X18,
        "9x18b" => &iso_8859_1::FONT_9X18_BOLD,
        "10x20" => &iso_8859_1::FONT_10X20,
        _ => return None,
    };
    Some(font)
}

/// Fonts for every text element on the screen
#[derive(Clone, Copy)]
pub struct FontSet {
    pub title: &'static MonoFont<'static>,
    pub day: &'static MonoFont<'static>,
    pub time: &'static MonoFont<'static>,
    pub text: &'static MonoFont<'static>,
    pub big: &'static MonoFont<'static>,
}

impl FontSet {
    /// Resolve configured names, logging and substituting unknown ones.
    pub fn resolve(config: &FontConfig) -> Self {
        let pick = |element: &str, name: &str| {
            font_by_name(name).unwrap_or_else(|| {
                tracing::warn!(element, font = name, "font not available, using 6x13");
                &iso_8859_1::FONT_6X13
            })
        };
        FontSet {
            title: pick("title", &config.title),
            day: pick("day", &config.day),
            time: pick("time", &config.time),
            text: pick("text", &config.text),
            big: pick("big", &config.big),
        }
    }
}

impl Default for FontSet {
    fn default() -> Self {
        FontSet::resolve(&FontConfig::default())
    }
}

impl core::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let size = |font: &MonoFont<'_>| font.character_size;
        f.debug_struct("FontSet")
            .field("title", &size(self.title))
            .field("day", &size(self.day))
            .field("time", &size(self.time))
            .field("text", &size(self.text))
            .field("big", &size(self.big))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{Line, PrimitiveStyle};

    const WHITE: ColorValue = ColorValue::Rgb(255, 255, 255);
    const RED: ColorValue = ColorValue::Rgb(255, 0, 0);

    #[test]
    fn new_canvas_is_background() {
        let canvas = Canvas::new(10, 4, WHITE);
        assert_eq!(canvas.pixels().len(), 40);
        assert!(canvas.pixels().iter().all(|&c| c == WHITE));
        assert_eq!(canvas.size(), Size::new(10, 4));
    }

    #[test]
    fn out_of_bounds_pixels_are_ignored() {
        let mut canvas = Canvas::new(10, 4, WHITE);
        Line::new(Point::new(-5, 1), Point::new(20, 1))
            .into_styled(PrimitiveStyle::with_stroke(RED, 1))
            .draw(&mut canvas)
            .unwrap();
        assert_eq!(canvas.count_in_rows(RED, 0, 4), 10);
        assert_eq!(canvas.pixel(10, 1), None);
    }

    #[test]
    fn fill_solid_clips_to_canvas() {
        let mut canvas = Canvas::new(10, 10, WHITE);
        canvas
            .fill_solid(&Rectangle::new(Point::new(8, 8), Size::new(5, 5)), RED)
            .unwrap();
        assert_eq!(canvas.count_in_rows(RED, 0, 10), 4);
        assert_eq!(canvas.pixel(9, 9), Some(RED));
        assert_eq!(canvas.pixel(7, 9), Some(WHITE));
    }

    #[test]
    fn fonts_resolve_with_fallback() {
        assert!(font_by_name("10x20").is_some());
        assert!(font_by_name("DejaVuSerif").is_none());

        let config = FontConfig {
            title: "nonsense".to_string(),
            ..FontConfig::default()
        };
        let fonts = FontSet::resolve(&config);
        assert_eq!(fonts.title.character_size, Size::new(6, 13));
        assert_eq!(fonts.day.character_size, Size::new(10, 20));
    }
}
