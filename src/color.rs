//! # Color Mapping
//!
//! Layout code only ever names colors symbolically ("red", "gray", ...). The
//! [`ColorMap`] turns those names into the concrete pixel representation of
//! the active display:
//!
//! - **Palette**: a small index into the fixed palette of the e-paper panel.
//!   Panels without a native entry for a color degrade it to the panel's
//!   accent (red on both supported panels).
//! - **Rgb**: an RGB triple, used by the simulated display.
//!
//! The mode is chosen once at startup and the map is immutable afterwards.

use std::collections::HashMap;

use embedded_graphics::pixelcolor::{PixelColor, Rgb888, RgbColor};
use serde::{Deserialize, Serialize};

use crate::config::ColorConfig;

/// Concrete pixel value on the canvas.
///
/// Equality and hashing are per variant: a palette index never equals an RGB
/// triple, even when both would look the same on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorValue {
    /// Index into the hardware palette
    Palette(u8),
    /// RGB triple for the simulated display
    Rgb(u8, u8, u8),
}

impl PixelColor for ColorValue {
    type Raw = ();
}

/// The eight symbolic colors layout code may ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedColor {
    White,
    Black,
    Gray,
    Red,
    Yellow,
    Green,
    Blue,
    Orange,
}

impl NamedColor {
    pub const ALL: [NamedColor; 8] = [
        NamedColor::White,
        NamedColor::Black,
        NamedColor::Gray,
        NamedColor::Red,
        NamedColor::Yellow,
        NamedColor::Green,
        NamedColor::Blue,
        NamedColor::Orange,
    ];

    /// Parse a symbolic name. Unknown names fail closed to black.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "white" => NamedColor::White,
            "black" => NamedColor::Black,
            "gray" | "grey" => NamedColor::Gray,
            "red" => NamedColor::Red,
            "yellow" => NamedColor::Yellow,
            "green" => NamedColor::Green,
            "blue" => NamedColor::Blue,
            "orange" => NamedColor::Orange,
            other => {
                tracing::warn!(color = other, "unknown color name, using black");
                NamedColor::Black
            }
        }
    }

    /// Reference RGB appearance, also used by the simulated display.
    pub fn rgb(self) -> [u8; 3] {
        match self {
            NamedColor::White => [255, 255, 255],
            NamedColor::Black => [0, 0, 0],
            NamedColor::Gray => [128, 128, 128],
            NamedColor::Red => [255, 0, 0],
            NamedColor::Yellow => [255, 255, 0],
            NamedColor::Green => [0, 128, 0],
            NamedColor::Blue => [0, 0, 255],
            NamedColor::Orange => [255, 165, 0],
        }
    }
}

/// Fixed palettes of the supported e-paper panels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Palette {
    /// Black/white/red panels such as the Waveshare 4.2" B
    ThreeColor,
    /// Seven-color ACeP panels (Inky Impression, Waveshare 7.3" F)
    SevenColor,
}

const THREE_COLOR: [NamedColor; 3] = [NamedColor::Black, NamedColor::White, NamedColor::Red];

const SEVEN_COLOR: [NamedColor; 7] = [
    NamedColor::Black,
    NamedColor::White,
    NamedColor::Green,
    NamedColor::Blue,
    NamedColor::Red,
    NamedColor::Yellow,
    NamedColor::Orange,
];

impl Palette {
    /// Palette entries, position == hardware index.
    pub fn entries(self) -> &'static [NamedColor] {
        match self {
            Palette::ThreeColor => &THREE_COLOR,
            Palette::SevenColor => &SEVEN_COLOR,
        }
    }

    /// Index every missing color degrades to.
    pub fn accent(self) -> u8 {
        self.index_of_native(NamedColor::Red).unwrap_or(0)
    }

    fn index_of_native(self, color: NamedColor) -> Option<u8> {
        self.entries()
            .iter()
            .position(|&c| c == color)
            .map(|i| i as u8)
    }

    pub fn index_of(self, color: NamedColor) -> u8 {
        self.index_of_native(color).unwrap_or_else(|| self.accent())
    }
}

/// Pixel representation selected for the active display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Rgb,
    Palette(Palette),
}

/// Resolves symbolic colors for one display mode.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mode: ColorMode,
    contrast: HashMap<ColorValue, ColorValue>,
}

impl ColorMap {
    pub fn new(mode: ColorMode) -> Self {
        let mut map = ColorMap {
            mode,
            contrast: HashMap::with_capacity(NamedColor::ALL.len()),
        };
        for name in NamedColor::ALL {
            let fill = map.resolve_named(name);
            let text = map.contrast_by_luminance(fill);
            map.contrast.insert(fill, text);
        }
        map
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    /// Resolve a symbolic color name. Unknown names resolve to black.
    pub fn resolve(&self, name: &str) -> ColorValue {
        self.resolve_named(NamedColor::from_name(name))
    }

    pub fn resolve_named(&self, color: NamedColor) -> ColorValue {
        match self.mode {
            ColorMode::Rgb => {
                let [r, g, b] = color.rgb();
                ColorValue::Rgb(r, g, b)
            }
            ColorMode::Palette(palette) => ColorValue::Palette(palette.index_of(color)),
        }
    }

    /// Text color that stays legible on top of `fill`.
    pub fn background_for(&self, fill: ColorValue) -> ColorValue {
        self.contrast
            .get(&fill)
            .copied()
            .unwrap_or_else(|| self.contrast_by_luminance(fill))
    }

    /// RGB appearance of a canvas value.
    pub fn to_rgb(&self, value: ColorValue) -> [u8; 3] {
        match value {
            ColorValue::Rgb(r, g, b) => [r, g, b],
            ColorValue::Palette(index) => {
                let palette = match self.mode {
                    ColorMode::Palette(palette) => palette,
                    // Paletted values never reach an RGB canvas; show them as
                    // seven-color entries when they do.
                    ColorMode::Rgb => Palette::SevenColor,
                };
                palette
                    .entries()
                    .get(index as usize)
                    .copied()
                    .unwrap_or(NamedColor::Black)
                    .rgb()
            }
        }
    }

    /// Closest representable value for an arbitrary RGB pixel (bitmap assets).
    pub fn nearest(&self, rgb: Rgb888) -> ColorValue {
        match self.mode {
            ColorMode::Rgb => ColorValue::Rgb(rgb.r(), rgb.g(), rgb.b()),
            ColorMode::Palette(palette) => {
                let distance = |c: NamedColor| {
                    let [r, g, b] = c.rgb();
                    let dr = r as i32 - rgb.r() as i32;
                    let dg = g as i32 - rgb.g() as i32;
                    let db = b as i32 - rgb.b() as i32;
                    dr * dr + dg * dg + db * db
                };
                let index = palette
                    .entries()
                    .iter()
                    .enumerate()
                    .min_by_key(|&(_, c)| distance(*c))
                    .map(|(i, _)| i as u8)
                    .unwrap_or(0);
                ColorValue::Palette(index)
            }
        }
    }

    fn contrast_by_luminance(&self, fill: ColorValue) -> ColorValue {
        let [r, g, b] = self.to_rgb(fill);
        let luma = (2126 * r as u32 + 7152 * g as u32 + 722 * b as u32) / 10_000;
        if luma > 140 {
            self.resolve_named(NamedColor::Black)
        } else {
            self.resolve_named(NamedColor::White)
        }
    }
}

/// Every color-valued UI setting, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeColors {
    pub background: ColorValue,
    pub title: ColorValue,
    pub day: ColorValue,
    pub day_bg: ColorValue,
    pub day_bg_sunday: ColorValue,
    pub text: ColorValue,
    pub line: ColorValue,
    pub big: ColorValue,
    pub glyph: ColorValue,
    pub battery_ok: ColorValue,
    pub battery_low: ColorValue,
}

impl ThemeColors {
    pub fn resolve(config: &ColorConfig, map: &ColorMap) -> Self {
        ThemeColors {
            background: map.resolve(&config.background),
            title: map.resolve(&config.title),
            day: map.resolve(&config.day),
            day_bg: map.resolve(&config.day_bg),
            day_bg_sunday: map.resolve(&config.day_bg_sunday),
            text: map.resolve(&config.text),
            line: map.resolve(&config.line),
            big: map.resolve(&config.big),
            glyph: map.resolve(&config.glyph),
            battery_ok: map.resolve(&config.battery_ok),
            battery_low: map.resolve(&config.battery_low),
        }
    }
}
