//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! daily-agenda.toml file. It provides a centralized way to configure the
//! screen geometry, fonts, colors, calendar and weather sources, and other
//! runtime parameters.
//!
//! The rest of the crate treats a loaded [`Config`] as validated and fully
//! resolved: colors are looked up by name through the color map, fonts by
//! name through the font set, and nothing downstream touches the filesystem
//! for settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_PATH: &str = "daily-agenda.toml";

/// Application configuration loaded from daily-agenda.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Screen geometry and layout constants
    pub display: DisplayConfig,
    /// Font names per UI element
    pub fonts: FontConfig,
    /// Symbolic color names per UI element
    pub colors: ColorConfig,
    /// Which content block fills the screen
    pub content: ContentConfig,
    /// Placeholder bitmaps for failed or empty content
    pub placeholders: PlaceholderConfig,
    /// CalDAV calendars merged into the agenda
    pub calendars: Vec<CalendarConfig>,
    /// OpenWeatherMap settings, required for the weather provider
    pub weather: Option<WeatherConfig>,
    /// Optional battery gauge shown in the status line
    pub battery: Option<BatteryConfig>,
    /// Panel wiring, used when built with the `hardware` feature
    pub hardware: HardwareConfig,
    /// Process level behavior
    pub runtime: RuntimeConfig,
}

/// Color model of the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// Three-color panel when built with hardware support, RGB simulation otherwise
    #[default]
    Auto,
    Rgb,
    ThreeColor,
    SevenColor,
}

/// Display geometry and layout constants
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Height of one agenda row
    pub entry_height: u32,
    /// Height reserved for the status line at the bottom
    pub status_height: u32,
    /// (top, bottom, left, right)
    pub margins: (u32, u32, u32, u32),
    /// Title drawn in the upper left corner
    pub title: String,
    pub mode: DisplayMode,
    /// Vertical space a placeholder image occupies
    pub placeholder_height: u32,
    /// Border color name, applied before the image is shown
    pub border: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            width: 400,  // Waveshare 4.2" / Inky wHAT
            height: 300, // Waveshare 4.2" / Inky wHAT
            entry_height: 40,
            status_height: 19,
            margins: (5, 5, 5, 5),
            title: "Daily Agenda".to_string(),
            mode: DisplayMode::Auto,
            placeholder_height: 100,
            border: "white".to_string(),
        }
    }
}

/// Font names, see [`crate::canvas::FontSet`] for the accepted values
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FontConfig {
    pub title: String,
    pub day: String,
    pub time: String,
    pub text: String,
    /// Current temperature in the weather view
    pub big: String,
}

impl Default for FontConfig {
    fn default() -> Self {
        FontConfig {
            title: "10x20".to_string(),
            day: "10x20".to_string(),
            time: "9x18b".to_string(),
            text: "6x13".to_string(),
            big: "10x20".to_string(),
        }
    }
}

/// Symbolic color names for every colored UI element
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColorConfig {
    pub background: String,
    pub title: String,
    pub day: String,
    pub day_bg: String,
    /// Day badge background on Sundays
    pub day_bg_sunday: String,
    pub text: String,
    pub line: String,
    pub big: String,
    pub glyph: String,
    pub battery_ok: String,
    pub battery_low: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        ColorConfig {
            background: "white".to_string(),
            title: "black".to_string(),
            day: "white".to_string(),
            day_bg: "black".to_string(),
            day_bg_sunday: "red".to_string(),
            text: "black".to_string(),
            line: "black".to_string(),
            big: "black".to_string(),
            glyph: "black".to_string(),
            battery_ok: "black".to_string(),
            battery_low: "red".to_string(),
        }
    }
}

/// Content provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Agenda,
    Weather,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    pub provider: ProviderKind,
}

/// Placeholder bitmaps (24-bit BMP)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    pub no_connect: PathBuf,
    pub no_events: PathBuf,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        PlaceholderConfig {
            no_connect: PathBuf::from("/usr/local/share/daily-agenda/no-connect.bmp"),
            no_events: PathBuf::from("/usr/local/share/daily-agenda/no-events.bmp"),
        }
    }
}

/// One CalDAV calendar
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// Short identifier used in logs
    pub name: String,
    /// CalDAV endpoint (server root, principal or calendar home)
    pub url: String,
    pub user: String,
    pub password: String,
    /// Display name of the calendar on the server
    pub calendar: String,
    /// Row background for this calendar's entries
    pub color: String,
}

/// OpenWeatherMap One-Call settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeatherConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub api_key: String,
    #[serde(default = "default_units")]
    pub units: String,
}

fn default_units() -> String {
    "metric".to_string()
}

/// Battery gauge read from sysfs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatteryConfig {
    /// File containing the charge level in percent, e.g. /sys/class/power_supply/BAT0/capacity
    pub capacity_path: PathBuf,
    /// Levels below this are shown in the "battery low" color
    #[serde(default = "default_low_percent")]
    pub low_percent: u8,
}

fn default_low_percent() -> u8 {
    20
}

/// GPIO and SPI wiring of the e-paper HAT (BCM numbering)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub gpio_chip: PathBuf,
    /// Chip select is driven by the SPI device (CE0)
    pub spi_device: PathBuf,
    pub dc_pin: u32,
    pub rst_pin: u32,
    pub busy_pin: u32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        HardwareConfig {
            gpio_chip: PathBuf::from("/dev/gpiochip0"),
            spi_device: PathBuf::from("/dev/spidev0.0"),
            dc_pin: 25,
            rst_pin: 17,
            busy_pin: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Exit with status 0 even after a degraded render
    pub no_shutdown_on_error: bool,
    /// Upper bound for every remote request
    pub request_timeout_secs: u64,
    /// Where the simulated display writes its image
    pub output: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            no_shutdown_on_error: false,
            request_timeout_secs: 20,
            output: PathBuf::from("/tmp/daily-agenda.ppm"),
        }
    }
}

impl Config {
    /// Load configuration from daily-agenda.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_PATH)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    tracing::info!(
                        path = %path.display(),
                        calendars = config.calendars.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        tracing::info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}
