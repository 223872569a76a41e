//! # Daily Agenda Core Library
//!
//! This library renders one still image, a "daily agenda", for low refresh
//! rate e-paper displays. The screen is composed top-down once per run:
//!
//! 1. The [`compositor`] draws the title and the day-of-month badge.
//! 2. Exactly one [`provider`] (calendar agenda or weather forecast) draws its
//!    block below, advancing the shared layout cursor.
//! 3. The compositor adds the status line and hands the image to a
//!    [`display`] backend.
//!
//! ## Design Philosophy
//!
//! ### One writer
//! All drawing state lives in a [`layout::LayoutContext`] that is lent by
//! exclusive borrow to one provider at a time. Network fetches complete
//! before a provider touches the cursor, so slow sources never interleave
//! with drawing.
//!
//! ### Portable colors
//! Layout code names colors symbolically. The [`color::ColorMap`] decides once
//! at startup whether those names become palette indices (real three- or
//! seven-color panels) or RGB triples (simulation).
//!
//! ### Degrade, never crash
//! A failing calendar or weather source produces a placeholder image and a
//! non-zero status code, but always a complete, well-formed screen.
//!
//! ## Core Types
//! - [`AgendaEntry`]: one normalized calendar event for today
//! - [`WeatherSample`]: one current, hourly or daily forecast point
//! - [`Forecast`]: everything one weather request returns

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};

// Module declarations
pub mod agenda;
pub mod agenda_provider;
pub mod caldav;
pub mod canvas;
pub mod color;
pub mod compositor;
pub mod config;
pub mod display;
pub mod epd4in2b_v2;
pub mod error;
pub mod glyphs;
#[cfg(all(target_os = "linux", feature = "hardware"))]
pub mod hardware;
pub mod ical;
pub mod layout;
pub mod provider;
pub mod renderer;
pub mod weather;
pub mod weather_provider;

use color::ColorValue;

/// One calendar event, normalized to today's local time.
///
/// `start <= end` always holds and both lie within today: events reaching
/// into yesterday or tomorrow are clipped at the day boundaries.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use daily_agenda_lib::{color::ColorValue, AgendaEntry};
///
/// let day = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
/// let entry = AgendaEntry {
///     start: day.and_hms_opt(9, 0, 0).unwrap(),
///     end: day.and_hms_opt(10, 30, 0).unwrap(),
///     title: "Standup".to_string(),
///     location: "Room 4".to_string(),
///     color: ColorValue::Rgb(0, 0, 255),
///     source_id: "work".to_string(),
///     is_full_day: false,
/// };
/// assert_eq!(entry.time_range(), "09:00-10:30");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgendaEntry {
    /// Local start time
    pub start: NaiveDateTime,
    /// Local end time, at most the end of today
    pub end: NaiveDateTime,
    /// Event summary, empty when the event has none
    pub title: String,
    /// Event location, empty when the event has none
    pub location: String,
    /// Row background, taken from the calendar's configured color
    pub color: ColorValue,
    /// Name of the calendar source the event came from
    pub source_id: String,
    /// True for events covering the whole day; their times are not drawn
    pub is_full_day: bool,
}

impl AgendaEntry {
    /// "HH:MM" of the start time
    pub fn start_label(&self) -> String {
        self.start.format("%H:%M").to_string()
    }

    /// "HH:MM" of the end time
    pub fn end_label(&self) -> String {
        self.end.format("%H:%M").to_string()
    }

    /// "HH:MM-HH:MM"
    pub fn time_range(&self) -> String {
        format!("{}-{}", self.start_label(), self.end_label())
    }

    /// Start and end as minutes of the day.
    ///
    /// Orders exactly like the "HH:MM-HH:MM" string for entries of one day.
    pub fn sort_key(&self) -> (u32, u32) {
        let minutes = |t: &NaiveDateTime| t.hour() * 60 + t.minute();
        (minutes(&self.start), minutes(&self.end))
    }
}

/// One weather data point.
///
/// Hourly and current samples carry a single temperature, which is copied to
/// `temp_min` and `temp_max`. Daily samples carry the day temperature plus
/// the real minimum and maximum.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSample {
    /// Sample time in the forecast location's offset
    pub time: DateTime<FixedOffset>,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// hPa
    pub pressure: f64,
    /// Percent
    pub humidity: f64,
    pub wind_speed: f64,
    /// Degrees, meteorological (0 = from north)
    pub wind_deg: f64,
    /// OpenWeatherMap condition code, e.g. 800 for clear sky
    pub condition: u32,
}

/// Current conditions plus hourly and daily forecasts.
#[derive(Clone, Debug, PartialEq)]
pub struct Forecast {
    pub current: WeatherSample,
    /// Starts at the current hour
    pub hourly: Vec<WeatherSample>,
    /// Starts today
    pub daily: Vec<WeatherSample>,
}
