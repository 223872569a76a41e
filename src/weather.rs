//! Weather forecast source and forecast sampling rules.
//!
//! [`OwmClient`] talks to the OpenWeatherMap One-Call API and turns its
//! response into a [`Forecast`]. Hourly temperatures arrive as plain numbers
//! and daily ones as `{day, min, max}` objects; both land in the same
//! [`WeatherSample`] shape.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, TimeZone, Timelike};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::config::WeatherConfig;
use crate::error::SourceError;
use crate::{Forecast, WeatherSample};

const ONE_CALL_URL: &str = "https://api.openweathermap.org/data/2.5/onecall";

/// A service that returns the current forecast for one location.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Name used in logs and failure reports
    fn id(&self) -> &str;

    /// Current, hourly and daily samples. Failure yields no partial result.
    async fn forecast(&self) -> Result<Forecast, SourceError>;
}

/// OpenWeatherMap One-Call client
pub struct OwmClient {
    url: Url,
    client: Client,
}

impl OwmClient {
    pub fn new(config: &WeatherConfig, timeout: Duration) -> Result<Self, SourceError> {
        let url = Url::parse_with_params(
            ONE_CALL_URL,
            &[
                ("lat", config.latitude.to_string()),
                ("lon", config.longitude.to_string()),
                ("exclude", "minutely,alerts".to_string()),
                ("appid", config.api_key.clone()),
                ("units", config.units.clone()),
            ],
        )
        .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(OwmClient { url, client })
    }
}

#[async_trait]
impl WeatherSource for OwmClient {
    fn id(&self) -> &str {
        "openweathermap"
    }

    async fn forecast(&self) -> Result<Forecast, SourceError> {
        let body = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let forecast = parse_forecast(&body)?;
        tracing::info!(
            hourly = forecast.hourly.len(),
            daily = forecast.daily.len(),
            temp = forecast.current.temp,
            "forecast received"
        );
        Ok(forecast)
    }
}

#[derive(Deserialize)]
struct OneCall {
    /// Seconds east of UTC at the forecast location
    #[serde(default)]
    timezone_offset: i32,
    current: RawSample,
    #[serde(default)]
    hourly: Vec<RawSample>,
    #[serde(default)]
    daily: Vec<RawSample>,
}

#[derive(Deserialize)]
struct RawSample {
    dt: i64,
    temp: RawTemp,
    #[serde(default)]
    pressure: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    wind_speed: f64,
    #[serde(default)]
    wind_deg: f64,
    #[serde(default)]
    weather: Vec<RawCondition>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTemp {
    Scalar(f64),
    Daily { day: f64, min: f64, max: f64 },
}

#[derive(Deserialize)]
struct RawCondition {
    id: u32,
}

impl RawSample {
    fn into_sample(self, offset: &FixedOffset) -> Result<WeatherSample, SourceError> {
        let time = offset
            .timestamp_opt(self.dt, 0)
            .single()
            .ok_or_else(|| SourceError::Malformed(format!("timestamp {} out of range", self.dt)))?;
        let (temp, temp_min, temp_max) = match self.temp {
            RawTemp::Scalar(t) => (t, t, t),
            RawTemp::Daily { day, min, max } => (day, min, max),
        };
        Ok(WeatherSample {
            time,
            temp,
            temp_min,
            temp_max,
            pressure: self.pressure,
            humidity: self.humidity,
            wind_speed: self.wind_speed,
            wind_deg: self.wind_deg,
            // Code 0 has no table entry and maps to the unknown glyph
            condition: self.weather.first().map(|w| w.id).unwrap_or(0),
        })
    }
}

/// Parse a One-Call JSON response.
pub fn parse_forecast(json: &str) -> Result<Forecast, SourceError> {
    let raw: OneCall = serde_json::from_str(json)?;
    let offset = FixedOffset::east_opt(raw.timezone_offset).ok_or_else(|| {
        SourceError::Malformed(format!("timezone offset {} out of range", raw.timezone_offset))
    })?;
    let convert = |samples: Vec<RawSample>| {
        samples
            .into_iter()
            .map(|s| s.into_sample(&offset))
            .collect::<Result<Vec<_>, _>>()
    };
    Ok(Forecast {
        current: raw.current.into_sample(&offset)?,
        hourly: convert(raw.hourly)?,
        daily: convert(raw.daily)?,
    })
}

/// Eight-point wind direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompassPoint {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassPoint {
    const ALL: [CompassPoint; 8] = [
        CompassPoint::N,
        CompassPoint::NE,
        CompassPoint::E,
        CompassPoint::SE,
        CompassPoint::S,
        CompassPoint::SW,
        CompassPoint::W,
        CompassPoint::NW,
    ];

    /// Sector of `degrees`, each 45° wide starting at north.
    /// Works for any finite input, negative or above 360.
    ///
    /// Sectors start at the named direction rather than being centered on
    /// it: 44° is still N and 45° is the first NE value, so 80° reads NE and
    /// 350° reads NW. Nearest-point rounding would break that boundary.
    pub fn from_degrees(degrees: f64) -> Self {
        let sector = (degrees.rem_euclid(360.0) / 45.0).floor() as usize % 8;
        Self::ALL[sector]
    }

    pub fn label(self) -> &'static str {
        match self {
            CompassPoint::N => "N",
            CompassPoint::NE => "NE",
            CompassPoint::E => "E",
            CompassPoint::SE => "SE",
            CompassPoint::S => "S",
            CompassPoint::SW => "SW",
            CompassPoint::W => "W",
            CompassPoint::NW => "NW",
        }
    }

    /// Direction the wind blows towards as a unit vector in screen
    /// coordinates (y grows downwards)
    pub fn downwind(self) -> (f64, f64) {
        let index = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        let angle = (index as f64 * 45.0).to_radians();
        (-angle.sin(), angle.cos())
    }
}

/// Hours shown in the first tile row, next to the current conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourPlan {
    pub hours: [u32; 3],
    /// The hours belong to tomorrow
    pub next_day: bool,
}

impl HourPlan {
    /// Choose three representative hours for the time of day.
    ///
    /// Before 18:00 the row spans from now (08:00 at the earliest) up to
    /// twelve hours ahead, ending by 21:00. Until 21:00 it may reach 23:00.
    /// Later in the evening it shows tomorrow's 08:00, 14:00 and 20:00.
    pub fn for_hour(hour: u32) -> Self {
        let span = |limit: u32| {
            let first = hour.max(8);
            let last = (first + 12).min(limit);
            [first, (first + last) / 2, last]
        };
        match hour {
            0..=17 => HourPlan {
                hours: span(21),
                next_day: false,
            },
            18..=20 => HourPlan {
                hours: span(23),
                next_day: false,
            },
            _ => HourPlan {
                hours: [8, 14, 20],
                next_day: true,
            },
        }
    }

    /// First entry of the daily forecast shown in the second row
    pub fn daily_offset(&self) -> usize {
        if self.next_day {
            2
        } else {
            1
        }
    }

    /// Hourly samples for the planned hours, in plan order. Hours the
    /// forecast does not cover are left out.
    pub fn pick<'f>(&self, forecast: &'f Forecast) -> Vec<&'f WeatherSample> {
        let today = forecast.current.time.date_naive();
        let date = if self.next_day {
            today.succ_opt().unwrap_or(today)
        } else {
            today
        };
        self.hours
            .iter()
            .filter_map(|&hour| find_hour(&forecast.hourly, date, hour))
            .collect()
    }
}

fn find_hour(samples: &[WeatherSample], date: NaiveDate, hour: u32) -> Option<&WeatherSample> {
    samples
        .iter()
        .find(|s| s.time.date_naive() == date && s.time.hour() == hour)
}

/// Daily samples for the second tile row
pub fn pick_days<'f>(forecast: &'f Forecast, plan: &HourPlan, count: usize) -> Vec<&'f WeatherSample> {
    forecast
        .daily
        .iter()
        .skip(plan.daily_offset())
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_CALL: &str = r#"{
        "lat": 52.52, "lon": 13.4,
        "timezone": "Europe/Berlin",
        "timezone_offset": 7200,
        "current": {"dt": 1792047600, "temp": 14.26, "pressure": 1012,
                    "humidity": 71, "wind_speed": 3.4, "wind_deg": 230,
                    "weather": [{"id": 803, "main": "Clouds"}]},
        "hourly": [
            {"dt": 1792047600, "temp": 14.26, "pressure": 1012, "humidity": 71,
             "wind_speed": 3.4, "wind_deg": 230, "weather": [{"id": 803}]},
            {"dt": 1792051200, "temp": 15.1, "pressure": 1012, "humidity": 68,
             "wind_speed": 3.1, "wind_deg": 225, "weather": [{"id": 500}]}
        ],
        "daily": [
            {"dt": 1792058400, "temp": {"day": 15.3, "min": 8.1, "max": 16.9,
             "night": 9.0, "eve": 12.0, "morn": 8.5},
             "pressure": 1011, "humidity": 60, "wind_speed": 4.2, "wind_deg": 210,
             "weather": [{"id": 501}]}
        ]
    }"#;

    #[test]
    fn parses_scalar_and_daily_temperatures() {
        let forecast = parse_forecast(ONE_CALL).unwrap();
        assert_eq!(forecast.current.temp, 14.26);
        assert_eq!(forecast.current.condition, 803);
        assert_eq!(forecast.hourly.len(), 2);
        assert_eq!(forecast.hourly[1].temp_min, 15.1);
        assert_eq!(forecast.hourly[1].temp_max, 15.1);

        let day = &forecast.daily[0];
        assert_eq!(day.temp, 15.3);
        assert_eq!(day.temp_min, 8.1);
        assert_eq!(day.temp_max, 16.9);
        assert_eq!(day.condition, 501);
    }

    #[test]
    fn times_use_the_location_offset() {
        let forecast = parse_forecast(ONE_CALL).unwrap();
        // 1792047600 is 2026-10-15 07:00 UTC, 09:00 at UTC+2
        assert_eq!(forecast.current.time.offset().local_minus_utc(), 7200);
        assert_eq!(forecast.current.time.hour(), 9);
    }

    #[test]
    fn missing_condition_is_code_zero() {
        let json = r#"{"current": {"dt": 0, "temp": 1.0}}"#;
        let forecast = parse_forecast(json).unwrap();
        assert_eq!(forecast.current.condition, 0);
        assert!(forecast.hourly.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            parse_forecast(r#"{"cod": 401, "message": "Invalid API key"}"#),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn compass_quantization() {
        assert_eq!(CompassPoint::from_degrees(0.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(44.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(45.0), CompassPoint::NE);
        assert_eq!(CompassPoint::from_degrees(360.0), CompassPoint::N);
        assert_eq!(CompassPoint::from_degrees(230.0), CompassPoint::SW);
        assert_eq!(CompassPoint::from_degrees(359.9), CompassPoint::NW);
        assert_eq!(CompassPoint::from_degrees(-10.0), CompassPoint::NW);
        assert_eq!(CompassPoint::from_degrees(720.0), CompassPoint::N);
        // sector edges, not nearest point
        assert_eq!(CompassPoint::from_degrees(80.0), CompassPoint::NE);
        assert_eq!(CompassPoint::from_degrees(350.0), CompassPoint::NW);
        assert_eq!(CompassPoint::SW.label(), "SW");
    }

    #[test]
    fn hour_plan_by_time_of_day() {
        assert_eq!(HourPlan::for_hour(6).hours, [8, 14, 20]);
        assert_eq!(HourPlan::for_hour(10).hours, [10, 15, 21]);
        assert_eq!(HourPlan::for_hour(17).hours, [17, 19, 21]);
        assert_eq!(HourPlan::for_hour(19).hours, [19, 21, 23]);
        assert_eq!(HourPlan::for_hour(20).hours, [20, 21, 23]);

        let late = HourPlan::for_hour(22);
        assert!(late.next_day);
        assert_eq!(late.hours, [8, 14, 20]);
        assert_eq!(late.daily_offset(), 2);
        assert_eq!(HourPlan::for_hour(12).daily_offset(), 1);
    }

    #[test]
    fn hours_are_picked_by_local_time() {
        let forecast = parse_forecast(ONE_CALL).unwrap();
        let plan = HourPlan {
            hours: [10, 9, 23],
            next_day: false,
        };
        let picked = plan.pick(&forecast);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].temp, 15.1);
        assert_eq!(picked[1].temp, 14.26);
    }

    #[test]
    fn days_skip_today() {
        let mut forecast = parse_forecast(ONE_CALL).unwrap();
        let template = forecast.daily[0].clone();
        forecast.daily = (0..8)
            .map(|i| WeatherSample {
                temp: i as f64,
                ..template.clone()
            })
            .collect();
        let temps = |plan: HourPlan| -> Vec<f64> {
            pick_days(&forecast, &plan, 4).iter().map(|s| s.temp).collect()
        };
        assert_eq!(temps(HourPlan::for_hour(9)), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(temps(HourPlan::for_hour(23)), [2.0, 3.0, 4.0, 5.0]);
    }
}
