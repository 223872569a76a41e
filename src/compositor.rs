//! # Screen Composition
//!
//! The compositor frames one render cycle: it draws the title and the
//! day-of-month badge, hands the [`LayoutContext`] to exactly one content
//! provider, and closes with the status line. It knows nothing about what
//! the provider draws; it only owns the chrome and the starting cursor.
//!
//! ```text
//! +-----------------------------------+----+
//! | Daily Agenda                      | 15 |
//! +-----------------------------------+----+   <- day rule, cursor starts below
//! |                                        |
//! |          provider content              |
//! |                                        |
//! +----------------------------------------+   <- status_y
//! | Updated: 10/15/26 07:30:00     Bat 87% |
//! +----------------------------------------+
//! ```

use std::fs;

use chrono::{DateTime, Datelike, Local, NaiveDate, Weekday};
use embedded_graphics::prelude::*;

use crate::canvas::{Canvas, FontSet};
use crate::color::{ColorMap, ThemeColors};
use crate::config::BatteryConfig;
use crate::error::RenderStatus;
use crate::layout::{LayoutContext, LayoutSettings};
use crate::provider::ContentProvider;

/// Left edge of the title
const TITLE_X: i32 = 20;

/// Charge level read from the battery gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryState {
    pub percent: u8,
    /// False once the level drops below the configured threshold
    pub ok: bool,
}

impl BatteryState {
    /// Read the gauge. Returns `None` (and logs) when it cannot be read.
    pub fn read(config: &BatteryConfig) -> Option<Self> {
        let path = &config.capacity_path;
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "battery gauge not readable");
                return None;
            }
        };
        match raw.trim().parse::<u8>() {
            Ok(percent) => {
                let percent = percent.min(100);
                Some(BatteryState {
                    percent,
                    ok: percent >= config.low_percent,
                })
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), value = raw.trim(), error = %e, "battery gauge unparsable");
                None
            }
        }
    }

    pub fn label(&self) -> String {
        format!("Bat {}%", self.percent)
    }
}

/// Draws the screen chrome around a single content provider.
pub struct ScreenCompositor<'a> {
    pub settings: &'a LayoutSettings,
    pub colors: &'a ThemeColors,
    pub color_map: &'a ColorMap,
    pub fonts: &'a FontSet,
}

impl<'a> ScreenCompositor<'a> {
    pub fn new(
        settings: &'a LayoutSettings,
        colors: &'a ThemeColors,
        color_map: &'a ColorMap,
        fonts: &'a FontSet,
    ) -> Self {
        ScreenCompositor {
            settings,
            colors,
            color_map,
            fonts,
        }
    }

    /// Full cycle: chrome, one provider, status line.
    pub async fn render(
        &self,
        provider: &ContentProvider,
        now: DateTime<Local>,
        battery: Option<BatteryState>,
    ) -> (Canvas, RenderStatus) {
        let mut ctx = self.begin(now.date_naive());
        provider.draw_content(&mut ctx, now).await;
        self.finish(ctx, now, battery)
    }

    /// Fresh canvas with title and day badge. The cursor sits below the badge.
    pub fn begin(&self, today: NaiveDate) -> LayoutContext<'a> {
        let mut ctx = LayoutContext::new(self.settings, self.colors, self.color_map, self.fonts);
        let (top, bottom, left, right) = self.settings.margins;
        let width = self.settings.width;

        ctx.text(
            Point::new(TITLE_X, top as i32),
            &self.settings.title,
            self.fonts.title,
            self.colors.title,
        );

        let day = today.day().to_string();
        let day_size = ctx.text_size(&day, self.fonts.day);
        let day_x = width.saturating_sub(day_size.width + right);
        let box_y = day_size.height + top + bottom + 1;
        let day_bg = if today.weekday() == Weekday::Sun {
            self.colors.day_bg_sunday
        } else {
            self.colors.day_bg
        };
        let box_x = day_x.saturating_sub(left);
        ctx.fill_rect(
            Point::new(box_x as i32, 0),
            Size::new(width - box_x, box_y),
            day_bg,
        );
        ctx.text(
            Point::new(day_x as i32, top as i32),
            &day,
            self.fonts.day,
            self.colors.day,
        );
        ctx.hline(box_y);

        let y = ctx.cursor_mut().advance_to(box_y + 2);
        tracing::debug!(day = %day, sunday = today.weekday() == Weekday::Sun, y, "chrome drawn");
        ctx
    }

    /// Status line below the content, then hand back the image.
    pub fn finish(
        &self,
        mut ctx: LayoutContext<'a>,
        now: DateTime<Local>,
        battery: Option<BatteryState>,
    ) -> (Canvas, RenderStatus) {
        let status_y = self.settings.status_y();
        let text_y = status_y as i32 + 2;
        ctx.hline(status_y);

        let updated = format!("Updated: {}", now.format("%x %X"));
        ctx.text(
            Point::new(self.settings.margin_left() as i32, text_y),
            &updated,
            self.fonts.text,
            self.colors.text,
        );

        if let Some(battery) = battery {
            let label = battery.label();
            let size = ctx.text_size(&label, self.fonts.text);
            let x = self
                .settings
                .width
                .saturating_sub(size.width + self.settings.margins.3);
            let color = if battery.ok {
                self.colors.battery_ok
            } else {
                self.colors.battery_low
            };
            ctx.text(Point::new(x as i32, text_y), &label, self.fonts.text, color);
        }

        let (canvas, status) = ctx.finish();
        tracing::info!(status = ?status, "render finished");
        (canvas, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    use crate::agenda_provider::AgendaContentProvider;
    use crate::color::{ColorMode, ColorValue};
    use crate::config::Config;

    const RED: ColorValue = ColorValue::Rgb(255, 0, 0);
    const BLACK: ColorValue = ColorValue::Rgb(0, 0, 0);

    struct Fixture {
        settings: LayoutSettings,
        colors: ThemeColors,
        map: ColorMap,
        fonts: FontSet,
    }

    impl Fixture {
        fn new() -> Self {
            let config = Config::default();
            let map = ColorMap::new(ColorMode::Rgb);
            let mut settings = LayoutSettings::from_config(&config);
            settings.no_connect = PathBuf::from("/nonexistent/no-connect.bmp");
            settings.no_events = PathBuf::from("/nonexistent/no-events.bmp");
            Fixture {
                settings,
                colors: ThemeColors::resolve(&config.colors, &map),
                map,
                fonts: FontSet::default(),
            }
        }

        fn compositor(&self) -> ScreenCompositor<'_> {
            ScreenCompositor::new(&self.settings, &self.colors, &self.map, &self.fonts)
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 10, day, hour, 30, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn badge_sets_the_starting_cursor() {
        let fixture = Fixture::new();
        let ctx = fixture
            .compositor()
            .begin(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());

        // 20px glyphs, 5px margins above and below, rule, 2px gap
        assert_eq!(ctx.y_off(), 20 + 5 + 5 + 1 + 2);
        assert_eq!(ctx.canvas().count_in_rows(BLACK, 31, 32), 400);
        // badge is black on a weekday, flush with the right edge
        assert_eq!(ctx.canvas().pixel(399, 0), Some(BLACK));
        assert_eq!(ctx.canvas().count_in_rows(RED, 0, 31), 0);
    }

    #[test]
    fn sunday_badge_uses_its_own_background() {
        let fixture = Fixture::new();
        // 2026-10-18 is a Sunday
        let ctx = fixture
            .compositor()
            .begin(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(ctx.canvas().pixel(399, 0), Some(RED));
        // two digits plus left and right margins
        assert_eq!(ctx.canvas().count_in_rows(RED, 0, 1), 20 + 5 + 5);
    }

    #[test]
    fn status_line_sits_at_the_bottom() {
        let fixture = Fixture::new();
        let compositor = fixture.compositor();
        let ctx = compositor.begin(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
        let (canvas, status) = compositor.finish(ctx, at(15, 7), None);

        assert!(status.is_ok());
        assert_eq!(canvas.count_in_rows(BLACK, 281, 282), 400);
        assert!(canvas.count_in_rows(BLACK, 282, 300) > 0);
        assert_eq!(canvas.count_in_rows(RED, 282, 300), 0);
    }

    #[test]
    fn low_battery_is_highlighted() {
        let fixture = Fixture::new();
        let compositor = fixture.compositor();
        let ctx = compositor.begin(NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
        let low = BatteryState { percent: 9, ok: false };
        let (canvas, _) = compositor.finish(ctx, at(15, 7), Some(low));
        assert!(canvas.count_in_rows(RED, 282, 300) > 0);
        // right-aligned
        let rightmost = (0..400)
            .rev()
            .find(|&x| (282..300).any(|y| canvas.pixel(x, y) == Some(RED)))
            .unwrap();
        assert!(rightmost >= 400 - 5 - 6);
    }

    #[test]
    fn battery_gauge_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capacity");
        let config = BatteryConfig {
            capacity_path: path.clone(),
            low_percent: 20,
        };

        assert_eq!(BatteryState::read(&config), None);

        fs::write(&path, "87\n").unwrap();
        let state = BatteryState::read(&config).unwrap();
        assert_eq!(state, BatteryState { percent: 87, ok: true });
        assert_eq!(state.label(), "Bat 87%");

        fs::write(&path, "12").unwrap();
        assert!(!BatteryState::read(&config).unwrap().ok);

        fs::write(&path, "full").unwrap();
        assert_eq!(BatteryState::read(&config), None);
    }

    #[tokio::test]
    async fn empty_agenda_still_yields_a_complete_frame() {
        let fixture = Fixture::new();
        let provider = ContentProvider::Agenda(AgendaContentProvider::new(Vec::new()));
        let (canvas, status) = fixture
            .compositor()
            .render(&provider, at(15, 7), None)
            .await;

        assert_eq!((canvas.width(), canvas.height()), (400, 300));
        assert!(status.is_ok());
        assert_eq!(canvas.count_in_rows(BLACK, 281, 282), 400);
    }
}
