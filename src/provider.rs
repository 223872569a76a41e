//! Content providers.
//!
//! Exactly one provider fills the screen area between the day badge and the
//! status line. The set of providers is closed; [`ProviderKind`] in the
//! configuration selects one at startup.

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Local};

use crate::agenda::CalendarSource;
use crate::agenda_provider::AgendaContentProvider;
use crate::caldav::CalDavSource;
use crate::color::ColorMap;
pub use crate::config::ProviderKind;
use crate::config::Config;
use crate::layout::LayoutContext;
use crate::weather::OwmClient;
use crate::weather_provider::WeatherContentProvider;

pub enum ContentProvider {
    Agenda(AgendaContentProvider),
    Weather(WeatherContentProvider),
}

impl ContentProvider {
    /// Build the configured provider and its network clients.
    pub fn from_config(config: &Config, colors: &ColorMap) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.runtime.request_timeout_secs);
        match config.content.provider {
            ProviderKind::Agenda => {
                if config.calendars.is_empty() {
                    tracing::warn!("agenda provider selected but no calendars configured");
                }
                let sources = config
                    .calendars
                    .iter()
                    .map(|calendar| {
                        let color = colors.resolve(&calendar.color);
                        CalDavSource::new(calendar, color, timeout)
                            .map(|source| Box::new(source) as Box<dyn CalendarSource>)
                            .with_context(|| format!("calendar '{}'", calendar.name))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(ContentProvider::Agenda(AgendaContentProvider::new(sources)))
            }
            ProviderKind::Weather => {
                let weather = config
                    .weather
                    .as_ref()
                    .context("weather provider selected but no [weather] section configured")?;
                let client = OwmClient::new(weather, timeout).context("weather client")?;
                Ok(ContentProvider::Weather(WeatherContentProvider::new(
                    Box::new(client),
                )))
            }
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            ContentProvider::Agenda(_) => ProviderKind::Agenda,
            ContentProvider::Weather(_) => ProviderKind::Weather,
        }
    }

    /// Fetch this provider's data and draw its block below the cursor.
    ///
    /// Never fails: source errors become a placeholder image plus a failure
    /// report on `ctx`.
    pub async fn draw_content(&self, ctx: &mut LayoutContext<'_>, now: DateTime<Local>) {
        tracing::debug!(provider = ?self.kind(), y = ctx.y_off(), "drawing content");
        match self {
            ContentProvider::Agenda(agenda) => agenda.draw_content(ctx, now).await,
            ContentProvider::Weather(weather) => weather.draw_content(ctx).await,
        }
    }
}
