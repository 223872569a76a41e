//! Agenda content block: one fixed-height row per calendar entry.

use chrono::{DateTime, Local};
use embedded_graphics::prelude::*;

use crate::agenda::{AgendaAggregator, CalendarSource};
use crate::error::ContentError;
use crate::layout::{LayoutContext, Placeholder};
use crate::AgendaEntry;

/// Gap between the time column and the entry text
const TIME_GAP: u32 = 4;

/// Draws today's remaining calendar entries below the cursor.
pub struct AgendaContentProvider {
    sources: Vec<Box<dyn CalendarSource>>,
    aggregator: AgendaAggregator<Local>,
}

impl AgendaContentProvider {
    pub fn new(sources: Vec<Box<dyn CalendarSource>>) -> Self {
        AgendaContentProvider {
            sources,
            aggregator: AgendaAggregator::new(Local),
        }
    }

    pub fn sources(&self) -> &[Box<dyn CalendarSource>] {
        &self.sources
    }

    /// Fetch every calendar, then draw. Failures end up as placeholders.
    pub async fn draw_content(&self, ctx: &mut LayoutContext<'_>, now: DateTime<Local>) {
        let result = self.aggregator.collect(&self.sources, now).await;
        self.draw_block(ctx, result);
    }

    /// Draw phase, separate from the fetch so the cursor is only touched here.
    pub fn draw_block(
        &self,
        ctx: &mut LayoutContext<'_>,
        result: Result<Vec<AgendaEntry>, ContentError>,
    ) {
        match result {
            Err(error) => {
                ctx.report_failure(&error);
                ctx.draw_placeholder(Placeholder::NoConnection);
            }
            Ok(entries) if entries.is_empty() => {
                ctx.report_failure(&ContentError::NoData);
                ctx.draw_placeholder(Placeholder::NoEvents);
            }
            Ok(entries) => draw_entries(ctx, &entries),
        }
    }
}

/// Rows that fit between the cursor and the status line
pub fn max_entries(ctx: &LayoutContext<'_>) -> usize {
    (ctx.cursor().remaining() / ctx.settings.entry_height) as usize
}

fn draw_entries(ctx: &mut LayoutContext<'_>, entries: &[AgendaEntry]) {
    let shown = max_entries(ctx).min(entries.len());
    if shown < entries.len() {
        tracing::debug!(
            total = entries.len(),
            shown,
            "agenda truncated to the available rows"
        );
    }

    let time_font = ctx.fonts.time;
    // Full-day rows draw no labels and do not widen the column
    let time_width = entries[..shown]
        .iter()
        .filter(|e| !e.is_full_day)
        .flat_map(|e| [e.start_label(), e.end_label()])
        .map(|label| ctx.text_size(&label, time_font).width)
        .max()
        .unwrap_or(0);
    let margin = ctx.settings.margin_left();
    let text_x = margin + time_width + TIME_GAP;

    for entry in &entries[..shown] {
        draw_row(ctx, entry, margin, text_x);
    }
    tracing::info!(rows = shown, "agenda drawn");
}

fn draw_row(ctx: &mut LayoutContext<'_>, entry: &AgendaEntry, margin: u32, text_x: u32) {
    let y = ctx.y_off();
    let height = ctx.settings.entry_height;
    let width = ctx.settings.width;
    let fonts = ctx.fonts;
    let ink = ctx.color_map.background_for(entry.color);

    ctx.fill_rect(
        Point::new(0, y as i32 + 1),
        Size::new(width, height.saturating_sub(1)),
        entry.color,
    );

    if !entry.is_full_day {
        let start = ctx.text(
            Point::new(margin as i32, y as i32 + 2),
            &entry.start_label(),
            fonts.time,
            ink,
        );
        ctx.text(
            Point::new(margin as i32, (y + 4 + start.height) as i32),
            &entry.end_label(),
            fonts.time,
            ink,
        );
    }

    let title = ctx.text(
        Point::new(text_x as i32, y as i32 + 2),
        &entry.title,
        fonts.text,
        ink,
    );
    let title_height = title.height.max(fonts.text.character_size.height);
    ctx.text(
        Point::new(text_x as i32, (y + 4 + title_height) as i32),
        &entry.location,
        fonts.text,
        ink,
    );

    let y = ctx.cursor_mut().advance(height);
    ctx.hline(y);
}
