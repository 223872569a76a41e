//! Calendar aggregation.
//!
//! [`AgendaAggregator::collect`] queries every configured [`CalendarSource`]
//! for today's window, normalizes each raw event into an [`AgendaEntry`] in
//! local time and returns one timeline ordered by start, then end.
//!
//! Normalization rules, applied per event:
//! - the event's own TZID wins, otherwise the value is read as local time
//! - a missing end is derived from DURATION (or one day for date values)
//! - events that ended before `now` or start after today are dropped
//! - start and end are clipped to `00:00:00` and `23:59:59` of today
//! - an entry covering the whole day is flagged `is_full_day`

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::color::ColorValue;
use crate::error::{ContentError, SourceError};
use crate::ical::{IcalTime, RawEvent};
use crate::AgendaEntry;

/// A remote calendar that can list the raw events of one day.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Name used in logs and on [`AgendaEntry::source_id`]
    fn id(&self) -> &str;

    /// Row background for this calendar's entries
    fn color(&self) -> ColorValue;

    /// Event instances overlapping `window`, recurrences already expanded.
    async fn events(&self, window: &DayWindow) -> Result<Vec<RawEvent>, SourceError>;
}

/// Today in local time, as the range sent to calendar servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    /// Local midnight
    pub start: DateTime<Utc>,
    /// Next local midnight
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn for_day<Z: TimeZone>(tz: &Z, date: NaiveDate) -> Self {
        let next = date.succ_opt().unwrap_or(date);
        DayWindow {
            date,
            start: localize(tz, date.and_time(NaiveTime::MIN)),
            end: localize(tz, next.and_time(NaiveTime::MIN)),
        }
    }
}

/// Local wall time to an instant. Times skipped by a DST jump move forward
/// by an hour; ambiguous times take the earlier instant.
fn localize<Z: TimeZone>(tz: &Z, naive: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            let later = naive.checked_add_signed(Duration::hours(1))?;
            tz.from_local_datetime(&later).earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Merges calendar sources into today's agenda for one timezone.
#[derive(Debug, Clone)]
pub struct AgendaAggregator<Z: TimeZone> {
    tz: Z,
}

impl<Z: TimeZone> AgendaAggregator<Z> {
    pub fn new(tz: Z) -> Self {
        AgendaAggregator { tz }
    }

    /// Collect today's remaining entries from all sources.
    ///
    /// The first failing source fails the whole collection; entries of
    /// sources that already answered are discarded.
    pub async fn collect(
        &self,
        sources: &[Box<dyn CalendarSource>],
        now: DateTime<Z>,
    ) -> Result<Vec<AgendaEntry>, ContentError> {
        let now = now.with_timezone(&self.tz).naive_local();
        let window = DayWindow::for_day(&self.tz, now.date());

        let mut entries = Vec::new();
        for source in sources {
            let raw = source
                .events(&window)
                .await
                .map_err(|err| ContentError::unavailable(source.id(), err))?;
            let before = entries.len();
            entries.extend(
                raw.iter()
                    .filter_map(|event| self.normalize(event, source.id(), source.color(), now)),
            );
            tracing::debug!(
                source = source.id(),
                fetched = raw.len(),
                kept = entries.len() - before,
                "calendar read"
            );
        }

        entries.sort_by_key(AgendaEntry::sort_key);
        tracing::info!(entries = entries.len(), sources = sources.len(), "agenda collected");
        Ok(entries)
    }

    /// Turn one raw event into today's entry, or `None` when it has no start,
    /// already ended, or does not touch today.
    pub fn normalize(
        &self,
        event: &RawEvent,
        source_id: &str,
        color: ColorValue,
        now: NaiveDateTime,
    ) -> Option<AgendaEntry> {
        let today = now.date();
        let day_start = today.and_time(NaiveTime::MIN);
        let day_end = today.and_hms_opt(23, 59, 59)?;

        let Some(raw_start) = event.start.as_ref() else {
            tracing::debug!(source = source_id, summary = ?event.summary, "event without start skipped");
            return None;
        };
        let start = self.local(raw_start);
        let end = match (&event.end, event.duration) {
            (Some(end), _) => self.local(end),
            // Durations past the calendar range saturate; day clipping follows
            (None, Some(duration)) => start.checked_add_signed(duration).unwrap_or(
                if duration < Duration::zero() {
                    NaiveDateTime::MIN
                } else {
                    NaiveDateTime::MAX
                },
            ),
            (None, None) if matches!(raw_start, IcalTime::Date(_)) => start
                .checked_add_signed(Duration::days(1))
                .unwrap_or(NaiveDateTime::MAX),
            (None, None) => start,
        };

        if end < now || start > day_end {
            return None;
        }
        let start = start.max(day_start);
        let end = end.min(day_end).max(start);

        Some(AgendaEntry {
            start,
            end,
            title: event.summary.clone().unwrap_or_default(),
            location: event.location.clone().unwrap_or_default(),
            color,
            source_id: source_id.to_string(),
            is_full_day: start == day_start && end == day_end,
        })
    }

    /// Wall time of `value` in this aggregator's zone
    fn local(&self, value: &IcalTime) -> NaiveDateTime {
        match value {
            IcalTime::Date(date) => date.and_time(NaiveTime::MIN),
            IcalTime::Utc(instant) => instant.with_timezone(&self.tz).naive_local(),
            IcalTime::Floating { value, tzid: None } => *value,
            IcalTime::Floating {
                value,
                tzid: Some(tzid),
            } => match tzid.parse::<Tz>() {
                Ok(zone) => localize(&zone, *value).with_timezone(&self.tz).naive_local(),
                Err(_) => {
                    tracing::warn!(tzid = %tzid, "unknown timezone, reading event as local time");
                    *value
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    const BLUE: ColorValue = ColorValue::Rgb(0, 0, 255);
    const GREEN: ColorValue = ColorValue::Rgb(0, 128, 0);

    struct FakeSource {
        id: &'static str,
        color: ColorValue,
        events: Result<Vec<RawEvent>, &'static str>,
    }

    #[async_trait]
    impl CalendarSource for FakeSource {
        fn id(&self) -> &str {
            self.id
        }

        fn color(&self) -> ColorValue {
            self.color
        }

        async fn events(&self, _window: &DayWindow) -> Result<Vec<RawEvent>, SourceError> {
            self.events
                .clone()
                .map_err(|msg| SourceError::Malformed(msg.to_string()))
        }
    }

    fn source(id: &'static str, color: ColorValue, events: Vec<RawEvent>) -> Box<dyn CalendarSource> {
        Box::new(FakeSource {
            id,
            color,
            events: Ok(events),
        })
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    fn local(h: u32, m: u32, title: &str) -> RawEvent {
        RawEvent {
            start: Some(IcalTime::Floating {
                value: at(h, m),
                tzid: None,
            }),
            summary: Some(title.to_string()),
            ..RawEvent::default()
        }
    }

    fn span(start: (u32, u32), end: (u32, u32), title: &str) -> RawEvent {
        RawEvent {
            end: Some(IcalTime::Floating {
                value: at(end.0, end.1),
                tzid: None,
            }),
            ..local(start.0, start.1, title)
        }
    }

    fn utc_aggregator() -> AgendaAggregator<Utc> {
        AgendaAggregator::new(Utc)
    }

    fn now_utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&at(h, m))
    }

    fn titles(entries: &[AgendaEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.title.as_str()).collect()
    }

    #[tokio::test]
    async fn merges_sources_into_one_sorted_timeline() {
        let sources = vec![
            source(
                "home",
                GREEN,
                vec![span((8, 0), (9, 0), "gym"), span((12, 0), (13, 0), "lunch")],
            ),
            source(
                "work",
                BLUE,
                vec![span((9, 30), (10, 0), "standup"), span((14, 0), (15, 0), "review")],
            ),
        ];
        let entries = utc_aggregator()
            .collect(&sources, now_utc(7, 0))
            .await
            .unwrap();

        assert_eq!(titles(&entries), ["gym", "standup", "lunch", "review"]);
        assert!(entries.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key()));
        assert_eq!(entries[1].source_id, "work");
        assert_eq!(entries[1].color, BLUE);
    }

    #[tokio::test]
    async fn equal_keys_keep_source_order() {
        let sources = vec![
            source("first", GREEN, vec![span((9, 0), (10, 0), "from first")]),
            source("second", BLUE, vec![span((9, 0), (10, 0), "from second")]),
        ];
        let entries = utc_aggregator()
            .collect(&sources, now_utc(7, 0))
            .await
            .unwrap();
        assert_eq!(titles(&entries), ["from first", "from second"]);
    }

    #[tokio::test]
    async fn same_start_orders_by_end_time() {
        // B is registered before A; the shorter "09:00-09:30" still sorts
        // first, and so does it when registered second
        let sources = vec![
            source("b", BLUE, vec![span((9, 0), (9, 30), "B")]),
            source("a", GREEN, vec![span((9, 0), (10, 0), "A")]),
        ];
        let entries = utc_aggregator()
            .collect(&sources, now_utc(7, 0))
            .await
            .unwrap();
        assert_eq!(titles(&entries), ["B", "A"]);

        let sources = vec![
            source("a", GREEN, vec![span((9, 0), (10, 0), "A")]),
            source("b", BLUE, vec![span((9, 0), (9, 30), "B")]),
        ];
        let entries = utc_aggregator()
            .collect(&sources, now_utc(7, 0))
            .await
            .unwrap();
        assert_eq!(titles(&entries), ["B", "A"]);
        assert_eq!(entries[0].time_range(), "09:00-09:30");
    }

    #[tokio::test]
    async fn one_failing_source_fails_the_collection() {
        let sources: Vec<Box<dyn CalendarSource>> = vec![
            source("ok", GREEN, vec![span((9, 0), (10, 0), "fine")]),
            Box::new(FakeSource {
                id: "broken",
                color: BLUE,
                events: Err("401 unauthorized"),
            }),
        ];
        let err = utc_aggregator()
            .collect(&sources, now_utc(7, 0))
            .await
            .unwrap_err();
        match err {
            ContentError::SourceUnavailable { source_id, .. } => assert_eq!(source_id, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn elapsed_events_are_dropped() {
        let agg = utc_aggregator();
        let now = at(11, 0);
        assert!(agg
            .normalize(&span((9, 0), (10, 59), "past"), "s", BLUE, now)
            .is_none());
        // ending exactly now is not strictly before now
        assert!(agg
            .normalize(&span((10, 0), (11, 0), "ending"), "s", BLUE, now)
            .is_some());
        assert!(agg
            .normalize(&span((10, 0), (12, 0), "running"), "s", BLUE, now)
            .is_some());
    }

    #[test]
    fn events_past_midnight_end_at_day_end() {
        let agg = utc_aggregator();
        let event = RawEvent {
            end: Some(IcalTime::Floating {
                value: day().succ_opt().unwrap().and_hms_opt(2, 0, 0).unwrap(),
                tzid: None,
            }),
            ..local(22, 0, "party")
        };
        let entry = agg.normalize(&event, "s", BLUE, at(8, 0)).unwrap();
        assert_eq!(entry.end, day().and_hms_opt(23, 59, 59).unwrap());
        assert_eq!(entry.time_range(), "22:00-23:59");
        assert!(!entry.is_full_day);
    }

    #[test]
    fn events_from_yesterday_start_at_midnight() {
        let agg = utc_aggregator();
        let event = RawEvent {
            start: Some(IcalTime::Floating {
                value: day().pred_opt().unwrap().and_hms_opt(23, 0, 0).unwrap(),
                tzid: None,
            }),
            end: Some(IcalTime::Floating {
                value: at(1, 0),
                tzid: None,
            }),
            ..RawEvent::default()
        };
        let entry = agg.normalize(&event, "s", BLUE, at(0, 30)).unwrap();
        assert_eq!(entry.time_range(), "00:00-01:00");
        assert_eq!(entry.title, "");
        assert_eq!(entry.location, "");
    }

    #[test]
    fn events_after_today_are_dropped() {
        let agg = utc_aggregator();
        let event = RawEvent {
            start: Some(IcalTime::Floating {
                value: day().succ_opt().unwrap().and_hms_opt(9, 0, 0).unwrap(),
                tzid: None,
            }),
            ..RawEvent::default()
        };
        assert!(agg.normalize(&event, "s", BLUE, at(8, 0)).is_none());
    }

    #[test]
    fn date_events_are_full_day() {
        let agg = utc_aggregator();
        let event = RawEvent {
            start: Some(IcalTime::Date(day())),
            summary: Some("holiday".into()),
            ..RawEvent::default()
        };
        let entry = agg.normalize(&event, "s", BLUE, at(15, 0)).unwrap();
        assert!(entry.is_full_day);
        assert_eq!(entry.time_range(), "00:00-23:59");

        // a multi-day event covering all of today is full-day too
        let event = RawEvent {
            start: Some(IcalTime::Date(day().pred_opt().unwrap())),
            end: Some(IcalTime::Date(day().succ_opt().unwrap().succ_opt().unwrap())),
            ..RawEvent::default()
        };
        assert!(agg.normalize(&event, "s", BLUE, at(15, 0)).unwrap().is_full_day);
    }

    #[test]
    fn duration_derives_the_end() {
        let agg = utc_aggregator();
        let event = RawEvent {
            duration: Some(Duration::minutes(90)),
            ..local(9, 0, "workshop")
        };
        let entry = agg.normalize(&event, "s", BLUE, at(8, 0)).unwrap();
        assert_eq!(entry.time_range(), "09:00-10:30");
    }

    #[test]
    fn oversized_durations_never_overflow() {
        let agg = utc_aggregator();
        let parsed = crate::ical::parse_events(
            "BEGIN:VEVENT\nDTSTART:20261015T090000\nDURATION:P9999999999D\nSUMMARY:forever\nEND:VEVENT\n",
        );
        assert!(parsed[0].duration.is_some());
        let entry = agg.normalize(&parsed[0], "s", BLUE, at(8, 0)).unwrap();
        assert_eq!(entry.time_range(), "09:00-23:59");

        let event = RawEvent {
            duration: Duration::try_days(-9_999_999_999),
            ..local(9, 0, "backwards")
        };
        assert!(agg.normalize(&event, "s", BLUE, at(8, 0)).is_none());

        // a duration the reader rejects leaves the event without an end
        let parsed = crate::ical::parse_events(
            "BEGIN:VEVENT\nDTSTART:20261015T090000\nDURATION:P9999999999999999W\nEND:VEVENT\n",
        );
        assert_eq!(parsed[0].duration, None);
        let entry = agg.normalize(&parsed[0], "s", BLUE, at(8, 0)).unwrap();
        assert_eq!(entry.time_range(), "09:00-09:00");
    }

    #[test]
    fn end_before_start_collapses_to_start() {
        let agg = utc_aggregator();
        let entry = agg
            .normalize(&span((10, 0), (9, 0), "odd"), "s", BLUE, at(8, 0))
            .unwrap();
        assert_eq!(entry.start, entry.end);
    }

    #[test]
    fn event_timezones_convert_to_local() {
        // local zone is UTC+2, the event is written in UTC and in New York time
        let agg = AgendaAggregator::new(FixedOffset::east_opt(2 * 3600).unwrap());
        let utc_event = RawEvent {
            start: Some(IcalTime::Utc(Utc.from_utc_datetime(&at(7, 0)))),
            ..RawEvent::default()
        };
        assert_eq!(agg.local(utc_event.start.as_ref().unwrap()), at(9, 0));

        let ny = IcalTime::Floating {
            value: at(3, 0),
            tzid: Some("America/New_York".into()),
        };
        // 03:00 EDT (UTC-4) is 07:00 UTC, 09:00 at UTC+2
        assert_eq!(agg.local(&ny), at(9, 0));

        let unknown = IcalTime::Floating {
            value: at(3, 0),
            tzid: Some("Mars/Olympus".into()),
        };
        assert_eq!(agg.local(&unknown), at(3, 0));
    }

    #[test]
    fn day_window_spans_local_midnights() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let window = DayWindow::for_day(&tz, day());
        assert_eq!(window.start, Utc.from_utc_datetime(&day().pred_opt().unwrap().and_hms_opt(23, 0, 0).unwrap()));
        assert_eq!(window.end - window.start, Duration::hours(24));
    }
}
