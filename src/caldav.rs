//! CalDAV calendar source.
//!
//! Locating a calendar by its display name takes three PROPFIND requests
//! (principal, calendar home, calendar listing); the events are then fetched
//! with a single calendar-query REPORT. The server expands recurring events
//! into instances for the requested window, so the iCalendar reader only
//! ever sees concrete occurrences.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Method, Url};

use crate::agenda::{CalendarSource, DayWindow};
use crate::color::ColorValue;
use crate::config::CalendarConfig;
use crate::error::SourceError;
use crate::ical::{self, RawEvent};

const PRINCIPAL_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:current-user-principal/></d:prop></d:propfind>"#;

const HOME_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
<d:prop><c:calendar-home-set/></d:prop></d:propfind>"#;

const LIST_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:"><d:prop><d:displayname/><d:resourcetype/></d:prop></d:propfind>"#;

/// One calendar on a CalDAV server, selected by display name.
pub struct CalDavSource {
    id: String,
    color: ColorValue,
    url: Url,
    user: String,
    password: String,
    calendar: String,
    client: Client,
}

impl CalDavSource {
    pub fn new(
        config: &CalendarConfig,
        color: ColorValue,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let url = Url::parse(&config.url)
            .map_err(|e| SourceError::Malformed(format!("calendar url '{}': {e}", config.url)))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(CalDavSource {
            id: config.name.clone(),
            color,
            url,
            user: config.user.clone(),
            password: config.password.clone(),
            calendar: config.calendar.clone(),
            client,
        })
    }

    async fn request(
        &self,
        method: &str,
        url: &Url,
        depth: u8,
        body: String,
    ) -> Result<String, SourceError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let text = self
            .client
            .request(method, url.clone())
            .basic_auth(&self.user, Some(&self.password))
            .header("Depth", depth.to_string())
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }

    /// URL of the calendar whose display name matches the configured one
    async fn locate_calendar(&self) -> Result<Url, SourceError> {
        let body = self
            .request("PROPFIND", &self.url, 0, PRINCIPAL_QUERY.to_string())
            .await?;
        let principal = principal_url(&self.url, &body)?;

        let body = self
            .request("PROPFIND", &principal, 0, HOME_QUERY.to_string())
            .await?;
        let home = calendar_home_url(&self.url, principal, &body)?;

        let body = self
            .request("PROPFIND", &home, 1, LIST_QUERY.to_string())
            .await?;
        let calendar = find_calendar(&self.url, &body, &self.calendar)?;
        tracing::debug!(source = %self.id, home = %home, calendar = %calendar, "calendar located");
        Ok(calendar)
    }
}

fn join(base: &Url, href: &str) -> Result<Url, SourceError> {
    base.join(href)
        .map_err(|e| SourceError::Malformed(format!("href '{href}': {e}")))
}

/// Principal from a current-user-principal PROPFIND. Servers without
/// principal support serve calendars below the base URL.
fn principal_url(base: &Url, body: &str) -> Result<Url, SourceError> {
    parse_multistatus(body)?
        .into_iter()
        .find_map(|r| r.principal)
        .map(|href| join(base, &href))
        .transpose()
        .map(|url| url.unwrap_or_else(|| base.clone()))
}

/// Calendar home from a calendar-home-set PROPFIND, else the principal itself
fn calendar_home_url(base: &Url, principal: Url, body: &str) -> Result<Url, SourceError> {
    parse_multistatus(body)?
        .into_iter()
        .find_map(|r| r.calendar_home)
        .map(|href| join(base, &href))
        .transpose()
        .map(|url| url.unwrap_or(principal))
}

/// Calendar collection in a Depth 1 listing whose display name is `name`
fn find_calendar(base: &Url, body: &str, name: &str) -> Result<Url, SourceError> {
    let wanted = name.trim();
    let found = parse_multistatus(body)?
        .into_iter()
        .find(|r| r.is_calendar && r.display_name.as_deref().map(str::trim) == Some(wanted))
        .ok_or_else(|| SourceError::CalendarNotFound(name.to_string()))?;
    join(base, &found.href)
}

#[async_trait]
impl CalendarSource for CalDavSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn color(&self) -> ColorValue {
        self.color
    }

    async fn events(&self, window: &DayWindow) -> Result<Vec<RawEvent>, SourceError> {
        let calendar = self.locate_calendar().await?;
        tracing::debug!(source = %self.id, url = %calendar, "querying calendar");
        let body = self
            .request("REPORT", &calendar, 1, calendar_query(window))
            .await?;
        let events: Vec<RawEvent> = parse_multistatus(&body)?
            .iter()
            .filter_map(|r| r.calendar_data.as_deref())
            .flat_map(ical::parse_events)
            .collect();
        Ok(events)
    }
}

/// calendar-query REPORT body asking for expanded VEVENTs in `window`
pub fn calendar_query(window: &DayWindow) -> String {
    let start = window.start.format("%Y%m%dT%H%M%SZ");
    let end = window.end.format("%Y%m%dT%H%M%SZ");
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
<d:prop><c:calendar-data><c:expand start="{start}" end="{end}"/></c:calendar-data></d:prop>
<c:filter><c:comp-filter name="VCALENDAR"><c:comp-filter name="VEVENT">
<c:time-range start="{start}" end="{end}"/>
</c:comp-filter></c:comp-filter></c:filter>
</c:calendar-query>"#
    )
}

/// The properties this client reads from one `<response>`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DavResponse {
    pub href: String,
    pub display_name: Option<String>,
    pub is_calendar: bool,
    pub principal: Option<String>,
    pub calendar_home: Option<String>,
    pub calendar_data: Option<String>,
}

/// Parse a WebDAV multistatus body. Namespace prefixes are ignored.
pub fn parse_multistatus(xml: &str) -> Result<Vec<DavResponse>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut responses = Vec::new();
    let mut current: Option<DavResponse> = None;
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(e.local_name().as_ref());
                if name == "response" {
                    current = Some(DavResponse::default());
                }
                mark_calendar(&mut current, &path, &name);
                path.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(e.local_name().as_ref());
                mark_calendar(&mut current, &path, &name);
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("response") {
                    responses.extend(current.take());
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| SourceError::Malformed(e.to_string()))?;
                store_text(&mut current, &path, &text);
            }
            Event::CData(c) => {
                let bytes = c.into_inner();
                store_text(&mut current, &path, &String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(responses)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn mark_calendar(current: &mut Option<DavResponse>, path: &[String], name: &str) {
    if let Some(response) = current.as_mut() {
        if name == "calendar" && path.last().map(String::as_str) == Some("resourcetype") {
            response.is_calendar = true;
        }
    }
}

fn store_text(current: &mut Option<DavResponse>, path: &[String], text: &str) {
    let Some(response) = current.as_mut() else {
        return;
    };
    let (Some(top), parent) = (path.last(), path.iter().rev().nth(1)) else {
        return;
    };
    let append = |slot: &mut Option<String>| slot.get_or_insert_with(String::new).push_str(text);
    match (top.as_str(), parent.map(String::as_str)) {
        ("href", Some("response")) => response.href.push_str(text.trim()),
        ("href", Some("current-user-principal")) => append(&mut response.principal),
        ("href", Some("calendar-home-set")) => append(&mut response.calendar_home),
        ("displayname", _) => append(&mut response.display_name),
        ("calendar-data", _) => append(&mut response.calendar_data),
        _ => {}
    }
    for slot in [&mut response.principal, &mut response.calendar_home] {
        if let Some(value) = slot.as_mut() {
            *value = value.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav/calendars/alice/</d:href>
    <d:propstat><d:prop><d:displayname>Alice</d:displayname>
      <d:resourcetype><d:collection/></d:resourcetype></d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/calendars/alice/work/</d:href>
    <d:propstat><d:prop><d:displayname>Work &amp; Projects</d:displayname>
      <d:resourcetype><d:collection/><cal:calendar/></d:resourcetype></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn listing_marks_calendars_and_unescapes_names() {
        let responses = parse_multistatus(LISTING).unwrap();
        assert_eq!(responses.len(), 2);
        assert!(!responses[0].is_calendar);
        assert!(responses[1].is_calendar);
        assert_eq!(responses[1].href, "/dav/calendars/alice/work/");
        assert_eq!(responses[1].display_name.as_deref(), Some("Work & Projects"));
    }

    #[test]
    fn principal_and_home_hrefs() {
        let xml = r#"<multistatus xmlns="DAV:"><response><href>/</href><propstat><prop>
<current-user-principal><href> /principals/alice/ </href></current-user-principal>
</prop></propstat></response></multistatus>"#;
        let responses = parse_multistatus(xml).unwrap();
        assert_eq!(responses[0].principal.as_deref(), Some("/principals/alice/"));
        assert_eq!(responses[0].href, "/");

        let xml = r#"<D:multistatus xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
<D:response><D:href>/principals/alice/</D:href><D:propstat><D:prop>
<C:calendar-home-set><D:href>/dav/calendars/alice/</D:href></C:calendar-home-set>
</D:prop></D:propstat></D:response></D:multistatus>"#;
        let responses = parse_multistatus(xml).unwrap();
        assert_eq!(
            responses[0].calendar_home.as_deref(),
            Some("/dav/calendars/alice/")
        );
    }

    #[test]
    fn calendar_data_feeds_the_ical_reader() {
        let xml = "<d:multistatus xmlns:d=\"DAV:\" xmlns:c=\"urn:ietf:params:xml:ns:caldav\">\
<d:response><d:href>/cal/1.ics</d:href><d:propstat><d:prop>\
<c:calendar-data><![CDATA[BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nDTSTART:20261015T090000Z\r\n\
SUMMARY:Standup\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n]]></c:calendar-data>\
</d:prop></d:propstat></d:response></d:multistatus>";
        let responses = parse_multistatus(xml).unwrap();
        let data = responses[0].calendar_data.as_deref().unwrap();
        let events = ical::parse_events(data);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary.as_deref(), Some("Standup"));
    }

    const PRINCIPAL: &str = r#"<d:multistatus xmlns:d="DAV:"><d:response><d:href>/dav/</d:href>
<d:propstat><d:prop><d:current-user-principal><d:href>principals/alice/</d:href>
</d:current-user-principal></d:prop></d:propstat></d:response></d:multistatus>"#;

    const HOME: &str = r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
<d:response><d:href>/dav/principals/alice/</d:href><d:propstat><d:prop>
<c:calendar-home-set><d:href>/dav/calendars/alice/</d:href></c:calendar-home-set>
</d:prop></d:propstat></d:response></d:multistatus>"#;

    fn base() -> Url {
        Url::parse("https://dav.example.org/dav/").unwrap()
    }

    #[test]
    fn lookup_follows_principal_home_and_listing() {
        let principal = principal_url(&base(), PRINCIPAL).unwrap();
        // relative href resolves against the configured base
        assert_eq!(principal.as_str(), "https://dav.example.org/dav/principals/alice/");

        let home = calendar_home_url(&base(), principal, HOME).unwrap();
        assert_eq!(home.as_str(), "https://dav.example.org/dav/calendars/alice/");

        let calendar = find_calendar(&base(), LISTING, " Work & Projects ").unwrap();
        assert_eq!(calendar.as_str(), "https://dav.example.org/dav/calendars/alice/work/");
    }

    #[test]
    fn lookup_falls_back_without_principal_or_home() {
        let empty = r#"<d:multistatus xmlns:d="DAV:"><d:response><d:href>/dav/</d:href>
</d:response></d:multistatus>"#;
        let principal = principal_url(&base(), empty).unwrap();
        assert_eq!(principal, base());
        let home = calendar_home_url(&base(), principal.clone(), empty).unwrap();
        assert_eq!(home, principal);
    }

    #[test]
    fn unknown_calendar_name_is_not_found() {
        // "Alice" exists but is not a calendar collection
        for name in ["Private", "Alice"] {
            match find_calendar(&base(), LISTING, name) {
                Err(SourceError::CalendarNotFound(missing)) => assert_eq!(missing, name),
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn broken_xml_is_an_error() {
        assert!(parse_multistatus("<a><b></a>").is_err());
    }

    #[test]
    fn query_covers_the_window() {
        let window = DayWindow::for_day(&Utc, NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
        let body = calendar_query(&window);
        assert!(body.contains(r#"<c:expand start="20261015T000000Z" end="20261016T000000Z"/>"#));
        assert!(body.contains(r#"<c:time-range start="20261015T000000Z" end="20261016T000000Z"/>"#));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let config = CalendarConfig {
            name: "work".into(),
            url: "not a url".into(),
            user: String::new(),
            password: String::new(),
            calendar: "Work".into(),
            color: "blue".into(),
        };
        let result = CalDavSource::new(&config, ColorValue::Rgb(0, 0, 255), Duration::from_secs(5));
        assert!(matches!(result, Err(SourceError::Malformed(_))));
    }
}
