//! Reconciles the inconsistent metadata feeds publish: HTML character
//! references left in text fields, and publish dates in several formats.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use super::parser::{Item, SyndicationDocument};

// ============================================================================
// Text
// ============================================================================

/// Decode HTML character references (`&amp;`, `&#39;`, `&eacute;`) into
/// plain text. Text without references is returned borrowed and unchanged.
pub fn unescape_text(s: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(s)
}

// ============================================================================
// Dates
// ============================================================================

/// A publish-date layout accepted from feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
}

/// Trial order for [`parse_publish_date`]. The first format that accepts a
/// string decides its value.
pub const DATE_FORMATS: [DateFormat; 3] =
    [DateFormat::Rfc3339, DateFormat::Rfc1123Z, DateFormat::Rfc1123];

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

impl DateFormat {
    pub fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::Rfc1123Z => {
                let rest = strip_weekday(s)?;
                DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S %z")
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }
            DateFormat::Rfc1123 => {
                let rest = strip_weekday(s)?;
                let (local, zone) = rest.rsplit_once(' ')?;
                let offset = zone_offset(zone)?;
                let naive = NaiveDateTime::parse_from_str(local, "%d %b %Y %H:%M:%S").ok()?;
                offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        }
    }
}

/// Drop the leading `"Mon, "`. The day name has to be present and valid but
/// is not checked against the date; feeds get it wrong often enough.
fn strip_weekday(s: &str) -> Option<&str> {
    let (day, rest) = s.split_once(", ")?;
    WEEKDAYS
        .iter()
        .any(|d| d.eq_ignore_ascii_case(day))
        .then_some(rest)
}

/// Offset for an RFC 822 zone name. Other alphabetic abbreviations carry no
/// usable offset and are read as UTC.
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() || zone.len() > 5 || !zone.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let hours = match zone.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// Parse a raw publish date against [`DATE_FORMATS`] in order.
///
/// `None` means the date is unknown; that is not an error, the post is
/// stored without one.
pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    matching_format(raw).and_then(|format| format.parse(raw.trim()))
}

/// The first format in [`DATE_FORMATS`] that accepts `raw`
pub fn matching_format(raw: &str) -> Option<DateFormat> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .into_iter()
        .find(|format| format.parse(raw).is_some())
}

// ============================================================================
// Documents
// ============================================================================

/// A feed with its text unescaped and dates resolved, ready for the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<NormalizedItem>,
    /// Items dropped because they had no link to key them by
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub title: String,
    /// Canonical url, the dedup key
    pub link: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl NormalizedItem {
    fn from_item(item: Item) -> Option<Self> {
        let link = item.link.trim();
        if link.is_empty() {
            return None;
        }

        let description = unescape_text(&item.description).into_owned();
        let published_at = parse_publish_date(&item.pub_date);
        if published_at.is_none() && !item.pub_date.trim().is_empty() {
            tracing::debug!(pub_date = %item.pub_date, link = %link, "Unrecognized publish date");
        }

        Some(NormalizedItem {
            title: unescape_text(&item.title).into_owned(),
            link: link.to_string(),
            description: (!description.is_empty()).then_some(description),
            published_at,
        })
    }
}

pub fn normalize_document(doc: SyndicationDocument) -> NormalizedFeed {
    let total = doc.items.len();
    let items: Vec<NormalizedItem> = doc
        .items
        .into_iter()
        .filter_map(NormalizedItem::from_item)
        .collect();

    NormalizedFeed {
        title: unescape_text(&doc.title).into_owned(),
        link: doc.link.trim().to_string(),
        description: unescape_text(&doc.description).into_owned(),
        skipped: total - items.len(),
        items,
    }
}
