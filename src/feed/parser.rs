use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use thiserror::Error;

/// The document could not be decoded as any supported feed format.
#[derive(Debug, Error)]
#[error("Parse error: {0}")]
pub struct ParseError(String);

/// One feed response decoded into a channel and its items.
///
/// Text fields are exactly as they appeared in the document (after XML
/// unescaping); HTML entities and dates are handled by `normalize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyndicationDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publish date as written by the feed, unparsed
    pub pub_date: String,
}

// ============================================================================
// RSS 2.0 wire shape
// ============================================================================

// Only the elements we read are declared; everything else in the document
// (attributes, images, categories) is skipped. Namespaced extensions such as
// `<atom:link>` or `<itunes:title>` can arrive under the same local name as
// the plain element, so each text field collects every occurrence and the
// first non-empty one wins.

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RssChannel {
    title: Vec<RssText>,
    link: Vec<RssText>,
    description: Vec<RssText>,
    #[serde(rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RssItem {
    title: Vec<RssText>,
    link: Vec<RssText>,
    description: Vec<RssText>,
    #[serde(rename = "pubDate")]
    pub_date: Vec<RssText>,
}

#[derive(Debug, Default, Deserialize)]
struct RssText {
    #[serde(rename = "$text", default)]
    text: String,
}

fn first_text(values: Vec<RssText>) -> String {
    values
        .into_iter()
        .map(|v| v.text)
        .find(|t| !t.trim().is_empty())
        .unwrap_or_default()
}

impl From<RssDocument> for SyndicationDocument {
    fn from(doc: RssDocument) -> Self {
        let RssChannel {
            title,
            link,
            description,
            items,
        } = doc.channel;

        SyndicationDocument {
            title: first_text(title),
            link: first_text(link),
            description: first_text(description),
            items: items
                .into_iter()
                .map(|item| Item {
                    title: first_text(item.title),
                    link: first_text(item.link),
                    description: first_text(item.description),
                    pub_date: first_text(item.pub_date),
                })
                .collect(),
        }
    }
}

impl From<feed_rs::model::Feed> for SyndicationDocument {
    fn from(feed: feed_rs::model::Feed) -> Self {
        let items = feed
            .entries
            .into_iter()
            .map(|entry| Item {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default(),
                description: entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body))
                    .unwrap_or_default(),
                pub_date: entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
            })
            .collect();

        SyndicationDocument {
            title: feed.title.map(|t| t.content).unwrap_or_default(),
            link: feed.links.first().map(|l| l.href.clone()).unwrap_or_default(),
            description: feed.description.map(|d| d.content).unwrap_or_default(),
            items,
        }
    }
}

/// Local name of the document's first element, if it has one
fn root_element(text: &str) -> Option<String> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Decode a feed body.
///
/// An `<rss>` document is decoded leniently as RSS 2.0: unknown markup is
/// ignored and invalid UTF-8 is replaced rather than rejected. Any other root
/// (Atom `<feed>`, RSS 1.0 `<rdf:RDF>`, JSON Feed) is handed to `feed-rs`,
/// as is an `<rss>` document the lenient decoder still rejects. In that last
/// case the RSS error is the one reported.
pub fn parse_document(bytes: &[u8]) -> Result<SyndicationDocument, ParseError> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let rss_err = if root_element(text).as_deref() == Some("rss") {
        match quick_xml::de::from_str::<RssDocument>(text) {
            Ok(doc) => return Ok(doc.into()),
            Err(e) => Some(e),
        }
    } else {
        None
    };

    match feed_rs::parser::parse(text.as_bytes()) {
        Ok(feed) => {
            if let Some(e) = &rss_err {
                tracing::debug!(rss_error = %e, "RSS decode failed, decoded with feed-rs");
            }
            Ok(feed.into())
        }
        Err(e) => Err(ParseError(match rss_err {
            Some(rss_err) => rss_err.to_string(),
            None => e.to_string(),
        })),
    }
}
