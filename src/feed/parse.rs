// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};

use crate::error::FeedError;

/// A feed as delivered by a feed source, before reconciliation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Entries in source order
    pub entries: Vec<ParsedEntry>,
}

/// One entry of a parsed feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published: Option<DateTime<FixedOffset>>,
    pub updated: Option<DateTime<FixedOffset>>,
    pub links: Vec<EntryLink>,
}

/// Relation of an entry link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRel {
    /// Primary media for the entry
    Enclosure,
    /// Secondary reference, usually a web page
    Alternate,
    Other(String),
}

impl LinkRel {
    pub fn from_rel(rel: &str) -> Self {
        match rel {
            "enclosure" => LinkRel::Enclosure,
            "alternate" => LinkRel::Alternate,
            other => LinkRel::Other(other.to_string()),
        }
    }
}

/// A link attached to an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLink {
    pub rel: LinkRel,
    pub href: String,
    /// MIME type, empty when the source gives none
    pub content_type: String,
}

/// Parse RSS or Atom feed XML bytes into a ParsedFeed
///
/// RSS goes through the `rss` crate; documents that do not start with an
/// `<rss>` element are handed to `feed-rs`.
pub fn parse_feed(xml_bytes: &[u8]) -> Result<ParsedFeed, FeedError> {
    let channel = match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => channel,
        Err(rss::Error::InvalidStartTag) => return parse_atom(xml_bytes),
        Err(e) => return Err(e.into()),
    };

    let entries = channel.items().iter().map(parse_entry).collect();

    Ok(ParsedFeed {
        title: non_empty(channel.title()).map(|t| decode_text(&t)),
        description: non_empty(channel.description()),
        entries,
    })
}

fn parse_entry(item: &rss::Item) -> ParsedEntry {
    let mut links = Vec::new();

    if let Some(link) = item.link().and_then(non_empty) {
        links.push(EntryLink {
            rel: LinkRel::Alternate,
            href: link,
            content_type: "text/html".to_string(),
        });
    }

    if let Some(enclosure) = item.enclosure() {
        links.push(EntryLink {
            rel: LinkRel::Enclosure,
            href: enclosure.url().to_string(),
            content_type: enclosure.mime_type().to_string(),
        });
    }

    let updated = item
        .dublin_core_ext()
        .and_then(|dc| dc.dates().first())
        .and_then(|date_str| parse_date(date_str));

    ParsedEntry {
        id: item.guid().and_then(|g| non_empty(g.value())),
        title: item.title().and_then(non_empty).map(|t| decode_text(&t)),
        description: item.description().and_then(non_empty),
        published: item.pub_date().and_then(parse_date),
        updated,
        links,
    }
}

fn parse_atom(xml_bytes: &[u8]) -> Result<ParsedFeed, FeedError> {
    let feed = feed_rs::parser::parse(xml_bytes)?;

    Ok(ParsedFeed {
        title: feed
            .title
            .and_then(|t| non_empty(&t.content))
            .map(|t| decode_text(&t)),
        description: feed.description.and_then(|d| non_empty(&d.content)),
        entries: feed.entries.iter().map(parse_atom_entry).collect(),
    })
}

fn parse_atom_entry(entry: &feed_rs::model::Entry) -> ParsedEntry {
    // Atom links without a rel attribute are alternates
    let links = entry
        .links
        .iter()
        .filter(|link| !link.href.trim().is_empty())
        .map(|link| EntryLink {
            rel: link
                .rel
                .as_deref()
                .map_or(LinkRel::Alternate, LinkRel::from_rel),
            href: link.href.trim().to_string(),
            content_type: link.media_type.clone().unwrap_or_default(),
        })
        .collect();

    let description = entry
        .summary
        .as_ref()
        .and_then(|s| non_empty(&s.content))
        .or_else(|| {
            entry
                .content
                .as_ref()
                .and_then(|c| c.body.as_deref())
                .and_then(non_empty)
        });

    ParsedEntry {
        id: non_empty(&entry.id),
        title: entry
            .title
            .as_ref()
            .and_then(|t| non_empty(&t.content))
            .map(|t| decode_text(&t)),
        description,
        published: entry.published.map(|d| d.fixed_offset()),
        updated: entry.updated.map(|d| d.fixed_offset()),
        links,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Titles regularly arrive double-escaped (`&amp;amp;`); decode one level.
fn decode_text(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

/// Parse an RFC 2822 or RFC 3339 date, falling back to common near-misses
fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let date_str = date_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt);
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate};

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Test Podcast &amp;amp; Friends</title>
    <description>A test podcast for unit testing</description>
    <link>https://example.com</link>
    <item>
      <title>Episode 1</title>
      <description>First episode</description>
      <link>https://example.com/ep1</link>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <dc:date>2024-01-03T08:00:00+00:00</dc:date>
      <guid>ep1-guid</guid>
      <enclosure url="https://example.com/ep1.mp3" length="1234567" type="audio/mpeg"/>
    </item>
    <item>
      <title>Episode 2</title>
      <link>https://example.com/ep2</link>
    </item>
    <item>
      <description>Bare item</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parse_feed_extracts_channel_metadata() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();

        assert_eq!(feed.title, Some("Test Podcast & Friends".to_string()));
        assert_eq!(
            feed.description,
            Some("A test podcast for unit testing".to_string())
        );
        assert_eq!(feed.entries.len(), 3);
    }

    #[test]
    fn parse_entry_maps_guid_dates_and_links() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        let ep1 = &feed.entries[0];

        assert_eq!(ep1.id, Some("ep1-guid".to_string()));
        assert_eq!(ep1.title, Some("Episode 1".to_string()));
        assert_eq!(
            ep1.published.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(ep1.updated.unwrap().day(), 3);
        assert_eq!(
            ep1.links,
            vec![
                EntryLink {
                    rel: LinkRel::Alternate,
                    href: "https://example.com/ep1".to_string(),
                    content_type: "text/html".to_string(),
                },
                EntryLink {
                    rel: LinkRel::Enclosure,
                    href: "https://example.com/ep1.mp3".to_string(),
                    content_type: "audio/mpeg".to_string(),
                },
            ]
        );
    }

    #[test]
    fn parse_entry_keeps_items_without_enclosure() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        let ep2 = &feed.entries[1];

        assert!(ep2.id.is_none());
        assert!(ep2.published.is_none());
        assert_eq!(ep2.links.len(), 1);
        assert_eq!(ep2.links[0].rel, LinkRel::Alternate);
    }

    #[test]
    fn parse_entry_handles_bare_item() {
        let feed = parse_feed(SAMPLE_FEED.as_bytes()).unwrap();
        let bare = &feed.entries[2];

        assert!(bare.title.is_none());
        assert_eq!(bare.description, Some("Bare item".to_string()));
        assert!(bare.links.is_empty());
    }

    const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Cast</title>
  <subtitle>Episodes in Atom</subtitle>
  <id>urn:uuid:60a76c80-d399-11d9-b93c-0003939e0af6</id>
  <updated>2024-02-02T10:00:00Z</updated>
  <entry>
    <title>Pilot &amp;amp; more</title>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <published>2024-02-01T09:30:00-05:00</published>
    <updated>2024-02-02T10:00:00Z</updated>
    <summary>The first one</summary>
    <link href="https://atom.example/pilot"/>
    <link rel="enclosure" type="audio/ogg" length="42" href="https://atom.example/pilot.ogg"/>
    <link rel="alternate" type="text/html" href="https://atom.example/pilot.html"/>
    <link rel="related" href="https://atom.example/notes"/>
  </entry>
</feed>"#;

    #[test]
    fn parse_feed_reads_atom() {
        let feed = parse_feed(ATOM_FEED.as_bytes()).unwrap();

        assert_eq!(feed.title, Some("Atom Cast".to_string()));
        assert_eq!(feed.description, Some("Episodes in Atom".to_string()));
        assert_eq!(feed.entries.len(), 1);

        let entry = &feed.entries[0];
        assert_eq!(
            entry.id,
            Some("urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a".to_string())
        );
        assert_eq!(entry.title, Some("Pilot & more".to_string()));
        assert_eq!(entry.description, Some("The first one".to_string()));
        assert_eq!(
            entry.published.unwrap().to_utc(),
            DateTime::parse_from_rfc3339("2024-02-01T14:30:00Z").unwrap().to_utc()
        );
        assert_eq!(entry.updated.unwrap().day(), 2);
    }

    #[test]
    fn parse_atom_entry_keeps_link_relations() {
        let feed = parse_feed(ATOM_FEED.as_bytes()).unwrap();
        let rels: Vec<_> = feed.entries[0]
            .links
            .iter()
            .map(|l| (l.rel.clone(), l.href.as_str(), l.content_type.as_str()))
            .collect();

        assert_eq!(
            rels,
            vec![
                (LinkRel::Alternate, "https://atom.example/pilot", ""),
                (
                    LinkRel::Enclosure,
                    "https://atom.example/pilot.ogg",
                    "audio/ogg"
                ),
                (
                    LinkRel::Alternate,
                    "https://atom.example/pilot.html",
                    "text/html"
                ),
                (
                    LinkRel::Other("related".to_string()),
                    "https://atom.example/notes",
                    ""
                ),
            ]
        );
    }

    #[test]
    fn parse_feed_rejects_garbage() {
        assert!(parse_feed(b"<html>not a feed</html>").is_err());
    }

    #[test]
    fn parse_date_accepts_common_formats() {
        assert!(parse_date("Mon, 01 Jan 2024 12:00:00 +0000").is_some());
        assert!(parse_date("2024-01-01T12:00:00+02:00").is_some());
        assert!(parse_date("2024-01-01 12:00:00 +0000").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn link_rel_from_rel() {
        assert_eq!(LinkRel::from_rel("enclosure"), LinkRel::Enclosure);
        assert_eq!(LinkRel::from_rel("alternate"), LinkRel::Alternate);
        assert_eq!(
            LinkRel::from_rel("self"),
            LinkRel::Other("self".to_string())
        );
    }
}
