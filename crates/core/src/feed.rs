//! Atom feed parsing for hub notifications.
//!
//! Notifications arrive as the YouTube video feed
//! (`http://www.youtube.com/xml/schemas/2015` namespace). Elements are
//! matched by local name so prefix choices made by the hub do not matter.
//! The first entry's `yt:channelId` is the authoritative channel identity;
//! `author/uri` is advisory and ignored.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed feed xml: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[derive(Debug, Default, Clone)]
pub struct Entry {
    pub id: String,
    pub video_id: Option<String>,
    pub channel_id: Option<String>,
    pub title: String,
    pub published: Option<String>,
    pub updated: Option<String>,
}

impl Entry {
    /// Video id from `<yt:videoId>`, falling back to an `<id>` of shape
    /// `yt:video:<id>`.
    pub fn resolve_video_id(&self) -> Option<&str> {
        if let Some(v) = self.video_id.as_deref() {
            if !v.is_empty() {
                return Some(v);
            }
        }
        let rest = self.id.strip_prefix("yt:video:")?;
        (!rest.is_empty()).then_some(rest)
    }

    /// `<published>` as RFC 3339. A missing or unparseable value is `None`;
    /// callers skip such entries rather than substituting a default.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.published.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[derive(Debug, Default)]
pub struct Feed {
    pub entries: Vec<Entry>,
}

impl Feed {
    /// Channel id asserted by the feed: the first entry's `yt:channelId`.
    pub fn channel_id(&self) -> Option<&str> {
        self.entries
            .first()
            .and_then(|e| e.channel_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Clone, Copy)]
enum EntryField {
    Id,
    VideoId,
    ChannelId,
    Title,
    Published,
    Updated,
}

pub fn parse_feed(body: &[u8]) -> Result<Feed, FeedError> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();

    let mut feed = Feed::default();
    let mut entry: Option<Entry> = None;
    let mut field: Option<EntryField> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let local = e.local_name();
                if local.as_ref() == b"entry" {
                    entry = Some(Entry::default());
                } else if entry.is_some() {
                    field = match local.as_ref() {
                        b"id" => Some(EntryField::Id),
                        b"videoId" => Some(EntryField::VideoId),
                        b"channelId" => Some(EntryField::ChannelId),
                        b"title" => Some(EntryField::Title),
                        b"published" => Some(EntryField::Published),
                        b"updated" => Some(EntryField::Updated),
                        _ => None,
                    };
                }
            }
            Event::Text(ref t) => {
                if let (Some(entry), Some(field)) = (entry.as_mut(), field) {
                    let text = t.unescape()?.trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match field {
                        EntryField::Id => entry.id = text,
                        EntryField::VideoId => entry.video_id = Some(text),
                        EntryField::ChannelId => entry.channel_id = Some(text),
                        EntryField::Title => entry.title = text,
                        EntryField::Published => entry.published = Some(text),
                        EntryField::Updated => entry.updated = Some(text),
                    }
                }
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == b"entry" {
                    if let Some(done) = entry.take() {
                        feed.entries.push(done);
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(feed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015"
      xmlns="http://www.w3.org/2005/Atom">
  <link rel="hub" href="https://pubsubhubbub.appspot.com"/>
  <title>YouTube video feed</title>
  <updated>2025-03-20T14:02:29.019330192+00:00</updated>
  <entry>
    <id>yt:video:E9QdJRd-gGE</id>
    <yt:videoId>E9QdJRd-gGE</yt:videoId>
    <yt:channelId>UCuAXFkgsw1L7xaCfnd5JJOw</yt:channelId>
    <title>First upload</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=E9QdJRd-gGE"/>
    <author>
      <name>Example Channel</name>
      <uri>https://www.youtube.com/channel/UCuAXFkgsw1L7xaCfnd5JJOw</uri>
    </author>
    <published>2025-03-20T13:57:41+00:00</published>
    <updated>2025-03-20T14:02:29.019330192+00:00</updated>
  </entry>
</feed>"#;

    #[test]
    fn parses_notification_entry() {
        let feed = parse_feed(NOTIFICATION.as_bytes()).unwrap();
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.channel_id(), Some("UCuAXFkgsw1L7xaCfnd5JJOw"));

        let entry = &feed.entries[0];
        assert_eq!(entry.resolve_video_id(), Some("E9QdJRd-gGE"));
        assert_eq!(entry.title, "First upload");
        let published = entry.published_at().unwrap();
        assert_eq!(published.timestamp(), 1_742_479_061);
        assert!(entry.updated.is_some());
    }

    #[test]
    fn video_id_falls_back_to_entry_id() {
        let body = r#"<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015">
  <entry>
    <id>yt:video:abc123</id>
    <yt:channelId>UCx</yt:channelId>
    <title>T</title>
  </entry>
</feed>"#;
        let feed = parse_feed(body.as_bytes()).unwrap();
        assert_eq!(feed.entries[0].resolve_video_id(), Some("abc123"));
    }

    #[test]
    fn unresolvable_video_id_is_none() {
        let body = r#"<feed><entry><id>tag:something-else</id><title>T</title></entry></feed>"#;
        let feed = parse_feed(body.as_bytes()).unwrap();
        assert_eq!(feed.entries[0].resolve_video_id(), None);
    }

    #[test]
    fn bad_published_is_none() {
        let body = r#"<feed><entry><id>yt:video:v1</id><published>yesterday</published></entry></feed>"#;
        let feed = parse_feed(body.as_bytes()).unwrap();
        assert!(feed.entries[0].published_at().is_none());
    }

    #[test]
    fn feed_without_entries_has_no_channel() {
        let feed = parse_feed(b"<feed><title>empty</title></feed>").unwrap();
        assert!(feed.entries.is_empty());
        assert_eq!(feed.channel_id(), None);
    }

    #[test]
    fn feed_level_title_is_not_an_entry_title() {
        let body = r#"<feed><title>feed title</title><entry><id>yt:video:v2</id><title>entry title</title></entry></feed>"#;
        let feed = parse_feed(body.as_bytes()).unwrap();
        assert_eq!(feed.entries[0].title, "entry title");
    }

    #[test]
    fn multiple_entries_keep_feed_order() {
        let body = r#"<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015">
  <entry><yt:videoId>v1</yt:videoId><yt:channelId>UCx</yt:channelId><title>one</title></entry>
  <entry><yt:videoId>v2</yt:videoId><yt:channelId>UCx</yt:channelId><title>two</title></entry>
</feed>"#;
        let feed = parse_feed(body.as_bytes()).unwrap();
        let ids: Vec<_> = feed
            .entries
            .iter()
            .filter_map(|e| e.resolve_video_id())
            .collect();
        assert_eq!(ids, vec!["v1", "v2"]);
    }

    #[test]
    fn mismatched_close_tag_is_an_error() {
        assert!(parse_feed(b"<feed><entry></wrong></feed>").is_err());
    }
}
