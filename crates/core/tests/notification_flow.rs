//! End-to-end check of the notification primitives: a hub-style signed body
//! must verify against its subscription secret and parse into entries the
//! ingestion pipeline can act on.

use watchtower_core::feed;
use watchtower_core::signature;

const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015"
      xmlns="http://www.w3.org/2005/Atom">
  <link rel="hub" href="https://pubsubhubbub.appspot.com"/>
  <entry>
    <id>yt:video:E9QdJRd-gGE</id>
    <yt:videoId>E9QdJRd-gGE</yt:videoId>
    <yt:channelId>UCuAXFkgsw1L7xaCfnd5JJOw</yt:channelId>
    <title>T</title>
    <published>2025-03-20T13:57:41Z</published>
  </entry>
  <entry>
    <id>yt:video:aaaaaaaaaaa</id>
    <yt:videoId>aaaaaaaaaaa</yt:videoId>
    <yt:channelId>UCuAXFkgsw1L7xaCfnd5JJOw</yt:channelId>
    <title>Second</title>
    <published>not-a-date</published>
  </entry>
</feed>"#;

#[test]
fn signed_notification_verifies_and_parses() {
    let secret = signature::generate_secret();
    let header = signature::sign_feed(&secret, BODY.as_bytes());

    assert!(signature::verify_feed_signature(
        &secret,
        BODY.as_bytes(),
        &header
    ));

    let feed = feed::parse_feed(BODY.as_bytes()).unwrap();
    assert_eq!(feed.channel_id(), Some("UCuAXFkgsw1L7xaCfnd5JJOw"));
    assert_eq!(feed.entries.len(), 2);

    // First entry is fully ingestable.
    let first = &feed.entries[0];
    assert_eq!(first.resolve_video_id(), Some("E9QdJRd-gGE"));
    assert!(first.published_at().is_some());

    // Second entry carries an unusable publish date and would be skipped,
    // never given a substitute timestamp.
    let second = &feed.entries[1];
    assert_eq!(second.resolve_video_id(), Some("aaaaaaaaaaa"));
    assert!(second.published_at().is_none());
}

#[test]
fn tampered_body_fails_verification_even_with_valid_header() {
    let secret = signature::generate_secret();
    let header = signature::sign_feed(&secret, BODY.as_bytes());

    let tampered = BODY.replace("<title>T</title>", "<title>T2</title>");
    assert!(!signature::verify_feed_signature(
        &secret,
        tampered.as_bytes(),
        &header
    ));
}

#[test]
fn signature_from_another_subscription_is_rejected() {
    let secret_a = signature::generate_secret();
    let secret_b = signature::generate_secret();
    let header = signature::sign_feed(&secret_a, BODY.as_bytes());

    assert!(!signature::verify_feed_signature(
        &secret_b,
        BODY.as_bytes(),
        &header
    ));
}
