//! Notification ingestion: authenticate, parse, materialize videos, fan out.
//!
//! A notification authenticates against the subscription of the channel the
//! feed itself names (first entry's `yt:channelId`); only then are entries
//! processed. Each entry's mutations run in their own transaction, so a bad
//! entry never poisons its siblings.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, warn};

use watchtower_core::feed::{self, Entry, FeedError};
use watchtower_core::signature;
use watchtower_db::models::Video;
use watchtower_db::queries::{channels, subscriptions};
use watchtower_platform::{VideoDetails, YouTubeClient};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] FeedError),
    #[error("feed contained no entries")]
    NoEntries,
    #[error("feed did not name a channel")]
    MissingChannelId,
    #[error("no subscription for channel {0}")]
    UnknownSubscription(String),
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub ingested: usize,
    pub skipped: usize,
}

/// Verifies and ingests one notification body.
///
/// Entries are processed sequentially in feed order. Entry-level problems
/// (underivable video id, untracked channel, unparseable publish date,
/// transaction failure) skip that entry; only authentication and parse
/// problems reject the whole notification.
pub async fn process_notification(
    db: &PgPool,
    platform: Option<&YouTubeClient>,
    body: &[u8],
    signature_header: &str,
) -> Result<IngestSummary, IngestError> {
    let feed = feed::parse_feed(body)?;
    if feed.entries.is_empty() {
        return Err(IngestError::NoEntries);
    }
    let channel_id = feed
        .channel_id()
        .ok_or(IngestError::MissingChannelId)?
        .to_string();

    let subscription = subscriptions::get_by_platform_id(db, &channel_id)
        .await?
        .ok_or_else(|| IngestError::UnknownSubscription(channel_id.clone()))?;

    if !signature::verify_feed_signature(&subscription.secret, body, signature_header) {
        return Err(IngestError::SignatureMismatch);
    }

    let mut summary = IngestSummary::default();
    for entry in &feed.entries {
        match process_entry(db, platform, entry).await {
            Ok(true) => summary.ingested += 1,
            Ok(false) => summary.skipped += 1,
            Err(err) => {
                warn!(error = %err, entry_id = %entry.id, "entry ingestion failed");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

async fn process_entry(
    db: &PgPool,
    platform: Option<&YouTubeClient>,
    entry: &Entry,
) -> Result<bool, IngestError> {
    let Some(video_id) = entry.resolve_video_id() else {
        warn!(entry_id = %entry.id, "could not derive a video id; skipping entry");
        return Ok(false);
    };

    let Some(entry_channel) = entry.channel_id.as_deref() else {
        return Ok(false);
    };
    let Some(channel) = channels::get_by_platform_id(db, entry_channel).await? else {
        debug!(channel_id = entry_channel, "notification for an untracked channel; skipping");
        return Ok(false);
    };

    // No default publish date: an entry we cannot date is an entry we skip.
    let Some(published_at) = entry.published_at() else {
        warn!(video_id, "unparseable published date; skipping entry");
        return Ok(false);
    };

    let details = match platform {
        Some(client) => match client.get_video(video_id).await {
            Ok(details) => details,
            Err(err) => {
                warn!(video_id, error = %err, "video metadata fetch failed; using feed fields");
                degraded_details(entry, video_id)
            }
        },
        None => degraded_details(entry, video_id),
    };

    let mut tx = db.begin().await?;

    let video = sqlx::query_as::<_, Video>(
        r#"
        INSERT INTO videos (platform_video_id, channel_id, title, description,
                            thumbnail_url, duration, published_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (platform_video_id) DO UPDATE
        SET title = EXCLUDED.title,
            description = EXCLUDED.description,
            thumbnail_url = EXCLUDED.thumbnail_url,
            duration = EXCLUDED.duration,
            published_at = EXCLUDED.published_at,
            updated_at = now(),
            deleted_at = NULL
        RETURNING id, platform_video_id, channel_id, title, description, thumbnail_url,
                  duration, published_at, created_at, updated_at, deleted_at
        "#,
    )
    .bind(video_id)
    .bind(channel.id)
    .bind(&details.title)
    .bind(&details.description)
    .bind(&details.thumbnail)
    .bind(&details.duration)
    .bind(published_at)
    .fetch_one(&mut *tx)
    .await?;

    // Fan out to every live watchlist currently containing the channel.
    sqlx::query(
        r#"
        INSERT INTO watchlist_videos (watchlist_id, video_id)
        SELECT wc.watchlist_id, $2
        FROM watchlist_channels wc
        JOIN watchlists w ON w.id = wc.watchlist_id
        WHERE wc.channel_id = $1 AND w.deleted_at IS NULL
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(channel.id)
    .bind(video.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Metadata synthesized from the notification alone, used when the platform
/// client is disabled or its lookup fails.
fn degraded_details(entry: &Entry, video_id: &str) -> VideoDetails {
    VideoDetails {
        id: video_id.to_string(),
        title: entry.title.clone(),
        description: String::new(),
        thumbnail: fallback_thumbnail_url(video_id),
        duration: String::new(),
    }
}

/// The platform's deterministic thumbnail location for a video.
pub fn fallback_thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_thumbnail_is_deterministic() {
        assert_eq!(
            fallback_thumbnail_url("E9QdJRd-gGE"),
            "https://img.youtube.com/vi/E9QdJRd-gGE/maxresdefault.jpg"
        );
    }

    #[test]
    fn degraded_details_use_feed_fields_only() {
        let entry = Entry {
            id: "yt:video:E9Q".to_string(),
            video_id: Some("E9Q".to_string()),
            channel_id: Some("UCx".to_string()),
            title: "T".to_string(),
            published: Some("2025-03-20T13:57:41Z".to_string()),
            updated: None,
        };
        let details = degraded_details(&entry, "E9Q");
        assert_eq!(details.title, "T");
        assert_eq!(details.description, "");
        assert_eq!(details.duration, "");
        assert_eq!(
            details.thumbnail,
            "https://img.youtube.com/vi/E9Q/maxresdefault.jpg"
        );
    }
}
