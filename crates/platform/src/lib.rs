//! YouTube Data API v3 client: resolves whatever users paste to a canonical
//! channel, and fetches video metadata during notification ingestion.

pub mod parse;

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("invalid channel identifier or url")]
    InvalidInput,
    #[error("not found on the platform")]
    NotFound,
    #[error("upstream api error: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError::Upstream(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
}

#[derive(Debug, Clone)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration: String,
}

pub struct YouTubeClient {
    api_key: String,
    http: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(api_key: String) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self { api_key, http })
    }

    /// Resolves a channel id, handle, or URL to channel metadata.
    ///
    /// Lookup order minimizes quota: direct id lookup, then handle lookup,
    /// then full-text search taking the first result. Each step runs only
    /// when the previous one produced no hit.
    pub async fn resolve_channel(&self, input: &str) -> Result<ChannelInfo, PlatformError> {
        let extracted = parse::extract_channel_input(input)?;

        if parse::is_canonical_id(&extracted) {
            let resp: ChannelListResponse = self
                .get_json("channels", &[("part", "snippet"), ("id", &extracted)])
                .await?;
            if let Some(item) = resp.items.into_iter().next() {
                return Ok(item.into_channel_info());
            }
        }

        if let Some(handle) = extracted.strip_prefix('@') {
            // A failed handle lookup falls through to search.
            if let Ok(resp) = self
                .get_json::<ChannelListResponse>(
                    "channels",
                    &[("part", "snippet"), ("forHandle", handle)],
                )
                .await
            {
                if let Some(item) = resp.items.into_iter().next() {
                    return Ok(item.into_channel_info());
                }
            }
        }

        let search: SearchListResponse = self
            .get_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("type", "channel"),
                    ("maxResults", "1"),
                    ("q", &extracted),
                ],
            )
            .await?;
        let found = search
            .items
            .into_iter()
            .next()
            .map(|item| item.id.channel_id)
            .filter(|id| !id.is_empty())
            .ok_or(PlatformError::NotFound)?;

        let resp: ChannelListResponse = self
            .get_json("channels", &[("part", "snippet"), ("id", &found)])
            .await?;
        resp.items
            .into_iter()
            .next()
            .map(ChannelItem::into_channel_info)
            .ok_or(PlatformError::NotFound)
    }

    pub async fn get_video(&self, video_id: &str) -> Result<VideoDetails, PlatformError> {
        let resp: VideoListResponse = self
            .get_json(
                "videos",
                &[("part", "snippet,contentDetails"), ("id", video_id)],
            )
            .await?;
        resp.items
            .into_iter()
            .next()
            .map(VideoItem::into_details)
            .ok_or(PlatformError::NotFound)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let resp = self
            .http
            .get(format!("{API_BASE}/{resource}"))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PlatformError::Upstream(format!(
                "{resource} request failed with status {status}"
            )));
        }
        Ok(resp.json::<T>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    snippet: Snippet,
}

impl ChannelItem {
    fn into_channel_info(self) -> ChannelInfo {
        // Channel thumbnails top out at "high".
        let thumbnail = self.snippet.thumbnails.best_of(&["high", "medium", "default"]);
        ChannelInfo {
            id: self.id,
            title: self.snippet.title,
            description: self.snippet.description,
            thumbnail,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    #[serde(default)]
    content_details: ContentDetails,
}

impl VideoItem {
    fn into_details(self) -> VideoDetails {
        let thumbnail = self
            .snippet
            .thumbnails
            .best_of(&["maxres", "high", "medium", "default"]);
        VideoDetails {
            id: self.id,
            title: self.snippet.title,
            description: self.snippet.description,
            thumbnail,
            duration: self.content_details.duration,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: std::collections::HashMap<String, Thumbnail>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnail {
    #[serde(default)]
    url: String,
}

trait BestThumbnail {
    fn best_of(&self, order: &[&str]) -> String;
}

impl BestThumbnail for std::collections::HashMap<String, Thumbnail> {
    fn best_of(&self, order: &[&str]) -> String {
        for key in order {
            if let Some(thumb) = self.get(*key) {
                if !thumb.url.is_empty() {
                    return thumb.url.clone();
                }
            }
        }
        String::new()
    }
}
