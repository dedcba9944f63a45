use crate::error::{Result, ScanError};
use crate::models::{SearchParams, VideoCategory, VideoSnapshot};
use crate::utils::parse_iso8601_timestamp;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// The API rejects `id` lists and `maxResults` above this.
pub const MAX_IDS_PER_REQUEST: usize = 50;

const THUMBNAIL_PREFERENCE: [&str; 5] = ["maxres", "standard", "high", "medium", "default"];

const QUOTA_REASONS: [&str; 4] = [
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

/// Quota units charged by the YouTube Data API per call.
pub struct QuotaCost;

impl QuotaCost {
    pub const LIST: u64 = 1;
    pub const SEARCH: u64 = 100;
}

/// Counts quota units spent by a client over its lifetime.
#[derive(Debug, Default)]
pub struct QuotaMeter {
    spent: AtomicU64,
}

impl QuotaMeter {
    pub fn charge(&self, units: u64) {
        self.spent.fetch_add(units, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.spent.load(Ordering::Relaxed)
    }
}

/// Read operations against the video platform.
///
/// Every call is metered, so implementations never retry on their own.
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Ids from the `mostPopular` chart, following page tokens up to `max_pages`.
    async fn list_most_popular(
        &self,
        region: &str,
        category: Option<&str>,
        page_size: u32,
        max_pages: u32,
    ) -> Result<Vec<String>>;

    /// Details for `ids`, in batches of at most 50. Deleted or private videos
    /// are absent from the result.
    async fn get_video_details(&self, ids: &[String]) -> Result<Vec<VideoSnapshot>>;

    /// Subscriber counts; `None` for channels that hide theirs.
    async fn get_channel_subscriptions(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<u64>>>;

    /// A single, unpaginated search call.
    async fn search(&self, params: &SearchParams<'_>) -> Result<Vec<String>>;

    /// Assignable video categories for a region, sorted by title.
    async fn list_categories(&self, region: &str) -> Result<Vec<VideoCategory>>;

    /// Quota units spent so far.
    fn quota_used(&self) -> u64 {
        0
    }
}

// Response shapes. Only the fields the pipeline reads are modelled.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnlyItem {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(default)]
    id: SearchItemId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: VideoItemSnippet,
    #[serde(default)]
    statistics: VideoItemStatistics,
    #[serde(default)]
    content_details: VideoItemContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItemSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_id: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItemStatistics {
    view_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VideoItemContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
    #[serde(default)]
    statistics: ChannelItemStatistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItemStatistics {
    subscriber_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryItem {
    id: String,
    #[serde(default)]
    snippet: CategorySnippet,
}

#[derive(Debug, Default, Deserialize)]
struct CategorySnippet {
    title: Option<String>,
    #[serde(default)]
    assignable: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

impl VideoItem {
    fn into_snapshot(self) -> VideoSnapshot {
        let thumbnail_url = THUMBNAIL_PREFERENCE.iter().find_map(|key| {
            self.snippet
                .thumbnails
                .get(*key)
                .and_then(|thumb| thumb.url.clone())
        });

        VideoSnapshot {
            video_id: self.id,
            title: self.snippet.title,
            channel_id: self.snippet.channel_id,
            channel_title: self.snippet.channel_title,
            published_at: parse_iso8601_timestamp(&self.snippet.published_at),
            view_count: parse_count(self.statistics.view_count.as_deref()).unwrap_or(0),
            duration_iso: self.content_details.duration,
            thumbnail_url,
        }
    }
}

/// Counts arrive as decimal strings; anything unparsable is treated as unknown.
fn parse_count(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
}

/// Map a failed API response onto the scan error taxonomy.
pub fn classify_error(status: StatusCode, body: &str) -> ScanError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();

    let quota_hit = parsed.as_ref().is_some_and(|env| {
        env.error
            .errors
            .iter()
            .any(|detail| QUOTA_REASONS.contains(&detail.reason.as_str()))
    });

    if quota_hit {
        return ScanError::QuotaExceeded(body.to_string());
    }

    if status == StatusCode::NOT_FOUND {
        let message = parsed
            .map(|env| env.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.to_string());
        return ScanError::RemoteUnavailable(message);
    }

    ScanError::Remote {
        status: Some(status.as_u16()),
        message: body.to_string(),
    }
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
    quota: QuotaMeter,
}

impl YouTubeClient {
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            quota: QuotaMeter::default(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        params: &[(&str, String)],
        cost: u64,
    ) -> Result<T> {
        // Documentation: https://developers.google.com/youtube/v3/docs
        let url = format!("{}/{}", self.base_url, resource);
        self.quota.charge(cost);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str::<T>(&body)?)
    }
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn list_most_popular(
        &self,
        region: &str,
        category: Option<&str>,
        page_size: u32,
        max_pages: u32,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        let page_size = page_size.clamp(1, MAX_IDS_PER_REQUEST as u32);

        for page in 0..max_pages {
            let mut params = vec![
                ("part", "id".to_string()),
                ("chart", "mostPopular".to_string()),
                ("regionCode", region.to_string()),
                ("maxResults", page_size.to_string()),
            ];
            if let Some(category_id) = category {
                params.push(("videoCategoryId", category_id.to_string()));
            }
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let response: ListResponse<IdOnlyItem> =
                self.get_json("videos", &params, QuotaCost::LIST).await?;
            ids.extend(response.items.into_iter().map(|item| item.id));
            debug!(
                "mostPopular {region}/{}: page {} -> {} ids so far",
                category.unwrap_or("all"),
                page + 1,
                ids.len()
            );

            match response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn get_video_details(&self, ids: &[String]) -> Result<Vec<VideoSnapshot>> {
        let mut videos = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let params = [
                ("part", "snippet,statistics,contentDetails".to_string()),
                ("id", chunk.join(",")),
                ("maxResults", MAX_IDS_PER_REQUEST.to_string()),
            ];
            let response: ListResponse<VideoItem> =
                self.get_json("videos", &params, QuotaCost::LIST).await?;
            videos.extend(response.items.into_iter().map(VideoItem::into_snapshot));
        }

        if videos.len() < ids.len() {
            info!(
                "{} of {} requested videos were not returned (deleted or private)",
                ids.len() - videos.len(),
                ids.len()
            );
        }
        Ok(videos)
    }

    async fn get_channel_subscriptions(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<u64>>> {
        let mut result = HashMap::new();
        let ids: Vec<&String> = ids.iter().filter(|id| !id.is_empty()).collect();

        for chunk in ids.chunks(MAX_IDS_PER_REQUEST) {
            let joined = chunk
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let params = [
                ("part", "statistics".to_string()),
                ("id", joined),
                ("maxResults", MAX_IDS_PER_REQUEST.to_string()),
            ];
            let response: ListResponse<ChannelItem> =
                self.get_json("channels", &params, QuotaCost::LIST).await?;
            for item in response.items {
                let subs = parse_count(item.statistics.subscriber_count.as_deref());
                result.insert(item.id, subs);
            }
        }

        Ok(result)
    }

    async fn search(&self, search: &SearchParams<'_>) -> Result<Vec<String>> {
        let mut params = vec![
            ("part", "id".to_string()),
            ("type", "video".to_string()),
            ("q", search.query.to_string()),
            ("regionCode", search.region.to_string()),
            (
                "maxResults",
                search.max_results.clamp(1, MAX_IDS_PER_REQUEST as u32).to_string(),
            ),
            ("videoDuration", search.duration_class.as_param().to_string()),
            ("order", search.order.as_param().to_string()),
        ];
        if let Some(language) = search.language {
            params.push(("relevanceLanguage", language.to_string()));
        }

        let response: ListResponse<SearchItem> =
            self.get_json("search", &params, QuotaCost::SEARCH).await?;
        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    async fn list_categories(&self, region: &str) -> Result<Vec<VideoCategory>> {
        let params = [
            ("part", "snippet".to_string()),
            ("regionCode", region.to_string()),
        ];
        let response: ListResponse<CategoryItem> = self
            .get_json("videoCategories", &params, QuotaCost::LIST)
            .await?;

        let categories = assignable_categories(response.items);
        if categories.is_empty() {
            warn!("No assignable video categories for region {region}");
        }
        Ok(categories)
    }

    fn quota_used(&self) -> u64 {
        self.quota.total()
    }
}

fn assignable_categories(items: Vec<CategoryItem>) -> Vec<VideoCategory> {
    let mut categories: Vec<VideoCategory> = items
        .into_iter()
        .filter(|item| item.snippet.assignable)
        .map(|item| VideoCategory {
            title: item.snippet.title.unwrap_or_else(|| item.id.clone()),
            id: item.id,
        })
        .collect();
    categories.sort_by_key(|c| c.title.to_lowercase());
    categories
}
