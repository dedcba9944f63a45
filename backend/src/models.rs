use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Base of the canonical watch URL for a video id.
pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSnapshot {
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: u64,
    pub duration_iso: String, // e.g. PT12M3S
    pub thumbnail_url: Option<String>,
}

impl VideoSnapshot {
    pub fn watch_url(&self) -> String {
        format!("{WATCH_URL_BASE}{}", self.video_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub channel_id: String,
    /// `None` when the channel hides its subscriber count.
    pub subscriber_count: Option<u64>,
}

/// A cached entity together with the time it was fetched from the API.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord<T> {
    pub record: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> CacheRecord<T> {
    pub fn new(record: T, fetched_at: DateTime<Utc>) -> Self {
        Self { record, fetched_at }
    }

    /// Fresh iff `now - fetched_at <= max_age`.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.fetched_at <= max_age
    }
}

/// A resolved video with the subscriber count of its channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVideo {
    pub video: VideoSnapshot,
    pub subscribers: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCategory {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStrategy {
    #[default]
    ChartOnly,
    ChartAndCategories,
    ChartAndSearch,
}

impl AcquisitionStrategy {
    pub fn scans_categories(&self) -> bool {
        matches!(self, AcquisitionStrategy::ChartAndCategories)
    }

    pub fn includes_search(&self) -> bool {
        matches!(self, AcquisitionStrategy::ChartAndSearch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    ViewsPerDay,
    Ratio,
    Views,
    #[serde(alias = "date")]
    PublishedAt,
}

/// `videoDuration` parameter of search.list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationClass {
    #[default]
    Any,
    Short,
    Medium,
    Long,
}

impl DurationClass {
    pub fn as_param(&self) -> &'static str {
        match self {
            DurationClass::Any => "any",
            DurationClass::Short => "short",
            DurationClass::Medium => "medium",
            DurationClass::Long => "long",
        }
    }
}

/// `order` parameter of search.list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchOrder {
    Date,
    Rating,
    #[default]
    Relevance,
    Title,
    ViewCount,
}

impl SearchOrder {
    pub fn as_param(&self) -> &'static str {
        match self {
            SearchOrder::Date => "date",
            SearchOrder::Rating => "rating",
            SearchOrder::Relevance => "relevance",
            SearchOrder::Title => "title",
            SearchOrder::ViewCount => "viewCount",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub language: Option<String>,
    pub max_results: u32,
    pub duration_class: DurationClass,
    pub order: SearchOrder,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            language: None,
            max_results: 25,
            duration_class: DurationClass::Medium,
            order: SearchOrder::ViewCount,
        }
    }
}

/// Parameters of a single search.list call.
#[derive(Debug, Clone)]
pub struct SearchParams<'a> {
    pub query: &'a str,
    pub region: &'a str,
    pub language: Option<&'a str>,
    pub max_results: u32,
    pub duration_class: DurationClass,
    pub order: SearchOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierFilters {
    pub min_views: u64,
    pub max_subs: Option<u64>,
    pub min_ratio: Option<f64>,
    pub min_duration_seconds: u64,
    pub exclude_shorts: bool,
    /// Keep rows whose ratio cannot be computed when `min_ratio` is set.
    pub keep_unknown_ratio: bool,
}

impl Default for OutlierFilters {
    fn default() -> Self {
        Self {
            min_views: 20_000,
            max_subs: Some(10_000),
            min_ratio: Some(3.0),
            min_duration_seconds: 120,
            exclude_shorts: true,
            keep_unknown_ratio: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    pub region_code: String,
    pub strategy: AcquisitionStrategy,
    pub pages: u32,
    pub page_size: u32,
    pub category_ids: Vec<String>,
    pub keywords: Vec<String>,
    pub search_budget: usize,
    pub search: SearchSettings,
    pub video_max_age_hours: i64,
    pub channel_max_age_hours: i64,
    pub filters: OutlierFilters,
    pub candidate_cap: usize,
    pub sort_by: SortKey,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            region_code: "US".to_string(),
            strategy: AcquisitionStrategy::ChartOnly,
            pages: 3,
            page_size: 50,
            category_ids: Vec::new(),
            keywords: Vec::new(),
            search_budget: 3,
            search: SearchSettings::default(),
            video_max_age_hours: 12,
            channel_max_age_hours: 24,
            filters: OutlierFilters::default(),
            candidate_cap: 300,
            sort_by: SortKey::ViewsPerDay,
        }
    }
}

impl ScanRequest {
    /// `None` when the window is too large to represent.
    pub fn video_max_age(&self) -> Option<Duration> {
        Duration::try_hours(self.video_max_age_hours)
    }

    pub fn channel_max_age(&self) -> Option<Duration> {
        Duration::try_hours(self.channel_max_age_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierRow {
    #[serde(flatten)]
    pub video: VideoSnapshot,
    pub subscribers: Option<u64>,
    pub duration_seconds: u64,
    pub age_days: Option<f64>,
    pub views_per_day: Option<f64>,
    pub ratio: Option<f64>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCategory {
    pub category_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub candidates_scanned: usize,
    pub rows_retained: usize,
    pub candidate_cap: usize,
    pub videos_from_cache: usize,
    pub videos_fetched: usize,
    pub channels_from_cache: usize,
    pub channels_fetched: usize,
    pub skipped_categories: Vec<SkippedCategory>,
    pub search_calls: usize,
    pub search_aborted: Option<String>,
    pub quota_units_spent: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub rows: Vec<OutlierRow>,
    pub summary: ScanSummary,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
