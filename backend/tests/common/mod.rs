//! Shared fixtures: an in-memory `VideoSource` that records every call.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use outlier_finder::models::{SearchParams, VideoCategory, VideoSnapshot};
use outlier_finder::services::youtube::{QuotaCost, VideoSource};
use outlier_finder::{Result, ScanError};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    MostPopular { category: Option<String> },
    VideoDetails(Vec<String>),
    ChannelSubs(Vec<String>),
    Search(String),
    Categories,
}

#[derive(Default)]
pub struct FakeSource {
    pub chart: Vec<String>,
    pub category_charts: HashMap<String, Vec<String>>,
    pub unavailable_categories: Vec<String>,
    pub categories: Vec<VideoCategory>,
    pub search_results: HashMap<String, Vec<String>>,
    pub failing_searches: Vec<String>,
    pub quota_exhausted: bool,
    pub videos: HashMap<String, VideoSnapshot>,
    pub subs: HashMap<String, Option<u64>>,
    pub calls: Mutex<Vec<Call>>,
    pub quota: Mutex<u64>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, video: VideoSnapshot, subs: Option<u64>) -> Self {
        self.subs.insert(video.channel_id.clone(), subs);
        self.videos.insert(video.video_id.clone(), video);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Search(_)))
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call, cost: u64) {
        self.calls.lock().unwrap().push(call);
        *self.quota.lock().unwrap() += cost;
    }
}

#[async_trait]
impl VideoSource for FakeSource {
    async fn list_most_popular(
        &self,
        _region: &str,
        category: Option<&str>,
        _page_size: u32,
        _max_pages: u32,
    ) -> Result<Vec<String>> {
        self.record(
            Call::MostPopular {
                category: category.map(String::from),
            },
            QuotaCost::LIST,
        );
        if self.quota_exhausted {
            return Err(ScanError::QuotaExceeded("quotaExceeded".to_string()));
        }

        match category {
            Some(id) if self.unavailable_categories.iter().any(|c| c == id) => Err(
                ScanError::RemoteUnavailable(format!("chart for category {id} not found")),
            ),
            Some(id) => Ok(self.category_charts.get(id).cloned().unwrap_or_default()),
            None => Ok(self.chart.clone()),
        }
    }

    async fn get_video_details(&self, ids: &[String]) -> Result<Vec<VideoSnapshot>> {
        self.record(Call::VideoDetails(ids.to_vec()), QuotaCost::LIST);
        Ok(ids
            .iter()
            .filter_map(|id| self.videos.get(id).cloned())
            .collect())
    }

    async fn get_channel_subscriptions(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<u64>>> {
        self.record(Call::ChannelSubs(ids.to_vec()), QuotaCost::LIST);
        Ok(ids
            .iter()
            .filter_map(|id| self.subs.get(id).map(|s| (id.clone(), *s)))
            .collect())
    }

    async fn search(&self, params: &SearchParams<'_>) -> Result<Vec<String>> {
        self.record(Call::Search(params.query.to_string()), QuotaCost::SEARCH);
        if self.failing_searches.iter().any(|q| q == params.query) {
            return Err(ScanError::QuotaExceeded("quotaExceeded".to_string()));
        }
        Ok(self
            .search_results
            .get(params.query)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_categories(&self, _region: &str) -> Result<Vec<VideoCategory>> {
        self.record(Call::Categories, QuotaCost::LIST);
        Ok(self.categories.clone())
    }

    fn quota_used(&self) -> u64 {
        *self.quota.lock().unwrap()
    }
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// A ten-minute video on its own channel `UC_<id>`, published `days_old` days ago.
pub fn video(id: &str, views: u64, days_old: i64) -> VideoSnapshot {
    VideoSnapshot {
        video_id: id.to_string(),
        title: format!("Video {id}"),
        channel_id: format!("UC_{id}"),
        channel_title: format!("Channel {id}"),
        published_at: Some(Utc::now() - Duration::days(days_old)),
        view_count: views,
        duration_iso: "PT10M".to_string(),
        thumbnail_url: None,
    }
}

pub fn short(id: &str, views: u64, days_old: i64) -> VideoSnapshot {
    VideoSnapshot {
        duration_iso: "PT45S".to_string(),
        ..video(id, views, days_old)
    }
}
