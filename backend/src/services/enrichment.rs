use crate::error::Result;
use crate::models::{ResolvedVideo, VideoSnapshot};
use crate::services::cache_store::CacheStore;
use crate::services::youtube::VideoSource;
use chrono::Duration;
use log::info;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub videos_from_cache: usize,
    pub videos_fetched: usize,
    pub videos_known_missing: usize,
    pub channels_from_cache: usize,
    pub channels_fetched: usize,
}

#[derive(Debug, Default)]
pub struct Enrichment {
    /// Resolved videos in candidate order. Ids the API did not return are absent.
    pub videos: Vec<ResolvedVideo>,
    pub stats: EnrichmentStats,
}

/// Resolve candidate ids to videos with subscriber counts, cache first.
///
/// Only cache misses reach `source`, and whatever it returns is written back
/// before the next step runs, so a failure later in the scan keeps it.
pub async fn resolve(
    store: &CacheStore,
    source: &dyn VideoSource,
    ids: &[String],
    video_max_age: Duration,
    channel_max_age: Duration,
) -> Result<Enrichment> {
    let mut stats = EnrichmentStats::default();

    // Videos
    let mut videos: HashMap<String, VideoSnapshot> = store.get_videos(ids, video_max_age)?;
    stats.videos_from_cache = videos.len();
    let known_missing = store.get_missing_videos(ids, video_max_age)?;
    stats.videos_known_missing = known_missing.len();

    let missing_videos: Vec<String> = ids
        .iter()
        .filter(|id| !videos.contains_key(*id) && !known_missing.contains(*id))
        .cloned()
        .collect();

    if !missing_videos.is_empty() {
        let fetched = source.get_video_details(&missing_videos).await?;
        store.upsert_videos(&fetched)?;
        stats.videos_fetched = fetched.len();
        videos.extend(fetched.into_iter().map(|v| (v.video_id.clone(), v)));

        let gone: Vec<String> = missing_videos
            .iter()
            .filter(|id| !videos.contains_key(*id))
            .cloned()
            .collect();
        store.mark_videos_missing(&gone)?;
    }
    info!(
        "Videos: {} cached, {} missing, {} fetched",
        stats.videos_from_cache,
        missing_videos.len(),
        stats.videos_fetched
    );

    let ordered: Vec<VideoSnapshot> = ids.iter().filter_map(|id| videos.remove(id)).collect();

    // Channels
    let channel_ids = referenced_channels(&ordered);
    let mut subs = store.get_channel_subs(&channel_ids, channel_max_age)?;
    stats.channels_from_cache = subs.len();

    let missing_channels: Vec<String> = channel_ids
        .iter()
        .filter(|id| !subs.contains_key(*id))
        .cloned()
        .collect();

    if !missing_channels.is_empty() {
        let mut fetched = source.get_channel_subscriptions(&missing_channels).await?;
        stats.channels_fetched = fetched.len();
        // Channels the API did not return are cached as unknown.
        for id in &missing_channels {
            fetched.entry(id.clone()).or_insert(None);
        }
        store.upsert_channel_subs(&fetched)?;
        subs.extend(fetched);
    }
    info!(
        "Channels: {} cached, {} missing, {} fetched",
        stats.channels_from_cache,
        missing_channels.len(),
        stats.channels_fetched
    );

    let videos = ordered
        .into_iter()
        .map(|video| {
            let subscribers = subs.get(&video.channel_id).copied().flatten();
            ResolvedVideo { video, subscribers }
        })
        .collect();

    Ok(Enrichment { videos, stats })
}

/// Distinct, non-empty channel ids in first-seen order.
fn referenced_channels(videos: &[VideoSnapshot]) -> Vec<String> {
    let mut seen = HashSet::new();
    videos
        .iter()
        .map(|v| v.channel_id.as_str())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(String::from)
        .collect()
}
