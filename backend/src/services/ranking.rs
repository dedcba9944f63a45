use crate::models::{OutlierFilters, OutlierRow, ResolvedVideo, SortKey};
use crate::utils::{compare_desc_missing_last, iso8601_duration_to_seconds};
use chrono::{DateTime, Utc};
use log::debug;

/// Floor for a video's age so fresh uploads do not divide by ~0.
pub const MIN_AGE_DAYS: f64 = 0.1;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn age_days(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - published_at).num_milliseconds() as f64 / 1000.0;
    (seconds / SECONDS_PER_DAY).max(MIN_AGE_DAYS)
}

/// Views per subscriber; undefined for hidden or zero subscriber counts.
pub fn views_to_subs_ratio(views: u64, subscribers: Option<u64>) -> Option<f64> {
    match subscribers {
        Some(subs) if subs > 0 => Some(views as f64 / subs as f64),
        _ => None,
    }
}

/// Derive metrics for a resolved video without applying any filter.
pub fn derive_row(resolved: ResolvedVideo, now: DateTime<Utc>) -> OutlierRow {
    let ResolvedVideo { video, subscribers } = resolved;

    let duration_seconds = iso8601_duration_to_seconds(&video.duration_iso);
    let age = video.published_at.map(|ts| age_days(ts, now));
    let views_per_day = age.map(|days| video.view_count as f64 / days);
    let ratio = views_to_subs_ratio(video.view_count, subscribers);
    let url = video.watch_url();

    OutlierRow {
        video,
        subscribers,
        duration_seconds,
        age_days: age,
        views_per_day,
        ratio,
        url,
    }
}

pub fn passes_filters(row: &OutlierRow, filters: &OutlierFilters) -> bool {
    if filters.exclude_shorts && row.duration_seconds < filters.min_duration_seconds {
        return false;
    }
    if row.video.view_count < filters.min_views {
        return false;
    }
    if let (Some(max_subs), Some(subs)) = (filters.max_subs, row.subscribers) {
        if subs > max_subs {
            return false;
        }
    }
    if let Some(min_ratio) = filters.min_ratio {
        match row.ratio {
            Some(ratio) if ratio < min_ratio => return false,
            None if !filters.keep_unknown_ratio => return false,
            _ => {}
        }
    }
    true
}

pub fn sort_rows(rows: &mut [OutlierRow], sort_by: SortKey) {
    // sort_by is stable: ties keep discovery order.
    match sort_by {
        SortKey::ViewsPerDay => {
            rows.sort_by(|a, b| compare_desc_missing_last(a.views_per_day, b.views_per_day))
        }
        SortKey::Ratio => rows.sort_by(|a, b| compare_desc_missing_last(a.ratio, b.ratio)),
        SortKey::Views => rows.sort_by(|a, b| b.video.view_count.cmp(&a.video.view_count)),
        SortKey::PublishedAt => rows.sort_by(|a, b| {
            compare_desc_missing_last(a.video.published_at, b.video.published_at)
        }),
    }
}

/// Derive, filter and sort resolved videos into outlier rows.
pub fn rank(
    videos: Vec<ResolvedVideo>,
    filters: &OutlierFilters,
    sort_by: SortKey,
    now: DateTime<Utc>,
) -> Vec<OutlierRow> {
    let total = videos.len();
    let mut rows: Vec<OutlierRow> = videos
        .into_iter()
        .map(|resolved| derive_row(resolved, now))
        .filter(|row| passes_filters(row, filters))
        .collect();

    sort_rows(&mut rows, sort_by);
    debug!("Ranked {} of {} resolved videos", rows.len(), total);
    rows
}
