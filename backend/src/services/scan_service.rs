use crate::error::{Result, ScanError};
use crate::models::{ScanRequest, ScanResult, ScanSummary};
use crate::services::cache_store::CacheStore;
use crate::services::collector::collect;
use crate::services::enrichment::resolve;
use crate::services::ranking::rank;
use crate::services::youtube::{VideoSource, MAX_IDS_PER_REQUEST};
use chrono::{Duration, Utc};
use log::info;

/// Trim and uppercase a region code, rejecting anything but two ASCII letters.
pub fn normalize_region(region_code: &str) -> Result<String> {
    let region = region_code.trim();
    if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ScanError::InvalidRequest(format!(
            "region_code must be a two-letter country code, got '{region_code}'"
        )));
    }
    Ok(region.to_ascii_uppercase())
}

fn cache_window(window: Option<Duration>, field: &str) -> Result<Duration> {
    window.ok_or_else(|| ScanError::InvalidRequest(format!("{field} is out of range")))
}

/// Reject requests that would waste quota or cannot be expressed to the API.
pub fn validate_request(request: &ScanRequest) -> Result<()> {
    normalize_region(&request.region_code)?;
    if request.pages == 0 {
        return Err(ScanError::InvalidRequest("pages must be at least 1".to_string()));
    }
    if request.page_size == 0 || request.page_size as usize > MAX_IDS_PER_REQUEST {
        return Err(ScanError::InvalidRequest(format!(
            "page_size must be between 1 and {MAX_IDS_PER_REQUEST}"
        )));
    }
    if request.candidate_cap == 0 {
        return Err(ScanError::InvalidRequest(
            "candidate_cap must be at least 1".to_string(),
        ));
    }
    if request.search.max_results as usize > MAX_IDS_PER_REQUEST {
        return Err(ScanError::InvalidRequest(format!(
            "search.max_results must be at most {MAX_IDS_PER_REQUEST}"
        )));
    }
    if request.video_max_age_hours < 0 || request.channel_max_age_hours < 0 {
        return Err(ScanError::InvalidRequest(
            "cache windows must not be negative".to_string(),
        ));
    }
    cache_window(request.video_max_age(), "video_max_age_hours")?;
    cache_window(request.channel_max_age(), "channel_max_age_hours")?;
    if let Some(min_ratio) = request.filters.min_ratio {
        if !min_ratio.is_finite() || min_ratio < 0.0 {
            return Err(ScanError::InvalidRequest(
                "filters.min_ratio must be a non-negative number".to_string(),
            ));
        }
    }
    Ok(())
}

/// Run one scan: collect candidates, resolve them cache-first, rank the result.
pub async fn run_scan(
    store: &CacheStore,
    source: &dyn VideoSource,
    request: &ScanRequest,
) -> Result<ScanResult> {
    validate_request(request)?;

    let mut request = request.clone();
    request.region_code = normalize_region(&request.region_code)?;
    let video_max_age = cache_window(request.video_max_age(), "video_max_age_hours")?;
    let channel_max_age = cache_window(request.channel_max_age(), "channel_max_age_hours")?;

    let quota_before = source.quota_used();
    info!(
        "Starting scan: region {}, strategy {:?}, {} page(s) of {}",
        request.region_code, request.strategy, request.pages, request.page_size
    );

    let collection = collect(source, &request).await?;

    let mut summary = ScanSummary {
        candidates_scanned: collection.video_ids.len(),
        candidate_cap: request.candidate_cap,
        skipped_categories: collection.skipped_categories,
        search_calls: collection.search_calls,
        search_aborted: collection.search_aborted,
        ..ScanSummary::default()
    };

    if collection.video_ids.is_empty() {
        info!("No candidates collected, nothing to enrich");
        summary.quota_units_spent = source.quota_used().saturating_sub(quota_before);
        return Ok(ScanResult {
            rows: Vec::new(),
            summary,
        });
    }

    let enrichment = resolve(
        store,
        source,
        &collection.video_ids,
        video_max_age,
        channel_max_age,
    )
    .await?;

    summary.videos_from_cache = enrichment.stats.videos_from_cache;
    summary.videos_fetched = enrichment.stats.videos_fetched;
    summary.channels_from_cache = enrichment.stats.channels_from_cache;
    summary.channels_fetched = enrichment.stats.channels_fetched;

    let rows = rank(enrichment.videos, &request.filters, request.sort_by, Utc::now());
    summary.rows_retained = rows.len();
    summary.quota_units_spent = source.quota_used().saturating_sub(quota_before);

    info!(
        "Scan finished: {} candidates, {} rows retained, {} quota units",
        summary.candidates_scanned, summary.rows_retained, summary.quota_units_spent
    );

    Ok(ScanResult { rows, summary })
}
