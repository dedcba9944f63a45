use crate::error::{Result, ScanError};
use crate::models::{ScanRequest, SearchParams, SkippedCategory};
use crate::services::youtube::VideoSource;
use log::{info, warn};
use std::collections::HashSet;

/// Candidate ids of one scan plus a report of what degraded on the way.
#[derive(Debug, Default)]
pub struct Collection {
    pub video_ids: Vec<String>,
    pub skipped_categories: Vec<SkippedCategory>,
    pub search_calls: usize,
    pub search_aborted: Option<String>,
}

/// Gather candidate video ids for `request` in discovery order.
///
/// Ids are deduplicated (first occurrence wins) and then capped at
/// `candidate_cap`, before any enrichment call is made.
pub async fn collect(source: &dyn VideoSource, request: &ScanRequest) -> Result<Collection> {
    let mut collection = Collection::default();
    let mut raw_ids = Vec::new();

    if request.strategy.scans_categories() {
        let category_ids = selected_categories(source, request).await?;
        for category_id in &category_ids {
            match source
                .list_most_popular(
                    &request.region_code,
                    Some(category_id),
                    request.page_size,
                    request.pages,
                )
                .await
            {
                Ok(ids) => raw_ids.extend(ids),
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping category {category_id}: {e}");
                    collection.skipped_categories.push(SkippedCategory {
                        category_id: category_id.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    } else {
        raw_ids.extend(
            source
                .list_most_popular(&request.region_code, None, request.page_size, request.pages)
                .await?,
        );
    }

    if request.strategy.includes_search() {
        search_phase(source, request, &mut raw_ids, &mut collection).await;
    }

    let found = raw_ids.len();
    collection.video_ids = dedup_and_cap(raw_ids, request.candidate_cap);
    info!(
        "Collected {} candidates ({} raw ids, cap {})",
        collection.video_ids.len(),
        found,
        request.candidate_cap
    );

    Ok(collection)
}

async fn selected_categories(
    source: &dyn VideoSource,
    request: &ScanRequest,
) -> Result<Vec<String>> {
    let explicit: Vec<String> = request
        .category_ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if !explicit.is_empty() {
        return Ok(explicit);
    }

    let categories = source.list_categories(&request.region_code).await?;
    info!(
        "No categories selected, scanning all {} assignable categories in {}",
        categories.len(),
        request.region_code
    );
    Ok(categories.into_iter().map(|c| c.id).collect())
}

/// Spend at most `search_budget` search calls. Any failure stops the phase
/// but keeps the ids gathered so far.
async fn search_phase(
    source: &dyn VideoSource,
    request: &ScanRequest,
    raw_ids: &mut Vec<String>,
    collection: &mut Collection,
) {
    let keywords = request
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .take(request.search_budget);

    for keyword in keywords {
        let params = SearchParams {
            query: keyword,
            region: &request.region_code,
            language: request.search.language.as_deref(),
            max_results: request.search.max_results,
            duration_class: request.search.duration_class,
            order: request.search.order,
        };

        collection.search_calls += 1;
        match source.search(&params).await {
            Ok(ids) => {
                info!("Search '{keyword}' returned {} ids", ids.len());
                raw_ids.extend(ids);
            }
            Err(e) => {
                warn!("Search phase aborted at '{keyword}': {e}");
                collection.search_aborted = Some(abort_reason(keyword, &e));
                break;
            }
        }
    }
}

fn abort_reason(keyword: &str, err: &ScanError) -> String {
    format!("search for '{keyword}' failed: {err}")
}

/// Drop repeated ids keeping first-seen order, then truncate to `cap`.
pub fn dedup_and_cap(ids: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .take(cap)
        .collect()
}
