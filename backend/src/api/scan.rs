use crate::api::ApiError;
use crate::models::{ScanRequest, ScanResult, VideoCategory};
use crate::services::{export, scan_service};
use crate::AppState;
use log::{error, info};
use rocket::http::Header;
use rocket::serde::json::Json;
use rocket::{get, post, Responder, State};

#[derive(Responder)]
#[response(content_type = "text/csv")]
pub struct CsvDownload {
    body: String,
    disposition: Header<'static>,
}

#[post("/", format = "json", data = "<request>")]
pub async fn run_scan(
    request: Json<ScanRequest>,
    state: &State<AppState>,
) -> Result<Json<ScanResult>, ApiError> {
    match scan_service::run_scan(&state.store, state.source.as_ref(), &request).await {
        Ok(result) => {
            info!(
                "Scan for {} returned {} rows",
                request.region_code, result.summary.rows_retained
            );
            Ok(Json(result))
        }
        Err(e) => {
            error!("Scan failed: {e}");
            Err(e.into())
        }
    }
}

#[post("/csv", format = "json", data = "<request>")]
pub async fn export_scan_csv(
    request: Json<ScanRequest>,
    state: &State<AppState>,
) -> Result<CsvDownload, ApiError> {
    let result = scan_service::run_scan(&state.store, state.source.as_ref(), &request)
        .await
        .map_err(|e| {
            error!("Scan for CSV export failed: {e}");
            ApiError::from(e)
        })?;

    let csv = export::to_csv(&result.rows)?;
    let file_name = export::export_file_name(&request.region_code);

    // BOM so spreadsheet tools pick UTF-8.
    Ok(CsvDownload {
        body: format!("\u{feff}{csv}"),
        disposition: Header::new(
            "Content-Disposition",
            format!("attachment; filename=\"{file_name}\""),
        ),
    })
}

#[get("/<region>")]
pub async fn list_categories(
    region: &str,
    state: &State<AppState>,
) -> Result<Json<Vec<VideoCategory>>, ApiError> {
    let region = scan_service::normalize_region(region)?;
    match state.source.list_categories(&region).await {
        Ok(categories) => {
            info!("Found {} assignable categories for {region}", categories.len());
            Ok(Json(categories))
        }
        Err(e) => {
            error!("Failed to list categories for {region}: {e}");
            Err(e.into())
        }
    }
}
