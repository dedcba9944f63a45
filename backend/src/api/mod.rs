pub mod scan;

pub use scan::*;

use crate::error::ScanError;
use crate::models::ErrorResponse;
use crate::AppState;
use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::{routes, Build, Rocket};
use std::io::Cursor;

/// A scan failure rendered as a JSON `ErrorResponse`.
#[derive(Debug)]
pub struct ApiError(pub ScanError);

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> Status {
        match &self.0 {
            ScanError::InvalidRequest(_) => Status::BadRequest,
            ScanError::QuotaExceeded(_) => Status::TooManyRequests,
            ScanError::RemoteUnavailable(_) => Status::ServiceUnavailable,
            ScanError::Remote { .. } => Status::BadGateway,
            ScanError::CacheIo(_) | ScanError::Export(_) => Status::InternalServerError,
        }
    }

    fn kind(&self) -> &'static str {
        match &self.0 {
            ScanError::InvalidRequest(_) => "invalid_request",
            ScanError::QuotaExceeded(_) => "quota_exceeded",
            ScanError::RemoteUnavailable(_) => "remote_unavailable",
            ScanError::Remote { .. } => "remote_error",
            ScanError::CacheIo(_) => "cache_io",
            ScanError::Export(_) => "export_failed",
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.0.to_string(),
        };
        let json = serde_json::to_string(&body).unwrap_or_default();
        Response::build()
            .status(self.status())
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

pub fn build_rocket(state: AppState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount("/scan", routes![run_scan, export_scan_csv])
        .mount("/categories", routes![list_categories])
}
