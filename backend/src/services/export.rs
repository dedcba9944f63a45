use crate::error::{Result, ScanError};
use crate::models::OutlierRow;
use serde::Serialize;

/// Rendered for values the source withheld or that could not be computed.
pub const UNKNOWN: &str = "—";

#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    title: &'a str,
    channel: &'a str,
    subscribers: String,
    views: u64,
    views_per_day: String,
    ratio: String,
    duration_sec: u64,
    published_at: String,
    url: &'a str,
}

impl<'a> From<&'a OutlierRow> for ExportRecord<'a> {
    fn from(row: &'a OutlierRow) -> Self {
        Self {
            title: &row.video.title,
            channel: &row.video.channel_title,
            subscribers: row
                .subscribers
                .map_or_else(|| UNKNOWN.to_string(), |s| s.to_string()),
            views: row.video.view_count,
            views_per_day: format_decimal(row.views_per_day),
            ratio: format_decimal(row.ratio),
            duration_sec: row.duration_seconds,
            published_at: row
                .video
                .published_at
                .map_or_else(|| UNKNOWN.to_string(), |ts| ts.to_rfc3339()),
            url: &row.url,
        }
    }
}

fn format_decimal(value: Option<f64>) -> String {
    value.map_or_else(|| UNKNOWN.to_string(), |v| format!("{v:.2}"))
}

/// One CSV record per row, header first.
pub fn to_csv(rows: &[OutlierRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record([
            "title",
            "channel",
            "subscribers",
            "views",
            "views_per_day",
            "ratio",
            "duration_sec",
            "published_at",
            "url",
        ])?;
    }
    for row in rows {
        writer.serialize(ExportRecord::from(row))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ScanError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ScanError::Export(e.to_string()))
}

/// Suggested download name for a scan's export.
pub fn export_file_name(region_code: &str) -> String {
    format!("mostpopular_outliers_{}.csv", region_code.trim().to_uppercase())
}
