use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The remote resource does not exist (e.g. a chart for an unsupported category).
    /// Recoverable: the unit of work that triggered it is skipped.
    #[error("Remote resource unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("YouTube API quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("YouTube API error (status {}): {message}", display_status(.status))]
    Remote { status: Option<u16>, message: String },

    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    #[error("Invalid scan request: {0}")]
    InvalidRequest(String),

    #[error("Export error: {0}")]
    Export(String),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl ScanError {
    /// Whether the failure only invalidates the current unit of work.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScanError::RemoteUnavailable(_))
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        ScanError::Remote {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Remote {
            status: None,
            message: format!("Failed to parse YouTube API response: {err}"),
        }
    }
}

impl From<rusqlite::Error> for ScanError {
    fn from(err: rusqlite::Error) -> Self {
        ScanError::CacheIo(err.to_string())
    }
}

impl From<csv::Error> for ScanError {
    fn from(err: csv::Error) -> Self {
        ScanError::Export(err.to_string())
    }
}
