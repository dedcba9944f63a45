pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppState;
pub use error::{Result, ScanError};
