pub mod cache_store;
pub mod collector;
pub mod enrichment;
pub mod export;
pub mod ranking;
pub mod scan_service;
pub mod youtube;
