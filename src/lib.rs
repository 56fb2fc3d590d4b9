// src/lib.rs
pub mod api;
pub mod charts;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod portfolio;
pub mod quotes;
pub mod report;

pub use config::AppConfig;
pub use db::Store;
pub use error::{PortfolioError, Result};
pub use portfolio::{ArtifactPaths, Portfolio};
pub use quotes::QuoteSource;
