// src/config.rs
use crate::portfolio::ArtifactPaths;
use crate::quotes::{AlphaVantageQuotes, QuoteSource, YahooQuotes};
use crate::quotes::{ALPHAVANTAGE_BASE_URL, YAHOO_BASE_URL};
use log::LevelFilter;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteProvider {
    Yahoo,
    AlphaVantage,
}

/// Application configuration derived from environment variables. A `.env`
/// file in the working directory is honoured when present.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PathBuf,
    pub sample_csv: PathBuf,
    pub report_csv: PathBuf,
    pub allocation_chart: PathBuf,
    pub chart_dir: PathBuf,
    pub chart_font: Option<PathBuf>,
    pub bind: SocketAddr,
    pub quote_provider: QuoteProvider,
    pub quote_base_url: Option<String>,
    pub alphavantage_api_key: String,
    pub log_level: LevelFilter,
    /// Empty disables file logging.
    pub log_file: Option<PathBuf>,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_path(name: &str, default: &str) -> PathBuf {
    PathBuf::from(env_str(name, default))
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind = env_str("SHELL_BIND", "127.0.0.1:3030")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 3030)));

        let quote_provider = match env_str("QUOTE_PROVIDER", "yahoo").to_lowercase().as_str() {
            "alphavantage" | "alpha_vantage" | "av" => QuoteProvider::AlphaVantage,
            _ => QuoteProvider::Yahoo,
        };

        let log_level = env_str("LOG_LEVEL", "info")
            .parse()
            .unwrap_or(LevelFilter::Info);

        // Unset means the default file; set-but-empty means stderr only.
        let log_file = match env::var("LOG_FILE") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(PathBuf::from(v.trim())),
            Err(_) => Some(PathBuf::from("stock_analysis.log")),
        };

        Self {
            database: env_path("PORTFOLIO_DB", "stocks.db"),
            sample_csv: env_path("SAMPLE_CSV", "sample_stock_data.csv"),
            report_csv: env_path("REPORT_CSV", "portfolio_report.csv"),
            allocation_chart: env_path("ALLOCATION_CHART", "portfolio_allocation.png"),
            chart_dir: env_path("CHART_DIR", "."),
            chart_font: env_opt("CHART_FONT").map(PathBuf::from),
            bind,
            quote_provider,
            quote_base_url: env_opt("QUOTE_BASE_URL"),
            alphavantage_api_key: env_str("ALPHAVANTAGE_API_KEY", "demo"),
            log_level,
            log_file,
        }
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            report_csv: self.report_csv.clone(),
            allocation_chart: self.allocation_chart.clone(),
            chart_dir: self.chart_dir.clone(),
            chart_font: self.chart_font.clone(),
        }
    }

    pub fn quote_source(&self) -> Arc<dyn QuoteSource> {
        match self.quote_provider {
            QuoteProvider::Yahoo => Arc::new(YahooQuotes::new(
                self.quote_base_url.as_deref().unwrap_or(YAHOO_BASE_URL),
            )),
            QuoteProvider::AlphaVantage => Arc::new(AlphaVantageQuotes::new(
                self.quote_base_url.as_deref().unwrap_or(ALPHAVANTAGE_BASE_URL),
                self.alphavantage_api_key.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global, so everything runs in one test.
    #[test]
    fn reads_overrides_and_falls_back_to_defaults() {
        env::remove_var("PORTFOLIO_DB");
        env::remove_var("SHELL_BIND");
        env::remove_var("LOG_FILE");
        env::set_var("QUOTE_PROVIDER", "AlphaVantage");
        env::set_var("REPORT_CSV", "  out/report.csv ");
        env::set_var("LOG_LEVEL", "not-a-level");

        let config = AppConfig::from_env();
        assert_eq!(config.database, PathBuf::from("stocks.db"));
        assert_eq!(config.bind, SocketAddr::from(([127, 0, 0, 1], 3030)));
        assert_eq!(config.quote_provider, QuoteProvider::AlphaVantage);
        assert_eq!(config.report_csv, PathBuf::from("out/report.csv"));
        assert_eq!(config.log_level, LevelFilter::Info);
        assert_eq!(config.log_file, Some(PathBuf::from("stock_analysis.log")));

        env::set_var("LOG_FILE", "");
        env::set_var("SHELL_BIND", "0.0.0.0:8080");
        let config = AppConfig::from_env();
        assert_eq!(config.log_file, None);
        assert_eq!(config.bind.port(), 8080);

        for name in ["QUOTE_PROVIDER", "REPORT_CSV", "LOG_LEVEL", "LOG_FILE", "SHELL_BIND"] {
            env::remove_var(name);
        }
    }
}
