// src/portfolio.rs
use crate::charts;
use crate::db::Store;
use crate::error::{PortfolioError, Result};
use crate::models::{Lot, NewLot, PerformanceReport, ReportRow, ReportSummary};
use crate::quotes::QuoteSource;
use crate::report;
use chrono::NaiveDate;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where generated artifacts land. Every regeneration overwrites them.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub report_csv: PathBuf,
    pub allocation_chart: PathBuf,
    pub chart_dir: PathBuf,
    pub chart_font: Option<PathBuf>,
}

impl ArtifactPaths {
    /// Default file names, placed under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            report_csv: dir.join("portfolio_report.csv"),
            allocation_chart: dir.join("portfolio_allocation.png"),
            chart_dir: dir.to_path_buf(),
            chart_font: None,
        }
    }

    pub fn history_chart(&self, symbol: &str) -> PathBuf {
        self.chart_dir.join(format!("{}_performance.png", symbol))
    }
}

pub struct Portfolio {
    store: Store,
    quotes: Arc<dyn QuoteSource>,
    paths: ArtifactPaths,
}

impl Portfolio {
    pub fn new(store: Store, quotes: Arc<dyn QuoteSource>, paths: ArtifactPaths) -> Self {
        Self {
            store,
            quotes,
            paths,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub async fn close(self) -> Result<()> {
        self.store.close().await
    }

    pub async fn import_prices_from_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.store.import_prices_from_path(path).await
    }

    pub async fn export_prices_to_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.store.export_prices_to_path(path).await
    }

    pub async fn add_lot(&self, lot: NewLot) -> Result<Lot> {
        self.store.add_lot(lot).await
    }

    pub async fn list_lots(&self) -> Result<Vec<Lot>> {
        self.store.list_lots().await
    }

    pub async fn price_history(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>> {
        self.store.price_history(symbol).await
    }

    /// Latest close from the quote source; failures count as unavailable.
    pub async fn current_price(&self, symbol: &str) -> Option<f64> {
        match self.quotes.latest_close(symbol).await {
            Ok(Some(price)) => Some(price),
            Ok(None) => {
                warn!("No current price data for {}", symbol);
                None
            }
            Err(e) => {
                error!("Quote service error for {}: {}", symbol, e);
                None
            }
        }
    }

    /// Market value of every lot with an available price.
    pub async fn portfolio_value(&self) -> Result<f64> {
        let mut total = 0.0;
        for lot in self.store.list_lots().await? {
            if let Some(price) = self.current_price(&lot.symbol).await {
                total += lot.shares as f64 * price;
            }
        }
        Ok(total)
    }

    pub async fn performance_report(&self) -> Result<PerformanceReport> {
        let lots = self.store.list_lots().await?;
        if lots.is_empty() {
            info!("No holdings in portfolio");
            return Err(PortfolioError::NoHoldings);
        }

        let mut rows = Vec::with_capacity(lots.len());
        let mut skipped = Vec::new();
        for lot in &lots {
            match self.current_price(&lot.symbol).await {
                Some(price) => rows.push(ReportRow::from_lot(lot, price)),
                None => {
                    warn!("Could not get current price for {}", lot.symbol);
                    skipped.push(lot.symbol.clone());
                }
            }
        }
        let summary = ReportSummary::from_rows(&rows);

        report::write_report_csv_to_path(&rows, &self.paths.report_csv)?;
        info!("Saved portfolio report to: {:?}", self.paths.report_csv);

        let allocation_chart = match self.draw_allocation(&rows) {
            Ok(()) => {
                info!("Saved allocation chart to: {:?}", self.paths.allocation_chart);
                Some(self.paths.allocation_chart.clone())
            }
            Err(e) => {
                warn!("Allocation chart not written: {}", e);
                // A chart from an earlier report would no longer match the rows.
                if let Err(e) = std::fs::remove_file(&self.paths.allocation_chart) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("Could not remove stale allocation chart: {}", e);
                    }
                }
                None
            }
        };

        info!("Generated portfolio performance report");
        Ok(PerformanceReport {
            rows,
            summary,
            skipped,
            report_csv: self.paths.report_csv.clone(),
            allocation_chart,
        })
    }

    fn draw_allocation(&self, rows: &[ReportRow]) -> Result<()> {
        let slices: Vec<(String, f64)> = rows
            .iter()
            .map(|row| (row.symbol.clone(), row.current_value))
            .collect();
        charts::load_font(self.paths.chart_font.as_deref())?;
        charts::draw_allocation(&slices, &self.paths.allocation_chart)
    }

    /// Writes the closing-price chart for `symbol`. `None` when no bars exist.
    pub async fn plot_price_history(&self, symbol: &str) -> Result<Option<PathBuf>> {
        let symbol = symbol.to_uppercase();
        let history = self.price_history(&symbol).await?;
        if history.is_empty() {
            info!("No data available for {}", symbol);
            return Ok(None);
        }

        let path = self.paths.history_chart(&symbol);
        charts::load_font(self.paths.chart_font.as_deref())?;
        charts::draw_price_history(&symbol, &history, &path)?;
        info!("Generated performance plot for {} at {:?}", symbol, path);
        Ok(Some(path))
    }
}
