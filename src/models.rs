// src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One day's OHLCV record as read from an import file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPriceBar {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: i64,
}

/// A stored price bar. Field order matches the export header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLot {
    pub symbol: String,
    pub shares: i64,
    pub purchase_price: f64,
    pub purchase_date: String,
}

impl NewLot {
    pub fn new(symbol: &str, shares: i64, purchase_price: f64, purchase_date: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            shares,
            purchase_price,
            purchase_date: purchase_date.to_string(),
        }
    }
}

/// A purchase lot. The symbol is always upper case once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub symbol: String,
    pub shares: i64,
    pub purchase_price: f64,
    pub purchase_date: String,
}

impl Lot {
    pub fn investment(&self) -> f64 {
        self.shares as f64 * self.purchase_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub symbol: String,
    pub shares: i64,
    pub purchase_price: f64,
    pub current_price: f64,
    pub investment: f64,
    pub current_value: f64,
    pub gain_loss: f64,
    /// `None` when the lot cost nothing.
    pub gain_loss_pct: Option<f64>,
}

impl ReportRow {
    pub fn from_lot(lot: &Lot, current_price: f64) -> Self {
        let investment = lot.investment();
        let current_value = lot.shares as f64 * current_price;
        let gain_loss = current_value - investment;
        Self {
            symbol: lot.symbol.clone(),
            shares: lot.shares,
            purchase_price: lot.purchase_price,
            current_price,
            investment,
            current_value,
            gain_loss,
            gain_loss_pct: percent_of(gain_loss, investment),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_investment: f64,
    pub total_current_value: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_pct: Option<f64>,
}

impl ReportSummary {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        let total_investment: f64 = rows.iter().map(|r| r.investment).sum();
        let total_current_value: f64 = rows.iter().map(|r| r.current_value).sum();
        let total_gain_loss = total_current_value - total_investment;
        Self {
            total_investment,
            total_current_value,
            total_gain_loss,
            total_gain_loss_pct: percent_of(total_gain_loss, total_investment),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
    /// Symbols of lots left out because no current price was available.
    pub skipped: Vec<String>,
    pub report_csv: PathBuf,
    pub allocation_chart: Option<PathBuf>,
}

fn percent_of(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 {
        None
    } else {
        Some(part / whole * 100.0)
    }
}
