// src/report.rs
use crate::error::Result;
use crate::models::{Lot, PerformanceReport, ReportRow, ReportSummary};
use comfy_table::presets::ASCII_BORDERS_ONLY_CONDENSED;
use comfy_table::Table;
use csv::Writer;
use std::io::Write;
use std::path::Path;

pub const REPORT_HEADER: [&str; 8] = [
    "Symbol",
    "Shares",
    "Avg Purchase Price",
    "Current Price",
    "Investment",
    "Current Value",
    "Gain/Loss ($)",
    "Gain/Loss (%)",
];

pub fn money(value: f64) -> String {
    format!("${:.2}", value)
}

pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v),
        None => "N/A".to_string(),
    }
}

fn row_cells(row: &ReportRow) -> [String; 8] {
    [
        row.symbol.clone(),
        row.shares.to_string(),
        money(row.purchase_price),
        money(row.current_price),
        money(row.investment),
        money(row.current_value),
        money(row.gain_loss),
        percent(row.gain_loss_pct),
    ]
}

pub fn summary_lines(summary: &ReportSummary) -> Vec<(&'static str, String)> {
    vec![
        ("Total Investment", money(summary.total_investment)),
        ("Total Current Value", money(summary.total_current_value)),
        ("Total Gain/Loss ($)", money(summary.total_gain_loss)),
        ("Total Gain/Loss (%)", percent(summary.total_gain_loss_pct)),
    ]
}

pub fn write_report_csv<W: Write>(rows: &[ReportRow], destination: W) -> Result<()> {
    let mut writer = Writer::from_writer(destination);
    writer.write_record(REPORT_HEADER)?;
    for row in rows {
        writer.write_record(row_cells(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_report_csv_to_path(rows: &[ReportRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_report_csv(rows, file)
}

pub fn render_report(report: &PerformanceReport) -> String {
    let mut table = Table::new();
    table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
    table.set_header(REPORT_HEADER.to_vec());
    for row in &report.rows {
        table.add_row(row_cells(row).to_vec());
    }

    let mut out = String::from("PORTFOLIO PERFORMANCE REPORT\n\n");
    out.push_str("Individual Holdings:\n");
    out.push_str(&table.to_string());
    out.push('\n');

    if !report.skipped.is_empty() {
        out.push_str(&format!(
            "\nNo current price for: {}\n",
            report.skipped.join(", ")
        ));
    }

    out.push_str("\nSummary:\n");
    for (key, value) in summary_lines(&report.summary) {
        out.push_str(&format!("{}: {}\n", key, value));
    }
    out
}

/// Tab-separated holdings block shown on startup and after each add.
pub fn render_holdings(lots: &[Lot]) -> String {
    let mut out = String::from("CURRENT PORTFOLIO HOLDINGS\n\n");
    if lots.is_empty() {
        out.push_str("No holdings in portfolio");
        return out;
    }

    out.push_str("ID\tSymbol\tShares\tPurchase Price\tPurchase Date\n");
    for lot in lots {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            lot.id,
            lot.symbol,
            lot.shares,
            money(lot.purchase_price),
            lot.purchase_date
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_rows() -> Vec<ReportRow> {
        vec![ReportRow {
            symbol: "AAPL".to_string(),
            shares: 10,
            purchase_price: 100.0,
            current_price: 110.0,
            investment: 1000.0,
            current_value: 1100.0,
            gain_loss: 100.0,
            gain_loss_pct: Some(10.0),
        }]
    }

    #[test]
    fn formats_money_and_percent() {
        assert_eq!(money(2050.0), "$2050.00");
        assert_eq!(money(-12.5), "$-12.50");
        assert_eq!(percent(Some(2.5)), "2.50%");
        assert_eq!(percent(None), "N/A");
    }

    #[test]
    fn report_csv_has_fixed_columns() {
        let mut out = Vec::new();
        write_report_csv(&sample_rows(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Symbol,Shares,Avg Purchase Price,Current Price,Investment,Current Value,Gain/Loss ($),Gain/Loss (%)"
        );
        assert_eq!(lines[1], "AAPL,10,$100.00,$110.00,$1000.00,$1100.00,$100.00,10.00%");
    }

    #[test]
    fn rendered_report_lists_rows_and_summary() {
        let rows = sample_rows();
        let report = PerformanceReport {
            summary: ReportSummary::from_rows(&rows),
            rows,
            skipped: vec!["MSFT".to_string()],
            report_csv: PathBuf::from("portfolio_report.csv"),
            allocation_chart: None,
        };
        let text = render_report(&report);
        assert!(text.starts_with("PORTFOLIO PERFORMANCE REPORT"));
        assert!(text.contains("AAPL"));
        assert!(text.contains("No current price for: MSFT"));
        assert!(text.contains("Total Current Value: $1100.00"));
        assert!(text.contains("Total Gain/Loss (%): 10.00%"));
    }

    #[test]
    fn holdings_are_tab_separated() {
        let lots = vec![Lot {
            id: 3,
            symbol: "AAPL".to_string(),
            shares: 10,
            purchase_price: 150.0,
            purchase_date: "2024-01-01".to_string(),
        }];
        let text = render_holdings(&lots);
        assert!(text.contains("ID\tSymbol\tShares\tPurchase Price\tPurchase Date\n"));
        assert!(text.contains("3\tAAPL\t10\t$150.00\t2024-01-01\n"));
        assert!(render_holdings(&[]).ends_with("No holdings in portfolio"));
    }
}
