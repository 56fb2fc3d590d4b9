// src/charts.rs
use crate::error::{PortfolioError, Result};
use chrono::{Duration, NaiveDate};
use log::info;
use plotters::element::Pie;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const FONT_CANDIDATES: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_READY: OnceLock<std::result::Result<PathBuf, String>> = OnceLock::new();

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

fn chart_err<E: std::fmt::Display>(e: E) -> PortfolioError {
    PortfolioError::Chart(e.to_string())
}

/// Registers the first readable TrueType font as "sans-serif". Only the
/// first call does any work; later calls report the same outcome.
pub fn load_font(preferred: Option<&Path>) -> Result<PathBuf> {
    FONT_READY
        .get_or_init(|| {
            let candidates = preferred
                .map(Path::to_path_buf)
                .into_iter()
                .chain(FONT_CANDIDATES.iter().map(PathBuf::from));
            for candidate in candidates {
                let Ok(bytes) = std::fs::read(&candidate) else {
                    continue;
                };
                let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
                if register_font("sans-serif", FontStyle::Normal, bytes).is_ok() {
                    info!("Using chart font {:?}", candidate);
                    return Ok(candidate);
                }
            }
            Err("no usable chart font found; set CHART_FONT".to_string())
        })
        .clone()
        .map_err(PortfolioError::Chart)
}

/// Closing price against date for one symbol. `history` must be sorted by
/// date and non-empty.
pub fn draw_price_history(symbol: &str, history: &[(NaiveDate, f64)], path: &Path) -> Result<()> {
    let (first, last) = match (history.first(), history.last()) {
        (Some(first), Some(last)) => (first.0, last.0),
        _ => return Err(PortfolioError::InvalidData(format!("no price history for {}", symbol))),
    };

    let span = (last - first).num_days().max(1);
    let (mut low, mut high) = history
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), (_, close)| (lo.min(*close), hi.max(*close)));
    if (high - low).abs() < f64::EPSILON {
        low -= 1.0;
        high += 1.0;
    }
    let pad = (high - low) * 0.05;

    let root = BitMapBackend::new(path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("{} Historical Performance", symbol), ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0i64..span, (low - pad)..(high + pad))
        .map_err(chart_err)?;

    let format_day = |day: &i64| (first + Duration::days(*day)).format("%Y-%m-%d").to_string();
    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Price ($)")
        .x_labels(8)
        .x_label_formatter(&format_day)
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(LineSeries::new(
            history
                .iter()
                .map(|(date, close)| ((*date - first).num_days(), *close)),
            &PALETTE[0],
        ))
        .map_err(chart_err)?
        .label(format!("{} Closing Price", symbol))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], PALETTE[0]));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

/// Pie chart of current value by symbol. Non-positive slices are dropped.
pub fn draw_allocation(slices: &[(String, f64)], path: &Path) -> Result<()> {
    let (labels, sizes): (Vec<String>, Vec<f64>) = slices
        .iter()
        .filter(|(_, value)| *value > 0.0)
        .cloned()
        .unzip();
    if sizes.is_empty() {
        return Err(PortfolioError::InvalidData(
            "nothing to allocate".to_string(),
        ));
    }
    let colors: Vec<RGBColor> = (0..sizes.len()).map(|i| PALETTE[i % PALETTE.len()]).collect();

    let root = BitMapBackend::new(path, (800, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;
    let area = root
        .titled("Portfolio Allocation", ("sans-serif", 30))
        .map_err(chart_err)?;

    let dims = area.dim_in_pixel();
    let center = (dims.0 as i32 / 2, dims.1 as i32 / 2);
    let radius = f64::from(dims.0.min(dims.1)) * 0.35;

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.label_style(("sans-serif", 20).into_font().color(&BLACK));
    pie.percentages(("sans-serif", 16).into_font().color(&WHITE));
    area.draw(&pie).map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}
