// src/api.rs
use crate::error::ShellError;
use crate::models::NewLot;
use crate::portfolio::Portfolio;
use crate::report::{render_holdings, render_report};
use log::{error, info};
use serde::Deserialize;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use warp::filters::body::BodyDeserializeError;
use warp::http::{Response, StatusCode};
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("shell.html");
const FORM_LIMIT: u64 = 16 * 1024;

/// Raw text of the add-lot form; conversion happens in the handler.
#[derive(Debug, Deserialize)]
pub struct LotForm {
    pub symbol: String,
    pub shares: String,
    pub price: String,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct PathForm {
    pub path: String,
}

pub fn routes(
    portfolio: Arc<Portfolio>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let holdings = warp::path("holdings")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_portfolio(portfolio.clone()))
        .and_then(holdings_handler);

    let add = warp::path("lots")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_portfolio(portfolio.clone()))
        .and(warp::body::content_length_limit(FORM_LIMIT))
        .and(warp::body::form())
        .and_then(add_lot_handler);

    let report = warp::path("report")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_portfolio(portfolio.clone()))
        .and_then(report_handler);

    let allocation = warp::path!("charts" / "allocation.png")
        .and(warp::get())
        .and(with_portfolio(portfolio.clone()))
        .and_then(allocation_chart_handler);

    let history = warp::path!("charts" / "history" / String)
        .and(warp::get())
        .and(with_portfolio(portfolio.clone()))
        .and_then(history_chart_handler);

    let import = warp::path("import")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_portfolio(portfolio.clone()))
        .and(warp::body::content_length_limit(FORM_LIMIT))
        .and(warp::body::form())
        .and_then(import_handler);

    let export = warp::path("export")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_portfolio(portfolio))
        .and(warp::body::content_length_limit(FORM_LIMIT))
        .and(warp::body::form())
        .and_then(export_handler);

    index
        .or(holdings)
        .or(add)
        .or(report)
        .or(allocation)
        .or(history)
        .or(import)
        .or(export)
        .recover(handle_rejection)
}

fn with_portfolio(
    portfolio: Arc<Portfolio>,
) -> impl Filter<Extract = (Arc<Portfolio>,), Error = Infallible> + Clone {
    warp::any().map(move || portfolio.clone())
}

async fn holdings_handler(portfolio: Arc<Portfolio>) -> Result<impl Reply, Rejection> {
    match portfolio.list_lots().await {
        Ok(lots) => Ok(render_holdings(&lots)),
        Err(e) => {
            error!("Failed to list holdings: {}", e);
            Err(warp::reject::custom(ShellError::from(e)))
        }
    }
}

async fn add_lot_handler(
    portfolio: Arc<Portfolio>,
    form: LotForm,
) -> Result<impl Reply, Rejection> {
    let shares = form.shares.trim().parse::<i64>();
    let price = form.price.trim().parse::<f64>();
    let (shares, price) = match (shares, price) {
        (Ok(shares), Ok(price)) => (shares, price),
        _ => {
            error!(
                "Invalid lot input: shares={:?} price={:?}",
                form.shares, form.price
            );
            return Err(warp::reject::custom(ShellError::bad_request(
                "Invalid input values",
            )));
        }
    };

    let lot = NewLot::new(form.symbol.trim(), shares, price, form.date.trim());
    match portfolio.add_lot(lot).await {
        Ok(lot) => {
            info!("Lot added successfully.");
            let lots = portfolio.list_lots().await.map_err(|e| {
                error!("Failed to list holdings: {}", e);
                warp::reject::custom(ShellError::from(e))
            })?;
            let body = format!(
                "Added {} shares of {} to portfolio\n\n{}",
                lot.shares,
                lot.symbol,
                render_holdings(&lots)
            );
            Ok(warp::reply::with_status(body, StatusCode::CREATED))
        }
        Err(e) => {
            error!("Failed to add to portfolio: {}", e);
            Err(warp::reject::custom(ShellError::internal(format!(
                "Failed to add to portfolio: {}",
                e
            ))))
        }
    }
}

async fn report_handler(portfolio: Arc<Portfolio>) -> Result<impl Reply, Rejection> {
    match portfolio.performance_report().await {
        Ok(report) => {
            info!("Report generated successfully.");
            Ok(render_report(&report))
        }
        Err(e) => {
            error!("Report generation error: {}", e);
            Err(warp::reject::custom(ShellError::from(e)))
        }
    }
}

async fn allocation_chart_handler(portfolio: Arc<Portfolio>) -> Result<impl Reply, Rejection> {
    serve_png(&portfolio.paths().allocation_chart).await
}

async fn history_chart_handler(
    symbol: String,
    portfolio: Arc<Portfolio>,
) -> Result<impl Reply, Rejection> {
    match portfolio.plot_price_history(&symbol).await {
        Ok(Some(path)) => serve_png(&path).await,
        Ok(None) => Err(warp::reject::custom(ShellError::not_found(format!(
            "No data available for {}",
            symbol.to_uppercase()
        )))),
        Err(e) => {
            error!("Failed to plot {}: {}", symbol, e);
            Err(warp::reject::custom(ShellError::from(e)))
        }
    }
}

async fn serve_png(path: &Path) -> Result<Response<Vec<u8>>, Rejection> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        error!("Could not load chart {:?}: {}", path, e);
        warp::reject::custom(ShellError::not_found(format!(
            "Could not load chart: {}",
            e
        )))
    })?;
    Response::builder()
        .header("content-type", "image/png")
        .header("cache-control", "no-store")
        .body(bytes)
        .map_err(|e| warp::reject::custom(ShellError::internal(e.to_string())))
}

async fn import_handler(
    portfolio: Arc<Portfolio>,
    form: PathForm,
) -> Result<impl Reply, Rejection> {
    match portfolio.import_prices_from_path(form.path.trim()).await {
        Ok(count) => {
            info!("Imported {} rows from {}", count, form.path);
            Ok(format!("CSV file imported successfully! ({} rows)", count))
        }
        Err(e) => {
            error!("Failed to import CSV file: {}", e);
            Err(warp::reject::custom(ShellError::bad_request(format!(
                "Failed to import CSV file: {}",
                e
            ))))
        }
    }
}

async fn export_handler(
    portfolio: Arc<Portfolio>,
    form: PathForm,
) -> Result<impl Reply, Rejection> {
    match portfolio.export_prices_to_path(form.path.trim()).await {
        Ok(count) => {
            info!("Exported {} rows to {}", count, form.path);
            Ok(format!("Data exported successfully! ({} rows)", count))
        }
        Err(e) => {
            error!("Failed to export data: {}", e);
            Err(warp::reject::custom(ShellError::internal(format!(
                "Failed to export data: {}",
                e
            ))))
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = err.find::<ShellError>() {
        (e.status, e.message.clone())
    } else if err.find::<BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid input values".to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };
    Ok(warp::reply::with_status(message, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use crate::error::Result as PortfolioResult;
    use crate::portfolio::ArtifactPaths;
    use crate::quotes::QuoteSource;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoQuotes;

    #[async_trait]
    impl QuoteSource for NoQuotes {
        async fn latest_close(&self, _symbol: &str) -> PortfolioResult<Option<f64>> {
            Ok(None)
        }
    }

    async fn shell(dir: &TempDir) -> Arc<Portfolio> {
        let store = Store::open_in_memory().await.unwrap();
        Arc::new(Portfolio::new(
            store,
            Arc::new(NoQuotes),
            ArtifactPaths::in_dir(dir.path()),
        ))
    }

    fn form_post(path: &str, body: &str) -> warp::test::RequestBuilder {
        warp::test::request()
            .method("POST")
            .path(path)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body.to_string())
    }

    #[tokio::test]
    async fn index_serves_the_form() {
        let dir = TempDir::new().unwrap();
        let api = routes(shell(&dir).await);
        let res = warp::test::request().path("/").reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.contains("Add to Portfolio"));
        assert!(body.contains("Generate Report"));
    }

    #[tokio::test]
    async fn invalid_shares_never_reach_the_store() {
        let dir = TempDir::new().unwrap();
        let portfolio = shell(&dir).await;
        let api = routes(portfolio.clone());

        let res = form_post("/lots", "symbol=aapl&shares=ten&price=150&date=2024-01-01")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(res.body().as_ref(), b"Invalid input values");
        assert!(portfolio.list_lots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn adding_a_lot_refreshes_holdings() {
        let _ = env_logger::try_init();
        let dir = TempDir::new().unwrap();
        let api = routes(shell(&dir).await);

        let res = form_post("/lots", "symbol=aapl&shares=10&price=150.5&date=2024-01-01")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.starts_with("Added 10 shares of AAPL to portfolio"));
        assert!(body.contains("1\tAAPL\t10\t$150.50\t2024-01-01"));

        let res = warp::test::request().path("/holdings").reply(&api).await;
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.contains("1\tAAPL\t10\t$150.50\t2024-01-01"));
    }

    #[tokio::test]
    async fn missing_form_field_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let api = routes(shell(&dir).await);
        let res = form_post("/lots", "symbol=aapl&shares=10").reply(&api).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn report_without_lots_is_not_found() {
        let dir = TempDir::new().unwrap();
        let api = routes(shell(&dir).await);
        let res = warp::test::request()
            .method("POST")
            .path("/report")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), b"No holdings in portfolio");
        assert!(!dir.path().join("portfolio_report.csv").exists());
    }

    #[tokio::test]
    async fn missing_allocation_chart_is_not_found() {
        let dir = TempDir::new().unwrap();
        let api = routes(shell(&dir).await);
        let res = warp::test::request()
            .path("/charts/allocation.png")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_chart_without_data_is_not_found() {
        let dir = TempDir::new().unwrap();
        let api = routes(shell(&dir).await);
        let res = warp::test::request()
            .path("/charts/history/tsla")
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.body().as_ref(), b"No data available for TSLA");
    }

    #[tokio::test]
    async fn import_and_export_by_path() {
        let dir = TempDir::new().unwrap();
        let portfolio = shell(&dir).await;
        let api = routes(portfolio.clone());

        let source = dir.path().join("prices.csv");
        std::fs::write(
            &source,
            "Symbol,Date,Open,High,Low,Close,Volume\nAAPL,2024-01-02,1,2,0.5,1.5,100\n",
        )
        .unwrap();

        let res = form_post("/import", &format!("path={}", source.display()))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(portfolio.store().bar_count().await.unwrap(), 1);

        let res = form_post("/import", "path=/no/such/file.csv").reply(&api).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let target = dir.path().join("export.csv");
        let res = form_post("/export", &format!("path={}", target.display()))
            .reply(&api)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let exported = std::fs::read_to_string(&target).unwrap();
        assert!(exported.starts_with("ID,Symbol,Date,Open,High,Low,Close,Volume"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let dir = TempDir::new().unwrap();
        let api = routes(shell(&dir).await);
        let res = warp::test::request().path("/nowhere").reply(&api).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
