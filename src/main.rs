// src/main.rs
use anyhow::Context;
use env_logger::{Builder, Target};
use log::{error, info, warn};
use portfolio_tracker::{api, AppConfig, Portfolio, Store};
use std::fs::OpenOptions;
use std::sync::Arc;

fn init_logging(config: &AppConfig) {
    let mut builder = Builder::new();
    builder.filter_level(config.log_level).format_timestamp_secs();

    if let Some(path) = &config.log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {:?}: {}; logging to stderr", path, e),
        }
    }
    builder.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();
    init_logging(&config);

    println!("Stock Portfolio Analysis Program");
    println!("--------------------------------");
    if let Ok(cwd) = std::env::current_dir() {
        println!("Current working directory: {}", cwd.display());
    }

    let store = Store::open(&config.database)
        .await
        .with_context(|| format!("failed to open database {:?}", config.database))?;
    info!("Connected to database...");

    if config.sample_csv.exists() {
        match store.import_prices_from_path(&config.sample_csv).await {
            Ok(count) => println!("Sample data imported successfully ({} rows)", count),
            Err(e) => warn!("Sample data {:?} not imported: {}", config.sample_csv, e),
        }
    } else {
        println!("Note: Sample data file not found. You can import your own CSV.");
    }

    let portfolio = Arc::new(Portfolio::new(
        store,
        config.quote_source(),
        config.artifact_paths(),
    ));

    let api = api::routes(portfolio.clone());
    let (addr, server) = warp::serve(api)
        .try_bind_with_graceful_shutdown(config.bind, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!("Portfolio shell running on http://{}", addr);
    println!("Open http://{} in a browser (Ctrl-C to quit)", addr);
    server.await;

    info!("Shutting down...");
    match Arc::try_unwrap(portfolio) {
        Ok(portfolio) => portfolio.close().await?,
        Err(_) => warn!("Portfolio still in use at shutdown; database closed on drop"),
    }
    Ok(())
}
