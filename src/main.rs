mod aggregator;
mod analyzer;
mod config;
mod fetcher;
mod model;
mod normalizer;
mod pipeline;
mod storage;

use config::{AppConfig, load_config};
use fetcher::{EiaFetcher, PriceFeed};
use model::{product_name, region_name};
use pipeline::{Pipeline, RunReport};
use std::env;
use std::path::Path;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: AppConfig = if Path::new(&config_path).exists() {
        match load_config(&config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Config load error: {e}");
                return;
            }
        }
    } else {
        info!("No config file at {config_path}, using defaults");
        AppConfig::default()
    };

    let pipeline = match Pipeline::new(config.clone()) {
        Ok(p) => p,
        Err(e) => {
            error!("Pipeline construction failed: {e}");
            return;
        }
    };

    // Fetch from the API when a key is available, otherwise fall back to
    // the persisted flat file from a previous run.
    let report = match env::var("EIA_API_KEY") {
        Ok(api_key) => {
            let fetcher = match EiaFetcher::new(api_key, config.fetch.clone()) {
                Ok(f) => f,
                Err(e) => {
                    error!("Fetcher construction failed: {e}");
                    return;
                }
            };
            info!("Fetching annual fuel prices from the EIA API...");
            let records = match fetcher.fetch().await {
                Ok(r) => r,
                Err(e) => {
                    error!("Fetch failed: {e}");
                    return;
                }
            };
            match pipeline.run(&records) {
                Ok(report) => report,
                Err(e) => {
                    error!("Pipeline run failed: {e}");
                    return;
                }
            }
        }
        Err(_) => {
            let table_path = Path::new(&config.output.table_path);
            info!(
                "EIA_API_KEY not set, loading saved table from {}",
                table_path.display()
            );
            let table = match storage::load_table(table_path) {
                Ok(t) => t,
                Err(e) => {
                    error!("No usable input: {e}");
                    return;
                }
            };
            pipeline.analyze(table, Vec::new())
        }
    };

    if !report.rejections.is_empty() {
        warn!(
            "{} raw records were rejected during normalization",
            report.rejections.len()
        );
    }

    let mut table = model::CanonicalTable::new();
    for obs in &report.observations {
        table.insert(obs.clone());
    }
    if let Err(e) = storage::save_table(Path::new(&config.output.table_path), &table) {
        warn!("Table save failed: {e}");
    }
    if let Err(e) = storage::save_report(Path::new(&config.output.report_path), &report) {
        warn!("Report save failed: {e}");
    }

    log_findings(&report);
}

fn log_findings(report: &RunReport) {
    for episode in &report.episodes {
        info!(
            "Volatility episode {}-{}: peak {:.2}, trough {:.2}, severity {:.2}",
            episode.start_period,
            episode.end_period,
            episode.peak_price,
            episode.trough_price,
            episode.severity
        );
    }
    for summary in &report.metrics.premiums {
        if let Some(latest) = summary.latest.value() {
            info!(
                "{} premium over {} in {}: {:.2} $/gal",
                product_name(&summary.product_code),
                product_name(&summary.baseline_product_code),
                region_name(&summary.region_code),
                latest
            );
        }
    }
    if report.insights.is_empty() {
        info!("No insights met their thresholds this run");
    }
    for (rank, insight) in report.insights.iter().enumerate() {
        info!(
            "Insight #{} [{:?}]: {}",
            rank + 1,
            insight.category,
            insight.statement
        );
    }
}
