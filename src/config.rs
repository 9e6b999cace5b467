use crate::model::ConfigurationError;
use serde::Deserialize;
use std::fs;

/// EIA API request parameters. Defaults mirror the published
/// `petroleum/pri/gnd` retail price endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_products")]
    pub products: Vec<String>,
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
    #[serde(default = "default_process")]
    pub process: String,
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_end_year")]
    pub end_year: i32,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

/// Thresholds and data-sufficiency floors consumed by the core. All
/// values are plain configuration, not semantics.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_baseline_product")]
    pub baseline_product: String,
    #[serde(default = "default_national_region")]
    pub national_region: String,
    /// Period-over-period change (percent) that opens an episode.
    #[serde(default = "default_volatility_threshold")]
    pub volatility_threshold_pct: f64,
    /// Consecutive sub-threshold periods that close an episode.
    #[serde(default = "default_stabilization_periods")]
    pub stabilization_periods: usize,
    /// Cumulative move from a local extremum (percent) that opens an episode.
    #[serde(default = "default_drawdown_threshold")]
    pub drawdown_threshold_pct: f64,
    /// Minimum regions with data before a spread is considered defined.
    #[serde(default = "default_min_regions")]
    pub min_regions: usize,
    /// Minimum common periods before synchronization is considered defined.
    #[serde(default = "default_min_common_periods")]
    pub min_common_periods: usize,
    #[serde(default = "default_sync_threshold")]
    pub sync_threshold: f64,
    /// A premium series is "stable" when its relative std-dev is below this.
    #[serde(default = "default_premium_stability_threshold")]
    pub premium_stability_threshold_pct: f64,
    /// Latest-period regional spread ($/gal) worth calling out.
    #[serde(default = "default_spread_alert")]
    pub spread_alert_usd: f64,
    /// Placeholder price the source uses for "no data", if any.
    #[serde(default)]
    pub missing_value_sentinel: Option<f64>,
    /// Earliest annual period accepted during normalization.
    #[serde(default = "default_min_period")]
    pub min_period: i32,
    /// Latest annual period accepted during normalization.
    #[serde(default = "default_max_period")]
    pub max_period: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_table_path")]
    pub table_path: String,
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_base_url() -> String {
    "https://api.eia.gov/v2/petroleum/pri/gnd/data/".to_string()
}

fn default_products() -> Vec<String> {
    ["EPD2D", "EPD2DXL0", "EPM0", "EPM0R", "EPMP", "EPMR"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_regions() -> Vec<String> {
    [
        "NUS", "R10", "R1X", "R1Y", "R20", "R30", "R40", "R50", "R5XCA", "SCA",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_process() -> String {
    "PTE".to_string()
}

fn default_start_year() -> i32 {
    2000
}

fn default_end_year() -> i32 {
    2024
}

fn default_page_size() -> usize {
    5000
}

fn default_baseline_product() -> String {
    "EPM0".to_string()
}

fn default_national_region() -> String {
    "NUS".to_string()
}

fn default_volatility_threshold() -> f64 {
    15.0
}

fn default_stabilization_periods() -> usize {
    2
}

fn default_drawdown_threshold() -> f64 {
    25.0
}

fn default_min_regions() -> usize {
    2
}

fn default_min_common_periods() -> usize {
    3
}

fn default_sync_threshold() -> f64 {
    0.95
}

fn default_premium_stability_threshold() -> f64 {
    10.0
}

fn default_spread_alert() -> f64 {
    0.50
}

fn default_min_period() -> i32 {
    1990
}

fn default_max_period() -> i32 {
    2100
}

fn default_table_path() -> String {
    "data/fuel_prices.csv".to_string()
}

fn default_report_path() -> String {
    "data/report.json".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            products: default_products(),
            regions: default_regions(),
            process: default_process(),
            start_year: default_start_year(),
            end_year: default_end_year(),
            page_size: default_page_size(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            baseline_product: default_baseline_product(),
            national_region: default_national_region(),
            volatility_threshold_pct: default_volatility_threshold(),
            stabilization_periods: default_stabilization_periods(),
            drawdown_threshold_pct: default_drawdown_threshold(),
            min_regions: default_min_regions(),
            min_common_periods: default_min_common_periods(),
            sync_threshold: default_sync_threshold(),
            premium_stability_threshold_pct: default_premium_stability_threshold(),
            spread_alert_usd: default_spread_alert(),
            missing_value_sentinel: None,
            min_period: default_min_period(),
            max_period: default_max_period(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            table_path: default_table_path(),
            report_path: default_report_path(),
        }
    }
}

impl AppConfig {
    /// Rejects invalid thresholds and unknown codes before any record is
    /// processed. Called at pipeline construction.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.fetch.products.is_empty() {
            return Err(ConfigurationError::Invalid("product list is empty".to_string()));
        }
        if self.fetch.regions.is_empty() {
            return Err(ConfigurationError::Invalid("region list is empty".to_string()));
        }
        if self.fetch.start_year > self.fetch.end_year {
            return Err(ConfigurationError::Invalid(format!(
                "start_year {} is after end_year {}",
                self.fetch.start_year, self.fetch.end_year
            )));
        }
        let a = &self.analysis;
        if a.volatility_threshold_pct <= 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "volatility_threshold_pct must be positive, got {}",
                a.volatility_threshold_pct
            )));
        }
        if a.drawdown_threshold_pct <= 0.0 {
            return Err(ConfigurationError::Invalid(format!(
                "drawdown_threshold_pct must be positive, got {}",
                a.drawdown_threshold_pct
            )));
        }
        if a.stabilization_periods == 0 {
            return Err(ConfigurationError::Invalid(
                "stabilization_periods must be at least 1".to_string(),
            ));
        }
        if a.min_regions < 2 {
            return Err(ConfigurationError::Invalid(
                "min_regions must be at least 2".to_string(),
            ));
        }
        if a.min_common_periods < 3 {
            return Err(ConfigurationError::Invalid(
                "min_common_periods must be at least 3".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&a.sync_threshold) {
            return Err(ConfigurationError::Invalid(format!(
                "sync_threshold must be within [0, 1], got {}",
                a.sync_threshold
            )));
        }
        if a.premium_stability_threshold_pct <= 0.0 {
            return Err(ConfigurationError::Invalid(
                "premium_stability_threshold_pct must be positive".to_string(),
            ));
        }
        if a.min_period > a.max_period {
            return Err(ConfigurationError::Invalid(format!(
                "min_period {} is after max_period {}",
                a.min_period, a.max_period
            )));
        }
        if !self.fetch.products.contains(&a.baseline_product) {
            return Err(ConfigurationError::Invalid(format!(
                "unknown baseline product {:?}",
                a.baseline_product
            )));
        }
        if !self.fetch.regions.contains(&a.national_region) {
            return Err(ConfigurationError::Invalid(format!(
                "unknown national region {:?}",
                a.national_region
            )));
        }
        Ok(())
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigurationError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_string(),
        source,
    })?;
    let config: AppConfig = serde_json::from_str(&content).map_err(|source| ConfigurationError::Parse {
        path: path.to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let mut config = AppConfig::default();
        config.analysis.volatility_threshold_pct = -5.0;
        assert!(matches!(config.validate(), Err(ConfigurationError::Invalid(_))));
    }

    #[test]
    fn unknown_baseline_is_rejected() {
        let mut config = AppConfig::default();
        config.analysis.baseline_product = "EPXX".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("baseline"));
    }

    #[test]
    fn inverted_period_bounds_are_rejected() {
        let mut config = AppConfig::default();
        config.analysis.min_period = 2050;
        config.analysis.max_period = 2000;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid(_))
        ));
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.analysis.baseline_product, "EPM0");
        assert_eq!(config.fetch.page_size, 5000);
    }
}
