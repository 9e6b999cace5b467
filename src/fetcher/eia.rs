// EIA open-data v2 client for annual retail fuel prices.
use crate::config::FetchConfig;
use crate::fetcher::traits::PriceFeed;
use crate::model::{FetchError, RawRecord};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

pub struct EiaFetcher {
    client: Client,
    api_key: String,
    cfg: FetchConfig,
}

impl EiaFetcher {
    pub fn new(api_key: String, cfg: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("fuelscope/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key,
            cfg,
        })
    }

    /// Query string for one page. Facet parameters repeat per value, the
    /// way the v2 API expects them.
    fn query(&self, offset: usize) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("api_key".into(), self.api_key.clone()),
            ("frequency".into(), "annual".into()),
            ("data[0]".into(), "value".into()),
            ("start".into(), self.cfg.start_year.to_string()),
            ("end".into(), self.cfg.end_year.to_string()),
            ("sort[0][column]".into(), "period".into()),
            ("sort[0][direction]".into(), "asc".into()),
            ("offset".into(), offset.to_string()),
            ("length".into(), self.cfg.page_size.to_string()),
        ];
        for product in &self.cfg.products {
            params.push(("facets[product][]".into(), product.clone()));
        }
        for region in &self.cfg.regions {
            params.push(("facets[duoarea][]".into(), region.clone()));
        }
        params.push(("facets[process][]".into(), self.cfg.process.clone()));
        params
    }
}

#[async_trait::async_trait]
impl PriceFeed for EiaFetcher {
    /// Pages through the endpoint until a short page signals the end.
    /// Raw records go through untouched; validation happens downstream.
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        let mut records: Vec<RawRecord> = Vec::new();
        let mut offset = 0usize;
        loop {
            let response = self
                .client
                .get(&self.cfg.base_url)
                .query(&self.query(offset))
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let body: Value = response.json().await?;
            let page = body
                .get("response")
                .and_then(|r| r.get("data"))
                .and_then(Value::as_array)
                .ok_or_else(|| FetchError::Decode("missing response.data array".to_string()))?;
            let page_len = page.len();
            for item in page {
                let map = item.as_object().ok_or_else(|| {
                    FetchError::Decode("non-object entry in response.data".to_string())
                })?;
                records.push(map.clone());
            }
            debug!(offset, page_len, "fetched page");
            if page_len < self.cfg.page_size {
                break;
            }
            offset += page_len;
        }
        info!(total = records.len(), "EIA fetch complete");
        Ok(records)
    }
}
