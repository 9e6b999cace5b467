use crate::model::{FetchError, RawRecord};

#[async_trait::async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError>;
}
