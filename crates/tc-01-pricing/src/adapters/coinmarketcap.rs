//! CoinMarketCap `listings/latest` client.
//!
//! API docs: https://coinmarketcap.com/api/documentation/v1/

use crate::config::UpstreamConfig;
use crate::ports::ListingsSource;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::Client;
use shared_rpc::FetchError;
use tracing::debug;

/// Rank offset of the first listing.
const START: &str = "1";

/// Quote currency.
const CONVERT: &str = "USD";

/// Longest upstream error body carried into an error message.
const MAX_ERROR_BODY: usize = 256;

/// HTTP client for CoinMarketCap listings.
pub struct CoinMarketCapClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl CoinMarketCapClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ListingsSource for CoinMarketCapClient {
    async fn latest_listings(&self, limit: usize) -> Result<Bytes, FetchError> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header(ACCEPT, "application/json")
            .query(&[("start", START), ("limit", limit.as_str()), ("convert", CONVERT)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Upstream(format!("request to {} timed out", self.api_url))
                } else {
                    FetchError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        if !status.is_success() {
            let end = body.len().min(MAX_ERROR_BODY);
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body[..end]).into_owned(),
            });
        }

        debug!(limit = %limit, bytes = body.len(), "Received listings");
        Ok(body)
    }
}
