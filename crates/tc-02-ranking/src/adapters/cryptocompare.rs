//! CryptoCompare `top/mktcapfull` client.
//!
//! API docs: https://min-api.cryptocompare.com/documentation

use crate::config::UpstreamConfig;
use crate::ports::PageSource;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::Client;
use shared_rpc::FetchError;
use tracing::debug;

/// Quote currency (`tsym`).
const TSYM: &str = "USD";

/// Longest upstream error body carried into an error message.
const MAX_ERROR_BODY: usize = 256;

/// HTTP client for CryptoCompare's market-cap top list.
pub struct CryptoCompareClient {
    client: Client,
    api_url: String,
}

impl CryptoCompareClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }
}

#[async_trait]
impl PageSource for CryptoCompareClient {
    async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Bytes, FetchError> {
        let page = page.to_string();
        let limit = page_size.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .header(ACCEPT, "application/json")
            .query(&[("limit", limit.as_str()), ("page", page.as_str()), ("tsym", TSYM)])
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

        debug!(page = %page, bytes = body.len(), "Received ranking page");
        Ok(body)
    }
}
