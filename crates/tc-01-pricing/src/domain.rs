//! Pricing domain types.
//!
//! Records are decoded from CoinMarketCap's `listings/latest` response and
//! re-encoded as the reply body: a JSON array of
//! `{"symbol": "BTC", "quote": {"USD": {"price": 11923.37}}}`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use shared_rpc::FetchError;

/// Price in one quote currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    /// Absent for coins the upstream has no market data for
    #[serde(default)]
    pub price: Option<f64>,
}

/// Quotes by currency. Only USD is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(rename = "USD")]
    pub usd: Currency,
}

/// One listed coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cryptocurrency {
    pub symbol: String,
    pub quote: Quote,
}

#[derive(Debug, Deserialize)]
struct ListingsStatus {
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingsResponse {
    #[serde(default)]
    status: Option<ListingsStatus>,
    #[serde(default)]
    data: Vec<Cryptocurrency>,
}

/// Decode a `listings/latest` response body.
pub fn parse_listings(raw: &[u8]) -> Result<Vec<Cryptocurrency>, FetchError> {
    let response: ListingsResponse = serde_json::from_slice(raw)
        .map_err(|e| FetchError::InvalidResponse(format!("listings: {e}")))?;

    if let Some(status) = response.status {
        if status.error_code != 0 {
            return Err(FetchError::InvalidResponse(format!(
                "listings error {}: {}",
                status.error_code,
                status.error_message.unwrap_or_default()
            )));
        }
    }
    Ok(response.data)
}

/// Encode coins as a reply body.
pub fn encode_prices(coins: &[Cryptocurrency]) -> Result<Bytes, FetchError> {
    serde_json::to_vec(coins)
        .map(Bytes::from)
        .map_err(|e| FetchError::Encode(e.to_string()))
}
