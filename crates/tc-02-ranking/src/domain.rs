//! Ranking domain types.
//!
//! A CryptoCompare `top/mktcapfull` page lists coins in market-cap order;
//! only each coin's symbol (`CoinInfo.Name`) is kept. The reply body is a
//! JSON array of symbols, highest rank first.

use bytes::Bytes;
use serde::Deserialize;
use shared_rpc::FetchError;

#[derive(Debug, Deserialize)]
struct CoinInfo {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RankedCoin {
    #[serde(rename = "CoinInfo")]
    coin_info: CoinInfo,
}

#[derive(Debug, Deserialize)]
struct TopListResponse {
    #[serde(rename = "Response", default)]
    response: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
    #[serde(rename = "Data", default)]
    data: Vec<RankedCoin>,
}

/// Decode one page into coin symbols, in rank order.
pub fn parse_page(raw: &[u8]) -> Result<Vec<String>, FetchError> {
    let page: TopListResponse = serde_json::from_slice(raw)
        .map_err(|e| FetchError::InvalidResponse(format!("top list: {e}")))?;

    if page.response.as_deref() == Some("Error") {
        return Err(FetchError::InvalidResponse(format!(
            "top list error: {}",
            page.message.unwrap_or_default()
        )));
    }
    Ok(page.data.into_iter().map(|coin| coin.coin_info.name).collect())
}

/// Encode symbols as a reply body.
pub fn encode_symbols(symbols: &[String]) -> Result<Bytes, FetchError> {
    serde_json::to_vec(symbols)
        .map(Bytes::from)
        .map_err(|e| FetchError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_rank_order() {
        let raw = br#"{
            "Message": "Success", "Type": 100, "SponsoredData": [],
            "Data": [
                {"CoinInfo": {"Id": "1182", "Name": "BTC", "FullName": "Bitcoin"}, "RAW": {}},
                {"CoinInfo": {"Id": "7605", "Name": "ETH", "FullName": "Ethereum"}, "RAW": {}}
            ]
        }"#;
        assert_eq!(parse_page(raw).unwrap(), ["BTC", "ETH"]);
    }

    #[test]
    fn test_error_response() {
        let raw = br#"{"Response": "Error", "Message": "limit is larger than max value.", "Type": 1}"#;
        let err = parse_page(raw).unwrap_err();
        assert!(err.to_string().contains("limit is larger"));
    }

    #[test]
    fn test_encode_symbols() {
        let body = encode_symbols(&["BTC".to_string(), "ETH".to_string()]).unwrap();
        assert_eq!(&body[..], br#"["BTC","ETH"]"#);
    }
}
