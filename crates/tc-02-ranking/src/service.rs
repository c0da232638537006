//! Ranking service: the worker's fetch capability.
//!
//! The upstream serves at most [`MAX_PAGE_SIZE`] coins per page, so a request
//! for `count` symbols is split into `ceil(count / page_size)` page fetches,
//! issued in rank order and concatenated. A short page means the list has
//! ended; the reply then holds fewer than `count` symbols.

use crate::domain::{encode_symbols, parse_page};
use crate::ports::PageSource;
use async_trait::async_trait;
use bytes::Bytes;
use shared_rpc::{FetchData, FetchError, FetchParams};
use tracing::debug;

/// Largest page the upstream accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Fetches the top coins by market cap and encodes their symbols.
pub struct RankingService<S> {
    source: S,
    page_size: usize,
}

impl<S: PageSource> RankingService<S> {
    pub fn new(source: S) -> Self {
        Self::with_page_size(source, MAX_PAGE_SIZE)
    }

    /// Use a smaller page size; clamped to `1..=MAX_PAGE_SIZE`.
    pub fn with_page_size(source: S, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Symbols of the top `count` coins, highest rank first.
    pub async fn top_symbols(&self, count: usize) -> Result<Vec<String>, FetchError> {
        let pages = count.div_ceil(self.page_size);
        let mut symbols = Vec::with_capacity(count);

        for page in 0..pages {
            let raw = self.source.fetch_page(page, self.page_size).await?;
            let names = parse_page(&raw)?;
            let short = names.len() < self.page_size;
            symbols.extend(names);
            debug!(page, total = symbols.len(), "Fetched ranking page");
            if short {
                break;
            }
        }

        symbols.truncate(count);
        Ok(symbols)
    }
}

#[async_trait]
impl<S: PageSource> FetchData for RankingService<S> {
    async fn fetch(&self, params: FetchParams) -> Result<Bytes, FetchError> {
        let symbols = self.top_symbols(params.count).await?;
        encode_symbols(&symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Serves `total` coins named `C0`, `C1`, ... and records requested pages.
    struct FakePages {
        total: usize,
        requested: Mutex<Vec<usize>>,
        fail_on: Option<usize>,
    }

    impl FakePages {
        fn new(total: usize) -> Self {
            Self {
                total,
                requested: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl PageSource for FakePages {
        async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Bytes, FetchError> {
            self.requested.lock().push(page);
            if self.fail_on == Some(page) {
                return Err(FetchError::Status {
                    status: 429,
                    message: "rate limited".into(),
                });
            }
            let start = (page * page_size).min(self.total);
            let end = (start + page_size).min(self.total);
            let data: Vec<String> = (start..end)
                .map(|i| format!(r#"{{"CoinInfo": {{"Name": "C{i}"}}}}"#))
                .collect();
            Ok(Bytes::from(format!(r#"{{"Message": "Success", "Data": [{}]}}"#, data.join(","))))
        }
    }

    #[tokio::test]
    async fn test_two_hundred_is_two_pages_in_order() {
        let service = RankingService::new(FakePages::new(1000));

        let symbols = service.top_symbols(200).await.unwrap();
        assert_eq!(symbols.len(), 200);
        assert_eq!(symbols[0], "C0");
        assert_eq!(symbols[100], "C100");
        assert_eq!(symbols[199], "C199");
        assert_eq!(*service.source.requested.lock(), [0, 1]);
    }

    #[tokio::test]
    async fn test_partial_page_is_truncated() {
        let service = RankingService::new(FakePages::new(1000));
        let symbols = service.top_symbols(150).await.unwrap();
        assert_eq!(symbols.len(), 150);
        assert_eq!(symbols.last().map(String::as_str), Some("C149"));
    }

    #[tokio::test]
    async fn test_short_page_stops_paging() {
        let service = RankingService::new(FakePages::new(120));
        let symbols = service.top_symbols(300).await.unwrap();
        assert_eq!(symbols.len(), 120);
        assert_eq!(*service.source.requested.lock(), [0, 1]);
    }

    #[tokio::test]
    async fn test_page_failure_fails_request() {
        let mut pages = FakePages::new(1000);
        pages.fail_on = Some(1);
        let service = RankingService::new(pages);

        assert!(matches!(
            service.fetch(FetchParams::new(200)).await,
            Err(FetchError::Status { status: 429, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_encodes_symbols() {
        let service = RankingService::with_page_size(FakePages::new(10), 2);
        let body = service.fetch(FetchParams::new(3)).await.unwrap();
        assert_eq!(&body[..], br#"["C0","C1","C2"]"#);
    }
}
