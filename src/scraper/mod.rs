pub mod cleaner;
pub mod http_client;
pub mod parsers;

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::models::{Fetched, MarketSegment, Stock, ThemeStub};

use self::cleaner::{stock_row_to_stock, theme_row_to_stub};
use self::http_client::{FetchError, HttpClient};
use self::parsers::{parse_rising_page, parse_theme_index_page, parse_theme_members};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable data source abstraction.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Rising-stocks listing for one market segment, cleaned but unranked.
    async fn fetch_rising(&self, segment: MarketSegment) -> Fetched<Vec<Stock>>;

    /// One page of the theme index.
    async fn fetch_theme_page(&self, page: u32) -> Fetched<Vec<ThemeStub>>;

    /// Member stock codes from one theme's detail page.
    async fn fetch_theme_members(&self, stub: &ThemeStub) -> Fetched<HashSet<String>>;
}

// ── Naver Finance scraper ─────────────────────────────────────────────────────

pub struct NaverScraper {
    client: HttpClient,
    base_url: String,
}

impl NaverScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Rising-stocks listing, per segment via the `sosok` parameter.
    fn rising_url(&self, segment: MarketSegment) -> String {
        format!("{}/sise/sise_rise.naver?sosok={}", self.base_url, segment.sosok())
    }

    /// Theme index, paginated.
    fn theme_index_url(&self, page: u32) -> String {
        format!("{}/sise/theme.naver?&page={}", self.base_url, page)
    }
}

#[async_trait]
impl MarketDataSource for NaverScraper {
    async fn fetch_rising(&self, segment: MarketSegment) -> Fetched<Vec<Stock>> {
        let url = self.rising_url(segment);
        debug!("Fetching {} rising list ({})", segment, url);

        let html = match self.client.get_html(&url).await {
            Ok(html) => html,
            Err(e) => return Fetched::Failed(e),
        };

        let raw = match parse_rising_page(&html) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{} listing parse failed: {:#}", segment, e);
                return Fetched::Empty;
            }
        };

        let stocks: Vec<Stock> = raw
            .iter()
            .filter_map(|row| stock_row_to_stock(row, &self.base_url))
            .collect();

        let skipped = raw.len() - stocks.len();
        if skipped > 0 {
            debug!("{}: {} rows skipped during cleaning", segment, skipped);
        }

        Fetched::from_rows(stocks)
    }

    async fn fetch_theme_page(&self, page: u32) -> Fetched<Vec<ThemeStub>> {
        let url = self.theme_index_url(page);
        debug!("Fetching theme index page {} ({})", page, url);

        let html = match self.client.get_html(&url).await {
            Ok(html) => html,
            Err(e) => return Fetched::Failed(e),
        };

        let raw = match parse_theme_index_page(&html) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Theme index page {} parse failed: {:#}", page, e);
                return Fetched::Empty;
            }
        };

        let stubs: Vec<ThemeStub> = raw
            .iter()
            .filter_map(|row| theme_row_to_stub(row, &self.base_url))
            .collect();

        Fetched::from_rows(stubs)
    }

    async fn fetch_theme_members(&self, stub: &ThemeStub) -> Fetched<HashSet<String>> {
        debug!("Fetching members of {:?} ({})", stub.name, stub.url);

        let html = match self.client.get_html(&stub.url).await {
            Ok(html) => html,
            Err(e) => return Fetched::Failed(e),
        };

        match parse_theme_members(&html) {
            Ok(codes) => Fetched::from_set(codes),
            Err(e) => {
                warn!("{}: member parse failed: {:#}", stub.name, e);
                Fetched::Empty
            }
        }
    }
}
