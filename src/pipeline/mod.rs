//! Pipeline orchestrator: ties scraper → grouping together.
//!
//! One run:
//!   1. Fetch the rising list for both segments, rank the top N
//!   2. Walk the paginated theme index until it runs dry
//!   3. Scatter/gather membership fetches behind a bounded semaphore
//!   4. Join everything single-threaded into the final grouping
//!
//! Every upstream failure degrades to "no data from that source"; the run
//! itself only fails on programmer error, never on a bad upstream day.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::grouping::{self, Grouping};
use crate::models::{Fetched, MarketSegment, Stock, Theme, ThemeStub};
use crate::scraper::MarketDataSource;

pub struct Pipeline {
    config: AppConfig,
    source: Arc<dyn MarketDataSource>,
}

/// Everything one run produces: the ranked list, the grouping derived
/// from it, and counters for degraded sources.
#[derive(Debug)]
pub struct Analysis {
    pub top: Vec<Stock>,
    pub grouping: Grouping,
    pub stats: PipelineStats,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub segments_failed: usize,
    pub stocks_ranked: usize,
    pub themes_discovered: usize,
    pub memberships_failed: usize,
    pub groups: usize,
}

impl Pipeline {
    pub fn new(config: AppConfig, source: Arc<dyn MarketDataSource>) -> Self {
        Self { config, source }
    }

    pub async fn run(&self) -> Result<Analysis> {
        info!("=== Step 1: Ranking rising stocks ===");
        let (top, segments_failed) = self.rank_top().await;
        info!("{} stocks ranked ({} segment failures)", top.len(), segments_failed);

        info!("=== Step 2: Listing themes ===");
        let stubs = self.list_themes().await;
        info!("{} themes discovered", stubs.len());

        info!("=== Step 3: Fetching theme memberships ({} themes) ===", stubs.len());
        let (themes, memberships_failed) = self.fetch_memberships(stubs).await;

        let grouping = grouping::group_by_theme(&top, &themes);

        let stats = PipelineStats {
            segments_failed,
            stocks_ranked: top.len(),
            themes_discovered: themes.len(),
            memberships_failed,
            groups: grouping.len(),
        };

        info!(
            "=== Done: {} stocks | {} themes | {} groups | {} membership failures ===",
            stats.stocks_ranked, stats.themes_discovered, stats.groups, stats.memberships_failed,
        );

        Ok(Analysis { top, grouping, stats })
    }

    /// Rising list across both segments, volume-filtered, deduplicated,
    /// rate-descending, truncated to the configured top N.
    pub async fn rank_top(&self) -> (Vec<Stock>, usize) {
        let mut all = Vec::new();
        let mut failed = 0usize;

        for segment in MarketSegment::ALL {
            match self.source.fetch_rising(segment).await {
                Fetched::Ok(stocks) => {
                    debug!("{}: {} rows", segment, stocks.len());
                    all.extend(stocks);
                }
                Fetched::Empty => warn!("{}: listing page yielded no rows", segment),
                Fetched::Failed(e) => {
                    warn!("{}: listing fetch failed: {}", segment, e);
                    failed += 1;
                }
            }
        }

        let ranked = rank_stocks(all, self.config.pipeline.min_volume, self.config.pipeline.top_n);
        (ranked, failed)
    }

    /// Theme index, page by page; stops at the first failed or empty page.
    pub async fn list_themes(&self) -> Vec<ThemeStub> {
        let mut stubs = Vec::new();

        for page in 1..=self.config.pipeline.max_theme_pages {
            match self.source.fetch_theme_page(page).await {
                Fetched::Ok(rows) => {
                    debug!("Theme index page {}: {} themes", page, rows.len());
                    stubs.extend(rows);
                }
                Fetched::Empty => {
                    debug!("Theme index page {} empty — stopping pagination", page);
                    break;
                }
                Fetched::Failed(e) => {
                    warn!("Theme index page {} failed: {} — stopping pagination", page, e);
                    break;
                }
            }
        }

        stubs
    }

    /// Scatter membership fetches across a bounded pool, gather with the
    /// originating stub attached. A failed fetch leaves that theme with an
    /// empty membership (the joiner then drops it); siblings are unaffected.
    async fn fetch_memberships(&self, stubs: Vec<ThemeStub>) -> (Vec<Theme>, usize) {
        let sem = Arc::new(Semaphore::new(self.config.pipeline.concurrency));
        let mut handles = Vec::new();

        for stub in stubs {
            let source = Arc::clone(&self.source);
            let sem = Arc::clone(&sem);
            let task_stub = stub.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;
                let fetched = source.fetch_theme_members(&task_stub).await;
                Ok::<_, anyhow::Error>((task_stub, fetched))
            });

            handles.push((stub, handle));
        }

        let mut themes = Vec::new();
        let mut failed = 0usize;

        for (stub, handle) in handles {
            match handle.await {
                Ok(Ok((stub, Fetched::Ok(codes)))) => {
                    debug!("{}: {} members", stub.name, codes.len());
                    themes.push(stub.with_codes(codes));
                }
                Ok(Ok((stub, Fetched::Empty))) => {
                    debug!("{}: no members listed", stub.name);
                    themes.push(stub.with_codes(Default::default()));
                }
                Ok(Ok((stub, Fetched::Failed(e)))) => {
                    warn!("{}: membership fetch failed: {}", stub.name, e);
                    themes.push(stub.with_codes(Default::default()));
                    failed += 1;
                }
                Ok(Err(e)) => {
                    warn!("{}: worker error: {:#}", stub.name, e);
                    themes.push(stub.with_codes(Default::default()));
                    failed += 1;
                }
                Err(e) => {
                    error!("Task panic for {}: {}", stub.name, e);
                    themes.push(stub.with_codes(Default::default()));
                    failed += 1;
                }
            }
        }

        (themes, failed)
    }
}

/// Volume filter, later-wins dedupe by code, rate-descending sort, top-N cut.
pub fn rank_stocks(stocks: Vec<Stock>, min_volume: i64, top_n: usize) -> Vec<Stock> {
    let mut by_code: HashMap<String, Stock> = HashMap::new();
    for stock in stocks {
        if stock.volume > min_volume {
            by_code.insert(stock.code.clone(), stock);
        }
    }

    let mut ranked: Vec<Stock> = by_code.into_values().collect();
    ranked.sort_by(|a, b| b.rate.total_cmp(&a.rate));
    ranked.truncate(top_n);
    ranked
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::scraper::http_client::FetchError;

    fn stock(code: &str, rate: f64, volume: i64) -> Stock {
        Stock {
            code: code.to_string(),
            name: format!("종목{}", code),
            price: 10_000,
            rate,
            volume,
            link: format!("https://finance.naver.com/item/main.naver?code={}", code),
        }
    }

    #[test]
    fn test_rank_filters_low_volume() {
        let ranked = rank_stocks(
            vec![stock("A", 9.0, 500), stock("B", 5.0, 5_000)],
            1000,
            100,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].code, "B");
    }

    #[test]
    fn test_rank_dedupes_later_wins() {
        let mut later = stock("A", 4.0, 9_000);
        later.name = "나중行".into();

        let ranked = rank_stocks(vec![stock("A", 9.0, 5_000), later], 1000, 100);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "나중行");
        assert_eq!(ranked[0].rate, 4.0);
    }

    #[test]
    fn test_rank_sorts_and_truncates() {
        let stocks: Vec<Stock> = (0..150)
            .map(|i| stock(&format!("{:06}", i), i as f64 / 10.0, 2_000))
            .collect();

        let ranked = rank_stocks(stocks, 1000, 100);
        assert_eq!(ranked.len(), 100);
        assert!(ranked.windows(2).all(|w| w[0].rate >= w[1].rate));
        // The weakest 50 risers fell off the end.
        assert!(ranked.iter().all(|s| s.rate >= 5.0));
    }

    // ── Mock source ───────────────────────────────────────────────────────────

    struct MockSource {
        fail_kosdaq: bool,
        failing_theme: Option<String>,
    }

    #[async_trait]
    impl MarketDataSource for MockSource {
        async fn fetch_rising(&self, segment: MarketSegment) -> Fetched<Vec<Stock>> {
            match segment {
                MarketSegment::Kospi => Fetched::Ok(vec![
                    stock("A", 9.0, 5_000),
                    stock("B", 7.0, 5_000),
                ]),
                MarketSegment::Kosdaq => {
                    if self.fail_kosdaq {
                        Fetched::Failed(FetchError::Status(504))
                    } else {
                        Fetched::Ok(vec![stock("C", 5.0, 5_000)])
                    }
                }
            }
        }

        async fn fetch_theme_page(&self, page: u32) -> Fetched<Vec<ThemeStub>> {
            if page > 1 {
                return Fetched::Empty;
            }
            Fetched::Ok(vec![
                ThemeStub {
                    name: "반도체".into(),
                    url: "https://finance.naver.com/t/1".into(),
                    rate: 3.0,
                },
                ThemeStub {
                    name: "2차전지".into(),
                    url: "https://finance.naver.com/t/2".into(),
                    rate: 2.0,
                },
            ])
        }

        async fn fetch_theme_members(&self, stub: &ThemeStub) -> Fetched<HashSet<String>> {
            if self.failing_theme.as_deref() == Some(stub.name.as_str()) {
                return Fetched::Failed(FetchError::Status(504));
            }
            match stub.name.as_str() {
                "반도체" => Fetched::Ok(["A".to_string()].into_iter().collect()),
                "2차전지" => Fetched::Ok(["B".to_string(), "Z".to_string()].into_iter().collect()),
                _ => Fetched::Empty,
            }
        }
    }

    fn pipeline(mock: MockSource) -> Pipeline {
        Pipeline::new(AppConfig::default(), Arc::new(mock))
    }

    #[tokio::test]
    async fn test_run_groups_across_both_segments() {
        let analysis = pipeline(MockSource { fail_kosdaq: false, failing_theme: None })
            .run()
            .await
            .unwrap();

        assert_eq!(analysis.stats.stocks_ranked, 3);
        assert_eq!(analysis.stats.segments_failed, 0);
        assert_eq!(analysis.stats.memberships_failed, 0);

        assert!(analysis.grouping.groups.contains_key("반도체"));
        assert!(analysis.grouping.groups.contains_key("2차전지"));
        // C matched no theme → catch-all.
        let others = &analysis.grouping.groups[crate::grouping::OTHERS_GROUP];
        assert_eq!(others.stocks[0].code, "C");
    }

    #[tokio::test]
    async fn test_failed_segment_yields_partial_results() {
        let analysis = pipeline(MockSource { fail_kosdaq: true, failing_theme: None })
            .run()
            .await
            .unwrap();

        assert_eq!(analysis.stats.segments_failed, 1);
        assert_eq!(analysis.stats.stocks_ranked, 2);
        assert!(analysis.top.iter().all(|s| s.code != "C"));
    }

    #[tokio::test]
    async fn test_failed_membership_drops_theme_only() {
        let analysis = pipeline(MockSource {
            fail_kosdaq: false,
            failing_theme: Some("반도체".into()),
        })
        .run()
        .await
        .unwrap();

        assert_eq!(analysis.stats.memberships_failed, 1);
        // Failed theme ends up with an empty membership → dropped by the join.
        assert!(!analysis.grouping.groups.contains_key("반도체"));
        // The sibling theme is unaffected.
        assert!(analysis.grouping.groups.contains_key("2차전지"));
        // A now falls to the catch-all.
        let others = &analysis.grouping.groups[crate::grouping::OTHERS_GROUP];
        assert!(others.stocks.iter().any(|s| s.code == "A"));
    }

    #[tokio::test]
    async fn test_run_is_idempotent_over_unchanged_source() {
        let p = pipeline(MockSource { fail_kosdaq: false, failing_theme: None });

        let first = p.run().await.unwrap();
        let second = p.run().await.unwrap();

        assert_eq!(first.top, second.top);
        assert_eq!(first.grouping.len(), second.grouping.len());
        for (name, group) in &first.grouping.groups {
            assert_eq!(Some(group), second.grouping.groups.get(name));
        }
    }
}
