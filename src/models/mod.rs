use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::scraper::http_client::FetchError;

// ── Market segment ────────────────────────────────────────────────────────────

/// The two KRX boards Naver exposes via the `sosok` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketSegment {
    Kospi,
    Kosdaq,
}

impl MarketSegment {
    pub const ALL: [MarketSegment; 2] = [MarketSegment::Kospi, MarketSegment::Kosdaq];

    /// `sosok` value used by the rising-stocks listing endpoint.
    pub fn sosok(self) -> u8 {
        match self {
            MarketSegment::Kospi => 0,
            MarketSegment::Kosdaq => 1,
        }
    }
}

impl std::fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketSegment::Kospi => write!(f, "KOSPI"),
            MarketSegment::Kosdaq => write!(f, "KOSDAQ"),
        }
    }
}

// ── Stock ─────────────────────────────────────────────────────────────────────

/// One row of the rising-stocks listing, unique by `code` within a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stock {
    /// Exchange code, e.g. "005930".
    pub code: String,
    pub name: String,
    /// Last price in whole won.
    pub price: i64,
    /// Percent change for the day, signed.
    pub rate: f64,
    pub volume: i64,
    /// Detail page on the portal.
    pub link: String,
}

// ── Theme ─────────────────────────────────────────────────────────────────────

/// Theme as listed on the index page, before its membership is known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThemeStub {
    pub name: String,
    pub url: String,
    /// Average percent change across the theme's members.
    pub rate: f64,
}

/// Theme with its member stock codes resolved from the detail page.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub url: String,
    pub rate: f64,
    pub codes: HashSet<String>,
}

impl ThemeStub {
    pub fn with_codes(self, codes: HashSet<String>) -> Theme {
        Theme {
            name: self.name,
            url: self.url,
            rate: self.rate,
            codes,
        }
    }
}

// ── Raw rows (parser output, pre-cleaning) ────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RawStockRow {
    pub name: Option<String>,
    pub href: Option<String>,
    pub price: Option<String>,
    pub rate: Option<String>,
    pub volume: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawThemeRow {
    pub name: Option<String>,
    pub href: Option<String>,
    pub rate: Option<String>,
}

// ── Per-unit fetch outcome ────────────────────────────────────────────────────

/// Outcome of fetching one unit of upstream data (a segment listing, an
/// index page, a theme detail page). Failures never abort the run; they
/// degrade that unit to "no data" while staying observable to the caller.
#[derive(Debug)]
pub enum Fetched<T> {
    Ok(T),
    /// Page loaded but held no usable rows.
    Empty,
    Failed(FetchError),
}

impl<T> Fetched<Vec<T>> {
    pub fn from_rows(rows: Vec<T>) -> Self {
        if rows.is_empty() { Fetched::Empty } else { Fetched::Ok(rows) }
    }
}

impl<T> Fetched<HashSet<T>> {
    pub fn from_set(set: HashSet<T>) -> Self {
        if set.is_empty() { Fetched::Empty } else { Fetched::Ok(set) }
    }
}
