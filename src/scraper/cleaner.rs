use crate::models::{RawStockRow, RawThemeRow, Stock, ThemeStub};

// ── Field parsers ─────────────────────────────────────────────────────────────

/// First run of digits after comma-stripping.
/// "71,200" → 71200 | "상한가 1,234" → 1234 | "—" → None
pub fn parse_amount(s: &str) -> Option<i64> {
    let stripped = s.replace(',', "");
    let start = stripped.find(|c: char| c.is_ascii_digit())?;
    let digits: String = stripped[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// First signed decimal after stripping percent signs and commas.
/// "+3.04%" → 3.04 | "-0.5%" → -0.5 | "0.00%" → 0.0
pub fn parse_rate(s: &str) -> Option<f64> {
    let stripped = s.replace('%', "").replace(',', "");
    let bytes = stripped.as_bytes();

    let start = bytes.iter().position(|&b| {
        b.is_ascii_digit() || b == b'+' || b == b'-'
    })?;

    let mut end = start;
    let mut seen_dot = false;
    for &b in &bytes[start..] {
        match b {
            b'+' | b'-' if end == start => end += 1,
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }

    stripped[start..end].trim_start_matches('+').parse().ok()
}

/// Stock code from a portal link target: the substring after the last `=`.
/// "/item/main.naver?code=005930" → "005930"
pub fn code_from_href(href: &str) -> Option<String> {
    let code = href.rsplit('=').next()?;
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

// ── Raw row → typed ───────────────────────────────────────────────────────────

/// Convert a raw listing row into a [`Stock`]. Rows without a usable name
/// or code are dropped; unparseable numeric cells degrade to zero, matching
/// how the listing page renders halted stocks.
pub fn stock_row_to_stock(row: &RawStockRow, base_url: &str) -> Option<Stock> {
    let name = row.name.as_deref()?.trim();
    if name.is_empty() {
        return None;
    }
    let code = code_from_href(row.href.as_deref()?)?;

    Some(Stock {
        link: format!("{}/item/main.naver?code={}", base_url, code),
        code,
        name: name.to_string(),
        price: row.price.as_deref().and_then(parse_amount).unwrap_or(0),
        rate: row.rate.as_deref().and_then(parse_rate).unwrap_or(0.0),
        volume: row.volume.as_deref().and_then(parse_amount).unwrap_or(0),
    })
}

/// Convert a raw theme-index row into a [`ThemeStub`]. A row whose rate
/// cell holds no number is dropped rather than defaulted, same as rows
/// without a name link.
pub fn theme_row_to_stub(row: &RawThemeRow, base_url: &str) -> Option<ThemeStub> {
    let name = row.name.as_deref()?.trim();
    if name.is_empty() {
        return None;
    }
    let href = row.href.as_deref()?;
    let rate = row.rate.as_deref().and_then(parse_rate)?;

    let url = url::Url::parse(base_url)
        .ok()?
        .join(href)
        .ok()?
        .to_string();

    Some(ThemeStub {
        name: name.to_string(),
        url,
        rate,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
