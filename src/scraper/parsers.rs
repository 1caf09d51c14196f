use std::collections::HashSet;

use anyhow::Result;
use scraper::{Html, Selector};

use crate::models::{RawStockRow, RawThemeRow};
use crate::scraper::cleaner::code_from_href;

fn sel(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow::anyhow!("selector {s:?}: {e:?}"))
}

// ── Rising-stocks listing page ────────────────────────────────────────────────

/// Extract raw stock rows from a `sise_rise` listing page.
///
/// Layout: `table.type_2` with one `tr` per stock. A qualifying row has at
/// least 10 `td` cells and a stock link in the second cell; everything else
/// (header rows, spacer rows, ad rows) is skipped.
pub fn parse_rising_page(html: &str) -> Result<Vec<RawStockRow>> {
    let doc = Html::parse_document(html);

    let row_sel = sel("table.type_2 tr")?;
    let td_sel = sel("td")?;
    let a_sel = sel("a")?;

    let mut rows = Vec::new();

    for tr in doc.select(&row_sel) {
        let cells: Vec<_> = tr.select(&td_sel).collect();
        if cells.len() < 10 {
            continue;
        }

        let Some(link) = cells[1].select(&a_sel).next() else {
            continue;
        };

        rows.push(RawStockRow {
            name: Some(link.text().collect::<String>().trim().to_string()),
            href: link.value().attr("href").map(|h| h.to_string()),
            price: Some(cell_text(&cells[2])),
            rate: Some(cell_text(&cells[4])),
            volume: Some(cell_text(&cells[6])),
        });
    }

    Ok(rows)
}

// ── Theme index page ──────────────────────────────────────────────────────────

/// Extract raw theme rows from one page of the theme index.
///
/// Layout: `table.type_1`, name link in the first cell, average percent
/// change in the second.
pub fn parse_theme_index_page(html: &str) -> Result<Vec<RawThemeRow>> {
    let doc = Html::parse_document(html);

    let row_sel = sel("table.type_1 tr")?;
    let td_sel = sel("td")?;
    let a_sel = sel("a")?;

    let mut rows = Vec::new();

    for tr in doc.select(&row_sel) {
        let cells: Vec<_> = tr.select(&td_sel).collect();
        if cells.len() < 2 {
            continue;
        }

        let Some(link) = cells[0].select(&a_sel).next() else {
            continue;
        };

        rows.push(RawThemeRow {
            name: Some(link.text().collect::<String>().trim().to_string()),
            href: link.value().attr("href").map(|h| h.to_string()),
            rate: Some(cell_text(&cells[1])),
        });
    }

    Ok(rows)
}

// ── Theme detail page ─────────────────────────────────────────────────────────

/// Extract member stock codes from a theme detail page.
///
/// Every link in the membership table whose target carries a `code=`
/// parameter counts; duplicates collapse into the set.
pub fn parse_theme_members(html: &str) -> Result<HashSet<String>> {
    let doc = Html::parse_document(html);

    let a_sel = sel("table.type_5 tr td a")?;

    let mut codes = HashSet::new();
    for link in doc.select(&a_sel) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if href.contains("code=") {
            if let Some(code) = code_from_href(href) {
                codes.insert(code);
            }
        }
    }
    Ok(codes)
}

fn cell_text(cell: &scraper::ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
