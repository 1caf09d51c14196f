//! Terminal presentation of pipeline output. Formatting only; all
//! ordering and grouping decisions are made upstream.

use crate::grouping::{Grouping, OTHERS_GROUP};
use crate::models::{Stock, ThemeStub};
use crate::utils::{fmt_number, fmt_rate};

pub fn print_grouping(grouping: &Grouping) {
    if grouping.is_empty() {
        println!("No groups — upstream returned no data.");
        return;
    }

    for group in grouping.sorted() {
        println!();
        if group.name == OTHERS_GROUP {
            println!("📂 {} ({}종목)", group.name, group.stocks.len());
        } else {
            println!(
                "🔥 {} (평균 {}) - {}종목",
                group.name,
                fmt_rate(group.rate),
                group.stocks.len()
            );
        }
        if let Some(url) = &group.url {
            println!("   🔗 {}", url);
        }
        print_stock_rows(&group.stocks);
    }
}

pub fn print_top(stocks: &[Stock]) {
    println!("─────────────────────────────────");
    println!("  급등주 TOP {}", stocks.len());
    println!("─────────────────────────────────");
    print_stock_rows(stocks);
}

pub fn print_themes(stubs: &[ThemeStub]) {
    println!("{} themes:", stubs.len());
    for stub in stubs {
        println!("  {:>8}  {}  ({})", fmt_rate(stub.rate), stub.name, stub.url);
    }
}

fn print_stock_rows(stocks: &[Stock]) {
    for s in stocks {
        println!(
            "   {:>8}  {}  {}원  거래량 {}  {}",
            fmt_rate(s.rate),
            s.name,
            fmt_number(s.price),
            fmt_number(s.volume),
            s.link,
        );
    }
}
