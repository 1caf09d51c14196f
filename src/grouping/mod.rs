//! The join phase: intersect each theme's membership with the ranked
//! top list and bucket every ranked stock into exactly one group.
//!
//! Pure and single-threaded; runs after the scatter/gather barrier so it
//! never sees a half-fetched theme.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::models::{Stock, Theme};

/// Reserved key for ranked stocks no theme claimed.
pub const OTHERS_GROUP: &str = "[개별 급등주 / 기타 재료]";

/// One rendered group: a theme that claimed at least one ranked stock,
/// or the catch-all for the rest.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Group {
    pub name: String,
    /// Theme's average percent change; 0 for the catch-all.
    pub rate: f64,
    /// Members, percent change descending.
    pub stocks: Vec<Stock>,
    /// Theme detail page; the catch-all has none.
    pub url: Option<String>,
}

/// The final mapping from group name to group.
#[derive(Debug, Default, Serialize)]
pub struct Grouping {
    pub groups: HashMap<String, Group>,
}

impl Grouping {
    /// Display order: most members first, then name for determinism.
    pub fn sorted(&self) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self.groups.values().collect();
        groups.sort_by(|a, b| {
            b.stocks
                .len()
                .cmp(&a.stocks.len())
                .then_with(|| a.name.cmp(&b.name))
        });
        groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Join ranked stocks against theme memberships.
///
/// A theme whose membership does not intersect the ranked set is dropped.
/// Every ranked stock lands in exactly one group: the first theme (in
/// theme-list order) that claims it keeps claiming through the shared
/// claimed-set, and whatever remains goes to [`OTHERS_GROUP`] in original
/// rank order.
pub fn group_by_theme(ranked: &[Stock], themes: &[Theme]) -> Grouping {
    let by_code: HashMap<&str, &Stock> = ranked.iter().map(|s| (s.code.as_str(), s)).collect();

    let mut groups: HashMap<String, Group> = HashMap::new();
    let mut claimed: HashSet<&str> = HashSet::new();

    for theme in themes {
        let mut matched: Vec<Stock> = theme
            .codes
            .iter()
            .filter_map(|code| by_code.get(code.as_str()).copied())
            .cloned()
            .collect();

        if matched.is_empty() {
            continue;
        }

        // Two distinct theme pages can share a display name. The first
        // occurrence wins; the loser's stocks stay unclaimed so they can
        // still surface in the catch-all rather than vanish.
        if groups.contains_key(&theme.name) {
            warn!("Duplicate theme name {:?}, keeping first occurrence", theme.name);
            continue;
        }

        for stock in &matched {
            if let Some((code, _)) = by_code.get_key_value(stock.code.as_str()) {
                claimed.insert(code);
            }
        }

        matched.sort_by(|a, b| b.rate.total_cmp(&a.rate));

        groups.insert(
            theme.name.clone(),
            Group {
                name: theme.name.clone(),
                rate: theme.rate,
                stocks: matched,
                url: Some(theme.url.clone()),
            },
        );
    }

    let others: Vec<Stock> = ranked
        .iter()
        .filter(|s| !claimed.contains(s.code.as_str()))
        .cloned()
        .collect();

    if !others.is_empty() {
        groups.insert(
            OTHERS_GROUP.to_string(),
            Group {
                name: OTHERS_GROUP.to_string(),
                rate: 0.0,
                stocks: others,
                url: None,
            },
        );
    }

    Grouping { groups }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(code: &str, rate: f64) -> Stock {
        Stock {
            code: code.to_string(),
            name: format!("종목{}", code),
            price: 10_000,
            rate,
            volume: 50_000,
            link: format!("https://finance.naver.com/item/main.naver?code={}", code),
        }
    }

    fn theme(name: &str, rate: f64, codes: &[&str]) -> Theme {
        Theme {
            name: name.to_string(),
            url: format!("https://finance.naver.com/sise/sise_group_detail.naver?no={}", name),
            rate,
            codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_basic_grouping_with_catch_all() {
        let ranked = vec![stock("A", 5.0), stock("B", 3.0), stock("C", 1.0)];
        let themes = vec![theme("T1", 2.5, &["A", "C"])];

        let grouping = group_by_theme(&ranked, &themes);
        assert_eq!(grouping.len(), 2);

        let t1 = &grouping.groups["T1"];
        assert_eq!(
            t1.stocks.iter().map(|s| s.code.as_str()).collect::<Vec<_>>(),
            vec!["A", "C"]
        );
        assert_eq!(t1.rate, 2.5);
        assert!(t1.url.is_some());

        let others = &grouping.groups[OTHERS_GROUP];
        assert_eq!(
            others.stocks.iter().map(|s| s.code.as_str()).collect::<Vec<_>>(),
            vec!["B"]
        );
        assert_eq!(others.rate, 0.0);
        assert!(others.url.is_none());
    }

    #[test]
    fn test_theme_without_intersection_is_dropped() {
        let ranked = vec![stock("A", 5.0)];
        let themes = vec![theme("유령테마", 9.0, &["X", "Y"])];

        let grouping = group_by_theme(&ranked, &themes);
        assert!(!grouping.groups.contains_key("유령테마"));
        assert_eq!(grouping.len(), 1); // only the catch-all
    }

    #[test]
    fn test_empty_membership_is_dropped() {
        let ranked = vec![stock("A", 5.0)];
        let themes = vec![theme("빈테마", 1.0, &[])];

        let grouping = group_by_theme(&ranked, &themes);
        assert!(!grouping.groups.contains_key("빈테마"));
    }

    #[test]
    fn test_groups_partition_the_ranked_set() {
        let ranked = vec![
            stock("A", 9.0),
            stock("B", 7.0),
            stock("C", 5.0),
            stock("D", 3.0),
        ];
        let themes = vec![
            theme("T1", 4.0, &["A", "B"]),
            theme("T2", 2.0, &["C", "Z"]),
        ];

        let grouping = group_by_theme(&ranked, &themes);

        let mut seen: Vec<&str> = Vec::new();
        for group in grouping.groups.values() {
            for s in &group.stocks {
                assert!(
                    !seen.contains(&s.code.as_str()),
                    "{} appears in more than one group",
                    s.code
                );
                seen.push(&s.code);
            }
        }
        seen.sort();
        assert_eq!(seen, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_member_sort_and_catch_all_order() {
        let ranked = vec![stock("A", 9.0), stock("B", 7.0), stock("C", 5.0)];
        let themes = vec![theme("T1", 1.0, &["C", "A"])];

        let grouping = group_by_theme(&ranked, &themes);

        // Matched members re-sorted rate-descending, regardless of set order.
        let t1: Vec<&str> = grouping.groups["T1"].stocks.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(t1, vec!["A", "C"]);

        // Catch-all preserves original rank order.
        let others: Vec<&str> = grouping.groups[OTHERS_GROUP]
            .stocks
            .iter()
            .map(|s| s.code.as_str())
            .collect();
        assert_eq!(others, vec!["B"]);
    }

    #[test]
    fn test_no_catch_all_when_everything_claimed() {
        let ranked = vec![stock("A", 5.0)];
        let themes = vec![theme("T1", 1.0, &["A"])];

        let grouping = group_by_theme(&ranked, &themes);
        assert!(!grouping.groups.contains_key(OTHERS_GROUP));
    }

    #[test]
    fn test_duplicate_theme_name_keeps_first() {
        let ranked = vec![stock("A", 5.0), stock("B", 3.0)];
        let first = theme("중복", 1.0, &["A"]);
        let mut second = theme("중복", 2.0, &["B"]);
        second.url = "https://finance.naver.com/other".to_string();

        let grouping = group_by_theme(&ranked, &[first, second]);

        let group = &grouping.groups["중복"];
        assert_eq!(group.rate, 1.0);
        assert_eq!(group.stocks[0].code, "A");

        // The shadowed theme never claims, so B falls through to the
        // catch-all and the ranked set stays fully partitioned.
        let others: Vec<&str> = grouping.groups[OTHERS_GROUP]
            .stocks
            .iter()
            .map(|s| s.code.as_str())
            .collect();
        assert_eq!(others, vec!["B"]);
    }

    #[test]
    fn test_sorted_by_member_count_desc() {
        let ranked = vec![
            stock("A", 9.0),
            stock("B", 7.0),
            stock("C", 5.0),
            stock("D", 3.0),
        ];
        let themes = vec![
            theme("작은테마", 1.0, &["A"]),
            theme("큰테마", 1.0, &["B", "C", "D"]),
        ];

        let grouping = group_by_theme(&ranked, &themes);
        let names: Vec<&str> = grouping.sorted().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["큰테마", "작은테마"]);
    }

    #[test]
    fn test_idempotent_over_same_input() {
        let ranked = vec![stock("A", 5.0), stock("B", 3.0)];
        let themes = vec![theme("T1", 1.0, &["A"])];

        let first = group_by_theme(&ranked, &themes);
        let second = group_by_theme(&ranked, &themes);

        assert_eq!(first.len(), second.len());
        for (name, group) in &first.groups {
            assert_eq!(Some(group), second.groups.get(name));
        }
    }
}
