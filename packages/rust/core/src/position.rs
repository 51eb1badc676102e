//! Locating a domain in a ranked result list.

use serpwatch_shared::{PositionEntry, SearchResult};

/// Rank reported when the domain does not appear in the list.
pub const NOT_RANKED: i32 = -1;

/// 1-based rank of the first result whose URL contains `domain`.
///
/// Plain case-sensitive substring match, so `example.com` also matches
/// `sub.example.com` and `notexample.com`. An empty domain never matches.
pub fn find_domain_position(results: &[SearchResult], domain: &str) -> i32 {
    if domain.is_empty() {
        return NOT_RANKED;
    }
    results
        .iter()
        .position(|r| r.url.contains(domain))
        .map_or(NOT_RANKED, |i| i as i32 + 1)
}

/// The full ranking with each entry flagged as ours or not.
pub fn rank_entries(results: &[SearchResult], domain: &str) -> Vec<PositionEntry> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| PositionEntry {
            url: r.url.clone(),
            title: r.title.clone(),
            position: i as u32 + 1,
            is_our_site: !domain.is_empty() && r.url.contains(domain),
        })
        .collect()
}
