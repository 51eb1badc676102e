//! Builds the recommendation prompt sent to the language model.

use std::fmt::Write as _;

use serpwatch_shared::{SCAN_WINDOW, SearchResult};

const UNTITLED: &str = "untitled";

/// Human-readable description of a rank.
pub fn position_text(position: i32) -> String {
    if position > 0 {
        format!("at position {position}")
    } else {
        format!("not in the top {SCAN_WINDOW}")
    }
}

/// `"{rank}. {title} ({url})"` lines for the first `n` results.
pub fn top_results(results: &[SearchResult], n: usize) -> String {
    let mut out = String::new();
    for (i, r) in results.iter().take(n).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let title = r
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(UNTITLED);
        let _ = write!(out, "{}. {} ({})", i + 1, title, r.url);
    }
    out
}

/// The full prompt for one keyword/domain pair.
pub fn build_prompt(
    domain: &str,
    keyword: &str,
    position: i32,
    results: &[SearchResult],
    top_n: usize,
) -> String {
    format!(
        "You are an SEO specialist. Analyze the position of the site {domain}\n\
         for the search keyword: \"{keyword}\".\n\
         \n\
         Current position: {position}\n\
         Top {top_n} results:\n\
         {listing}\n\
         \n\
         Give recommendations for improving the ranking. Be specific and suggest practical steps.\n\
         Rate the urgency and importance of each recommendation.\n",
        position = position_text(position),
        listing = top_results(results, top_n),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SearchResult> {
        (1..=7)
            .map(|i| SearchResult::new(format!("https://site{i}.com")).with_title(format!("Site {i}")))
            .collect()
    }

    #[test]
    fn position_text_variants() {
        assert_eq!(position_text(3), "at position 3");
        assert_eq!(position_text(-1), "not in the top 20");
        assert_eq!(position_text(0), "not in the top 20");
    }

    #[test]
    fn top_results_takes_first_n_in_order() {
        let listing = top_results(&sample(), 5);
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "1. Site 1 (https://site1.com)");
        assert_eq!(lines[4], "5. Site 5 (https://site5.com)");
    }

    #[test]
    fn missing_title_reads_untitled() {
        let listing = top_results(&[SearchResult::new("https://a.com")], 5);
        assert_eq!(listing, "1. untitled (https://a.com)");
    }

    #[test]
    fn prompt_embeds_everything() {
        let prompt = build_prompt("example.com", "kitchens", -1, &sample(), 5);
        assert!(prompt.contains("example.com"));
        assert!(prompt.contains("\"kitchens\""));
        assert!(prompt.contains("not in the top 20"));
        assert!(prompt.contains("5. Site 5 (https://site5.com)"));
        assert!(!prompt.contains("Site 6"));
    }
}
